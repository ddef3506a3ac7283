//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, HealthResponse, SuggestPayload, SuggestionResponse, TokenPayload,
        TtsPayload,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::healthz,
        handlers::llm_suggest,
        handlers::text_to_speech,
    ),
    components(
        schemas(HealthResponse, TokenPayload, SuggestPayload, SuggestionResponse, TtsPayload, ErrorResponse)
    ),
    tags(
        (name = "MeetSL API", description = "Sign recognition, phrase suggestion and speech for video meetings")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/llm/suggest", post(handlers::llm_suggest))
        .route("/tts", post(handlers::text_to_speech))
        .route("/ws/session/{session_id}", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
