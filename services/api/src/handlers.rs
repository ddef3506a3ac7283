//! Axum Handlers for the REST API
//!
//! Health probe, phrase suggestion and text-to-speech. `utoipa` doc comments
//! feed the OpenAPI document.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use meetsl_core::{
    phrase::{PhraseRequest, SuggestError},
    speech::{SpeechError, synthesize_speech},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    models::{ErrorResponse, HealthResponse, SuggestPayload, SuggestionResponse, TtsPayload},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    /// A failure whose details are logged but not returned to the client.
    InternalServerError(anyhow::Error, &'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err, message) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        message: message.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Suggest a fluent phrase for a batch of recognized sign tokens.
#[utoipa::path(
    post,
    path = "/llm/suggest",
    request_body = SuggestPayload,
    responses(
        (status = 200, description = "Phrase suggestion", body = SuggestionResponse),
        (status = 400, description = "Empty token list", body = ErrorResponse)
    )
)]
pub async fn llm_suggest(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SuggestPayload>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    let request = PhraseRequest::from(payload);
    let suggestion = state
        .phrase_suggester
        .suggest(&request)
        .await
        .map_err(|e| match e {
            SuggestError::EmptyTokenList => ApiError::BadRequest(e.to_string()),
        })?;
    Ok(Json(suggestion.into()))
}

/// Synthesize speech for a piece of text, returned as MP3 audio.
#[utoipa::path(
    post,
    path = "/tts",
    request_body = TtsPayload,
    responses(
        (status = 200, description = "MP3 audio", content_type = "audio/mpeg", body = Vec<u8>),
        (status = 400, description = "Blank text", body = ErrorResponse),
        (status = 500, description = "Synthesis failed", body = ErrorResponse)
    )
)]
pub async fn text_to_speech(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TtsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let audio = synthesize_speech(state.speech.as_ref(), &payload.text, &payload.lang)
        .await
        .map_err(|e| match e {
            SpeechError::EmptyText => ApiError::BadRequest(e.to_string()),
            SpeechError::Synthesis(err) => {
                ApiError::InternalServerError(err, "TTS generation failed")
            }
        })?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}
