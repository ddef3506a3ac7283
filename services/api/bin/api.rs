//! Main Entrypoint for the MeetSL API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the gesture model once, before any session can connect.
//! 3. Initializing shared services (phrase suggestion and speech synthesis).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use axum::http::HeaderValue;
use meetsl_api::{config::Config, router::create_router, state::AppState};
use meetsl_core::{
    classifier::GestureClassifier,
    phrase::{OpenAIPhraseGenerator, PhraseSuggester},
    speech::{GoogleTranslateTts, SpeechSynthesizer},
};
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal. Shutting down gracefully..."),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origin == "*" {
        AllowOrigin::from(Any)
    } else {
        let origin = HeaderValue::from_str(origin)
            .with_context(|| format!("CORS_ORIGIN '{}' is not a valid header value", origin))?;
        AllowOrigin::exact(origin)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load the Gesture Model ---
    let classifier = Arc::new(GestureClassifier::new(&config.model_path));
    if let Err(e) = classifier.ensure_loaded() {
        error!(error = %e, "Gesture model could not be loaded");
        return Err(e).context("Failed to load gesture model");
    }
    info!(model_path = %classifier.model_path().display(), "Gesture model ready");

    // --- 4. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    let system_prompt = prompts
        .get("phrase_suggestion")
        .context("phrase_suggestion.md not found in prompts directory")?
        .clone();

    let phrase_suggester = match &config.openai_api_key {
        Some(api_key) => {
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(&config.openai_api_base);
            Arc::new(PhraseSuggester::new(Arc::new(OpenAIPhraseGenerator::new(
                openai_config,
                config.chat_model.clone(),
                system_prompt,
            ))))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; phrase suggestions will join raw tokens");
            Arc::new(PhraseSuggester::fallback_only())
        }
    };

    let speech: Arc<dyn SpeechSynthesizer> = Arc::new(GoogleTranslateTts::new(
        config.tts_base_url.clone(),
    )?);

    // --- 5. Create Router and Apply Middleware ---
    let cors = cors_layer(&config.cors_origin)?;

    let app_state = Arc::new(AppState {
        classifier,
        phrase_suggester,
        speech,
        config: Arc::new(config.clone()),
    });

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        chat_model = %config.chat_model,
        llm_enabled = config.openai_api_key.is_some(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
