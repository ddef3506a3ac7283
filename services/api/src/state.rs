//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared, long-lived
//! collaborators every handler and WebSocket session works with.

use crate::config::Config;
use meetsl_core::{
    classifier::GestureClassifier, phrase::PhraseSuggester, speech::SpeechSynthesizer,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    /// The one gesture classifier shared by every session.
    pub classifier: Arc<GestureClassifier>,
    pub phrase_suggester: Arc<PhraseSuggester>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub config: Arc<Config>,
}
