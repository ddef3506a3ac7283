//! API Models
//!
//! Request and response bodies of the REST endpoints, annotated with `utoipa`
//! for the OpenAPI document. Core types that carry no schema of their own are
//! described through `value_type` overrides.

use meetsl_core::phrase::{
    Domain, PhraseRequest, PhraseSuggestion, RecognizedToken, UncertaintyLevel,
};
use meetsl_core::speech::DEFAULT_LANG;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct TokenPayload {
    #[schema(example = "hello")]
    pub token: String,
    #[serde(default)]
    #[schema(example = 0.92)]
    pub confidence: f64,
    #[serde(default)]
    #[schema(example = 1718000000123.0)]
    pub ts: Option<f64>,
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct SuggestPayload {
    pub tokens: Vec<TokenPayload>,
    #[serde(default)]
    #[schema(value_type = String, example = "meeting")]
    pub domain: Domain,
    #[serde(default)]
    pub recent_speech_context: Option<String>,
}

impl From<SuggestPayload> for PhraseRequest {
    fn from(payload: SuggestPayload) -> Self {
        PhraseRequest {
            tokens: payload
                .tokens
                .into_iter()
                .map(|t| RecognizedToken {
                    token: t.token,
                    confidence: t.confidence,
                    ts: t.ts,
                })
                .collect(),
            domain: payload.domain,
            recent_speech_context: payload.recent_speech_context,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct SuggestionResponse {
    #[schema(example = "Hello, nice to meet you")]
    pub suggested_text: String,
    #[schema(value_type = String, example = "low")]
    pub uncertainty_level: UncertaintyLevel,
    pub alternatives: Vec<String>,
    pub needs_confirmation: bool,
}

impl From<PhraseSuggestion> for SuggestionResponse {
    fn from(suggestion: PhraseSuggestion) -> Self {
        Self {
            suggested_text: suggestion.suggested_text,
            uncertainty_level: suggestion.uncertainty_level,
            alternatives: suggestion.alternatives,
            needs_confirmation: suggestion.needs_confirmation,
        }
    }
}

fn default_lang() -> String {
    DEFAULT_LANG.to_string()
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct TtsPayload {
    #[schema(example = "Nice to meet you")]
    pub text: String,
    #[serde(default = "default_lang")]
    #[schema(example = "en")]
    pub lang: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
