//! Phrase Suggestion Service
//!
//! Turns a time-ordered batch of recognized sign tokens into a fluent phrase.
//! The wording comes from a language model behind the [`PhraseGenerator`]
//! trait, while the uncertainty of the batch is judged locally from the token
//! confidences. If the model cannot help, the raw tokens are joined instead,
//! so a suggestion is always produced for a non-empty batch.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, warn};

/// Most alternatives returned alongside a suggestion.
pub const MAX_ALTERNATIVES: usize = 3;

/// Minimum confidence at which a batch needs no confirmation.
const LOW_UNCERTAINTY_FLOOR: f64 = 0.6;
/// Minimum confidence at which a batch is only moderately uncertain.
const MEDIUM_UNCERTAINTY_FLOOR: f64 = 0.5;

/// A sign recognized earlier in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedToken {
    pub token: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub ts: Option<f64>,
}

/// Conversation setting, used to steer the phrasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    Meeting,
    Interview,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Meeting => write!(f, "meeting"),
            Domain::Interview => write!(f, "interview"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhraseRequest {
    pub tokens: Vec<RecognizedToken>,
    pub domain: Domain,
    pub recent_speech_context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhraseSuggestion {
    pub suggested_text: String,
    pub uncertainty_level: UncertaintyLevel,
    pub alternatives: Vec<String>,
    pub needs_confirmation: bool,
}

/// Raw output of a phrase generator, before local policy is applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneratedPhrase {
    pub text: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SuggestError {
    #[error("At least one token is required")]
    EmptyTokenList,
}

/// Anything that can word a batch of tokens as a phrase.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhraseGenerator: Send + Sync {
    async fn generate(&self, request: &PhraseRequest) -> Result<GeneratedPhrase>;
}

/// Classifies a batch by its weakest token.
///
/// Fewer than two tokens give too little context to trust, regardless of
/// confidence.
pub fn assess_uncertainty(tokens: &[RecognizedToken]) -> (UncertaintyLevel, bool) {
    if tokens.len() < 2 {
        return (UncertaintyLevel::High, true);
    }
    let min_confidence = tokens
        .iter()
        .map(|t| t.confidence)
        .fold(f64::INFINITY, f64::min);

    if min_confidence >= LOW_UNCERTAINTY_FLOOR {
        (UncertaintyLevel::Low, false)
    } else if min_confidence >= MEDIUM_UNCERTAINTY_FLOOR {
        (UncertaintyLevel::Medium, true)
    } else {
        (UncertaintyLevel::High, true)
    }
}

/// Applies local policy around an optional phrase generator.
pub struct PhraseSuggester {
    generator: Option<Arc<dyn PhraseGenerator>>,
}

impl PhraseSuggester {
    pub fn new(generator: Arc<dyn PhraseGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// A suggester with no language model; every suggestion is the joined tokens.
    pub fn fallback_only() -> Self {
        Self { generator: None }
    }

    pub async fn suggest(&self, request: &PhraseRequest) -> Result<PhraseSuggestion, SuggestError> {
        if request.tokens.is_empty() {
            return Err(SuggestError::EmptyTokenList);
        }
        let (uncertainty_level, needs_confirmation) = assess_uncertainty(&request.tokens);

        let Some(generator) = &self.generator else {
            debug!("No phrase generator configured, joining tokens");
            return Ok(fallback(request, uncertainty_level, needs_confirmation));
        };

        match generator.generate(request).await {
            Ok(phrase) if !phrase.text.trim().is_empty() => {
                let mut alternatives = phrase.alternatives;
                alternatives.truncate(MAX_ALTERNATIVES);
                Ok(PhraseSuggestion {
                    suggested_text: phrase.text,
                    uncertainty_level,
                    alternatives,
                    needs_confirmation,
                })
            }
            Ok(_) => {
                warn!("Phrase generator returned an empty phrase, joining tokens");
                Ok(fallback(request, uncertainty_level, needs_confirmation))
            }
            Err(e) => {
                warn!(error = ?e, "Phrase generation failed, joining tokens");
                Ok(fallback(request, uncertainty_level, needs_confirmation))
            }
        }
    }
}

fn fallback(
    request: &PhraseRequest,
    uncertainty_level: UncertaintyLevel,
    needs_confirmation: bool,
) -> PhraseSuggestion {
    let suggested_text = request
        .tokens
        .iter()
        .map(|t| t.token.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    PhraseSuggestion {
        suggested_text,
        uncertainty_level,
        alternatives: Vec::new(),
        needs_confirmation,
    }
}

/// Renders the user turn sent to the language model.
pub fn render_user_message(request: &PhraseRequest) -> String {
    let tokens = request
        .tokens
        .iter()
        .map(|t| format!("\"{}\" (conf={:.2})", t.token, t.confidence))
        .collect::<Vec<_>>()
        .join(", ");
    let mut message = format!("Domain: {}\nRecognized tokens: [{}]", request.domain, tokens);
    if let Some(context) = request
        .recent_speech_context
        .as_deref()
        .filter(|c| !c.is_empty())
    {
        message.push_str("\nRecent speech context: ");
        message.push_str(context);
    }
    message
}

#[derive(Deserialize)]
struct PhraseReply {
    #[serde(default)]
    suggested_text: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

/// Parses the model's JSON reply, tolerating a surrounding Markdown code fence.
pub fn parse_phrase_reply(raw: &str) -> Result<GeneratedPhrase> {
    let mut body = raw.trim();
    if body.starts_with("```") {
        body = body.split_once('\n').map_or(body, |(_, rest)| rest);
        body = body.rsplit_once("```").map_or(body, |(inner, _)| inner).trim();
    }
    let reply: PhraseReply =
        serde_json::from_str(body).context("Phrase reply was not the expected JSON object")?;
    Ok(GeneratedPhrase {
        text: reply.suggested_text,
        alternatives: reply.alternatives,
    })
}

/// A `PhraseGenerator` for any OpenAI-compatible chat completion API.
pub struct OpenAIPhraseGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
}

impl OpenAIPhraseGenerator {
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the completion service.
    /// * `model` - Chat model identifier (e.g., "gpt-4o-mini").
    /// * `system_prompt` - Instructions describing the reply format.
    pub fn new(config: OpenAIConfig, model: String, system_prompt: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            system_prompt,
        }
    }
}

#[async_trait]
impl PhraseGenerator for OpenAIPhraseGenerator {
    async fn generate(&self, request: &PhraseRequest) -> Result<GeneratedPhrase> {
        let completion = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.0)
            .max_completion_tokens(200u32)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(self.system_prompt.clone())
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(render_user_message(request))
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(completion).await?;
        let answer = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .as_ref()
            .context("No content in LLM response")?;

        parse_phrase_reply(answer)
    }
}
