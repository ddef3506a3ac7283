//! Text-to-Speech
//!
//! Converts text to MP3 audio through a [`SpeechSynthesizer`]. The bundled
//! backend talks to the Google Translate TTS endpoint, which only accepts
//! short utterances, so longer text is fetched in word-aligned chunks and the
//! MP3 segments are concatenated.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tracing::debug;

/// Longest text segment sent in a single TTS request.
pub const MAX_CHUNK_CHARS: usize = 100;

pub const DEFAULT_LANG: &str = "en";

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("text must not be empty")]
    EmptyText,
    #[error("speech synthesis failed: {0:#}")]
    Synthesis(anyhow::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns MP3 audio for already-validated, non-blank text.
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes>;
}

/// Validates the text and synthesizes it.
pub async fn synthesize_speech(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    lang: &str,
) -> Result<Bytes, SpeechError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SpeechError::EmptyText);
    }
    synthesizer
        .synthesize(text, lang)
        .await
        .map_err(SpeechError::Synthesis)
}

/// Splits text on whitespace into segments of at most `max_chars` characters.
/// A single word longer than the limit is cut at character boundaries.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }
        if current_len > 0 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len <= max_chars {
            current.push_str(word);
            current_len = word_len;
        } else {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
        }
    }
    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

/// Speech backed by the Google Translate `translate_tts` endpoint.
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateTts {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client for TTS")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        let total = chunks.len().to_string();
        let url = format!("{}/translate_tts", self.base_url);
        let mut audio = BytesMut::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", lang),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .with_context(|| format!("TTS request for chunk {} failed", idx))?
                .error_for_status()
                .context("TTS service rejected the request")?;
            let segment = response.bytes().await.context("Failed to read TTS audio")?;
            debug!(chunk = %idx, bytes = segment.len(), "Received TTS segment");
            audio.extend_from_slice(&segment);
        }

        Ok(audio.freeze())
    }
}
