//! Defines the WebSocket message protocol between the browser client and the API server.

use meetsl_core::Prediction;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Close code sent when the session identifier in the URL is rejected.
pub const INVALID_SESSION_CLOSE_CODE: u16 = 4400;
pub const INVALID_SESSION_REASON: &str = "Invalid session ID";

const MAX_SESSION_ID_LEN: usize = 64;

/// A client-chosen session identifier: 1 to 64 ASCII letters, digits or hyphens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("session id must be 1-64 characters of [A-Za-z0-9-]")]
pub struct InvalidSessionId;

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, InvalidSessionId> {
        let valid_len = (1..=MAX_SESSION_ID_LEN).contains(&raw.len());
        if valid_len && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidSessionId)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A webcam frame sent by the client.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FrameMessage {
    /// Base64-encoded JPEG still.
    #[serde(rename = "jpgBase64")]
    pub jpg_base64: String,
    /// Client timestamp, echoed back verbatim on the matching prediction.
    pub ts: Number,
}

/// An inbound text message, after type filtering.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Frame(FrameMessage),
    /// Well-formed message of a type this server does not handle.
    Ignored,
}

/// A message that breaks the protocol. Any of these ends the session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("frame message is missing or mistyping fields: {0}")]
    InvalidFrame(#[source] serde_json::Error),
    #[error("binary messages are not supported")]
    Binary,
}

/// Parses one text message from the client.
///
/// Only objects whose `type` is exactly `"frame"` are processed; other objects
/// are skipped so newer clients can add message types.
pub fn parse_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let Value::Object(fields) = &value else {
        return Err(ProtocolError::NotAnObject);
    };
    if fields.get("type").and_then(Value::as_str) != Some("frame") {
        return Ok(Inbound::Ignored);
    }
    serde_json::from_value(value)
        .map(Inbound::Frame)
        .map_err(ProtocolError::InvalidFrame)
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A recognized sign for one frame.
    SignPred {
        token: String,
        confidence: f64,
        ts: Number,
    },
}

impl ServerMessage {
    pub fn sign_prediction(prediction: Prediction, ts: Number) -> Self {
        ServerMessage::SignPred {
            token: prediction.token,
            confidence: round_confidence(prediction.confidence),
            ts,
        }
    }
}

/// Clamps a score into [0, 1] and rounds it to 4 decimal places.
pub fn round_confidence(confidence: f64) -> f64 {
    (confidence.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_id_accepts_valid_ids() {
        for id in ["abc-123", "A", "-", "0123456789", "x".repeat(64).as_str()] {
            assert!(SessionId::parse(id).is_ok(), "{id} should be valid");
        }
        assert_eq!(SessionId::parse("abc-123").unwrap().as_str(), "abc-123");
    }

    #[test]
    fn test_session_id_rejects_invalid_ids() {
        for id in [
            "",
            "under_score",
            "has space",
            "dot.ted",
            "slash/ed",
            "ünïcode",
            "x".repeat(65).as_str(),
        ] {
            assert_eq!(SessionId::parse(id), Err(InvalidSessionId), "{id:?}");
        }
    }

    #[test]
    fn test_parse_frame() {
        let inbound =
            parse_inbound(r#"{"type":"frame","jpgBase64":"AAAA","ts":1712.5}"#).unwrap();
        let Inbound::Frame(frame) = inbound else {
            panic!("expected a frame");
        };
        assert_eq!(frame.jpg_base64, "AAAA");
        assert_eq!(frame.ts.as_f64(), Some(1712.5));
    }

    #[test]
    fn test_other_types_are_ignored() {
        for text in [
            r#"{"type":"ping"}"#,
            r#"{"type":"Frame","jpgBase64":"AAAA","ts":1}"#,
            r#"{"jpgBase64":"AAAA","ts":1}"#,
            r#"{"type":7}"#,
            "{}",
        ] {
            assert_eq!(parse_inbound(text).unwrap(), Inbound::Ignored, "{text}");
        }
    }

    #[test]
    fn test_malformed_messages_are_protocol_errors() {
        assert!(matches!(
            parse_inbound("not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_inbound("[1, 2]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            parse_inbound(r#"{"type":"frame","ts":1}"#),
            Err(ProtocolError::InvalidFrame(_))
        ));
        assert!(matches!(
            parse_inbound(r#"{"type":"frame","jpgBase64":"AAAA","ts":"yesterday"}"#),
            Err(ProtocolError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_prediction_serialization_echoes_timestamp() {
        let msg = ServerMessage::sign_prediction(
            Prediction {
                token: "Thumb_Up".to_string(),
                confidence: 0.876_54,
            },
            Number::from(1000),
        );
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "sign_pred", "token": "Thumb_Up", "confidence": 0.8765, "ts": 1000 })
        );
    }

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(0.123_449), 0.1234);
        assert_eq!(round_confidence(0.999_99), 1.0);
        assert_eq!(round_confidence(0.5), 0.5);
        assert_eq!(round_confidence(1.2), 1.0);
        assert_eq!(round_confidence(-0.1), 0.0);
    }
}
