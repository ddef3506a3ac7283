//! Shared harness for the end-to-end tests: a real server on an ephemeral
//! port, wired with test doubles for the model and the speech backend.
#![allow(dead_code)]

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use futures_util::StreamExt;
use image::{ImageFormat, Rgb, RgbImage};
use meetsl_api::{config::Config, router::create_router, state::AppState};
use meetsl_core::{
    classifier::GestureClassifier,
    phrase::PhraseSuggester,
    recognizer::{Category, Detections, GestureRecognizer},
    speech::SpeechSynthesizer,
};
use serde_json::{Value, json};
use std::{
    io::Cursor,
    net::SocketAddr,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const SCORE: f32 = 0.87654;
pub const SLOW_INFERENCE: Duration = Duration::from_millis(300);

/// Picks its answer from the frame width, so a test chooses the outcome by
/// the size of the image it sends.
///
/// | width | answer |
/// |---|---|
/// | 2 | the "None" class |
/// | 3 | `thanks` |
/// | 4 | inference error |
/// | 5 | `slow`, after a pause |
/// | other | `hello` |
struct WidthRecognizer {
    calls: Arc<AtomicUsize>,
}

impl GestureRecognizer for WidthRecognizer {
    fn recognize(&mut self, frame: &RgbImage) -> anyhow::Result<Detections> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let label = match frame.width() {
            2 => "None",
            3 => "thanks",
            4 => anyhow::bail!("inference crashed"),
            5 => {
                std::thread::sleep(SLOW_INFERENCE);
                "slow"
            }
            _ => "hello",
        };
        Ok(vec![vec![Category::new(label, SCORE)]])
    }
}

/// Speaks `lang:text` as the "audio"; the text `fail` makes it fail.
struct StubSpeech;

#[async_trait]
impl SpeechSynthesizer for StubSpeech {
    async fn synthesize(&self, text: &str, lang: &str) -> anyhow::Result<Bytes> {
        if text == "fail" {
            anyhow::bail!("upstream unavailable");
        }
        Ok(Bytes::from(format!("{}:{}", lang, text)))
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub recognizer_calls: Arc<AtomicUsize>,
    pub model_loads: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let recognizer_calls = Arc::new(AtomicUsize::new(0));
        let model_loads = Arc::new(AtomicUsize::new(0));

        let calls = recognizer_calls.clone();
        let loads = model_loads.clone();
        let classifier = GestureClassifier::with_loader(
            "stub-model.json",
            Box::new(move |_: &Path| {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(WidthRecognizer {
                    calls: calls.clone(),
                }) as Box<dyn GestureRecognizer>)
            }),
        );

        let state = Arc::new(AppState {
            classifier: Arc::new(classifier),
            phrase_suggester: Arc::new(PhraseSuggester::fallback_only()),
            speech: Arc::new(StubSpeech),
            config: Arc::new(Config {
                stats_interval: 2,
                ..Config::default()
            }),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });

        Self {
            addr,
            recognizer_calls,
            model_loads,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, session_id: &str) -> WsClient {
        let url = format!("ws://{}/ws/session/{}", self.addr, session_id);
        let (ws, _) = connect_async(url).await.expect("WebSocket handshake failed");
        ws
    }

    pub fn recognizer_calls(&self) -> usize {
        self.recognizer_calls.load(Ordering::SeqCst)
    }
}

/// A base64 JPEG of the given width and a height of one pixel.
pub fn encoded_frame(width: u32) -> String {
    let image = RgbImage::from_pixel(width, 1, Rgb([120, 80, 40]));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    STANDARD.encode(buf.into_inner())
}

pub fn frame_message(width: u32, ts: Value) -> Message {
    Message::text(
        json!({ "type": "frame", "jpgBase64": encoded_frame(width), "ts": ts }).to_string(),
    )
}

/// Next message from the server, failing the test after a few seconds of silence.
pub async fn next_message(ws: &mut WsClient) -> Option<Message> {
    tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for the server")
        .map(|received| received.expect("WebSocket receive failed"))
}

/// Next message, which must be a JSON text message.
pub async fn next_json(ws: &mut WsClient) -> Value {
    match next_message(ws).await {
        Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text message, got {:?}", other),
    }
}

/// Next message, which must be a close frame; returns its code and reason.
pub async fn next_close(ws: &mut WsClient) -> (u16, String) {
    match next_message(ws).await {
        Some(Message::Close(Some(frame))) => (u16::from(frame.code), frame.reason.as_str().to_string()),
        other => panic!("expected a close frame, got {:?}", other),
    }
}
