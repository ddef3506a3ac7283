//! MeetSL Core
//!
//! Transport-independent building blocks of the sign-recognition service:
//! frame decoding, the shared gesture classifier, per-session latency
//! bookkeeping, and the phrase-suggestion and speech-synthesis collaborators.

pub mod classifier;
pub mod frame;
pub mod latency;
pub mod phrase;
pub mod recognizer;
pub mod speech;

pub use classifier::{GestureClassifier, Prediction, RecognitionError};
