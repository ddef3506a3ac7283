//! Gesture Classifier Adapter
//!
//! Wraps the single process-wide gesture recognizer. The recognizer is built
//! lazily on first use and every session shares it afterwards. Inference
//! calls are serialized through a mutex because recognizer runtimes are not
//! assumed to be reentrant; frame decoding happens outside the lock so only
//! the model pass itself is exclusive.

use crate::{
    frame::{DecodeError, decode_frame},
    recognizer::{Detections, GestureRecognizer, ModelLoadError, TemplateRecognizer},
};
use image::RgbImage;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::info;

/// Builds a recognizer from the model asset at the given path.
pub type RecognizerLoader =
    Box<dyn Fn(&Path) -> Result<Box<dyn GestureRecognizer>, ModelLoadError> + Send + Sync>;

/// The recognizer ran but did not produce a usable answer.
#[derive(Debug, thiserror::Error)]
#[error("gesture recognizer failed: {0:#}")]
pub struct ClassifierError(pub anyhow::Error);

/// Any failure on the decode + classify path of a single frame.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// A recognized gesture and the model's score for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub token: String,
    pub confidence: f64,
}

pub struct GestureClassifier {
    model_path: PathBuf,
    loader: RecognizerLoader,
    recognizer: Mutex<Option<Box<dyn GestureRecognizer>>>,
}

impl GestureClassifier {
    /// Creates a classifier backed by the JSON template recognizer.
    /// Nothing is read from disk until the first classification.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self::with_loader(
            model_path,
            Box::new(|path: &Path| {
                TemplateRecognizer::load(path).map(|r| Box::new(r) as Box<dyn GestureRecognizer>)
            }),
        )
    }

    /// Creates a classifier with a custom recognizer backend.
    pub fn with_loader(model_path: impl Into<PathBuf>, loader: RecognizerLoader) -> Self {
        Self {
            model_path: model_path.into(),
            loader,
            recognizer: Mutex::new(None),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Forces the lazy model load. Calling it again after success is a no-op.
    pub fn ensure_loaded(&self) -> Result<(), ModelLoadError> {
        let mut slot = self.recognizer.lock();
        if slot.is_none() {
            *slot = Some(self.load()?);
        }
        Ok(())
    }

    /// Decodes a base64 frame and classifies it.
    pub fn recognize_frame(&self, jpg_base64: &str) -> Result<Option<Prediction>, RecognitionError> {
        let frame = decode_frame(jpg_base64)?;
        self.classify(&frame)
    }

    /// Runs the recognizer over one frame and applies the "no gesture" policy:
    /// only the best category of the first detection is considered, and the
    /// model's own "none" class counts as nothing recognized.
    pub fn classify(&self, frame: &RgbImage) -> Result<Option<Prediction>, RecognitionError> {
        let mut slot = self.recognizer.lock();
        let recognizer = match slot.take() {
            Some(recognizer) => recognizer,
            None => self.load()?,
        };
        let recognizer = slot.insert(recognizer);

        let detections = recognizer.recognize(frame).map_err(ClassifierError)?;
        Ok(top_prediction(&detections))
    }

    fn load(&self) -> Result<Box<dyn GestureRecognizer>, ModelLoadError> {
        let recognizer = (self.loader)(&self.model_path)?;
        info!(path = %self.model_path.display(), "Gesture recognizer loaded");
        Ok(recognizer)
    }
}

fn top_prediction(detections: &Detections) -> Option<Prediction> {
    let top = detections.first()?.first()?;
    if top.label.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(Prediction {
        token: top.label.clone(),
        confidence: f64::from(top.score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::tests::encoded_image;
    use crate::recognizer::Category;
    use anyhow::anyhow;
    use approx::assert_abs_diff_eq;
    use image::{ImageFormat, Rgb};
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };
    use std::time::Duration;

    /// Returns a fixed answer and trips if two threads are inside `recognize` at once.
    struct FixedRecognizer {
        detections: Detections,
        busy: Arc<AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    impl GestureRecognizer for FixedRecognizer {
        fn recognize(&mut self, _frame: &RgbImage) -> anyhow::Result<Detections> {
            assert!(
                !self.busy.swap(true, Ordering::SeqCst),
                "recognizer entered concurrently"
            );
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            self.busy.store(false, Ordering::SeqCst);
            Ok(self.detections.clone())
        }
    }

    struct FailingRecognizer;

    impl GestureRecognizer for FailingRecognizer {
        fn recognize(&mut self, _frame: &RgbImage) -> anyhow::Result<Detections> {
            Err(anyhow!("tensor shape mismatch"))
        }
    }

    struct Harness {
        classifier: GestureClassifier,
        loads: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    fn harness(detections: Detections) -> Harness {
        let loads = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let busy = Arc::new(AtomicBool::new(false));
        let (l, c) = (loads.clone(), calls.clone());
        let classifier = GestureClassifier::with_loader(
            "stub.model",
            Box::new(move |_: &Path| {
                l.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FixedRecognizer {
                    detections: detections.clone(),
                    busy: busy.clone(),
                    calls: c.clone(),
                }) as Box<dyn GestureRecognizer>)
            }),
        );
        Harness {
            classifier,
            loads,
            calls,
        }
    }

    fn frame() -> RgbImage {
        RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]))
    }

    #[test]
    fn test_top_category_of_first_detection_wins() {
        let h = harness(vec![
            vec![Category::new("Thumb_Up", 0.87), Category::new("Victory", 0.1)],
            vec![Category::new("Open_Palm", 0.99)],
        ]);
        let prediction = h.classifier.classify(&frame()).unwrap().unwrap();
        assert_eq!(prediction.token, "Thumb_Up");
        assert_abs_diff_eq!(prediction.confidence, 0.87, epsilon = 1e-6);
    }

    #[test]
    fn test_none_category_is_filtered_case_insensitively() {
        for label in ["None", "none", "NONE"] {
            let h = harness(vec![vec![Category::new(label, 0.95)]]);
            assert_eq!(h.classifier.classify(&frame()).unwrap(), None);
        }
    }

    #[test]
    fn test_no_detections_means_no_prediction() {
        let h = harness(vec![]);
        assert_eq!(h.classifier.classify(&frame()).unwrap(), None);

        let h = harness(vec![vec![]]);
        assert_eq!(h.classifier.classify(&frame()).unwrap(), None);
    }

    #[test]
    fn test_model_is_loaded_once() {
        let h = harness(vec![vec![Category::new("Victory", 0.7)]]);
        h.classifier.ensure_loaded().unwrap();
        h.classifier.ensure_loaded().unwrap();
        for _ in 0..3 {
            h.classifier.classify(&frame()).unwrap();
        }
        assert_eq!(h.loads.load(Ordering::SeqCst), 1);
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_first_use_builds_one_model_and_serializes_inference() {
        let h = harness(vec![vec![Category::new("ILoveYou", 0.66)]]);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        let p = h.classifier.classify(&frame()).unwrap().unwrap();
                        assert_eq!(p.token, "ILoveYou");
                    }
                });
            }
        });
        assert_eq!(h.loads.load(Ordering::SeqCst), 1);
        assert_eq!(h.calls.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn test_recognize_frame_decodes_then_classifies() {
        let h = harness(vec![vec![Category::new("Pointing_Up", 0.5)]]);
        let payload = encoded_image(1, 1, ImageFormat::Jpeg);
        let p = h.classifier.recognize_frame(&payload).unwrap().unwrap();
        assert_eq!(p.token, "Pointing_Up");
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bad_frame_never_reaches_the_model() {
        let h = harness(vec![vec![Category::new("Victory", 0.5)]]);
        let err = h.classifier.recognize_frame("%%%").unwrap_err();
        assert!(matches!(err, RecognitionError::Decode(_)));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_model_asset_is_surfaced() {
        let classifier = GestureClassifier::new("/no/such/dir/gestures.json");
        assert_eq!(classifier.model_path(), Path::new("/no/such/dir/gestures.json"));

        let err = classifier.ensure_loaded().unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound(ref p) if p == classifier.model_path()));

        let err = classifier.classify(&frame()).unwrap_err();
        assert!(matches!(err, RecognitionError::ModelLoad(_)));
    }

    #[test]
    fn test_inference_failure_keeps_the_model() {
        let loads = Arc::new(AtomicUsize::new(0));
        let l = loads.clone();
        let classifier = GestureClassifier::with_loader(
            "failing.model",
            Box::new(move |_: &Path| {
                l.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FailingRecognizer) as Box<dyn GestureRecognizer>)
            }),
        );

        for _ in 0..2 {
            let err = classifier.classify(&frame()).unwrap_err();
            assert!(err.to_string().contains("tensor shape mismatch"));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
