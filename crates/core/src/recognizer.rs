//! Gesture Recognizer Backends
//!
//! A recognizer is the raw model runtime: it sees an RGB frame and returns,
//! for every hand it detected, a list of gesture categories ranked by score.
//! It knows nothing about "no gesture" policy or sharing; that lives in
//! [`crate::classifier::GestureClassifier`].

use image::{RgbImage, imageops};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Label the recognizer ranks first when nothing in the frame matches a gesture.
pub const NO_GESTURE_LABEL: &str = "None";

/// One scored gesture category.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

impl Category {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Ranked categories per detection. Detection 0 is the most confident hand,
/// and within a detection category 0 is the best match.
pub type Detections = Vec<Vec<Category>>;

/// A loaded gesture model.
///
/// Implementations are not required to be reentrant: `recognize` takes
/// `&mut self`, and callers sharing a recognizer must serialize access.
pub trait GestureRecognizer: Send {
    fn recognize(&mut self, frame: &RgbImage) -> anyhow::Result<Detections>;
}

/// Failure to bring a model asset into memory.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read model file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model file {} is not a valid model: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Deserialize)]
struct TemplateAsset {
    input_size: u32,
    #[serde(default = "default_min_score")]
    min_score: f32,
    gestures: Vec<TemplateEntry>,
}

#[derive(Deserialize)]
struct TemplateEntry {
    label: String,
    embedding: Vec<f32>,
}

fn default_min_score() -> f32 {
    0.5
}

/// Nearest-template recognizer backed by a JSON model asset.
///
/// Frames are reduced to an `input_size` x `input_size` grayscale thumbnail,
/// centred and normalized, then compared to each stored gesture embedding by
/// cosine similarity. Similarities are mapped from [-1, 1] onto [0, 1].
#[derive(Debug)]
pub struct TemplateRecognizer {
    input_size: u32,
    min_score: f32,
    templates: Vec<(String, Vec<f32>)>,
}

impl TemplateRecognizer {
    /// Reads and validates a template asset from disk.
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|reason| ModelLoadError::Invalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn from_json(raw: &str) -> Result<Self, String> {
        let asset: TemplateAsset = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if asset.input_size == 0 {
            return Err("input_size must be positive".to_string());
        }
        if asset.gestures.is_empty() {
            return Err("model defines no gestures".to_string());
        }
        if !(0.0..=1.0).contains(&asset.min_score) {
            return Err(format!("min_score {} is outside [0, 1]", asset.min_score));
        }

        let expected = (asset.input_size * asset.input_size) as usize;
        let mut templates = Vec::with_capacity(asset.gestures.len());
        for entry in asset.gestures {
            if entry.embedding.len() != expected {
                return Err(format!(
                    "gesture '{}' has {} embedding values, expected {}",
                    entry.label,
                    entry.embedding.len(),
                    expected
                ));
            }
            let embedding = normalize(entry.embedding)
                .ok_or_else(|| format!("gesture '{}' has a flat embedding", entry.label))?;
            templates.push((entry.label, embedding));
        }

        Ok(Self {
            input_size: asset.input_size,
            min_score: asset.min_score,
            templates,
        })
    }

    fn embed(&self, frame: &RgbImage) -> Option<Vec<f32>> {
        let gray = imageops::grayscale(frame);
        let thumb = imageops::resize(
            &gray,
            self.input_size,
            self.input_size,
            imageops::FilterType::Triangle,
        );
        normalize(thumb.pixels().map(|p| p[0] as f32 / 255.0).collect())
    }
}

impl GestureRecognizer for TemplateRecognizer {
    fn recognize(&mut self, frame: &RgbImage) -> anyhow::Result<Detections> {
        // A featureless frame (all one shade) cannot be matched against anything.
        let Some(embedding) = self.embed(frame) else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<Category> = self
            .templates
            .iter()
            .map(|(label, template)| {
                let cosine: f32 = template.iter().zip(&embedding).map(|(a, b)| a * b).sum();
                Category::new(label.clone(), ((cosine + 1.0) / 2.0).clamp(0.0, 1.0))
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let best = ranked.first().map(|c| c.score).unwrap_or(0.0);
        if best < self.min_score {
            ranked.insert(0, Category::new(NO_GESTURE_LABEL, 1.0 - best));
        }
        Ok(vec![ranked])
    }
}

/// Centres a vector on zero and scales it to unit length.
/// Returns `None` when the vector has no variance.
fn normalize(mut values: Vec<f32>) -> Option<Vec<f32>> {
    let mean = values.iter().sum::<f32>() / values.len().max(1) as f32;
    values.iter_mut().for_each(|v| *v -= mean);
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    values.iter_mut().for_each(|v| *v /= norm);
    Some(values)
}
