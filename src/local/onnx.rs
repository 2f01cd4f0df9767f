use super::{ClassScore, Classification, Classifier, ModelArtifact};
use image::{DynamicImage, imageops::FilterType};
use ort::{session::Session, value::Tensor};
use std::{path::Path, sync::Mutex};

#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error("ONNX Runtime error: {0}")]
    Runtime(String),

    #[error("Failed to read labels from {path}: {source}")]
    Labels {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No labels configured for {0}")]
    MissingLabels(String),

    #[error("Model produced {outputs} scores for {labels} labels")]
    LabelMismatch { outputs: usize, labels: usize },

    #[error("Session lock poisoned")]
    Poisoned,
}

fn runtime(err: impl std::fmt::Display) -> OnnxError {
    OnnxError::Runtime(err.to_string())
}

/// Image classifier backed by an ONNX Runtime session.
///
/// Expects a single NCHW float input of `input_size`×`input_size` RGB pixels
/// scaled to `[0, 1]` and a single `[1, num_classes]` output.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    input_size: u32,
}

impl OnnxClassifier {
    /// Class labels, in model output order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Resizes to `size`×`size` RGB and lays the pixels out as one NCHW plane per
/// channel, scaled to `[0, 1]`.
fn preprocess(image: &DynamicImage, size: u32) -> Vec<f32> {
    let resized = image
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }
    data
}

fn read_labels(path: &Path) -> Result<Vec<String>, OnnxError> {
    let text = std::fs::read_to_string(path).map_err(|source| OnnxError::Labels {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Turns raw scores into probabilities.
///
/// Scores already in `[0, 1]` are independent per-class probabilities and
/// pass through unchanged; they need not sum to one. Anything outside that
/// range is treated as logits and softmaxed.
fn to_probabilities(scores: &[f32]) -> Vec<f64> {
    let scores: Vec<f64> = scores.iter().map(|&s| s as f64).collect();
    if scores.iter().all(|s| (0.0..=1.0).contains(s)) {
        return scores;
    }

    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / total).collect()
}

impl Classifier for OnnxClassifier {
    type Error = OnnxError;

    fn load(artifact: &ModelArtifact) -> Result<Self, Self::Error> {
        let labels_path = artifact
            .labels_path
            .as_deref()
            .ok_or_else(|| OnnxError::MissingLabels(artifact.model_path.display().to_string()))?;
        let labels = read_labels(labels_path)?;

        let session = Session::builder()
            .and_then(|b| b.commit_from_file(&artifact.model_path))
            .map_err(runtime)?;

        log::debug!(
            "ONNX session ready with {} labels, input {}x{}",
            labels.len(),
            artifact.input_size,
            artifact.input_size
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_size: artifact.input_size,
        })
    }

    fn classify(&self, image: &DynamicImage) -> Result<Classification, Self::Error> {
        let size = self.input_size as usize;
        let input = Tensor::from_array(([1usize, 3, size, size], preprocess(image, self.input_size)))
            .map_err(runtime)?;

        let mut session = self.session.lock().map_err(|_| OnnxError::Poisoned)?;
        let outputs = session.run(ort::inputs![input]).map_err(runtime)?;
        let (_, scores) = outputs[0].try_extract_tensor::<f32>().map_err(runtime)?;

        if scores.len() != self.labels.len() {
            return Err(OnnxError::LabelMismatch {
                outputs: scores.len(),
                labels: self.labels.len(),
            });
        }

        let mut classes: Vec<ClassScore> = to_probabilities(scores)
            .into_iter()
            .zip(&self.labels)
            .map(|(confidence, label)| ClassScore {
                label: label.clone(),
                confidence,
            })
            .collect();
        classes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Ok(Classification { classes })
    }
}
