//! Local prediction backend: a classifier loaded once from disk and reused for
//! every request.

#[cfg(feature = "onnx")]
pub mod onnx;
pub mod results;

use crate::{
    error::{PredictError, ResultsError},
    prediction::Prediction,
    xray::XrayImage,
};
use image::DynamicImage;
use once_cell::sync::OnceCell;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Location of a pretrained model and its class labels.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelArtifact {
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    /// Side length of the square model input, in pixels.
    pub input_size: u32,
}

impl ModelArtifact {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            labels_path: None,
            input_size: 224,
        }
    }
}

/// One class reported by a classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassScore {
    pub label: String,
    /// Fractional confidence in `[0, 1]`.
    pub confidence: f64,
}

/// The output of a single inference pass, in classifier order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub classes: Vec<ClassScore>,
}

impl Classification {
    /// Converts fractional confidences into a percentage mapping.
    ///
    /// Labels are trimmed and must be non-empty, the same rules
    /// [`results::parse`] applies, so the in-memory and file paths agree.
    pub fn to_prediction(&self) -> Result<Prediction, ResultsError> {
        let mut prediction = Prediction::new();
        for (idx, class) in self.classes.iter().enumerate() {
            let (label, percent) = results::entry(idx + 1, &class.label, class.confidence)?;
            prediction.insert(label, percent);
        }
        Ok(prediction)
    }
}

/// Trait for image classifiers usable by the local backend.
///
/// Implementations are loaded once through [`ModelCache`] and then shared, so
/// `classify` takes `&self` and must be safe to call from any thread.
pub trait Classifier: Sized + Send + Sync + 'static {
    /// The error type that can be returned while loading or classifying.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads the model artifact from disk.
    fn load(artifact: &ModelArtifact) -> Result<Self, Self::Error>;

    /// Runs one inference pass over the image.
    fn classify(&self, image: &DynamicImage) -> Result<Classification, Self::Error>;
}

/// Owns the process-wide handle to a loaded classifier.
///
/// The artifact is read on the first successful [`get_or_load`](Self::get_or_load)
/// and the same handle is returned from then on. A failed load leaves the
/// cache empty so a later call can try again.
pub struct ModelCache<M> {
    artifact: ModelArtifact,
    model: OnceCell<Arc<M>>,
    loads: AtomicUsize,
}

impl<M: Classifier> ModelCache<M> {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            artifact,
            model: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Returns the loaded classifier, reading the artifact on first use.
    pub fn get_or_load(&self) -> Result<Arc<M>, M::Error> {
        self.model
            .get_or_try_init(|| {
                log::debug!("Loading model from {}", self.artifact.model_path.display());
                let model = M::load(&self.artifact)?;
                self.loads.fetch_add(1, Ordering::Relaxed);
                log::info!("Model loaded from {}", self.artifact.model_path.display());
                Ok(Arc::new(model))
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Number of times the artifact has been read successfully.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

/// Runs predictions against a cached local classifier.
pub struct LocalPredictor<M> {
    cache: ModelCache<M>,
    results_file: Option<PathBuf>,
}

impl<M: Classifier> LocalPredictor<M> {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            cache: ModelCache::new(artifact),
            results_file: None,
        }
    }

    /// Routes every result through a text file at `path` before charting.
    pub fn with_results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }

    pub fn cache(&self) -> &ModelCache<M> {
        &self.cache
    }

    /// Classifies one image. Every failure is reported as
    /// [`PredictError::Inference`].
    pub fn predict(&self, image: &XrayImage) -> Result<Prediction, PredictError> {
        let model = self.cache.get_or_load().map_err(inference_failed)?;

        log::debug!("Running local inference");
        let classification = model.classify(&image.image).map_err(inference_failed)?;
        let prediction = classification.to_prediction().map_err(inference_failed)?;

        match &self.results_file {
            Some(path) => round_trip(&classification, path),
            None => Ok(prediction),
        }
    }
}

fn round_trip(classification: &Classification, path: &Path) -> Result<Prediction, PredictError> {
    results::write_file(path, classification).map_err(inference_failed)?;
    let text = std::fs::read_to_string(path).map_err(inference_failed)?;
    results::parse(&text).map_err(inference_failed)
}

fn inference_failed(err: impl std::fmt::Display) -> PredictError {
    log::error!("Local prediction failed: {err}");
    PredictError::Inference(err.to_string())
}

/// Placeholder used when the crate is built without a local model runtime.
#[cfg(not(feature = "onnx"))]
pub struct UnavailableClassifier;

#[cfg(not(feature = "onnx"))]
#[derive(Debug, thiserror::Error)]
#[error("local inference requires building with the `onnx` feature")]
pub struct UnavailableError;

#[cfg(not(feature = "onnx"))]
impl Classifier for UnavailableClassifier {
    type Error = UnavailableError;

    fn load(_artifact: &ModelArtifact) -> Result<Self, Self::Error> {
        Err(UnavailableError)
    }

    fn classify(&self, _image: &DynamicImage) -> Result<Classification, Self::Error> {
        Err(UnavailableError)
    }
}
