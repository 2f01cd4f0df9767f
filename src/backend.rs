use crate::{
    chart::{ChartRenderer, ChartSpec},
    error::{ChartError, PredictError},
    local::{Classifier, LocalPredictor},
    prediction::Prediction,
    remote::RemoteClient,
    xray::XrayImage,
};
use std::sync::Arc;

/// Where predictions come from.
///
/// Chosen once at startup; every request in the process goes through the
/// same backend.
pub enum Backend<M> {
    /// A prediction API reached over HTTP.
    Remote(RemoteClient),
    /// A classifier loaded from disk and kept for the process lifetime.
    Local(Arc<LocalPredictor<M>>),
}

impl<M: Classifier> Backend<M> {
    /// Wraps a predictor so it can be handed to the blocking pool per request.
    pub fn local(predictor: LocalPredictor<M>) -> Self {
        Backend::Local(Arc::new(predictor))
    }

    /// Short name used in logs and on `/status`.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Remote(_) => "remote",
            Backend::Local(_) => "local",
        }
    }

    /// Runs one prediction.
    ///
    /// Local inference runs on the blocking thread pool so the async workers
    /// stay free. An empty mapping from either backend is a failure.
    pub async fn predict(&self, image: &XrayImage) -> Result<Prediction, PredictError> {
        let prediction = match self {
            Backend::Remote(client) => client.predict(image).await?,
            Backend::Local(predictor) => {
                let predictor = predictor.clone();
                let image = image.clone();
                tokio::task::spawn_blocking(move || predictor.predict(&image))
                    .await
                    .map_err(|e| {
                        log::error!("Local inference task failed: {e}");
                        PredictError::Inference(e.to_string())
                    })??
            }
        };

        if prediction.is_empty() {
            log::warn!("The {} backend returned no classes", self.name());
            return Err(PredictError::EmptyPrediction);
        }
        Ok(prediction)
    }
}

/// Failure of a full predict-and-chart cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error(transparent)]
    Chart(#[from] ChartError),
}

impl CycleError {
    /// Banner text for the failed cycle.
    pub fn user_message(&self) -> String {
        match self {
            CycleError::Predict(e) => e.user_message(),
            CycleError::Chart(e) => format!("Error making prediction: {e}"),
        }
    }
}

/// The outcome of a successful cycle.
pub struct Cycle<T> {
    pub prediction: Prediction,
    pub chart: ChartSpec,
    pub rendered: T,
}

/// Predicts, normalizes and renders. The renderer is only invoked once a
/// prediction has been obtained.
pub async fn predict_and_render<M, R>(
    backend: &Backend<M>,
    image: &XrayImage,
    renderer: &mut R,
) -> Result<Cycle<R::Output>, CycleError>
where
    M: Classifier,
    R: ChartRenderer,
{
    let prediction = backend.predict(image).await?;
    let chart = ChartSpec::from_prediction(&prediction.normalize());
    let rendered = renderer.render(&chart)?;

    log::info!(
        "Prediction with {} classes via {} backend",
        prediction.len(),
        backend.name()
    );

    Ok(Cycle {
        prediction,
        chart,
        rendered,
    })
}
