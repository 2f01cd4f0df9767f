//! Respiratory-disease prediction for chest X-rays.
//!
//! An uploaded image is decoded into an [`XrayImage`], sent to a prediction
//! [`Backend`] (a remote HTTP API or a locally cached classifier), and the
//! resulting [`Prediction`] is normalized and drawn as a bar chart.
//!
//! ```no_run
//! use pneumo::{Backend, Classifier, SvgRenderer, XrayImage, predict_and_render};
//!
//! async fn run<M: Classifier>(backend: &Backend<M>) -> Result<(), Box<dyn std::error::Error>> {
//!     let image = XrayImage::open("scan.png".as_ref())?;
//!     let mut renderer = SvgRenderer::with_output("chart.svg");
//!     let cycle = predict_and_render(backend, &image, &mut renderer).await?;
//!     println!("{}", serde_json::to_string(&cycle.prediction)?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod chart;
pub mod config;
pub mod error;
pub mod local;
pub mod prediction;
pub mod remote;
pub mod server;
pub mod xray;

pub use backend::{Backend, Cycle, CycleError, predict_and_render};
pub use chart::{ChartRenderer, ChartSpec, SvgRenderer};
pub use config::PneumoConfig;
pub use error::{ChartError, ConfigError, ImageError, PredictError, ResultsError};
pub use local::{Classification, Classifier, LocalPredictor, ModelArtifact, ModelCache};
pub use prediction::{NormalizedPrediction, Prediction};
pub use remote::RemoteClient;
pub use xray::{XrayFormat, XrayImage};
