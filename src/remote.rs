use crate::{error::PredictError, prediction::Prediction, xray::XrayImage};
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::time::Duration;

/// Body returned by `POST /predict`.
#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    pub prediction: Prediction,
}

/// Client for a remote prediction API exposing `POST <base-url>/predict`.
#[derive(Clone, Debug)]
pub struct RemoteClient {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteClient {
    /// Creates a client for `base_url`. A `timeout` of `None` waits forever.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, PredictError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url: base_url.into(),
            http: builder.build()?,
        })
    }

    /// Full URL of the predict endpoint, tolerating a trailing `/` on the base.
    pub fn endpoint(&self) -> String {
        format!("{}/predict", self.base_url.trim_end_matches('/'))
    }

    /// Uploads the image once and returns the `prediction` mapping.
    ///
    /// Any status other than `200 OK` is reported as [`PredictError::Status`]
    /// without looking at the body.
    pub async fn predict(&self, image: &XrayImage) -> Result<Prediction, PredictError> {
        let payload = image.encode()?;
        let ext = image.format.extension();

        log::debug!(
            "Posting {} bytes as image.{} to {}",
            payload.len(),
            ext,
            self.endpoint()
        );

        let part = Part::bytes(payload)
            .file_name(format!("image.{ext}"))
            .mime_str(image.format.mime_type())?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            log::warn!("Prediction API answered with status {}", status.as_u16());
            return Err(PredictError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: PredictResponse = serde_json::from_slice(&body)
            .map_err(|e| PredictError::MalformedResponse(e.to_string()))?;

        Ok(parsed.prediction)
    }
}
