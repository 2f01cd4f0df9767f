use std::path::PathBuf;

/// Errors raised while ingesting or serializing an X-ray image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image as {format}: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a prediction backend.
///
/// Every variant is terminal for the current prediction cycle: there are no
/// retries and no partial results.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The remote API answered with something other than `200 OK`.
    #[error("API error: {0}")]
    Status(u16),

    #[error("Request to the prediction API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),

    /// The backend answered but reported no classes.
    #[error("No prediction returned")]
    EmptyPrediction,

    /// Local model load, inference or result parsing failed.
    #[error("Prediction failed: {0}")]
    Inference(String),
}

impl PredictError {
    /// The text shown to a user in the transient error banner.
    pub fn user_message(&self) -> String {
        match self {
            PredictError::Status(code) => format!("API error: {code}"),
            PredictError::Inference(_) => "Prediction failed".to_string(),
            PredictError::EmptyPrediction => "Failed to obtain prediction".to_string(),
            other => format!("Error making prediction: {other}"),
        }
    }
}

/// A malformed line in a results file.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResultsError {
    #[error("line {line}: missing label after confidence")]
    MissingLabel { line: usize },

    #[error("line {line}: label spans more than one line")]
    MultilineLabel { line: usize },

    #[error("line {line}: invalid confidence {value:?}")]
    InvalidConfidence { line: usize, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Cannot draw a chart without bars")]
    Empty,

    #[error("Failed to draw chart: {0}")]
    Draw(String),

    #[error("Failed to write chart to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No API base URL configured (set api_base_url or PNEUMO_API_BASE_URL)")]
    MissingBaseUrl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_messages() {
        assert_eq!(PredictError::Status(500).user_message(), "API error: 500");
        assert_eq!(
            PredictError::Inference("bad tensor".into()).user_message(),
            "Prediction failed"
        );
        let msg = PredictError::MalformedResponse("missing field `prediction`".into())
            .user_message();
        assert!(msg.starts_with("Error making prediction: "));
        assert!(msg.contains("missing field `prediction`"));
        assert_eq!(
            PredictError::EmptyPrediction.user_message(),
            "Failed to obtain prediction"
        );
    }
}
