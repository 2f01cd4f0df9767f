use crate::{error::ConfigError, local::ModelArtifact};
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = "secrets.toml";
pub const BASE_URL_ENV: &str = "PNEUMO_API_BASE_URL";

const DEFAULT_MODEL_PATH: &str = "models/xray-cls.onnx";
const DEFAULT_LABELS_PATH: &str = "models/labels.txt";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_INPUT_SIZE: u32 = 224;

/// Settings shared by the CLI and the web page.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PneumoConfig {
    /// Base URL of the remote prediction API; `/predict` is appended.
    #[serde(alias = "API_BASE_URL")]
    pub api_base_url: Option<String>,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    /// When set, local results are written here and parsed back.
    pub results_file: Option<PathBuf>,
    /// `0` disables the timeout.
    pub request_timeout_secs: u64,
    pub input_size: u32,
}

impl Default for PneumoConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            results_file: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl PneumoConfig {
    /// Parses TOML text; `origin` only labels errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Reads the config file if present; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads the file and applies environment overrides.
    pub fn from_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_base_url_override(std::env::var(BASE_URL_ENV).ok());
        Ok(config)
    }

    fn apply_base_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
    }

    /// The remote API base URL, required by the remote backend.
    pub fn base_url(&self) -> Result<&str, ConfigError> {
        self.api_base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)
    }

    /// `None` when `request_timeout_secs` is 0.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn model_artifact(&self) -> ModelArtifact {
        ModelArtifact {
            model_path: self.model_path.clone(),
            labels_path: Some(self.labels_path.clone()),
            input_size: self.input_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PneumoConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, PneumoConfig::default());
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(60)));
        assert!(matches!(config.base_url(), Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn reads_secrets_style_key() {
        let config = PneumoConfig::from_toml_str(
            r#"API_BASE_URL = "https://xray.example.org""#,
            Path::new("secrets.toml"),
        )
        .unwrap();
        assert_eq!(config.base_url().unwrap(), "https://xray.example.org");
    }

    #[test]
    fn reads_all_fields() {
        let config = PneumoConfig::from_toml_str(
            r#"
api_base_url = "http://localhost:8000"
model_path = "weights/best.onnx"
labels_path = "weights/names.txt"
results_file = "/tmp/results.txt"
request_timeout_secs = 0
input_size = 256
"#,
            Path::new("pneumo.toml"),
        )
        .unwrap();
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.results_file, Some(PathBuf::from("/tmp/results.txt")));
        let artifact = config.model_artifact();
        assert_eq!(artifact.model_path, PathBuf::from("weights/best.onnx"));
        assert_eq!(artifact.labels_path, Some(PathBuf::from("weights/names.txt")));
        assert_eq!(artifact.input_size, 256);
    }

    #[test]
    fn env_value_overrides_file() {
        let mut config = PneumoConfig {
            api_base_url: Some("http://file".into()),
            ..Default::default()
        };
        config.apply_base_url_override(Some("   ".into()));
        assert_eq!(config.base_url().unwrap(), "http://file");
        config.apply_base_url_override(Some("http://env".into()));
        assert_eq!(config.base_url().unwrap(), "http://env");
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = PneumoConfig::from_toml_str("request_timeout_secs = \"soon\"", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
