use crate::domain::Ticker;
use crate::error::ForecastError;
use crate::forecast::scaler::ScalerParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const SCALER_FILE: &str = "scaler.json";
const MODEL_FILE: &str = "model.onnx";
const METADATA_FILE: &str = "metadata.json";

/// Training-time metadata written next to each model. Optional at
/// inference time; when present it lets the pipeline cross-check the
/// window shape before paying for a forward pass.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelMetadata {
    pub ticker: String,
    pub features: Vec<String>,
    pub window_size: usize,
    pub forecast_days: usize,
}

/// Per-ticker artifact retrieval: the scaler parameter document, the model
/// weights bundle, and training metadata, laid out as
/// `{base}/{ticker}/scaler.json` etc.
///
/// The base is either a local directory (the training pipeline's `models/`
/// layout) or an HTTP URL. Remote model bundles are cached on disk first
/// since the runtime loads sessions from a file path.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: String,
    cache_dir: PathBuf,
    http: reqwest::Client,
}

impl ArtifactStore {
    pub fn new(base: &str, cache_dir: &str) -> Self {
        ArtifactStore {
            base: base.trim_end_matches('/').to_string(),
            cache_dir: PathBuf::from(cache_dir),
            http: reqwest::Client::new(),
        }
    }

    fn is_remote(&self) -> bool {
        self.base.starts_with("http://") || self.base.starts_with("https://")
    }

    fn load_error(&self, ticker: &Ticker, artifact: &str, reason: String) -> ForecastError {
        ForecastError::ArtifactLoad {
            ticker: ticker.to_string(),
            artifact: artifact.to_string(),
            reason,
        }
    }

    async fn fetch_bytes(&self, ticker: &Ticker, artifact: &str) -> Result<Vec<u8>, ForecastError> {
        if self.is_remote() {
            let url = format!("{}/{}/{}", self.base, ticker, artifact);
            let resp = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| self.load_error(ticker, artifact, e.to_string()))?;
            if !resp.status().is_success() {
                return Err(self.load_error(ticker, artifact, format!("HTTP {}", resp.status())));
            }
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| self.load_error(ticker, artifact, e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            let path = Path::new(&self.base).join(ticker.as_str()).join(artifact);
            std::fs::read(&path)
                .map_err(|e| self.load_error(ticker, artifact, format!("{}: {e}", path.display())))
        }
    }

    /// Scaler parameters for one ticker. Validates the document invariant:
    /// both bounds present with equal width.
    pub async fn fetch_scaler(&self, ticker: &Ticker) -> Result<ScalerParams, ForecastError> {
        let bytes = self.fetch_bytes(ticker, SCALER_FILE).await?;
        let params: ScalerParams = serde_json::from_slice(&bytes)
            .map_err(|e| self.load_error(ticker, SCALER_FILE, e.to_string()))?;
        if params.feature_min.len() != params.feature_max.len() {
            return Err(self.load_error(
                ticker,
                SCALER_FILE,
                format!(
                    "min/max width differ: {} vs {}",
                    params.feature_min.len(),
                    params.feature_max.len()
                ),
            ));
        }
        Ok(params)
    }

    /// Training metadata, or `None` when the artifact does not exist.
    pub async fn fetch_metadata(
        &self,
        ticker: &Ticker,
    ) -> Result<Option<ModelMetadata>, ForecastError> {
        let bytes = match self.fetch_bytes(ticker, METADATA_FILE).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(None),
        };
        let meta: ModelMetadata = serde_json::from_slice(&bytes)
            .map_err(|e| self.load_error(ticker, METADATA_FILE, e.to_string()))?;
        Ok(Some(meta))
    }

    /// Path to the ticker's model bundle on local disk, downloading into the
    /// cache directory first when the base is remote.
    pub async fn fetch_model(&self, ticker: &Ticker) -> Result<PathBuf, ForecastError> {
        if !self.is_remote() {
            let path = Path::new(&self.base).join(ticker.as_str()).join(MODEL_FILE);
            if !path.exists() {
                return Err(self.load_error(
                    ticker,
                    MODEL_FILE,
                    format!("not found at {}", path.display()),
                ));
            }
            return Ok(path);
        }

        let cached = self.cache_dir.join(ticker.as_str()).join(MODEL_FILE);
        if cached.exists() {
            return Ok(cached);
        }

        let bytes = self.fetch_bytes(ticker, MODEL_FILE).await?;
        if let Some(parent) = cached.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&cached, &bytes)?;
        Ok(cached)
    }
}
