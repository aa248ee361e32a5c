use super::features::{FEATURE_COUNT, WINDOW_SIZE};
use crate::error::ForecastError;
use ndarray::Array3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;

/// Number of future trading days predicted per forward pass.
pub const FORECAST_HORIZON: usize = 3;

/// One ticker's loaded sequence model.
///
/// The session is cached by the pipeline for the lifetime of the ticker
/// selection; input tensors and outputs are scoped to each call so native
/// buffers are released on every path.
#[derive(Debug)]
pub struct TickerModel {
    session: Session,
    output_name: String,
}

impl TickerModel {
    /// Load a model bundle from disk. Failures are artifact-load errors:
    /// a bundle that cannot be parsed is as unusable as one that cannot be
    /// fetched.
    pub fn load(ticker: &str, path: &Path) -> Result<Self, ForecastError> {
        let artifact_err = |reason: String| ForecastError::ArtifactLoad {
            ticker: ticker.to_string(),
            artifact: "model.onnx".to_string(),
            reason,
        };

        let mut builder = Session::builder().map_err(|e| artifact_err(e.to_string()))?;
        builder = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| artifact_err(e.to_string()))?;
        builder = builder
            .with_intra_threads(1)
            .map_err(|e| artifact_err(e.to_string()))?;
        let session = builder
            .commit_from_file(path)
            .map_err(|e| artifact_err(e.to_string()))?;

        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| artifact_err("model declares no outputs".to_string()))?;

        Ok(TickerModel {
            session,
            output_name,
        })
    }

    /// Run one forward pass over a normalized window and return the raw
    /// normalized predictions, ordered by horizon.
    pub fn predict(&mut self, window: &[Vec<f64>]) -> Result<Vec<f64>, ForecastError> {
        validate_window(window)?;

        // rank-3 input: [batch, window, features]
        let mut input = Array3::<f32>::zeros((1, WINDOW_SIZE, FEATURE_COUNT));
        for (row, values) in window.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                input[[0, row, col]] = value as f32;
            }
        }

        let input_tensor =
            Value::from_array(input).map_err(|e| ForecastError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ForecastError::Inference(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ForecastError::Inference(format!("model output {} missing", self.output_name))
        })?;
        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ForecastError::Inference(e.to_string()))?;
        let values = tensor.1;

        if values.len() != FORECAST_HORIZON {
            return Err(ForecastError::Inference(format!(
                "expected {} predictions, model produced {}",
                FORECAST_HORIZON,
                values.len()
            )));
        }

        Ok(values.iter().map(|&v| v as f64).collect())
    }
}

/// The window must match the trained input shape exactly.
pub(crate) fn validate_window(window: &[Vec<f64>]) -> Result<(), ForecastError> {
    let cols = window.first().map(|r| r.len()).unwrap_or(0);
    if window.len() != WINDOW_SIZE || window.iter().any(|r| r.len() != FEATURE_COUNT) {
        return Err(ForecastError::ShapeMismatch {
            expected_rows: WINDOW_SIZE,
            expected_cols: FEATURE_COUNT,
            rows: window.len(),
            cols,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_exact_shape() {
        let window = vec![vec![0.5; FEATURE_COUNT]; WINDOW_SIZE];
        assert!(validate_window(&window).is_ok());
    }

    #[test]
    fn test_validate_rejects_short_window() {
        let window = vec![vec![0.5; FEATURE_COUNT]; WINDOW_SIZE - 1];
        let err = validate_window(&window).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::ShapeMismatch { rows: 6, cols: 10, .. }
        ));
    }

    #[test]
    fn test_validate_rejects_narrow_row() {
        let mut window = vec![vec![0.5; FEATURE_COUNT]; WINDOW_SIZE];
        window[3].pop();
        assert!(validate_window(&window).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let err = validate_window(&[]).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::ShapeMismatch { rows: 0, cols: 0, .. }
        ));
    }

    #[test]
    fn test_load_rejects_garbage_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not a model").unwrap();
        let err = TickerModel::load("SAP.DE", &path).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactLoad { .. }));
    }
}
