use thiserror::Error;

/// Crate-wide error type.
///
/// The scheduler swallows `Upstream` per polling cycle and retries on the
/// next tick; everything else is fatal to the single attempt that produced
/// it and is surfaced to the caller without automatic retry.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("unsupported ticker: {0}")]
    InvalidTicker(String),

    #[error("upstream quote provider error: {0}")]
    Upstream(String),

    #[error("insufficient data: have {have} rows, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("scaler mismatch: params carry {params} columns, row has {row}")]
    ScalerMismatch { params: usize, row: usize },

    #[error(
        "model shape mismatch: expected [{expected_rows}, {expected_cols}], got [{rows}, {cols}]"
    )]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("failed to load {artifact} for {ticker}: {reason}")]
    ArtifactLoad {
        ticker: String,
        artifact: String,
        reason: String,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("corrupt series: {0}")]
    CorruptSeries(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = ForecastError::InsufficientData { have: 4, need: 7 };
        assert_eq!(err.to_string(), "insufficient data: have 4 rows, need 7");
    }

    #[test]
    fn test_artifact_load_message() {
        let err = ForecastError::ArtifactLoad {
            ticker: "ASML.AS".into(),
            artifact: "scaler.json".into(),
            reason: "404".into(),
        };
        assert!(err.to_string().contains("scaler.json"));
        assert!(err.to_string().contains("ASML.AS"));
    }
}
