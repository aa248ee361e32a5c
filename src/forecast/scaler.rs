use crate::error::ForecastError;
use serde::Deserialize;

/// Per-feature min-max parameters fit at training time, one pair per
/// column in feature order. Loaded once per ticker and never mutated.
///
/// The document keys (`data_min_`, `data_max_`) come straight from the
/// exported sklearn scaler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScalerParams {
    #[serde(rename = "data_min_")]
    pub feature_min: Vec<f64>,
    #[serde(rename = "data_max_")]
    pub feature_max: Vec<f64>,
}

impl ScalerParams {
    /// Number of feature columns the parameters cover.
    pub fn width(&self) -> usize {
        self.feature_min.len()
    }
}

/// Scale each row column-wise to [0, 1]: `(x - min) / (max - min)`.
/// A degenerate column (`max == min`) scales to 0 — a constant column is
/// uninformative and must not divide by zero.
pub fn normalize(rows: &[Vec<f64>], params: &ScalerParams) -> Result<Vec<Vec<f64>>, ForecastError> {
    rows.iter()
        .map(|row| {
            if row.len() != params.width() {
                return Err(ForecastError::ScalerMismatch {
                    params: params.width(),
                    row: row.len(),
                });
            }
            Ok(row
                .iter()
                .enumerate()
                .map(|(col, &value)| {
                    let min = params.feature_min[col];
                    let max = params.feature_max[col];
                    let range = max - min;
                    if range == 0.0 {
                        0.0
                    } else {
                        (value - min) / range
                    }
                })
                .collect())
        })
        .collect()
}

/// Inverse transform against one column's min/max:
/// `x = scaled * (max - min) + min`. Used to map normalized predictions
/// back to prices via the close column.
pub fn denormalize(
    values: &[f64],
    params: &ScalerParams,
    feature_index: usize,
) -> Result<Vec<f64>, ForecastError> {
    if feature_index >= params.width() {
        return Err(ForecastError::ScalerMismatch {
            params: params.width(),
            row: feature_index,
        });
    }
    let min = params.feature_min[feature_index];
    let max = params.feature_max[feature_index];
    Ok(values.iter().map(|&v| v * (max - min) + min).collect())
}
