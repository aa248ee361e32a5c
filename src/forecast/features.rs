use crate::domain::DailyPricePoint;
use crate::error::ForecastError;

/// Length of the model's input window: the last trading week.
pub const WINDOW_SIZE: usize = 7;

/// Number of feature columns.
pub const FEATURE_COUNT: usize = FEATURES.len();

/// Fallback applied when a feature value is missing (or non-finite) for a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureDefault {
    /// Price-anchored indicators collapse onto the session's own close,
    /// which is neutral for the model.
    OwnClose,
    /// RSI midpoint: neither overbought nor oversold.
    Midpoint50,
    /// Oscillators, volatility and volume default to zero.
    Zero,
}

/// One feature column: stored-column extractor plus its default rule.
pub struct FeatureSpec {
    pub name: &'static str,
    pub extract: fn(&DailyPricePoint) -> Option<f64>,
    pub default: FeatureDefault,
}

/// The model's feature columns, in the exact order the scaler was fit on.
/// Reordering this table breaks every deployed scaler and model.
pub const FEATURES: [FeatureSpec; 10] = [
    FeatureSpec { name: "close", extract: |p| Some(p.close), default: FeatureDefault::OwnClose },
    FeatureSpec { name: "returns", extract: |p| p.returns, default: FeatureDefault::Zero },
    FeatureSpec { name: "ma5", extract: |p| p.ma5, default: FeatureDefault::OwnClose },
    FeatureSpec { name: "ma20", extract: |p| p.ma20, default: FeatureDefault::OwnClose },
    FeatureSpec { name: "rsi14", extract: |p| p.rsi14, default: FeatureDefault::Midpoint50 },
    FeatureSpec { name: "macd", extract: |p| p.macd, default: FeatureDefault::Zero },
    FeatureSpec { name: "bb_upper", extract: |p| p.bb_upper, default: FeatureDefault::OwnClose },
    FeatureSpec { name: "bb_lower", extract: |p| p.bb_lower, default: FeatureDefault::OwnClose },
    FeatureSpec { name: "volatility", extract: |p| p.volatility, default: FeatureDefault::Zero },
    FeatureSpec { name: "volume_ma5", extract: |p| p.volume_ma5, default: FeatureDefault::Zero },
];

impl FeatureSpec {
    /// The column's value for one session, defaulted per rule so the
    /// window is always fully populated even with incomplete indicator
    /// back-fill.
    pub fn resolve(&self, point: &DailyPricePoint) -> f64 {
        match (self.extract)(point).filter(|v| v.is_finite()) {
            Some(value) => value,
            None => match self.default {
                FeatureDefault::OwnClose => point.close,
                FeatureDefault::Midpoint50 => 50.0,
                FeatureDefault::Zero => 0.0,
            },
        }
    }
}

/// Extract the model input window: the last `window_size` sessions in
/// chronological order, one fully populated feature row per session.
pub fn build_window(
    series: &[DailyPricePoint],
    window_size: usize,
) -> Result<Vec<Vec<f64>>, ForecastError> {
    if series.len() < window_size {
        return Err(ForecastError::InsufficientData {
            have: series.len(),
            need: window_size,
        });
    }

    Ok(series[series.len() - window_size..]
        .iter()
        .map(|point| FEATURES.iter().map(|f| f.resolve(point)).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bare_point(day: u32, close: f64) -> DailyPricePoint {
        DailyPricePoint::from_ohlcv(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            None,
            None,
            None,
            None,
            close,
            None,
        )
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let series: Vec<DailyPricePoint> = (1..=6).map(|d| bare_point(d, 100.0)).collect();
        let err = build_window(&series, WINDOW_SIZE).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { have: 6, need: 7 }
        ));
    }

    #[test]
    fn test_window_has_exact_shape() {
        let series: Vec<DailyPricePoint> = (1..=12).map(|d| bare_point(d, 100.0)).collect();
        let window = build_window(&series, WINDOW_SIZE).unwrap();
        assert_eq!(window.len(), WINDOW_SIZE);
        for row in &window {
            assert_eq!(row.len(), FEATURE_COUNT);
        }
    }

    #[test]
    fn test_window_takes_chronological_tail() {
        let series: Vec<DailyPricePoint> =
            (1..=10).map(|d| bare_point(d, 100.0 + d as f64)).collect();
        let window = build_window(&series, WINDOW_SIZE).unwrap();
        // close is column 0; last 7 of 10 sessions, oldest first
        assert_eq!(window[0][0], 104.0);
        assert_eq!(window[6][0], 110.0);
    }

    #[test]
    fn test_defaults_for_bare_point() {
        let point = bare_point(5, 123.0);
        let row: Vec<f64> = FEATURES.iter().map(|f| f.resolve(&point)).collect();
        assert_eq!(
            row,
            vec![123.0, 0.0, 123.0, 123.0, 50.0, 0.0, 123.0, 123.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_populated_values_win_over_defaults() {
        let mut point = bare_point(5, 123.0);
        point.returns = Some(0.02);
        point.ma5 = Some(120.0);
        point.rsi14 = Some(61.5);
        point.volume_ma5 = Some(9_000.0);
        let row: Vec<f64> = FEATURES.iter().map(|f| f.resolve(&point)).collect();
        assert_eq!(row[1], 0.02);
        assert_eq!(row[2], 120.0);
        assert_eq!(row[4], 61.5);
        assert_eq!(row[9], 9_000.0);
    }

    #[test]
    fn test_non_finite_value_falls_back_to_default() {
        let mut point = bare_point(5, 123.0);
        point.macd = Some(f64::NAN);
        point.ma20 = Some(f64::INFINITY);
        let row: Vec<f64> = FEATURES.iter().map(|f| f.resolve(&point)).collect();
        assert_eq!(row[5], 0.0);
        assert_eq!(row[3], 123.0);
    }

    #[test]
    fn test_column_order_is_fixed() {
        let names: Vec<&str> = FEATURES.iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                "close",
                "returns",
                "ma5",
                "ma20",
                "rsi14",
                "macd",
                "bb_upper",
                "bb_lower",
                "volatility",
                "volume_ma5"
            ]
        );
    }
}
