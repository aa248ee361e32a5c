use super::types::DailyPricePoint;

/// Back-fill the indicator columns of an ascending daily series in place.
///
/// This runs in the data-preparation path only. Live ticks never reach it:
/// the augmented series carries whatever indicator values the store
/// delivered, so a same-day live close can drift from the indicators fed
/// to the model. That staleness is accepted behavior, not a bug.
///
/// Rows inside an indicator's warm-up window keep `None` for that column.
pub fn backfill(series: &mut [DailyPricePoint]) {
    let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
    let volumes: Vec<Option<f64>> = series.iter().map(|p| p.volume).collect();

    let returns = returns_series(&closes);
    let ma5 = sma_series(&closes, 5);
    let ma20 = sma_series(&closes, 20);
    let sma_50 = sma_series(&closes, 50);
    let rsi14 = rsi_series(&closes, 14);
    let macd = macd_series(&closes);
    let (bb_upper, bb_lower) = bollinger_series(&closes, 20, 2.0);
    let volatility = volatility_series(&returns, 20);
    let volume_ma5 = sma_opt_series(&volumes, 5);

    for (i, point) in series.iter_mut().enumerate() {
        point.returns = returns[i];
        point.ma5 = ma5[i];
        point.ma20 = ma20[i];
        point.sma_50 = sma_50[i];
        point.rsi14 = rsi14[i];
        point.macd = macd[i];
        point.bb_upper = bb_upper[i];
        point.bb_lower = bb_lower[i];
        point.volatility = volatility[i];
        point.volume_ma5 = volume_ma5[i];
    }
}

/// Daily percent change of the close.
fn returns_series(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    for i in 1..closes.len() {
        if closes[i - 1].abs() > 1e-10 {
            out[i] = Some(closes[i] / closes[i - 1] - 1.0);
        }
    }
    out
}

fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = Some(window.iter().sum::<f64>() / period as f64);
    }
    out
}

/// SMA over an optional column; a window with any missing value yields None.
fn sma_opt_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_some()) {
            let sum: f64 = window.iter().map(|v| v.unwrap()).sum();
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if values.len() < period {
        return out;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_val = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema_val);
    for i in period..values.len() {
        ema_val = (values[i] - ema_val) * multiplier + ema_val;
        out[i] = Some(ema_val);
    }
    out
}

/// Wilder-smoothed RSI. Defined from index `period` onward.
fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += change.abs();
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..closes.len() {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, change.abs())
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss < 1e-10 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD line (EMA12 - EMA26), no signal smoothing: the stored column is the
/// line itself.
fn macd_series(closes: &[f64]) -> Vec<Option<f64>> {
    let e12 = ema_series(closes, 12);
    let e26 = ema_series(closes, 26);
    e12.iter()
        .zip(e26.iter())
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        })
        .collect()
}

fn bollinger_series(
    closes: &[f64],
    period: usize,
    num_std: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];
    for i in (period - 1)..closes.len() {
        let window = &closes[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();
        upper[i] = Some(mean + num_std * std);
        lower[i] = Some(mean - num_std * std);
    }
    (upper, lower)
}

/// Rolling standard deviation of daily returns.
fn volatility_series(returns: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; returns.len()];
    for i in (period - 1)..returns.len() {
        let window = &returns[i + 1 - period..=i];
        if window.iter().all(|r| r.is_some()) {
            let vals: Vec<f64> = window.iter().map(|r| r.unwrap()).collect();
            let mean = vals.iter().sum::<f64>() / period as f64;
            let variance = vals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
            out[i] = Some(variance.sqrt());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> Vec<DailyPricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
                    + chrono::Days::new(i as u64);
                DailyPricePoint::from_ohlcv(date, None, None, None, None, c, Some(1000.0))
            })
            .collect()
    }

    #[test]
    fn test_returns_pct_change() {
        let out = returns_series(&[100.0, 110.0, 99.0]);
        assert!(out[0].is_none());
        assert!((out[1].unwrap() - 0.10).abs() < 1e-10);
        assert!((out[2].unwrap() - (-0.10)).abs() < 1e-10);
    }

    #[test]
    fn test_sma_warmup_and_value() {
        let out = sma_series(&[1.0, 2.0, 3.0, 4.0, 5.0], 5);
        assert!(out[3].is_none());
        assert_eq!(out[4], Some(3.0));
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi_series(&closes, 14);
        assert!(out[13].is_none());
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn test_rsi_flat_series_has_no_losses() {
        let closes = vec![100.0; 20];
        let out = rsi_series(&closes, 14);
        // zero gains and zero losses hit the zero-loss guard
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn test_macd_defined_after_26() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64) * 0.5).collect();
        let out = macd_series(&closes);
        assert!(out[24].is_none());
        assert!(out[25].is_some());
        // steady uptrend keeps the fast EMA above the slow one
        assert!(out[39].unwrap() > 0.0);
    }

    #[test]
    fn test_bollinger_bands_surround_mean() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let (upper, lower) = bollinger_series(&closes, 20, 2.0);
        assert!(upper[18].is_none());
        let (u, l) = (upper[25].unwrap(), lower[25].unwrap());
        assert!(u > l);
        let window = &closes[6..=25];
        let mean = window.iter().sum::<f64>() / 20.0;
        assert!(u > mean && l < mean);
    }

    #[test]
    fn test_bollinger_constant_series_collapses() {
        let closes = vec![50.0; 25];
        let (upper, lower) = bollinger_series(&closes, 20, 2.0);
        assert_eq!(upper[24], Some(50.0));
        assert_eq!(lower[24], Some(50.0));
    }

    #[test]
    fn test_backfill_fills_columns_and_keeps_warmup_empty() {
        let mut s = series(&(0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        backfill(&mut s);

        assert!(s[0].returns.is_none());
        assert!(s[1].returns.is_some());
        assert!(s[3].ma5.is_none());
        assert!(s[4].ma5.is_some());
        assert!(s[18].ma20.is_none());
        assert!(s[19].ma20.is_some());
        assert!(s[48].sma_50.is_none());
        assert!(s[49].sma_50.is_some());
        assert!(s[13].rsi14.is_none());
        assert!(s[14].rsi14.is_some());
        assert!(s[24].macd.is_none());
        assert!(s[25].macd.is_some());
        assert!(s[18].bb_upper.is_none());
        assert!(s[19].bb_upper.is_some());
        // volatility needs 20 returns, which start at index 1
        assert!(s[19].volatility.is_none());
        assert!(s[20].volatility.is_some());
        assert!(s[3].volume_ma5.is_none());
        assert!(s[4].volume_ma5.is_some());
    }

    #[test]
    fn test_backfill_volume_gaps_propagate() {
        let mut s = series(&(0..10).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        s[2].volume = None;
        backfill(&mut s);
        // windows touching the gap stay empty, later windows recover
        assert!(s[4].volume_ma5.is_none());
        assert!(s[6].volume_ma5.is_none());
        assert!(s[7].volume_ma5.is_some());
    }
}
