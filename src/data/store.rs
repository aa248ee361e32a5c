use crate::domain::{DailyPricePoint, Ticker};
use crate::error::ForecastError;
use std::path::Path;

/// CSV path for a ticker's daily series.
pub fn history_path(ticker: &Ticker, data_dir: &str) -> String {
    let slug = ticker
        .as_str()
        .to_lowercase()
        .replace(['.', '-'], "_");
    format!("{}/{}_daily.csv", data_dir, slug)
}

/// Save a daily series to its CSV cache.
pub fn save_history(series: &[DailyPricePoint], path: &str) -> Result<(), ForecastError> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in series {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a full daily series from its CSV cache, oldest first.
///
/// The store owns the ordering invariant: rows must be strictly ascending
/// by date with no duplicates, matching what the upstream ingest writes.
pub fn load_history(path: &str) -> Result<Vec<DailyPricePoint>, ForecastError> {
    if !Path::new(path).exists() {
        return Err(ForecastError::CorruptSeries(format!(
            "history file not found: {path}"
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut series = Vec::new();
    for result in reader.deserialize::<DailyPricePoint>() {
        series.push(result?);
    }

    for window in series.windows(2) {
        if window[1].date <= window[0].date {
            return Err(ForecastError::CorruptSeries(format!(
                "dates not strictly ascending around {}",
                window[1].date
            )));
        }
    }

    Ok(series)
}

/// The last `days` sessions of a ticker's series, ascending. This is the
/// historical-load interface the rest of the crate consumes: ticker plus
/// requested day count, oldest first.
pub fn load_last_days(
    ticker: &Ticker,
    days: usize,
    data_dir: &str,
) -> Result<Vec<DailyPricePoint>, ForecastError> {
    let mut series = load_history(&history_path(ticker, data_dir))?;
    if series.len() > days {
        series.drain(..series.len() - days);
    }
    Ok(series)
}
