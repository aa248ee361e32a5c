use super::types::ForecastPoint;
use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Pair each predicted close with a concrete future trading day, starting
/// after `last_known` and skipping weekends. Public holidays are ignored
/// on purpose; the projection only guarantees Mon-Fri dates.
///
/// Predicted values are rounded to 2 decimals.
pub fn project_forecast(last_known: NaiveDate, predicted_closes: &[f64]) -> Vec<ForecastPoint> {
    let mut current = last_known;
    predicted_closes
        .iter()
        .map(|&close| {
            current = next_trading_day(current);
            ForecastPoint {
                date: current,
                predicted_close: round2(close),
            }
        })
        .collect()
}

/// The next weekday strictly after `date`. Saturday rolls two extra days,
/// Sunday one, so a weekend anchor also lands on Monday.
fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Days::new(1);
    match next.weekday() {
        Weekday::Sat => next = next + Days::new(2),
        Weekday::Sun => next = next + Days::new(1),
        _ => {}
    }
    next
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
