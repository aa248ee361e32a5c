use super::types::{DailyPricePoint, LiveQuote};

/// Merge the latest live quote into a chronologically ascending historical
/// series, producing the augmented series the chart and the feature window
/// read from.
///
/// Pure function, safe to call on every recompute. Rules, in order:
/// empty historical or unusable quote → historical unchanged; same date as
/// the final session → overlay the final session (live fields win,
/// indicator columns are retained); later date → append a new session
/// carrying the previous session's indicator columns forward; earlier date
/// (stale or out-of-order tick) → historical unchanged.
///
/// The output stays ascending with unique dates and grows by at most one
/// element per call.
pub fn merge_live(historical: &[DailyPricePoint], live: Option<&LiveQuote>) -> Vec<DailyPricePoint> {
    let Some(last) = historical.last() else {
        return historical.to_vec();
    };
    let Some(live) = live else {
        return historical.to_vec();
    };
    if !live.close.is_finite() {
        return historical.to_vec();
    }

    if live.date == last.date {
        // Intraday update of the still-open session.
        let updated = overlay(last, live);
        let mut merged = historical[..historical.len() - 1].to_vec();
        merged.push(updated);
        merged
    } else if live.date > last.date {
        // A new session opened since the last historical row.
        let mut merged = historical.to_vec();
        let mut appended = overlay(last, live);
        appended.date = live.date;
        merged.push(appended);
        merged
    } else {
        historical.to_vec()
    }
}

/// Overlay the defined fields of `live` onto a copy of `base`. Fields the
/// quote does not supply keep the base session's values, which carries the
/// indicator columns forward unchanged.
fn overlay(base: &DailyPricePoint, live: &LiveQuote) -> DailyPricePoint {
    let mut out = base.clone();
    out.timestamp = Some(live.timestamp);
    out.open = live.open.or(base.open);
    out.high = live.high.or(base.high);
    out.low = live.low.or(base.low);
    out.close = live.close;
    out.volume = live.volume.or(base.volume);
    out
}
