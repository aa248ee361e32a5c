use crate::error::ForecastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Supported instrument universe: top 10 STOXX Europe 600 companies by
/// market cap. One model and one scaler exists per symbol, so quotes and
/// artifacts are only served for this list.
pub const SUPPORTED_TICKERS: [TickerInfo; 10] = [
    TickerInfo { symbol: "ASML.AS", company_name: "ASML Holding", sector: "Technology" },
    TickerInfo { symbol: "SAP.DE", company_name: "SAP SE", sector: "Technology" },
    TickerInfo { symbol: "NESN.SW", company_name: "Nestl\u{e9} S.A.", sector: "Consumer Defensive" },
    TickerInfo { symbol: "MC.PA", company_name: "LVMH", sector: "Consumer Cyclical" },
    TickerInfo { symbol: "NOVO-B.CO", company_name: "Novo Nordisk A/S", sector: "Healthcare" },
    TickerInfo { symbol: "NOVN.SW", company_name: "Novartis AG", sector: "Healthcare" },
    TickerInfo { symbol: "ROG.SW", company_name: "Roche Holding AG", sector: "Healthcare" },
    TickerInfo { symbol: "TTE.PA", company_name: "TotalEnergies SE", sector: "Energy" },
    TickerInfo { symbol: "SIE.DE", company_name: "Siemens AG", sector: "Industrials" },
    TickerInfo { symbol: "OR.PA", company_name: "L'Or\u{e9}al S.A.", sector: "Consumer Defensive" },
];

/// Static metadata for one supported instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerInfo {
    pub symbol: &'static str,
    pub company_name: &'static str,
    pub sector: &'static str,
}

/// Validated ticker symbol. Construction fails for symbols outside
/// [`SUPPORTED_TICKERS`].
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: &str) -> Result<Self, ForecastError> {
        let symbol = symbol.trim();
        if SUPPORTED_TICKERS.iter().any(|t| t.symbol == symbol) {
            Ok(Ticker(symbol.to_string()))
        } else {
            Err(ForecastError::InvalidTicker(symbol.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn info(&self) -> &'static TickerInfo {
        // new() guarantees membership
        SUPPORTED_TICKERS
            .iter()
            .find(|t| t.symbol == self.0)
            .unwrap()
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One trading session of the daily series, with indicator columns as
/// back-filled by the data pipeline. Indicator fields stay `None` until
/// their warm-up window is satisfied; they are never recomputed from live
/// ticks.
///
/// Series invariant: ascending by `date`, no duplicate dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPricePoint {
    pub date: NaiveDate,
    /// Epoch millis of the most recent sample inside the session, when known.
    pub timestamp: Option<i64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<f64>,
    pub returns: Option<f64>,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub sma_50: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub volatility: Option<f64>,
    pub volume_ma5: Option<f64>,
}

impl DailyPricePoint {
    /// Bare point carrying only price/volume columns.
    pub fn from_ohlcv(
        date: NaiveDate,
        timestamp: Option<i64>,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        close: f64,
        volume: Option<f64>,
    ) -> Self {
        DailyPricePoint {
            date,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            returns: None,
            ma5: None,
            ma20: None,
            sma_50: None,
            rsi14: None,
            macd: None,
            bb_upper: None,
            bb_lower: None,
            volatility: None,
            volume_ma5: None,
        }
    }
}

/// Snapshot of the most recent sample for a ticker. Replaced wholesale on
/// each accepted tick, never mutated in place. A finite `close` is the one
/// field required for the quote to be usable; the gateway drops samples
/// without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveQuote {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<f64>,
}

/// One forecast step: a future trading day paired with its predicted close,
/// rounded to 2 decimals. Ordered by horizon (day 1, 2, 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_close: f64,
}
