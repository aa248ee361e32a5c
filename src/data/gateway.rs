use crate::domain::{DailyPricePoint, LiveQuote, Ticker};
use crate::error::ForecastError;
use chrono::NaiveDate;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// The proxy aborts upstream calls after 8 seconds; the client enforces the
/// same budget end to end.
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// One normalized sample from the intraday proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct IntradayPoint {
    pub timestamp: i64,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// Payload of `GET {base}/api/intraday?ticker=SYM`, consumed as given.
#[derive(Debug, Deserialize)]
pub struct IntradayResponse {
    pub ticker: String,
    pub points: Vec<IntradayPoint>,
    pub latest: Option<IntradayPoint>,
    #[serde(rename = "marketTimestamp")]
    pub market_timestamp: Option<i64>,
}

/// Source of the freshest known quote for a ticker. The scheduler only
/// talks to this seam, which keeps it testable against scripted gateways.
pub trait QuoteGateway: Send + Sync {
    /// `Ok(None)` means the provider had no usable sample this cycle.
    fn latest_quote(
        &self,
        ticker: &Ticker,
    ) -> impl Future<Output = Result<Option<LiveQuote>, ForecastError>> + Send;
}

/// HTTP client for the intraday quote proxy.
#[derive(Debug, Clone)]
pub struct IntradayClient {
    http: reqwest::Client,
    base_url: String,
}

impl IntradayClient {
    pub fn new(base_url: &str) -> Result<Self, ForecastError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ForecastError::Upstream(e.to_string()))?;
        Ok(IntradayClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, ticker: &Ticker) -> Result<IntradayResponse, ForecastError> {
        let url = format!("{}/api/intraday", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("ticker", ticker.as_str())])
            .send()
            .await
            .map_err(|e| ForecastError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ForecastError::Upstream(format!(
                "intraday proxy returned {} for {}",
                resp.status(),
                ticker
            )));
        }

        resp.json::<IntradayResponse>()
            .await
            .map_err(|e| ForecastError::Upstream(format!("malformed payload: {e}")))
    }

    /// Full intraday point list mapped to daily-point rows with empty
    /// indicator columns. Samples without a close are dropped.
    pub async fn intraday_series(
        &self,
        ticker: &Ticker,
    ) -> Result<Vec<DailyPricePoint>, ForecastError> {
        let resp = self.fetch(ticker).await?;
        Ok(resp
            .points
            .into_iter()
            .filter_map(|p| {
                let close = p.close.filter(|c| c.is_finite())?;
                Some(DailyPricePoint::from_ohlcv(
                    p.date,
                    Some(p.timestamp),
                    p.open,
                    p.high,
                    p.low,
                    close,
                    p.volume,
                ))
            })
            .collect())
    }
}

impl QuoteGateway for IntradayClient {
    async fn latest_quote(&self, ticker: &Ticker) -> Result<Option<LiveQuote>, ForecastError> {
        let resp = self.fetch(ticker).await?;
        Ok(quote_from_response(resp, ticker))
    }
}

/// Pick the freshest usable sample: `latest` if it carries a finite close,
/// otherwise the last point that does (the provider pads the tail of the
/// minute grid with nulls while the session is open).
fn quote_from_response(resp: IntradayResponse, ticker: &Ticker) -> Option<LiveQuote> {
    let point = resp
        .latest
        .filter(|p| p.close.map(f64::is_finite).unwrap_or(false))
        .or_else(|| {
            resp.points
                .into_iter()
                .rev()
                .find(|p| p.close.map(f64::is_finite).unwrap_or(false))
        })?;
    let close = point.close.filter(|c| c.is_finite())?;

    Some(LiveQuote {
        ticker: ticker.clone(),
        date: point.date,
        timestamp: point.timestamp,
        open: point.open,
        high: point.high,
        low: point.low,
        close,
        volume: point.volume,
    })
}
