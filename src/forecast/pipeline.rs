use super::features::{build_window, FEATURE_COUNT, WINDOW_SIZE};
use super::predictor::{TickerModel, FORECAST_HORIZON};
use super::scaler::{denormalize, normalize, ScalerParams};
use crate::data::artifacts::ArtifactStore;
use crate::domain::{calendar::project_forecast, DailyPricePoint, ForecastPoint, Ticker};
use crate::error::ForecastError;
use std::collections::HashMap;
use tracing::debug;

/// Column index of the close price in the feature order; predictions are
/// denormalized against it.
const CLOSE_COLUMN: usize = 0;

/// End-to-end inference: window the series, normalize, run the ticker's
/// model, denormalize, project onto the trading calendar.
///
/// Model and scaler artifacts are fetched lazily and cached per ticker;
/// the cache survives repeated forecasts for the same selection and is
/// dropped via [`Forecaster::invalidate`] on ticker change.
pub struct Forecaster {
    artifacts: ArtifactStore,
    models: HashMap<Ticker, TickerModel>,
    scalers: HashMap<Ticker, ScalerParams>,
}

impl Forecaster {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Forecaster {
            artifacts,
            models: HashMap::new(),
            scalers: HashMap::new(),
        }
    }

    /// Produce the 3-day close forecast for `series`.
    ///
    /// The caller decides what `series` is; the intended input is the
    /// freshly loaded historical series. Same-day live ticks update the
    /// augmented series only and do not re-enter here, so the last
    /// session's live close can run ahead of the values the model saw.
    pub async fn forecast(
        &mut self,
        ticker: &Ticker,
        series: &[DailyPricePoint],
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let window = build_window(series, WINDOW_SIZE)?;
        let last_date = series
            .last()
            .ok_or(ForecastError::InsufficientData {
                have: 0,
                need: WINDOW_SIZE,
            })?
            .date;

        let scaler = self.scaler_for(ticker).await?.clone();
        let scaled = normalize(&window, &scaler)?;

        let model = self.model_for(ticker).await?;
        let raw = model.predict(&scaled)?;

        let closes = denormalize(&raw, &scaler, CLOSE_COLUMN)?;
        Ok(project_forecast(last_date, &closes))
    }

    /// Drop cached artifacts for a ticker. Called on ticker change so a
    /// retrained artifact set is picked up on the next selection.
    pub fn invalidate(&mut self, ticker: &Ticker) {
        self.models.remove(ticker);
        self.scalers.remove(ticker);
    }

    async fn scaler_for(&mut self, ticker: &Ticker) -> Result<&ScalerParams, ForecastError> {
        if !self.scalers.contains_key(ticker) {
            let params = self.artifacts.fetch_scaler(ticker).await?;
            if params.width() != FEATURE_COUNT {
                return Err(ForecastError::ScalerMismatch {
                    params: params.width(),
                    row: FEATURE_COUNT,
                });
            }
            self.scalers.insert(ticker.clone(), params);
        }
        Ok(&self.scalers[ticker])
    }

    async fn model_for(&mut self, ticker: &Ticker) -> Result<&mut TickerModel, ForecastError> {
        if !self.models.contains_key(ticker) {
            self.check_metadata(ticker).await?;
            let path = self.artifacts.fetch_model(ticker).await?;
            let model = TickerModel::load(ticker.as_str(), &path)?;
            self.models.insert(ticker.clone(), model);
        }
        Ok(self.models.get_mut(ticker).unwrap())
    }

    /// Cross-check the training metadata against this build's window shape
    /// when the artifact exists; a model trained for another shape would
    /// otherwise fail deep inside the forward pass.
    async fn check_metadata(&self, ticker: &Ticker) -> Result<(), ForecastError> {
        let Some(meta) = self.artifacts.fetch_metadata(ticker).await? else {
            debug!(ticker = %ticker, "no training metadata, skipping shape cross-check");
            return Ok(());
        };
        if meta.window_size != WINDOW_SIZE || meta.features.len() != FEATURE_COUNT {
            return Err(ForecastError::ShapeMismatch {
                expected_rows: WINDOW_SIZE,
                expected_cols: FEATURE_COUNT,
                rows: meta.window_size,
                cols: meta.features.len(),
            });
        }
        if meta.forecast_days != FORECAST_HORIZON {
            return Err(ForecastError::Inference(format!(
                "model trained for {}-day horizon, expected {}",
                meta.forecast_days, FORECAST_HORIZON
            )));
        }
        Ok(())
    }
}
