// Forecasting module
//
// The pipeline only talks to the `ForecastModel` / `FittedModel` traits:
// - fit(series) -> fitted model
// - predict(fitted, index) -> points with uncertainty bounds
// `AdditiveModel` is the default implementation.

pub mod additive;
pub mod linalg;

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::models::{CleanedSeries, ForecastPoint, ForecastResult};

pub use additive::{AdditiveModel, AdditiveModelConfig, Seasonality};

/// Number of monthly periods projected past the last observation
pub const DEFAULT_HORIZON_MONTHS: usize = 12;

/// Upper bound accepted for a configured horizon (100 years)
pub const MAX_HORIZON_MONTHS: usize = 12 * 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelFittingError {
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("All observations share one timestamp; the series has no time span")]
    ZeroTimeSpan,

    #[error("Model fitting failed: {0}")]
    Numerical(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// A forecasting model that can be trained on a cleaned series
pub trait ForecastModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, series: &CleanedSeries) -> Result<Box<dyn FittedModel>, ModelFittingError>;
}

/// A trained model, able to produce estimates for arbitrary timestamps
pub trait FittedModel: Send {
    fn predict(&self, index: &[NaiveDateTime]) -> Result<Vec<ForecastPoint>, ModelFittingError>;
}

/// Runs fit + predict over the history extended by a monthly horizon
#[derive(Clone)]
pub struct Forecaster {
    model: Arc<dyn ForecastModel>,
    horizon_months: usize,
}

impl Forecaster {
    pub fn new(model: Arc<dyn ForecastModel>, horizon_months: usize) -> Self {
        Self {
            model,
            horizon_months,
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn horizon_months(&self) -> usize {
        self.horizon_months
    }

    #[instrument(skip(self, series), fields(model = self.model.name(), observations = series.len()))]
    pub fn forecast(&self, series: &CleanedSeries) -> Result<ForecastResult, ModelFittingError> {
        debug!("Fitting model");
        let fitted = self.model.fit(series)?;

        let mut index = series.unique_timestamps();
        let history_len = index.len();
        index.extend(future_month_starts(series.last_timestamp(), self.horizon_months));

        let points = fitted.predict(&index)?;
        if points.len() != index.len() {
            return Err(ModelFittingError::Prediction(format!(
                "model returned {} points for an index of {}",
                points.len(),
                index.len()
            )));
        }

        info!(
            "Forecast produced {} historical and {} future points",
            history_len,
            points.len() - history_len
        );

        Ok(ForecastResult {
            points,
            history_len,
        })
    }
}

/// The first `periods` month starts (day 1, midnight) strictly after `last`
pub fn future_month_starts(last: NaiveDateTime, periods: usize) -> Vec<NaiveDateTime> {
    let (mut year, mut month) = (last.year(), last.month());
    let mut out = Vec::with_capacity(periods.min(MAX_HORIZON_MONTHS));

    while out.len() < periods && year <= NaiveDate::MAX.year() {
        if let Some(start) = NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
            if start > last {
                out.push(start);
            }
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_future_month_starts_after_month_start() {
        let months = future_month_starts(ts(2024, 12, 1, 0), 12);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], ts(2025, 1, 1, 0));
        assert_eq!(months[11], ts(2025, 12, 1, 0));
    }

    #[test]
    fn test_future_month_starts_mid_month() {
        let months = future_month_starts(ts(2024, 6, 15, 0), 3);
        assert_eq!(months, vec![ts(2024, 7, 1, 0), ts(2024, 8, 1, 0), ts(2024, 9, 1, 0)]);
    }

    #[test]
    fn test_future_month_starts_first_of_month_with_time() {
        let months = future_month_starts(ts(2024, 3, 1, 10), 1);
        assert_eq!(months, vec![ts(2024, 4, 1, 0)]);
    }

    #[test]
    fn test_future_month_starts_strictly_increasing() {
        let months = future_month_starts(ts(2023, 11, 20, 0), 24);
        assert!(months.windows(2).all(|w| w[0] < w[1]));
        assert!(months.iter().all(|m| m.day() == 1));
    }

    #[test]
    fn test_future_month_starts_unbounded_request_stops_at_calendar_end() {
        let last_year = NaiveDate::MAX.year();
        let months = future_month_starts(ts(last_year - 1, 1, 1, 0), usize::MAX);
        assert_eq!(months.len(), 23);
        assert_eq!(months[0], ts(last_year - 1, 2, 1, 0));
    }

    /// Returns its input value for every timestamp with fixed bounds
    struct ConstantModel;

    struct ConstantFit(f64);

    impl ForecastModel for ConstantModel {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn fit(&self, series: &CleanedSeries) -> Result<Box<dyn FittedModel>, ModelFittingError> {
            Ok(Box::new(ConstantFit(series.observations()[0].value)))
        }
    }

    impl FittedModel for ConstantFit {
        fn predict(&self, index: &[NaiveDateTime]) -> Result<Vec<ForecastPoint>, ModelFittingError> {
            Ok(index
                .iter()
                .map(|&timestamp| ForecastPoint {
                    timestamp,
                    estimate: self.0,
                    lower: self.0 - 1.0,
                    upper: self.0 + 1.0,
                })
                .collect())
        }
    }

    #[test]
    fn test_forecaster_appends_horizon_to_unique_history() {
        let series = CleanedSeries::new(vec![
            Observation { timestamp: ts(2024, 2, 1, 0), value: 5.0 },
            Observation { timestamp: ts(2024, 1, 1, 0), value: 4.0 },
            Observation { timestamp: ts(2024, 2, 1, 0), value: 6.0 },
        ])
        .unwrap();

        let forecaster = Forecaster::new(Arc::new(ConstantModel), DEFAULT_HORIZON_MONTHS);
        let result = forecaster.forecast(&series).unwrap();

        assert_eq!(result.history_len, 2);
        assert_eq!(result.points.len(), 14);
        assert_eq!(result.history()[0].timestamp, ts(2024, 1, 1, 0));
        assert_eq!(result.future()[0].timestamp, ts(2024, 3, 1, 0));
        assert_eq!(result.future().len(), 12);
    }
}
