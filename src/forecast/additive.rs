use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use tracing::debug;

use super::linalg::{Cholesky, SquareMatrix};
use super::{FittedModel, ForecastModel, ModelFittingError};
use crate::models::{CleanedSeries, ForecastPoint};

const MIN_OBSERVATIONS: usize = 2;

/// History span at which `Seasonality::Auto` turns the yearly term on
const AUTO_YEARLY_MIN_SPAN_DAYS: f64 = 730.0;

const YEAR_DAYS: f64 = 365.25;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Whether the yearly Fourier term is part of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seasonality {
    /// Enabled once the history spans two years
    Auto,
    Enabled,
    Disabled,
}

impl FromStr for Seasonality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "on" | "true" | "enabled" => Ok(Self::Enabled),
            "off" | "false" | "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown seasonality mode '{other}' (expected auto, on or off)")),
        }
    }
}

impl fmt::Display for Seasonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Enabled => "on",
            Self::Disabled => "off",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdditiveModelConfig {
    /// Coverage of the uncertainty interval, in (0, 1)
    pub interval_width: f64,
    pub yearly_seasonality: Seasonality,
    pub yearly_fourier_order: usize,
    /// Larger values let the seasonal terms fit more flexibly
    pub seasonality_prior_scale: f64,
}

impl Default for AdditiveModelConfig {
    fn default() -> Self {
        Self {
            interval_width: 0.8,
            yearly_seasonality: Seasonality::Auto,
            yearly_fourier_order: 10,
            seasonality_prior_scale: 10.0,
        }
    }
}

/// Linear trend plus optional yearly seasonality, fitted by ridge-penalised
/// least squares.
///
/// Time is scaled to [0, 1] over the history and values by their largest
/// magnitude. Only seasonal coefficients are penalised. Bounds are the
/// regression prediction interval, so they widen as the forecast moves away
/// from the observed range.
#[derive(Debug, Clone, Default)]
pub struct AdditiveModel {
    config: AdditiveModelConfig,
}

impl AdditiveModel {
    pub fn new(config: AdditiveModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdditiveModelConfig {
        &self.config
    }
}

impl ForecastModel for AdditiveModel {
    fn name(&self) -> &'static str {
        "additive-trend-seasonal"
    }

    fn fit(&self, series: &CleanedSeries) -> Result<Box<dyn FittedModel>, ModelFittingError> {
        let width = self.config.interval_width;
        if !(width > 0.0 && width < 1.0) {
            return Err(ModelFittingError::Numerical(format!(
                "interval width must be in (0, 1), got {width}"
            )));
        }

        let n = series.len();
        if n < MIN_OBSERVATIONS {
            return Err(ModelFittingError::InsufficientData {
                required: MIN_OBSERVATIONS,
                actual: n,
            });
        }

        let start = series.first_timestamp();
        let span_days = days_between(start, series.last_timestamp());
        if span_days <= 0.0 {
            return Err(ModelFittingError::ZeroTimeSpan);
        }

        let yearly = match self.config.yearly_seasonality {
            Seasonality::Auto => span_days >= AUTO_YEARLY_MIN_SPAN_DAYS,
            Seasonality::Enabled => true,
            Seasonality::Disabled => false,
        };
        let basis = Basis {
            start,
            span_days,
            fourier_order: if yearly { self.config.yearly_fourier_order } else { 0 },
        };

        let y_scale = series
            .observations()
            .iter()
            .map(|o| o.value.abs())
            .fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let p = basis.dim();
        let mut normal = SquareMatrix::zeros(p);
        let mut rhs = vec![0.0; p];
        let rows: Vec<(Vec<f64>, f64)> = series
            .observations()
            .iter()
            .map(|o| (basis.features(o.timestamp), o.value / y_scale))
            .collect();

        for (x, y) in &rows {
            normal.add_outer(x);
            for (r, xi) in rhs.iter_mut().zip(x) {
                *r += xi * y;
            }
        }

        let penalty = 1.0 / self.config.seasonality_prior_scale.powi(2);
        for j in Basis::TREND_TERMS..p {
            normal.add(j, j, penalty);
        }

        let cholesky = Cholesky::decompose(&normal).ok_or_else(|| {
            ModelFittingError::Numerical("normal equations are not positive definite".to_string())
        })?;
        let coefficients = cholesky.solve(&rhs);

        let rss: f64 = rows
            .iter()
            .map(|(x, y)| (y - dot(x, &coefficients)).powi(2))
            .sum();
        let dof = n.saturating_sub(p).max(1) as f64;
        let sigma = (rss / dof).sqrt();

        if !sigma.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelFittingError::Numerical(
                "fit produced non-finite coefficients".to_string(),
            ));
        }

        debug!(
            "Fitted additive model: {} terms, yearly={}, sigma={:.6}, scale={:.4}",
            p, yearly, sigma, y_scale
        );

        Ok(Box::new(FittedAdditiveModel {
            basis,
            coefficients,
            cholesky,
            sigma,
            y_scale,
            z: normal_quantile(0.5 + width / 2.0),
        }))
    }
}

/// Design-matrix layout shared by fit and predict
#[derive(Debug, Clone, Copy)]
struct Basis {
    start: NaiveDateTime,
    span_days: f64,
    fourier_order: usize,
}

impl Basis {
    const TREND_TERMS: usize = 2;

    fn dim(&self) -> usize {
        Self::TREND_TERMS + 2 * self.fourier_order
    }

    fn features(&self, timestamp: NaiveDateTime) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.dim());
        x.push(1.0);
        x.push(days_between(self.start, timestamp) / self.span_days);

        // Yearly phase is taken from the epoch so it does not depend on where
        // the history starts.
        let epoch_days = timestamp.and_utc().timestamp() as f64 / SECONDS_PER_DAY;
        for k in 1..=self.fourier_order {
            let angle = 2.0 * PI * k as f64 * epoch_days / YEAR_DAYS;
            x.push(angle.sin());
            x.push(angle.cos());
        }
        x
    }
}

struct FittedAdditiveModel {
    basis: Basis,
    coefficients: Vec<f64>,
    cholesky: Cholesky,
    sigma: f64,
    y_scale: f64,
    z: f64,
}

impl FittedModel for FittedAdditiveModel {
    fn predict(&self, index: &[NaiveDateTime]) -> Result<Vec<ForecastPoint>, ModelFittingError> {
        index
            .iter()
            .map(|&timestamp| {
                let x = self.basis.features(timestamp);
                let estimate = dot(&x, &self.coefficients) * self.y_scale;
                let leverage = self.cholesky.inverse_quadratic_form(&x);
                let half_width = self.z * self.sigma * (1.0 + leverage).sqrt() * self.y_scale;

                if !estimate.is_finite() || !half_width.is_finite() {
                    return Err(ModelFittingError::Prediction(format!(
                        "non-finite estimate at {timestamp}"
                    )));
                }

                Ok(ForecastPoint {
                    timestamp,
                    estimate,
                    lower: estimate - half_width,
                    upper: estimate + half_width,
                })
            })
            .collect()
    }
}

fn days_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}
