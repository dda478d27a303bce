use std::env;

use encoding_rs::Encoding;
use thiserror::Error;

use crate::forecast::{AdditiveModelConfig, Seasonality, DEFAULT_HORIZON_MONTHS, MAX_HORIZON_MONTHS};
use crate::ingest::resolve_encoding;
use crate::pipeline::UploadContext;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Unknown INPUT_ENCODING: {0}")]
    UnknownEncoding(String),

    #[error("INTERVAL_WIDTH must be between 0 and 1 (exclusive), got {0}")]
    IntervalWidth(f64),

    #[error("FORECAST_HORIZON_MONTHS must be at least 1")]
    ZeroHorizon,

    #[error("FORECAST_HORIZON_MONTHS must be at most {max}, got {0}", max = MAX_HORIZON_MONTHS)]
    HorizonTooLong(usize),

    #[error("Invalid YEARLY_SEASONALITY: {0}")]
    Seasonality(String),

    #[error("{0} must not be empty")]
    EmptyColumnName(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub timestamp_column: String,
    pub value_column: String,
    pub input_encoding: &'static Encoding,
    pub target_year: i32,
    pub horizon_months: usize,
    pub interval_width: f64,
    pub yearly_seasonality: Seasonality,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            timestamp_column: "측정날짜".to_string(),
            value_column: "질산이온".to_string(),
            input_encoding: encoding_rs::EUC_KR,
            target_year: 2025,
            horizon_months: DEFAULT_HORIZON_MONTHS,
            interval_width: 0.8,
            yearly_seasonality: Seasonality::Auto,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let encoding_label = env::var("INPUT_ENCODING").unwrap_or_else(|_| "cp949".to_string());
        let input_encoding = resolve_encoding(&encoding_label)
            .map_err(|_| ConfigError::UnknownEncoding(encoding_label.clone()))?;

        let yearly_seasonality = match env::var("YEARLY_SEASONALITY") {
            Ok(raw) => raw.parse().map_err(ConfigError::Seasonality)?,
            Err(_) => defaults.yearly_seasonality,
        };

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            timestamp_column: env::var("TIMESTAMP_COLUMN").unwrap_or(defaults.timestamp_column),
            value_column: env::var("VALUE_COLUMN").unwrap_or(defaults.value_column),
            input_encoding,
            target_year: env::var("TARGET_YEAR")
                .unwrap_or_else(|_| "2025".to_string())
                .parse()
                .unwrap_or(defaults.target_year),
            horizon_months: env::var("FORECAST_HORIZON_MONTHS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .unwrap_or(defaults.horizon_months),
            interval_width: env::var("INTERVAL_WIDTH")
                .unwrap_or_else(|_| "0.8".to_string())
                .parse()
                .unwrap_or(defaults.interval_width),
            yearly_seasonality,
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| "10485760".to_string())
                .parse()
                .unwrap_or(defaults.max_upload_bytes),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ConfigError::IntervalWidth(self.interval_width));
        }
        if self.horizon_months == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.horizon_months > MAX_HORIZON_MONTHS {
            return Err(ConfigError::HorizonTooLong(self.horizon_months));
        }
        if self.timestamp_column.trim().is_empty() {
            return Err(ConfigError::EmptyColumnName("TIMESTAMP_COLUMN"));
        }
        if self.value_column.trim().is_empty() {
            return Err(ConfigError::EmptyColumnName("VALUE_COLUMN"));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn model_config(&self) -> AdditiveModelConfig {
        AdditiveModelConfig {
            interval_width: self.interval_width,
            yearly_seasonality: self.yearly_seasonality,
            ..AdditiveModelConfig::default()
        }
    }

    /// Per-request context; `target_year` overrides the configured year
    pub fn upload_context(&self, target_year: Option<i32>) -> UploadContext {
        UploadContext {
            timestamp_column: self.timestamp_column.clone(),
            value_column: self.value_column.clone(),
            encoding: self.input_encoding,
            horizon_months: self.horizon_months,
            target_year: target_year.unwrap_or(self.target_year),
        }
    }
}
