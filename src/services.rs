pub mod forecast_service;

pub use forecast_service::{ForecastReport, ForecastService, ServiceError};
