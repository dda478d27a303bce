use std::sync::Arc;

use encoding_rs::Encoding;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::clean::{CleanError, Cleaner, CleaningReport};
use crate::forecast::{ForecastModel, Forecaster, ModelFittingError};
use crate::ingest::{Ingestor, ParseError};
use crate::models::ForecastResult;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    ModelFitting(#[from] ModelFittingError),
}

/// User-facing error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ParseError,
    SchemaError,
    EmptyDataError,
    ModelFittingError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::SchemaError => "schema_error",
            Self::EmptyDataError => "empty_data_error",
            Self::ModelFittingError => "model_fitting_error",
        }
    }
}

impl PipelineError {
    /// Shown next to every pipeline failure
    pub const HINT: &'static str = "Check the uploaded file: the value column may contain \
        non-numeric entries (for example a calibration marker such as '교정') or the date \
        column may contain malformed dates.";

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Clean(CleanError::MissingColumns { .. }) => ErrorKind::SchemaError,
            Self::Clean(CleanError::NoValidRows { .. }) => ErrorKind::EmptyDataError,
            Self::ModelFitting(_) => ErrorKind::ModelFittingError,
        }
    }
}

/// Settings for one upload; built fresh for every request
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub timestamp_column: String,
    pub value_column: String,
    pub encoding: &'static Encoding,
    pub horizon_months: usize,
    pub target_year: i32,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Header row of the upload, as received
    pub columns: Vec<String>,
    pub cleaning: CleaningReport,
    pub forecast: ForecastResult,
    pub model_name: &'static str,
}

/// Ingest, clean and forecast one uploaded file.
///
/// Stops at the first failing stage; nothing from earlier stages is
/// returned on error.
#[instrument(skip(ctx, model, bytes), fields(size = bytes.len(), encoding = ctx.encoding.name()))]
pub fn run(
    ctx: &UploadContext,
    model: Arc<dyn ForecastModel>,
    bytes: &[u8],
) -> Result<PipelineOutput, PipelineError> {
    let table = Ingestor::new(ctx.encoding).parse(bytes)?;
    let columns = table.headers.clone();
    info!("Uploaded file has columns: {:?}", columns);

    let cleaning = Cleaner::new(&ctx.timestamp_column, &ctx.value_column).clean(&table)?;
    drop(table);

    let forecaster = Forecaster::new(model, ctx.horizon_months);
    let forecast = forecaster.forecast(&cleaning.series)?;

    Ok(PipelineOutput {
        columns,
        cleaning,
        forecast,
        model_name: forecaster.model_name(),
    })
}
