use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::forecast::{AdditiveModel, ForecastModel};
use crate::pipeline::{self, PipelineError, PipelineOutput, UploadContext};
use crate::presenter::{render_svg, ChartError, ChartOptions, TableLabels, YearTable};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("Forecast task failed: {0}")]
    Task(String),
}

/// Everything shown for one processed upload
#[derive(Debug, Clone)]
pub struct ForecastReport {
    pub output: PipelineOutput,
    pub table: YearTable,
    pub chart_svg: Option<String>,
}

#[derive(Clone)]
pub struct ForecastService {
    config: Arc<Config>,
    model: Arc<dyn ForecastModel>,
    labels: TableLabels,
    chart_options: ChartOptions,
}

impl ForecastService {
    pub fn new(config: Config, model: Arc<dyn ForecastModel>) -> Self {
        let chart_options = ChartOptions {
            value_label: config.value_column.clone(),
            ..ChartOptions::default()
        };
        Self {
            config: Arc::new(config),
            model,
            labels: TableLabels::default(),
            chart_options,
        }
    }

    /// Service backed by the default additive model
    pub fn from_config(config: Config) -> Self {
        let model = AdditiveModel::new(config.model_config());
        Self::new(config, Arc::new(model))
    }

    pub fn with_labels(mut self, labels: TableLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self, target_year: Option<i32>) -> UploadContext {
        self.config.upload_context(target_year)
    }

    /// Run the pipeline and build the views for one upload (blocking)
    #[instrument(skip(self, ctx, bytes), fields(target_year = ctx.target_year, size = bytes.len()))]
    pub fn build_report(
        &self,
        ctx: &UploadContext,
        bytes: &[u8],
        render_chart: bool,
    ) -> Result<ForecastReport, ServiceError> {
        let output = pipeline::run(ctx, self.model.clone(), bytes)?;
        let table = YearTable::build(&output.forecast, ctx.target_year, &self.labels);

        let chart_svg = if render_chart {
            Some(render_svg(&output.cleaning.series, &output.forecast, &self.chart_options)?)
        } else {
            None
        };

        info!(
            "Forecast ready: {} target-year rows for {}",
            table.rows.len(),
            ctx.target_year
        );

        Ok(ForecastReport {
            output,
            table,
            chart_svg,
        })
    }

    /// [`Self::build_report`] on the blocking thread pool
    pub async fn process_upload(
        &self,
        ctx: UploadContext,
        bytes: Vec<u8>,
        render_chart: bool,
    ) -> Result<ForecastReport, ServiceError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.build_report(&ctx, &bytes, render_chart))
            .await
            .map_err(|e| {
                error!("Forecast task panicked or was cancelled: {}", e);
                ServiceError::Task(e.to_string())
            })?
    }
}
