use std::fs;
use std::path::PathBuf;

use clap::Parser;
use nitrate_forecast_service::config::Config;
use nitrate_forecast_service::forecast::Seasonality;
use nitrate_forecast_service::ingest::resolve_encoding;
use nitrate_forecast_service::pipeline::PipelineError;
use nitrate_forecast_service::services::{ForecastService, ServiceError};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "forecast-file")]
#[command(about = "Forecast the next year of nitrate measurements from a local CSV file", long_about = None)]
struct Cli {
    /// Measurement file to forecast
    #[arg(long)]
    file: PathBuf,

    /// Text encoding of the file (e.g. cp949, utf-8)
    #[arg(long, env = "INPUT_ENCODING", default_value = "cp949")]
    encoding: String,

    /// Name of the timestamp column
    #[arg(long, env = "TIMESTAMP_COLUMN", default_value = "측정날짜")]
    timestamp_column: String,

    /// Name of the measurement column
    #[arg(long, env = "VALUE_COLUMN", default_value = "질산이온")]
    value_column: String,

    /// Calendar year to tabulate
    #[arg(long, env = "TARGET_YEAR", default_value = "2025")]
    year: i32,

    /// Number of monthly periods to forecast
    #[arg(long, env = "FORECAST_HORIZON_MONTHS", default_value = "12")]
    horizon: usize,

    /// Coverage of the uncertainty interval
    #[arg(long, env = "INTERVAL_WIDTH", default_value = "0.8")]
    interval_width: f64,

    /// Yearly seasonality: auto, on or off
    #[arg(long, env = "YEARLY_SEASONALITY", default_value = "auto")]
    seasonality: Seasonality,

    /// Write the forecast chart as SVG to this path
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Print the full forecast as JSON instead of the year table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config {
        timestamp_column: cli.timestamp_column,
        value_column: cli.value_column,
        input_encoding: resolve_encoding(&cli.encoding)?,
        target_year: cli.year,
        horizon_months: cli.horizon,
        interval_width: cli.interval_width,
        yearly_seasonality: cli.seasonality,
        ..Config::default()
    };
    config.validate()?;

    let bytes = fs::read(&cli.file)?;
    info!("Read {} bytes from {}", bytes.len(), cli.file.display());

    let service = ForecastService::from_config(config);
    let ctx = service.context(None);

    let report = match service.build_report(&ctx, &bytes, cli.chart.is_some()) {
        Ok(report) => report,
        Err(ServiceError::Pipeline(e)) => {
            error!("Forecast failed ({})", e.kind().as_str());
            eprintln!("⚠️ {e}");
            eprintln!("💡 {}", PipelineError::HINT);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let cleaning = &report.output.cleaning;
    eprintln!("Columns: {}", report.output.columns.join(", "));
    eprintln!(
        "Rows: {} read, {} used, {} dropped",
        cleaning.total_rows,
        cleaning.series.len(),
        cleaning.dropped_rows
    );

    if let (Some(path), Some(svg)) = (&cli.chart, &report.chart_svg) {
        fs::write(path, svg)?;
        eprintln!("Chart written to {}", path.display());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.output.forecast)?);
    } else if report.table.is_empty() {
        eprintln!("No forecast rows fall in {}", report.table.year);
    } else {
        print!("{}", report.table.to_text());
    }

    Ok(())
}
