use chrono::{DateTime, NaiveDateTime};
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::models::{CleanedSeries, ForecastResult};

const SECONDS_PER_DAY: f64 = 86_400.0;
const BAND_COLOR: RGBColor = RGBColor(0, 114, 178);

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Nothing to plot")]
    NoData,

    #[error("Failed to render chart: {0}")]
    Render(String),
}

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub title: String,
    pub value_label: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "질산이온 농도 예측".to_string(),
            value_label: "질산이온".to_string(),
            width: 900,
            height: 480,
        }
    }
}

/// Render observations, the fitted line and the uncertainty band as SVG
pub fn render_svg(
    history: &CleanedSeries,
    forecast: &ForecastResult,
    options: &ChartOptions,
) -> Result<String, ChartError> {
    if forecast.points.is_empty() {
        return Err(ChartError::NoData);
    }

    let observed: Vec<(f64, f64)> = history
        .observations()
        .iter()
        .map(|o| (to_days(o.timestamp), o.value))
        .collect();
    let estimate: Vec<(f64, f64)> = forecast
        .points
        .iter()
        .map(|p| (to_days(p.timestamp), p.estimate))
        .collect();

    // Upper edge left to right, then lower edge back
    let band: Vec<(f64, f64)> = forecast
        .points
        .iter()
        .map(|p| (to_days(p.timestamp), p.upper))
        .chain(
            forecast
                .points
                .iter()
                .rev()
                .map(|p| (to_days(p.timestamp), p.lower)),
        )
        .collect();

    let (x_min, x_max) = extent(observed.iter().chain(&estimate).map(|(x, _)| *x));
    let (y_min, y_max) = extent(
        observed
            .iter()
            .map(|(_, y)| *y)
            .chain(forecast.points.iter().flat_map(|p| [p.lower, p.upper])),
    );
    let (x_min, x_max) = pad_range(x_min, x_max, 0.02);
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 20).into_font())
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .x_labels(10)
            .x_label_formatter(&|x| format_day(*x))
            .y_desc(options.value_label.as_str())
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(std::iter::once(Polygon::new(band, BAND_COLOR.mix(0.2).filled())))
            .map_err(render_error)?;
        chart
            .draw_series(LineSeries::new(estimate, BAND_COLOR.stroke_width(2)))
            .map_err(render_error)?;
        chart
            .draw_series(observed.iter().map(|&point| Circle::new(point, 3, BLACK.filled())))
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    debug!("Rendered chart SVG ({} bytes)", svg.len());
    Ok(svg)
}

fn render_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> ChartError {
    ChartError::Render(err.to_string())
}

fn to_days(timestamp: NaiveDateTime) -> f64 {
    timestamp.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

fn format_day(days: f64) -> String {
    DateTime::from_timestamp((days * SECONDS_PER_DAY) as i64, 0)
        .map(|dt| dt.format("%Y-%m").to_string())
        .unwrap_or_default()
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Widen by a fraction of the span; a degenerate span gets a unit margin
fn pad_range(lo: f64, hi: f64, fraction: f64) -> (f64, f64) {
    let span = hi - lo;
    if span > 0.0 {
        (lo - span * fraction, hi + span * fraction)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}
