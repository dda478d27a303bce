// Presenter: display-only views over a finished forecast
//
// - table: target-year rows with human-readable labels
// - chart: SVG rendering of history, estimate and uncertainty band
// - page: HTML upload form, report and error views

pub mod chart;
pub mod page;
pub mod table;

pub use chart::{render_svg, ChartError, ChartOptions};
pub use table::{TableLabels, YearTable};
