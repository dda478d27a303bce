use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

/// Uploaded table as decoded from the source file, before any type coercion.
///
/// Rows are padded to the header width; a blank cell is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Index of the first header with this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A single cleaned measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Cleaned two-column series: every row has a timestamp and a finite value.
///
/// Never empty. Rows keep the order they had in the upload.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSeries {
    observations: Vec<Observation>,
}

impl CleanedSeries {
    /// Returns `None` for an empty vector
    pub fn new(observations: Vec<Observation>) -> Option<Self> {
        if observations.is_empty() {
            None
        } else {
            Some(Self { observations })
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    // A constructed series always holds at least one observation.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.iter_timestamps().min().unwrap_or_default()
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.iter_timestamps().max().unwrap_or_default()
    }

    /// Distinct timestamps in ascending order
    pub fn unique_timestamps(&self) -> Vec<NaiveDateTime> {
        let mut timestamps: Vec<NaiveDateTime> = self.iter_timestamps().collect();
        timestamps.sort();
        timestamps.dedup();
        timestamps
    }

    fn iter_timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.observations.iter().map(|o| o.timestamp)
    }
}

/// One row of model output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ForecastPoint {
    pub timestamp: NaiveDateTime,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Model output over the historical index followed by the future extension.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastResult {
    pub points: Vec<ForecastPoint>,
    /// Number of leading points that belong to the historical range
    pub history_len: usize,
}

impl ForecastResult {
    pub fn history(&self) -> &[ForecastPoint] {
        &self.points[..self.history_len.min(self.points.len())]
    }

    pub fn future(&self) -> &[ForecastPoint] {
        &self.points[self.history_len.min(self.points.len())..]
    }
}
