use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{ForecastPoint, ForecastResult};

/// Display names for the four forecast fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TableLabels {
    pub date: String,
    pub estimate: String,
    pub lower: String,
    pub upper: String,
}

impl Default for TableLabels {
    fn default() -> Self {
        Self {
            date: "날짜".to_string(),
            estimate: "예측값".to_string(),
            lower: "하한값".to_string(),
            upper: "상한값".to_string(),
        }
    }
}

impl TableLabels {
    pub fn as_array(&self) -> [&str; 4] {
        [&self.date, &self.estimate, &self.lower, &self.upper]
    }
}

/// Forecast rows that fall inside one calendar year
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct YearTable {
    pub year: i32,
    pub labels: TableLabels,
    pub rows: Vec<ForecastPoint>,
}

impl YearTable {
    pub fn build(forecast: &ForecastResult, year: i32, labels: &TableLabels) -> Self {
        let rows = forecast
            .points
            .iter()
            .filter(|p| p.timestamp.year() == year)
            .copied()
            .collect();

        Self {
            year,
            labels: labels.clone(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fixed-width text rendering for terminals
    pub fn to_text(&self) -> String {
        let header = self.labels.as_array();
        let body: Vec<[String; 4]> = self
            .rows
            .iter()
            .map(|r| {
                [
                    format_timestamp(r.timestamp),
                    format!("{:.4}", r.estimate),
                    format!("{:.4}", r.lower),
                    format!("{:.4}", r.upper),
                ]
            })
            .collect();

        let mut widths = header.map(|h| h.chars().count());
        for row in &body {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let pad = |cell: &str, width: usize| {
            let fill = width.saturating_sub(cell.chars().count());
            format!("{}{}", " ".repeat(fill), cell)
        };

        let header_line: Vec<String> = header.iter().zip(widths).map(|(h, w)| pad(*h, w)).collect();
        out.push_str(&header_line.join("  "));
        out.push('\n');
        for row in &body {
            let line: Vec<String> = row.iter().zip(widths).map(|(c, w)| pad(c.as_str(), w)).collect();
            out.push_str(&line.join("  "));
            out.push('\n');
        }
        out
    }
}

/// Date only when the timestamp falls on midnight
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    if timestamp.num_seconds_from_midnight() == 0 {
        timestamp.format("%Y-%m-%d").to_string()
    } else {
        timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
