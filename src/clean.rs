use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::models::{CleanedSeries, Observation, RawTable};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y.%m.%d.", "%m/%d/%Y"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CleanError {
    #[error("Required column(s) missing: {}; available columns: {}", missing.join(", "), available.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("No valid rows remain after cleaning {total_rows} row(s) of '{timestamp_column}' and '{value_column}'")]
    NoValidRows {
        total_rows: usize,
        timestamp_column: String,
        value_column: String,
    },
}

/// Outcome of a successful cleaning pass
#[derive(Debug, Clone)]
pub struct CleaningReport {
    pub series: CleanedSeries,
    pub total_rows: usize,
    pub dropped_rows: usize,
    pub invalid_values: usize,
    pub invalid_timestamps: usize,
}

/// Validates the two required columns and coerces them into a [`CleanedSeries`]
#[derive(Debug, Clone)]
pub struct Cleaner {
    timestamp_column: String,
    value_column: String,
}

impl Cleaner {
    pub fn new(timestamp_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            value_column: value_column.into(),
        }
    }

    /// Coerce both columns and drop every row where either one fails.
    ///
    /// Bad cells are nulled rather than reported, so instrument errors and
    /// calibration notes mixed into an export do not block the forecast.
    #[instrument(skip(self, table), fields(rows = table.row_count()))]
    pub fn clean(&self, table: &RawTable) -> Result<CleaningReport, CleanError> {
        let ts_idx = table.column_index(&self.timestamp_column);
        let value_idx = table.column_index(&self.value_column);

        let (ts_idx, value_idx) = match (ts_idx, value_idx) {
            (Some(t), Some(v)) => (t, v),
            _ => {
                let missing = [
                    (ts_idx, &self.timestamp_column),
                    (value_idx, &self.value_column),
                ]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name.clone())
                .collect();

                return Err(CleanError::MissingColumns {
                    missing,
                    available: table.headers.clone(),
                });
            }
        };

        let mut observations = Vec::with_capacity(table.row_count());
        let mut invalid_values = 0;
        let mut invalid_timestamps = 0;

        for (row_idx, row) in table.rows.iter().enumerate() {
            let raw_ts = row.get(ts_idx).and_then(Option::as_deref);
            let raw_value = row.get(value_idx).and_then(Option::as_deref);

            let timestamp = raw_ts.and_then(coerce_timestamp);
            let value = raw_value.and_then(coerce_value);

            if timestamp.is_none() {
                invalid_timestamps += 1;
            }
            if value.is_none() {
                invalid_values += 1;
            }

            match (timestamp, value) {
                (Some(timestamp), Some(value)) => observations.push(Observation { timestamp, value }),
                _ => debug!(
                    "Dropping row {}: timestamp={:?}, value={:?}",
                    row_idx + 1,
                    raw_ts,
                    raw_value
                ),
            }
        }

        let total_rows = table.row_count();
        let dropped_rows = total_rows - observations.len();

        let series = CleanedSeries::new(observations).ok_or_else(|| CleanError::NoValidRows {
            total_rows,
            timestamp_column: self.timestamp_column.clone(),
            value_column: self.value_column.clone(),
        })?;

        if dropped_rows > 0 {
            warn!(
                "Dropped {} of {} rows ({} invalid values, {} invalid timestamps)",
                dropped_rows, total_rows, invalid_values, invalid_timestamps
            );
        }
        info!("Cleaned series has {} observations", series.len());

        Ok(CleaningReport {
            series,
            total_rows,
            dropped_rows,
            invalid_values,
            invalid_timestamps,
        })
    }
}

/// Parse a cell as a finite number; anything else is null
pub fn coerce_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Best-effort timestamp parse; offsets are dropped and the local wall-clock time kept
pub fn coerce_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }

    // "2024. 01. 05." style dates from Korean locale exports
    let normalized = trimmed.replace(". ", ".");
    let candidate = normalized.as_str();

    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(candidate, fmt).ok())
    {
        return Some(dt);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
        .or_else(|| parse_compact_date(candidate))
        .or_else(|| parse_year_month(candidate))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `YYYYMMDD`
fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = raw[0..4].parse().ok()?;
    let month = raw[4..6].parse().ok()?;
    let day = raw[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY-MM`, `YYYY/MM` or `YYYY.MM`, as the first of the month
fn parse_year_month(raw: &str) -> Option<NaiveDate> {
    let raw = raw.strip_suffix('.').unwrap_or(raw);
    let (year, month) = raw.split_once(['-', '/', '.'])?;
    if year.len() != 4
        || !(1..=2).contains(&month.len())
        || !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit())
    {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[Option<&str>]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value("10"), Some(10.0));
        assert_eq!(coerce_value(" 2.5 "), Some(2.5));
        assert_eq!(coerce_value("-1e-3"), Some(-0.001));
        assert_eq!(coerce_value("교정"), None);
        assert_eq!(coerce_value("cal"), None);
        assert_eq!(coerce_value("NaN"), None);
        assert_eq!(coerce_value("inf"), None);
        assert_eq!(coerce_value("1,234"), None);
        assert_eq!(coerce_value(""), None);
    }

    #[test]
    fn test_coerce_timestamp_formats() {
        assert_eq!(coerce_timestamp("2024-01-05"), Some(date(2024, 1, 5)));
        assert_eq!(coerce_timestamp("2024/01/05"), Some(date(2024, 1, 5)));
        assert_eq!(coerce_timestamp("2024.01.05"), Some(date(2024, 1, 5)));
        assert_eq!(coerce_timestamp("2024. 01. 05."), Some(date(2024, 1, 5)));
        assert_eq!(coerce_timestamp("20240105"), Some(date(2024, 1, 5)));
        assert_eq!(coerce_timestamp("01/05/2024"), Some(date(2024, 1, 5)));
        assert_eq!(
            coerce_timestamp("2024-01-05 13:30"),
            date(2024, 1, 5).checked_add_signed(chrono::Duration::minutes(13 * 60 + 30))
        );
        assert_eq!(
            coerce_timestamp("2024-01-05T09:00:00+09:00"),
            date(2024, 1, 5).checked_add_signed(chrono::Duration::hours(9))
        );
        assert_eq!(
            coerce_timestamp("2024-12-01T00:00:00+09:00"),
            Some(date(2024, 12, 1))
        );
    }

    #[test]
    fn test_coerce_timestamp_year_month() {
        assert_eq!(coerce_timestamp("2024-01"), Some(date(2024, 1, 1)));
        assert_eq!(coerce_timestamp("2024/1"), Some(date(2024, 1, 1)));
        assert_eq!(coerce_timestamp("2024.11"), Some(date(2024, 11, 1)));
        assert_eq!(coerce_timestamp("2024. 03."), Some(date(2024, 3, 1)));
        assert_eq!(coerce_timestamp("2024-13"), None);
        assert_eq!(coerce_timestamp("24-01"), None);
    }

    #[test]
    fn test_coerce_timestamp_rejects_garbage() {
        assert_eq!(coerce_timestamp("not a date"), None);
        assert_eq!(coerce_timestamp("2024-13-01"), None);
        assert_eq!(coerce_timestamp("2024-02-30"), None);
        assert_eq!(coerce_timestamp("   "), None);
    }

    #[test]
    fn test_missing_columns_lists_missing_and_available() {
        let cleaner = Cleaner::new("date", "value");
        let result = cleaner.clean(&table(&["date", "reading"], &[]));

        match result {
            Err(CleanError::MissingColumns { missing, available }) => {
                assert_eq!(missing, vec!["value"]);
                assert_eq!(available, vec!["date", "reading"]);
            }
            other => panic!("Expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_both_columns_missing() {
        let cleaner = Cleaner::new("date", "value");
        let err = cleaner.clean(&table(&["x"], &[])).unwrap_err();
        assert!(matches!(
            err,
            CleanError::MissingColumns { ref missing, .. } if missing.len() == 2
        ));
    }

    #[test]
    fn test_drops_rows_with_either_field_invalid() {
        let cleaner = Cleaner::new("date", "value");
        let raw = table(
            &["value", "site", "date"],
            &[
                &[Some("10"), Some("A"), Some("2024-01-01")],
                &[Some("cal"), Some("A"), Some("2024-02-01")],
                &[Some("12"), Some("A"), Some("bad date")],
                &[None, Some("A"), Some("2024-04-01")],
                &[Some("14"), Some("A"), Some("2024-05-01")],
            ],
        );

        let report = cleaner.clean(&raw).unwrap();
        assert_eq!(report.series.len(), 2);
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.dropped_rows, 3);
        assert_eq!(report.invalid_values, 2);
        assert_eq!(report.invalid_timestamps, 1);

        let obs = report.series.observations();
        assert_eq!(obs[0].timestamp, date(2024, 1, 1));
        assert_eq!(obs[0].value, 10.0);
        assert_eq!(obs[1].timestamp, date(2024, 5, 1));
        assert_eq!(obs[1].value, 14.0);
    }

    #[test]
    fn test_all_values_non_numeric_is_empty_data() {
        let cleaner = Cleaner::new("date", "value");
        let raw = table(
            &["date", "value"],
            &[
                &[Some("2024-01-01"), Some("교정")],
                &[Some("2024-02-01"), Some("교정")],
            ],
        );

        assert_eq!(
            cleaner.clean(&raw).unwrap_err(),
            CleanError::NoValidRows {
                total_rows: 2,
                timestamp_column: "date".to_string(),
                value_column: "value".to_string(),
            }
        );
    }

    #[test]
    fn test_header_only_table_is_empty_data() {
        let cleaner = Cleaner::new("date", "value");
        let err = cleaner.clean(&table(&["date", "value"], &[])).unwrap_err();
        assert!(matches!(err, CleanError::NoValidRows { total_rows: 0, .. }));
    }
}
