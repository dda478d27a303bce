// End-to-end pipeline tests over in-memory CSV uploads

mod common;

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Timelike};
use nitrate_forecast_service::forecast::{AdditiveModel, AdditiveModelConfig, ModelFittingError};
use nitrate_forecast_service::pipeline::{self, ErrorKind, PipelineError};
use nitrate_forecast_service::presenter::{TableLabels, YearTable};

fn model() -> Arc<AdditiveModel> {
    Arc::new(AdditiveModel::new(AdditiveModelConfig::default()))
}

#[test]
fn test_single_valid_row_fails_model_fitting() {
    let ctx = common::utf8_context();
    let csv = "date,value\n2024-01-01,1.2\n2024-02-01,cal\n";

    let err = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ModelFittingError);
    match err {
        PipelineError::ModelFitting(ModelFittingError::InsufficientData { required, actual }) => {
            assert_eq!(required, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("expected insufficient data, got {other:?}"),
    }
}

#[test]
fn test_two_years_of_history_fill_target_year() {
    let ctx = common::utf8_context();
    let csv = common::monthly_csv(2023, 24);

    let output = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap();
    let table = YearTable::build(&output.forecast, 2025, &TableLabels::default());

    assert_eq!(table.rows.len(), 12);
    for (i, row) in table.rows.iter().enumerate() {
        assert_eq!(row.timestamp.year(), 2025);
        assert_eq!(row.timestamp.month(), i as u32 + 1);
        assert_eq!(row.timestamp.day(), 1);
    }
}

#[test]
fn test_wrong_encoding_fails_before_cleaning() {
    let ctx = common::utf8_context();
    let bytes = common::korean_monthly_csv(2023, 24);

    let err = pipeline::run(&ctx, model(), &bytes).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(matches!(err, PipelineError::Parse(_)));
}

#[test]
fn test_missing_value_column_is_schema_error() {
    let ctx = common::utf8_context();
    let csv = "date,nitrate\n2024-01-01,1.0\n2024-02-01,2.0\n";

    let err = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
    assert!(err.to_string().contains("value"));
}

#[test]
fn test_all_values_non_numeric_is_empty_data_error() {
    let ctx = common::utf8_context();
    let csv = "date,value\n2024-01-01,교정\n2024-02-01,n/a\n2024-03-01,\n";

    let err = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyDataError);
}

#[test]
fn test_cleaned_rows_match_rows_with_both_fields_valid() {
    let ctx = common::utf8_context();
    let csv = "date,value\n\
               2023-01-01,10.0\n\
               2023-02-01,교정\n\
               not-a-date,11.0\n\
               2023-04-01,12.5\n\
               ,13.0\n\
               2023-06-01,14.0\n\
               2023-07-01,15.0\n";

    let output = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap();
    let cleaning = &output.cleaning;

    assert_eq!(cleaning.total_rows, 7);
    assert_eq!(cleaning.series.len(), 4);
    assert_eq!(cleaning.dropped_rows, 3);
    assert_eq!(cleaning.invalid_values, 1);
    assert_eq!(cleaning.invalid_timestamps, 2);
    assert_eq!(output.forecast.history_len, 4);
}

#[test]
fn test_bounds_bracket_estimate_everywhere() {
    let ctx = common::utf8_context();
    let csv = common::monthly_csv(2021, 40);

    let output = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap();

    assert!(!output.forecast.points.is_empty());
    for point in &output.forecast.points {
        assert!(
            point.lower <= point.estimate && point.estimate <= point.upper,
            "bounds violated at {}: {} <= {} <= {}",
            point.timestamp,
            point.lower,
            point.estimate,
            point.upper
        );
    }
}

#[test]
fn test_future_is_twelve_month_starts_after_history() {
    let ctx = common::utf8_context();
    let csv = "date,value\n\
               2024-01-03 09:30,10.0\n\
               2024-02-11 14:00,11.0\n\
               2024-03-20 08:15,12.0\n\
               2024-04-17 10:45,11.5\n";

    let output = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap();
    let last = output.cleaning.series.last_timestamp();
    let future = output.forecast.future();

    assert_eq!(future.len(), 12);
    assert!(future[0].timestamp > last);
    assert_eq!(
        future[0].timestamp.date(),
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    );
    for window in future.windows(2) {
        assert!(window[0].timestamp < window[1].timestamp);
    }
    for point in future {
        assert_eq!(point.timestamp.day(), 1);
        assert_eq!(point.timestamp.hour(), 0);
        assert_eq!(point.timestamp.minute(), 0);
    }
}

#[test]
fn test_output_reports_header_and_model() {
    let ctx = common::utf8_context();
    let csv = "site,date,value\nA,2024-01-01,1.0\nA,2024-02-01,2.0\nA,2024-03-01,2.5\n";

    let output = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap();

    assert_eq!(output.columns, vec!["site", "date", "value"]);
    assert_eq!(output.model_name, "additive-trend-seasonal");
}

#[test]
fn test_offset_stamped_months_keep_their_calendar_month() {
    let ctx = common::utf8_context();
    let mut csv = String::from("date,value\n");
    for i in 0..24 {
        csv.push_str(&format!(
            "{}-{:02}-01T00:00:00+09:00,{}\n",
            2023 + i / 12,
            i % 12 + 1,
            10.0 + 0.1 * i as f64
        ));
    }

    let output = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap();
    let first = output.cleaning.series.first_timestamp();
    assert_eq!(first, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
    assert_eq!(
        output.forecast.future()[0].timestamp.date(),
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    );

    let table = YearTable::build(&output.forecast, 2025, &TableLabels::default());
    assert_eq!(table.rows.len(), 12);
}

#[test]
fn test_year_month_dates_are_month_starts() {
    let ctx = common::utf8_context();
    let mut csv = String::from("date,value\n");
    for i in 0..24 {
        csv.push_str(&format!("{}-{:02},{}\n", 2023 + i / 12, i % 12 + 1, 5.0 + 0.2 * i as f64));
    }

    let output = pipeline::run(&ctx, model(), csv.as_bytes()).unwrap();
    assert_eq!(output.cleaning.series.len(), 24);
    assert_eq!(output.cleaning.dropped_rows, 0);

    let table = YearTable::build(&output.forecast, 2025, &TableLabels::default());
    assert_eq!(table.rows.len(), 12);
    assert_eq!(table.rows[0].timestamp.month(), 1);
}
