#![allow(dead_code)]

use nitrate_forecast_service::config::Config;
use nitrate_forecast_service::pipeline::UploadContext;
use nitrate_forecast_service::services::ForecastService;

pub const BOUNDARY: &str = "nitrate-test-boundary";

/// Config reading plain `date,value` UTF-8 files
pub fn utf8_config() -> Config {
    Config {
        timestamp_column: "date".to_string(),
        value_column: "value".to_string(),
        input_encoding: encoding_rs::UTF_8,
        ..Config::default()
    }
}

pub fn utf8_context() -> UploadContext {
    utf8_config().upload_context(None)
}

pub fn utf8_service() -> ForecastService {
    ForecastService::from_config(utf8_config())
}

/// `months` month-start rows beginning January `start_year`, with a gentle
/// trend and a yearly wobble
pub fn monthly_csv(start_year: i32, months: u32) -> String {
    let mut csv = String::from("date,value\n");
    for i in 0..months {
        let year = start_year + (i / 12) as i32;
        let month = i % 12 + 1;
        let value = 12.0 + 0.05 * i as f64 + 1.5 * ((month as f64) * std::f64::consts::PI / 6.0).sin();
        csv.push_str(&format!("{year}-{month:02}-01,{value:.3}\n"));
    }
    csv
}

/// Same rows as [`monthly_csv`] under the default Korean headers, encoded as cp949
pub fn korean_monthly_csv(start_year: i32, months: u32) -> Vec<u8> {
    let text = monthly_csv(start_year, months).replacen("date,value", "측정날짜,질산이온", 1);
    let (bytes, _, had_errors) = encoding_rs::EUC_KR.encode(&text);
    assert!(!had_errors, "fixture must be representable in cp949");
    bytes.into_owned()
}

/// Multipart body with a single file field
pub fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
