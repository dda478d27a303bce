// HTML views for the browser upload flow: form -> report | error

use super::table::{format_timestamp, YearTable};
use crate::pipeline::{ErrorKind, PipelineOutput};

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2em auto;padding:0 1em}\
table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:4px 10px;text-align:right}\
.error{color:#b00020}.hint{color:#555}";

pub fn page_title(target_year: i32) -> String {
    format!("{target_year}년 질산이온 농도 예측 시스템")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"ko\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape(title),
    )
}

pub fn upload_page(title: &str) -> String {
    let body = "<form action=\"/report\" method=\"post\" enctype=\"multipart/form-data\">\n\
                <label>CSV 파일을 업로드하세요 <input type=\"file\" name=\"file\" accept=\".csv,text/csv\" required></label>\n\
                <button type=\"submit\">예측</button>\n</form>\n";
    layout(title, body)
}

pub fn report_page(title: &str, output: &PipelineOutput, table: &YearTable, chart_svg: &str) -> String {
    let mut body = String::new();

    body.push_str("<h2>업로드된 CSV 컬럼 목록</h2>\n<ul>\n");
    for column in &output.columns {
        body.push_str(&format!("<li>{}</li>\n", escape(column)));
    }
    body.push_str("</ul>\n");

    let cleaning = &output.cleaning;
    body.push_str(&format!(
        "<p>{} rows read, {} used, {} dropped ({} invalid values, {} invalid dates).</p>\n",
        cleaning.total_rows,
        cleaning.series.len(),
        cleaning.dropped_rows,
        cleaning.invalid_values,
        cleaning.invalid_timestamps
    ));

    body.push_str("<h2>예측 결과 그래프</h2>\n");
    body.push_str(chart_svg);
    body.push('\n');

    body.push_str(&format!("<h2>{}년 예측 데이터</h2>\n", table.year));
    body.push_str("<table>\n<tr><th></th>");
    for label in table.labels.as_array() {
        body.push_str(&format!("<th>{}</th>", escape(label)));
    }
    body.push_str("</tr>\n");
    for (i, row) in table.rows.iter().enumerate() {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            i,
            format_timestamp(row.timestamp),
            row.estimate,
            row.lower,
            row.upper
        ));
    }
    body.push_str("</table>\n<p><a href=\"/\">다른 파일 업로드</a></p>\n");

    layout(title, &body)
}

/// `kind` is `None` when the request failed before the pipeline ran
pub fn error_page(title: &str, kind: Option<ErrorKind>, message: &str, hint: &str) -> String {
    let label = kind.map(|k| k.as_str()).unwrap_or("invalid_upload");
    let body = format!(
        "<p class=\"error\">오류 발생 ({}): {}</p>\n<p class=\"hint\">{}</p>\n<p><a href=\"/\">다시 시도</a></p>\n",
        label,
        escape(message),
        escape(hint)
    );
    layout(title, &body)
}

/// Minimal HTML text escaping
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
