/// Ingestor for uploaded measurement files
///
/// Decodes the raw upload with a declared text encoding and splits it into a
/// header row plus string cells. No type coercion happens here.
use csv::{ReaderBuilder, Trim};
use encoding_rs::{Encoding, EUC_KR, UTF_8};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::RawTable;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),

    #[error("File is not valid {encoding} text")]
    Decode { encoding: &'static str },

    #[error("Row on line {line} has {found} fields, header declares {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Resolve an encoding label, accepting the Windows code-page aliases that
/// Korean spreadsheet exports are usually tagged with.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, ParseError> {
    let normalized = label.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "cp949" | "ms949" | "uhc" => Ok(EUC_KR),
        other => Encoding::for_label(other.as_bytes())
            .ok_or_else(|| ParseError::UnknownEncoding(label.to_string())),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ingestor {
    encoding: &'static Encoding,
    delimiter: u8,
}

impl Ingestor {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            delimiter: b',',
        }
    }

    pub fn from_label(label: &str) -> Result<Self, ParseError> {
        resolve_encoding(label).map(Self::new)
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Parse an uploaded file into a [`RawTable`]
    ///
    /// Decoding is strict: a single malformed byte sequence fails the whole
    /// file rather than being replaced.
    #[instrument(skip(self, bytes), fields(encoding = self.encoding.name(), size = bytes.len()))]
    pub fn parse(&self, bytes: &[u8]) -> Result<RawTable, ParseError> {
        let text = self.decode(bytes)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let width = headers.len();
        debug!("Parsed header row with {} columns: {:?}", width, headers);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if record.len() > width {
                return Err(ParseError::RaggedRow {
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    expected: width,
                    found: record.len(),
                });
            }

            let mut row: Vec<Option<String>> = record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect();
            row.resize(width, None);
            rows.push(row);
        }

        debug!("Parsed {} data rows", rows.len());
        Ok(RawTable { headers, rows })
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<std::borrow::Cow<'a, str>, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::Empty);
        }

        let body = if self.encoding == UTF_8 {
            bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
        } else {
            bytes
        };

        self.encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or(ParseError::Decode {
                encoding: self.encoding.name(),
            })
    }
}
