//! CSV file ingestion
//!
//! Reads a librarian-supplied CSV from disk into a header list plus
//! row records. Blank rows are dropped, every cell is trimmed, and
//! short rows are padded so each row has one cell per header.

use csv::ReaderBuilder;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Ceiling on accepted CSV file size
pub const DEFAULT_MAX_CSV_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CsvIngestError {
    #[error("File must have a .csv extension")]
    WrongExtension,

    #[error("File is {actual} bytes, exceeding the {limit} byte limit")]
    TooLarge { actual: u64, limit: u64 },

    #[error("Empty file")]
    EmptyFile,

    #[error("No headers found")]
    NoHeaders,

    #[error("CSV parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A parsed CSV: one header row plus zero-padded data rows
#[derive(Debug, Clone, Serialize)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedCsv {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First non-empty cell in a column, used as its sample value
    pub fn sample_value(&self, column: usize) -> &str {
        self.rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(String::as_str)
            .find(|cell| !cell.is_empty())
            .unwrap_or("")
    }

    /// Distinct non-empty values in a column, in first-seen order
    pub fn distinct_values(&self, column: usize) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut values = Vec::new();
        for row in &self.rows {
            if let Some(cell) = row.get(column) {
                if !cell.is_empty() && seen.insert(cell.clone()) {
                    values.push(cell.clone());
                }
            }
        }
        values
    }
}

/// Reads and parses a CSV file, enforcing the extension and size
/// pre-checks before touching the content.
pub fn ingest_file(path: &Path, max_bytes: u64) -> Result<ParsedCsv, CsvIngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    if extension.as_deref() != Some("csv") {
        return Err(CsvIngestError::WrongExtension);
    }

    let actual = std::fs::metadata(path)?.len();
    if actual > max_bytes {
        return Err(CsvIngestError::TooLarge {
            actual,
            limit: max_bytes,
        });
    }

    let content = std::fs::read_to_string(path)?;
    parse_csv(&content)
}

/// Parses CSV text into headers plus data rows.
///
/// The first non-blank row supplies the headers. Rows where every cell
/// is blank are dropped; a file with no data rows left after the
/// header fails with [`CsvIngestError::EmptyFile`].
pub fn parse_csv(content: &str) -> Result<ParsedCsv, CsvIngestError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| CsvIngestError::Parse(e.to_string()))?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        records.push(cells);
    }

    let mut records = records.into_iter();
    let headers = records.next().ok_or(CsvIngestError::EmptyFile)?;
    if headers.iter().all(|header| header.is_empty()) {
        return Err(CsvIngestError::NoHeaders);
    }

    let width = headers.len();
    let rows: Vec<Vec<String>> = records
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    if rows.is_empty() {
        return Err(CsvIngestError::EmptyFile);
    }

    Ok(ParsedCsv { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_basic() {
        let parsed = parse_csv("MMS ID,URL\n991,https://a.example/x\n992,https://a.example/y\n")
            .unwrap();
        assert_eq!(parsed.headers, vec!["MMS ID", "URL"]);
        assert_eq!(parsed.row_count(), 2);
        assert_eq!(parsed.rows[0], vec!["991", "https://a.example/x"]);
    }

    #[test]
    fn test_blank_rows_dropped() {
        let parsed = parse_csv("id,url\n\n , \n1,https://a.example\n,,\n").unwrap();
        assert_eq!(parsed.row_count(), 1);
    }

    #[test]
    fn test_short_rows_padded_long_rows_clipped() {
        let parsed = parse_csv("id,url,title\n1,https://a.example\n2,https://b.example,t,extra\n")
            .unwrap();
        assert_eq!(parsed.rows[0], vec!["1", "https://a.example", ""]);
        assert_eq!(parsed.rows[1], vec!["2", "https://b.example", "t"]);
    }

    #[test]
    fn test_cells_trimmed() {
        let parsed = parse_csv("id , url \n 1 , https://a.example \n").unwrap();
        assert_eq!(parsed.headers, vec!["id", "url"]);
        assert_eq!(parsed.rows[0], vec!["1", "https://a.example"]);
    }

    #[test]
    fn test_quoted_cells() {
        let parsed = parse_csv("id,title\n1,\"last, first\"\n").unwrap();
        assert_eq!(parsed.rows[0][1], "last, first");
    }

    #[test]
    fn test_bom_stripped() {
        let parsed = parse_csv("\u{feff}id,url\n1,https://a.example\n").unwrap();
        assert_eq!(parsed.headers[0], "id");
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(parse_csv(""), Err(CsvIngestError::EmptyFile)));
        assert!(matches!(parse_csv("\n\n"), Err(CsvIngestError::EmptyFile)));
    }

    #[test]
    fn test_header_only_is_empty() {
        assert!(matches!(
            parse_csv("id,url\n"),
            Err(CsvIngestError::EmptyFile)
        ));
    }

    #[test]
    fn test_parse_error_surfaced() {
        let result = parse_csv("id\n\"unterminated\n1");
        assert!(matches!(result, Err(CsvIngestError::Parse(_))));
    }

    #[test]
    fn test_sample_and_distinct_values() {
        let parsed = parse_csv("id,type\n1,\n2,accepted\n3,accepted\n4,submitted\n").unwrap();
        assert_eq!(parsed.sample_value(1), "accepted");
        assert_eq!(parsed.distinct_values(1), vec!["accepted", "submitted"]);
        assert_eq!(parsed.sample_value(9), "");
    }

    #[test]
    fn test_rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.txt");
        std::fs::write(&path, "id,url\n1,https://a.example\n").unwrap();
        assert!(matches!(
            ingest_file(&path, DEFAULT_MAX_CSV_BYTES),
            Err(CsvIngestError::WrongExtension)
        ));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id,url").unwrap();
        writeln!(file, "1,https://a.example/with/a/long/path").unwrap();
        drop(file);
        assert!(matches!(
            ingest_file(&path, 8),
            Err(CsvIngestError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_ingest_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.CSV");
        std::fs::write(&path, "id,url\n1,https://a.example\n").unwrap();
        let parsed = ingest_file(&path, DEFAULT_MAX_CSV_BYTES).unwrap();
        assert_eq!(parsed.row_count(), 1);
    }
}
