use garde::Validate;

use crate::error::AppError;

/// Header the upload CSV must carry, in this exact order.
pub const UPLOAD_HEADER: [&str; 3] = ["Serial Number", "Product Name", "Input Image Urls"];

/// Header written by the export endpoint.
pub const EXPORT_HEADER: [&str; 4] = [
    "Serial Number",
    "Product Name",
    "Input Image Urls",
    "Output Image Urls",
];

/// One validated upload row: a product plus its image URL list.
///
/// An empty URL column yields an empty `input_urls` — a product with
/// zero images, which contributes nothing to the batch total.
#[derive(Debug, Clone, Validate)]
pub struct CsvRow {
    #[garde(skip)]
    pub serial_num: i64,

    #[garde(length(min = 1, max = 500))]
    pub product_name: String,

    #[garde(skip)]
    pub input_urls: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("CSV file is empty")]
    Empty,

    #[error("Invalid CSV format. Expected columns: {expected:?}, got: {found:?}")]
    BadHeader {
        expected: &'static [&'static str],
        found: Vec<String>,
    },

    #[error("Row {line} has {found} fields, expected {expected}")]
    BadShape {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {line}: serial number {value:?} is not an integer")]
    BadSerial { line: usize, value: String },

    #[error("Row {line}: {report}")]
    InvalidRow { line: usize, report: garde::Report },
}

impl From<CsvError> for AppError {
    fn from(err: CsvError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Parse and validate an upload CSV.
///
/// Enforces the literal header, a rectangular three-column body, and an
/// integer serial per row. Record parsing is quote-aware so the URL
/// column may hold a comma-separated list inside one quoted field.
pub fn parse_products_csv(data: &str) -> Result<Vec<CsvRow>, CsvError> {
    let mut records = parse_records(data).into_iter();

    let header = records.next().ok_or(CsvError::Empty)?;
    let header_trimmed: Vec<&str> = header.iter().map(|f| f.trim()).collect();
    if header_trimmed != UPLOAD_HEADER {
        return Err(CsvError::BadHeader {
            expected: &UPLOAD_HEADER,
            found: header,
        });
    }

    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        let line = idx + 2; // 1-based, after the header
        if record.len() != UPLOAD_HEADER.len() {
            return Err(CsvError::BadShape {
                line,
                expected: UPLOAD_HEADER.len(),
                found: record.len(),
            });
        }

        let serial_field = record[0].trim();
        let serial_num = serial_field
            .parse::<i64>()
            .map_err(|_| CsvError::BadSerial {
                line,
                value: serial_field.to_string(),
            })?;

        let row = CsvRow {
            serial_num,
            product_name: record[1].trim().to_string(),
            input_urls: split_urls(&record[2]),
        };

        row.validate()
            .map_err(|report| CsvError::InvalidRow { line, report })?;

        rows.push(row);
    }

    Ok(rows)
}

/// Split a comma-separated URL list, trimming whitespace and dropping
/// empty entries. An empty column therefore yields zero images rather
/// than an error.
pub fn split_urls(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Minimal RFC-4180-style record splitter: double-quoted fields may hold
/// commas and newlines, `""` escapes a quote, blank lines are skipped.
fn parse_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => record.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    if !(record.len() == 1 && record[0].is_empty()) {
                        records.push(std::mem::take(&mut record));
                    } else {
                        record.clear();
                    }
                }
                _ => field.push(c),
            }
        }
    }

    // Trailing record without a final newline.
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        if !(record.len() == 1 && record[0].is_empty()) {
            records.push(record);
        }
    }

    records
}

/// One export row: a product with its input and output URL lists in
/// per-image creation order.
#[derive(Debug)]
pub struct ExportRow {
    pub serial_num: i64,
    pub product_name: String,
    pub input_urls: Vec<String>,
    pub output_urls: Vec<String>,
}

/// Render the export CSV, one row per product, URL lists comma-joined.
pub fn write_export(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    out.push_str(&EXPORT_HEADER.join(","));
    out.push_str("\r\n");

    for row in rows {
        let fields = [
            row.serial_num.to_string(),
            row.product_name.clone(),
            row.input_urls.join(", "),
            row.output_urls.join(", "),
        ];
        let escaped: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&escaped.join(","));
        out.push_str("\r\n");
    }

    out
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_valid_upload() {
        let data = "Serial Number,Product Name,Input Image Urls\r\n\
                    1,Alpha,\"http://x/1.png,http://x/2.png\"\r\n\
                    2,Beta,http://x/3.png\r\n";
        let rows = parse_products_csv(data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].serial_num, 1);
        assert_eq!(rows[0].product_name, "Alpha");
        assert_eq!(rows[0].input_urls.len(), 2);
        assert_eq!(rows[1].input_urls, vec!["http://x/3.png"]);
    }

    #[test]
    fn test_rejects_wrong_header() {
        let data = "Wrong,Cols\n1,2\n";
        assert!(matches!(
            parse_products_csv(data),
            Err(CsvError::BadHeader { .. })
        ));
    }

    #[test]
    fn test_rejects_ragged_row() {
        let data = "Serial Number,Product Name,Input Image Urls\n1,OnlyTwoFields\n";
        assert!(matches!(
            parse_products_csv(data),
            Err(CsvError::BadShape { line: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_non_integer_serial() {
        let data = "Serial Number,Product Name,Input Image Urls\nabc,Name,http://x/1.png\n";
        assert!(matches!(
            parse_products_csv(data),
            Err(CsvError::BadSerial { line: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_empty_product_name() {
        let data = "Serial Number,Product Name,Input Image Urls\n1,,http://x/1.png\n";
        assert!(matches!(
            parse_products_csv(data),
            Err(CsvError::InvalidRow { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_url_column_yields_zero_images() {
        let data = "Serial Number,Product Name,Input Image Urls\n1,NoImages,\n";
        let rows = parse_products_csv(data).unwrap();
        assert!(rows[0].input_urls.is_empty());
    }

    #[test]
    fn test_url_splitting_trims_and_drops_empties() {
        assert_eq!(
            split_urls("http://x/1.png, http://x/2.png,,  "),
            vec!["http://x/1.png", "http://x/2.png"]
        );
        assert!(split_urls("").is_empty());
    }

    #[test]
    fn test_quoted_field_with_escaped_quote() {
        let data = "Serial Number,Product Name,Input Image Urls\n1,\"Widget \"\"Pro\"\"\",http://x/1.png\n";
        let rows = parse_products_csv(data).unwrap();
        assert_eq!(rows[0].product_name, "Widget \"Pro\"");
    }

    #[test]
    fn test_export_quotes_url_lists() {
        let rows = vec![ExportRow {
            serial_num: 1,
            product_name: "Alpha".to_string(),
            input_urls: vec!["http://x/1.png".to_string(), "http://x/2.png".to_string()],
            output_urls: vec!["./static/a.jpg".to_string(), "./static/b.jpg".to_string()],
        }];
        let csv = write_export(&rows);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Serial Number,Product Name,Input Image Urls,Output Image Urls"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,Alpha,\"http://x/1.png, http://x/2.png\",\"./static/a.jpg, ./static/b.jpg\""
        );
    }

    #[test]
    fn test_export_round_trips_through_parser() {
        let rows = vec![ExportRow {
            serial_num: 7,
            product_name: "Gamma".to_string(),
            input_urls: vec!["http://x/7.png".to_string()],
            output_urls: vec!["./static/7.jpg".to_string()],
        }];
        let csv = write_export(&rows);
        let records = parse_records(&csv);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][0], "7");
        assert_eq!(records[1][3], "./static/7.jpg");
    }
}
