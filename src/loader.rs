#![cfg(not(tarpaulin_include))]

use crate::cell::CellValue;
use crate::config::Limits;
use crate::dataset::TabularDataset;
use crate::errors::PipelineError;
use calamine::{Data, Range, Reader, Xls, Xlsx};
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Header and leading rows of an upload, every cell kept as its source text
///
/// This is what the validator inspects: no type inference is applied, so a
/// field such as `+5` is seen exactly as a spreadsheet application would see it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Non-empty cell values, as scanned for suspicious content
    pub fn present_values(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Lower-cased extension of a file name, including the leading dot
///
/// Returns an empty string when the name has no dot.
///
/// # Examples
/// ```
/// use sheetgenius::loader::extension_of;
///
/// assert_eq!(extension_of("Report.XLSX"), ".xlsx");
/// assert_eq!(extension_of("archive.tar.gz"), ".gz");
/// assert_eq!(extension_of("README"), "");
/// ```
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext.to_lowercase()),
        None => String::new(),
    }
}

/// Parse the header and at most `max_rows` data rows of an upload
///
/// Reads from the stream's current position. CSV lines carrying more fields
/// than the header are skipped; any other parse problem is an error.
///
/// # Arguments
/// * `stream` - Readable, seekable upload content
/// * `extension` - Lower-cased extension as returned by [`extension_of`]
/// * `max_rows` - Number of data rows to read after the header
///
/// # Returns
/// * `Result<RawTable, Box<dyn Error>>` - The sampled table or a parse error
pub fn read_sample<R: Read + Seek>(
    stream: &mut R,
    extension: &str,
    max_rows: usize,
) -> Result<RawTable, Box<dyn Error>> {
    let (headers, rows, _) = match extension {
        ".csv" => read_csv(stream, max_rows, true, |field| field.to_string())?,
        ".xlsx" => {
            let mut workbook: Xlsx<_> = Xlsx::new(stream)?;
            let range = first_sheet(&mut workbook)?;
            read_range(&range, max_rows, data_text)?
        }
        ".xls" => {
            let mut workbook: Xls<_> = Xls::new(stream)?;
            let range = first_sheet(&mut workbook)?;
            read_range(&range, max_rows, data_text)?
        }
        other => return Err(format!("Unsupported file extension: {}", other).into()),
    };

    Ok(RawTable { headers, rows })
}

/// Load a saved upload into a dataset, enforcing the row and column caps
///
/// # Arguments
/// * `filepath` - Path to the saved `.csv`, `.xlsx` or `.xls` file
/// * `limits` - Row and column caps; exceeding either is a size error
///
/// # Returns
/// * `Result<TabularDataset, PipelineError>` - The dataset, a `ParseFailure`
///   or a `SizeExceeded` error
///
/// # Examples
/// ```no_run
/// use sheetgenius::config::Limits;
/// use sheetgenius::loader::load_dataset;
///
/// match load_dataset("data.csv", &Limits::default()) {
///     Ok(ds) => println!("Loaded {} rows", ds.row_count()),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub fn load_dataset(
    filepath: impl AsRef<Path>,
    limits: &Limits,
) -> Result<TabularDataset, PipelineError> {
    let (headers, rows, total_rows) = parse_file(filepath.as_ref(), limits.max_rows)
        .map_err(|e| PipelineError::ParseFailure(e.to_string()))?;

    if total_rows > limits.max_rows || headers.len() > limits.max_cols {
        return Err(PipelineError::SizeExceeded {
            rows: total_rows,
            cols: headers.len(),
            max_rows: limits.max_rows,
            max_cols: limits.max_cols,
        });
    }

    Ok(TabularDataset::new(headers, rows))
}

type Parsed<T> = (Vec<String>, Vec<Vec<T>>, usize);

fn parse_file(path: &Path, max_rows: usize) -> Result<Parsed<CellValue>, Box<dyn Error>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    match extension_of(name).as_str() {
        ".csv" => {
            let file = File::open(path)?;
            read_csv(BufReader::new(file), max_rows, false, CellValue::infer)
        }
        ".xlsx" | ".xls" => {
            let mut workbook = calamine::open_workbook_auto(path)?;
            let range = first_sheet(&mut workbook)?;
            read_range(&range, max_rows, excel_value)
        }
        other => Err(format!("Unsupported file extension: {}", other).into()),
    }
}

// Rows past `max_rows` are counted but not kept.
fn read_csv<R: Read, T>(
    reader: R,
    max_rows: usize,
    skip_bad_lines: bool,
    map: impl Fn(&str) -> T,
) -> Result<Parsed<T>, Box<dyn Error>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Err("No columns to parse from file".into());
    }

    let mut rows = Vec::new();
    let mut total = 0usize;
    let mut record = csv::StringRecord::new();

    while csv_reader.read_record(&mut record)? {
        if record.len() > headers.len() {
            if skip_bad_lines {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(format!(
                "Expected {} fields in line {}, saw {}",
                headers.len(),
                line,
                record.len()
            )
            .into());
        }

        total += 1;
        if rows.len() < max_rows {
            rows.push(record.iter().map(&map).collect());
        } else if skip_bad_lines {
            break;
        }
    }

    Ok((headers, rows, total))
}

fn first_sheet<RS, W>(workbook: &mut W) -> Result<Range<Data>, Box<dyn Error>>
where
    RS: Read + Seek,
    W: Reader<RS>,
    W::Error: Error + 'static,
{
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(range?),
        None => Err("No sheets found in Excel file".into()),
    }
}

fn read_range<T>(
    range: &Range<Data>,
    max_rows: usize,
    map: impl Fn(&Data) -> T,
) -> Result<Parsed<T>, Box<dyn Error>> {
    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header) => header.iter().map(data_text).collect(),
        None => return Err("Excel sheet is empty".into()),
    };

    let mut rows = Vec::new();
    let mut total = 0usize;
    for row in rows_iter {
        total += 1;
        if rows.len() < max_rows {
            rows.push(row.iter().map(&map).collect());
        }
    }

    Ok((headers, rows, total))
}

fn data_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn excel_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn sample_skips_lines_with_extra_fields() {
        let mut data = Cursor::new(b"a,b\n1,2\n3,4,5\n6\n".to_vec());
        let sample = read_sample(&mut data, ".csv", 500).unwrap();
        assert_eq!(sample.headers, vec!["a", "b"]);
        assert_eq!(sample.rows, vec![vec!["1", "2"], vec!["6"]]);
    }

    #[test]
    fn sample_stops_at_row_limit() {
        let mut body = String::from("n\n");
        for i in 0..20 {
            body.push_str(&format!("{}\n", i));
        }
        let mut data = Cursor::new(body.into_bytes());
        let sample = read_sample(&mut data, ".csv", 5).unwrap();
        assert_eq!(sample.rows.len(), 5);
    }

    #[test]
    fn sample_rejects_invalid_utf8_and_empty_input() {
        let mut data = Cursor::new(vec![b'a', b'\n', 0xff, 0xfe, b'\n']);
        assert!(read_sample(&mut data, ".csv", 500).is_err());

        let mut empty = Cursor::new(Vec::new());
        assert!(read_sample(&mut empty, ".csv", 500).is_err());
    }

    #[test]
    fn present_values_skip_blanks() {
        let table = RawTable {
            headers: vec!["a".into(), "b".into()],
            rows: vec![vec!["x".into(), "".into()], vec![" ".into(), "=1".into()]],
        };
        assert_eq!(table.present_values().collect::<Vec<_>>(), vec!["x", "=1"]);
    }
}
