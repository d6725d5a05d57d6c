#![cfg(not(tarpaulin_include))]

use crate::dataset::TabularDataset;
use crate::summary::{ColumnSummary, SUMMARY_HEADER};
use std::error::Error;
use std::io::Write;
use std::path::Path;

/// Convert a dataset to CSV text
///
/// The header row carries the column names; missing values are written as
/// empty fields. Quoting of commas, quotes and newlines is handled by the
/// `csv` writer.
///
/// # Arguments
/// * `dataset` - Reference to the dataset to convert
///
/// # Returns
/// * `Result<String, Box<dyn Error>>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use sheetgenius::cell::CellValue;
/// use sheetgenius::dataset::TabularDataset;
/// use sheetgenius::downloader::to_csv;
///
/// let ds = TabularDataset::new(
///     vec!["city".to_string(), "pop".to_string()],
///     vec![vec![CellValue::Text("Oslo, NO".to_string()), CellValue::Number(709000.0)]],
/// );
/// assert_eq!(to_csv(&ds).unwrap(), "city,pop\n\"Oslo, NO\",709000\n");
/// ```
pub fn to_csv(dataset: &TabularDataset) -> Result<String, Box<dyn Error>> {
    let mut buffer = Vec::new();
    write_dataset(dataset, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Write a dataset to a CSV file without an index column
///
/// # Arguments
/// * `dataset` - Dataset to export
/// * `path` - Destination file, created or truncated
///
/// # Returns
/// * `Result<(), Box<dyn Error>>` - Success or an I/O / CSV error
pub fn save_csv(dataset: &TabularDataset, path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
    let file = std::fs::File::create(path)?;
    write_dataset(dataset, file)
}

/// Write the per-column summary table, one row per source column
///
/// # Arguments
/// * `summaries` - Output of [`crate::summary::describe`]
/// * `path` - Destination file, created or truncated
///
/// # Returns
/// * `Result<(), Box<dyn Error>>` - Success or an I/O / CSV error
pub fn save_summary_csv(
    summaries: &[ColumnSummary],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(SUMMARY_HEADER)?;
    for summary in summaries {
        writer.write_record(summary.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_dataset<W: Write>(dataset: &TabularDataset, out: W) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&dataset.columns)?;
    for row in &dataset.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
