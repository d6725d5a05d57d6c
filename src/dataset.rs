use crate::cell::CellValue;
use std::collections::HashMap;

/// Rows of named columns parsed from one upload
///
/// Every row holds exactly one value per column; short source rows are padded
/// with [`CellValue::Empty`] when the table is built.
#[derive(Clone, Debug, PartialEq)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularDataset {
    /// Build a dataset from raw header names and rows
    ///
    /// Header names are normalised: a blank name at position `i` becomes
    /// `Unnamed: i` and a repeated name gets a `.n` suffix. Rows are padded
    /// or truncated to the header width.
    pub fn new(raw_headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let columns = normalize_headers(raw_headers);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        TabularDataset { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over the values of one column
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// A column is numeric when every non-empty value in it is a number
    pub fn is_numeric_column(&self, index: usize) -> bool {
        self.column_values(index)
            .all(|v| v.is_empty() || matches!(v, CellValue::Number(_)))
    }

    /// Indices of numeric columns, in column order
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.column_count())
            .filter(|&i| self.is_numeric_column(i))
            .collect()
    }

    /// Copy of the dataset with `values` stored in column `name`
    ///
    /// An existing column of that name is overwritten in place; otherwise the
    /// column is appended at the end.
    pub fn with_column(&self, name: &str, values: Vec<CellValue>) -> TabularDataset {
        let mut out = self.clone();
        match out.column_index(name) {
            Some(idx) => {
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                out.columns.push(name.to_string());
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        out
    }
}

fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(raw.len());

    for (i, name) in raw.into_iter().enumerate() {
        let name = name.trim().to_string();
        let base = if name.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name
        };

        let mut candidate = base.clone();
        while let Some(count) = seen.get_mut(&base) {
            *count += 1;
            candidate = format!("{}.{}", base, count);
            if !seen.contains_key(&candidate) {
                break;
            }
        }
        seen.entry(base).or_insert(0);
        seen.entry(candidate.clone()).or_insert(0);
        columns.push(candidate);
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_blank_and_duplicate_headers() {
        let ds = TabularDataset::new(headers(&["a", "", "a", "b", "a"]), vec![]);
        assert_eq!(ds.columns, vec!["a", "Unnamed: 1", "a.1", "b", "a.2"]);
    }

    #[test]
    fn pads_short_rows() {
        let ds = TabularDataset::new(
            headers(&["x", "y", "z"]),
            vec![vec![CellValue::Number(1.0)]],
        );
        assert_eq!(
            ds.rows[0],
            vec![CellValue::Number(1.0), CellValue::Empty, CellValue::Empty]
        );
    }

    #[test]
    fn detects_numeric_columns() {
        let ds = TabularDataset::new(
            headers(&["n", "t", "blank"]),
            vec![
                vec![CellValue::Number(1.0), CellValue::Text("a".into()), CellValue::Empty],
                vec![CellValue::Empty, CellValue::Number(2.0), CellValue::Empty],
            ],
        );
        assert_eq!(ds.numeric_columns(), vec![0, 2]);
    }

    #[test]
    fn with_column_replaces_existing_column() {
        let ds = TabularDataset::new(
            headers(&["x", "Cluster"]),
            vec![vec![CellValue::Number(1.0), CellValue::Text("old".into())]],
        );
        let out = ds.with_column("Cluster", vec![CellValue::Number(2.0)]);
        assert_eq!(out.columns, vec!["x", "Cluster"]);
        assert_eq!(out.rows[0][1], CellValue::Number(2.0));

        let appended = ds.with_column("Label", vec![CellValue::Number(0.0)]);
        assert_eq!(appended.columns.len(), 3);
    }
}
