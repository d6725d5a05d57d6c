use crate::dataset::TabularDataset;
use std::collections::HashMap;

/// Column order of the summary table
pub const SUMMARY_HEADER: [&str; 12] = [
    "column", "count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%", "max",
];

/// Descriptive statistics of one column
///
/// `top`/`freq` are only set for non-numeric columns, the numeric statistics
/// only for numeric ones. Statistics that are undefined for the data (the
/// standard deviation of a single value, anything over an empty column) are
/// `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: Option<usize>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    /// The summary as one row of text fields, blank where not applicable
    pub fn to_record(&self) -> Vec<String> {
        let num = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        vec![
            self.name.clone(),
            self.count.to_string(),
            self.unique.to_string(),
            self.top.clone().unwrap_or_default(),
            self.freq.map(|f| f.to_string()).unwrap_or_default(),
            num(self.mean),
            num(self.std),
            num(self.min),
            num(self.q25),
            num(self.q50),
            num(self.q75),
            num(self.max),
        ]
    }
}

/// Summarise every column of a dataset, in column order
pub fn describe(dataset: &TabularDataset) -> Vec<ColumnSummary> {
    (0..dataset.column_count())
        .map(|idx| describe_column(dataset, idx))
        .collect()
}

fn describe_column(dataset: &TabularDataset, idx: usize) -> ColumnSummary {
    let present: Vec<_> = dataset.column_values(idx).filter(|v| !v.is_empty()).collect();

    // Distinct values in first-seen order, with their counts
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for value in &present {
        let key = value.to_string();
        match positions.get(&key) {
            Some(&pos) => order[pos].1 += 1,
            None => {
                positions.insert(key.clone(), order.len());
                order.push((key, 1));
            }
        }
    }

    let mut summary = ColumnSummary {
        name: dataset.columns[idx].clone(),
        count: present.len(),
        unique: order.len(),
        top: None,
        freq: None,
        mean: None,
        std: None,
        min: None,
        q25: None,
        q50: None,
        q75: None,
        max: None,
    };

    if dataset.is_numeric_column(idx) {
        let mut values: Vec<f64> = present.iter().filter_map(|v| v.as_number()).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        if !values.is_empty() {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            summary.mean = Some(mean);
            if values.len() > 1 {
                let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
                summary.std = Some(var.sqrt());
            }
            summary.min = values.first().copied();
            summary.q25 = Some(quantile(&values, 0.25));
            summary.q50 = Some(quantile(&values, 0.5));
            summary.q75 = Some(quantile(&values, 0.75));
            summary.max = values.last().copied();
        }
    } else {
        // max_by_key keeps the last maximum; scan in reverse so ties go to the first seen
        if let Some((value, freq)) = order.iter().rev().max_by_key(|(_, count)| *count) {
            summary.top = Some(value.clone());
            summary.freq = Some(*freq);
        }
    }

    summary
}

/// Linearly interpolated quantile of sorted, non-empty data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
