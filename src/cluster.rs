//! K-Means grouping of two numeric columns

use crate::cell::CellValue;
use crate::dataset::TabularDataset;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;

/// Fixed parameters of the report's clustering step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterSettings {
    pub n_clusters: usize,
    pub seed: u64,
    pub max_iters: u64,
    pub tolerance: f64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            seed: 42,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// Two dataset columns as an `(n_rows, 2)` feature matrix
///
/// Missing or non-numeric cells are read as zero.
pub fn feature_matrix(dataset: &TabularDataset, x: usize, y: usize) -> Array2<f64> {
    let n = dataset.row_count();
    let mut features = Array2::zeros((n, 2));
    for (i, row) in dataset.rows.iter().enumerate() {
        features[[i, 0]] = row[x].as_number().unwrap_or(0.0);
        features[[i, 1]] = row[y].as_number().unwrap_or(0.0);
    }
    features
}

/// Fit K-Means on a feature matrix and return one label per row
///
/// # Arguments
/// * `features` - Observations, one per row
/// * `settings` - Cluster count, seed and convergence parameters
///
/// # Returns
/// * Cluster index for each row, or an error when there are fewer rows than
///   clusters, a value is not finite, or the fit fails
pub fn fit_labels(
    features: &Array2<f64>,
    settings: &ClusterSettings,
) -> Result<Vec<usize>, Box<dyn Error>> {
    let n_samples = features.nrows();
    if n_samples < settings.n_clusters {
        return Err(format!(
            "Number of data points ({}) must be at least equal to number of clusters ({})",
            n_samples, settings.n_clusters
        )
        .into());
    }

    let scaled = unit_scaled(features)?;
    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(scaled.clone(), targets);

    let rng = StdRng::seed_from_u64(settings.seed);
    let model = KMeans::params_with(settings.n_clusters, rng, L2Dist)
        .max_n_iterations(settings.max_iters)
        .tolerance(settings.tolerance)
        .fit(&dataset)?;

    let labels: Array1<usize> = model.predict(&scaled);
    Ok(labels.to_vec())
}

/// Shift and shrink all features by one common amount so they lie in `[0, 1]`
///
/// Both axes share the factor, so distances keep their proportions and the
/// labels match a fit on the raw values. Squared distances stay far from
/// overflow whatever the input magnitude.
fn unit_scaled(features: &Array2<f64>) -> Result<Array2<f64>, Box<dyn Error>> {
    if features.iter().any(|v| !v.is_finite()) {
        return Err("clustering needs finite values".into());
    }
    let (min, max) = features
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let half_width = max / 2.0 - min / 2.0;
    if half_width <= 0.0 {
        return Ok(Array2::zeros(features.raw_dim()));
    }
    Ok(features.mapv(|v| (v / 2.0 - min / 2.0) / half_width))
}

/// Copy of the dataset with a `Cluster` column holding each row's label
pub fn cluster_dataset(
    dataset: &TabularDataset,
    x: usize,
    y: usize,
    settings: &ClusterSettings,
) -> Result<TabularDataset, Box<dyn Error>> {
    let features = feature_matrix(dataset, x, y);
    let labels = fit_labels(&features, settings)?;
    let values = labels
        .into_iter()
        .map(|label| CellValue::Number(label as f64))
        .collect();
    Ok(dataset.with_column("Cluster", values))
}
