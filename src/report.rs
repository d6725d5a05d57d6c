//! Report generation.
//!
//! Turns a loaded dataset into the files delivered to the customer: the
//! summary table always, and a scatter plot plus a clustered copy of the data
//! when the dataset has at least two numeric columns. Plot and clustering are
//! best-effort; their failures are recorded in the outcome instead of failing
//! the report.

use crate::cluster::{self, ClusterSettings};
use crate::dataset::TabularDataset;
use crate::downloader;
use crate::errors::PipelineError;
use crate::graph::{self, GraphOptions};
use crate::summary;
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "summary.csv";
pub const SCATTER_FILE: &str = "scatterplot.png";
pub const CLUSTERED_FILE: &str = "clustered.csv";

/// Generated files of one report, in generation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportArtifactSet {
    pub files: Vec<PathBuf>,
}

impl ReportArtifactSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File names of the artifacts, without directories
    pub fn file_names(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// Optional report steps that may fail without failing the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStep {
    Plot,
    Cluster,
}

impl fmt::Display for ReportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStep::Plot => write!(f, "scatter plot"),
            ReportStep::Cluster => write!(f, "clustering"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    pub step: ReportStep,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    pub artifacts: ReportArtifactSet,
    /// Best-effort steps that were attempted and failed
    pub degraded: Vec<Degradation>,
}

impl ReportOutcome {
    pub fn is_degraded(&self, step: ReportStep) -> bool {
        self.degraded.iter().any(|d| d.step == step)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportGenerator {
    graph: GraphOptions,
    clusters: ClusterSettings,
}

impl ReportGenerator {
    pub fn new(graph: GraphOptions, clusters: ClusterSettings) -> Self {
        ReportGenerator { graph, clusters }
    }

    /// Write the report files for `dataset` into `workdir`
    ///
    /// # Arguments
    /// * `dataset` - The validated, fully loaded upload
    /// * `workdir` - Existing directory that receives the files
    ///
    /// # Returns
    /// * `Result<ReportOutcome, PipelineError>` - Artifacts and degradations;
    ///   only a failure to write the summary table is an error
    pub fn generate(
        &self,
        dataset: &TabularDataset,
        workdir: &Path,
    ) -> Result<ReportOutcome, PipelineError> {
        let mut outcome = ReportOutcome::default();

        let summary_path = workdir.join(SUMMARY_FILE);
        downloader::save_summary_csv(&summary::describe(dataset), &summary_path)
            .map_err(|e| PipelineError::Report(e.to_string()))?;
        outcome.artifacts.files.push(summary_path);

        let numeric = dataset.numeric_columns();
        if numeric.len() < 2 {
            info!(
                "{} numeric column(s); skipping scatter plot and clustering",
                numeric.len()
            );
            return Ok(outcome);
        }
        let (x, y) = (numeric[0], numeric[1]);

        let plot_path = workdir.join(SCATTER_FILE);
        match self.plot(dataset, x, y, &plot_path) {
            Ok(()) => outcome.artifacts.files.push(plot_path),
            Err(reason) => {
                warn!("scatter plot skipped: {}", reason);
                outcome.degraded.push(Degradation {
                    step: ReportStep::Plot,
                    reason,
                });
            }
        }

        let clustered_path = workdir.join(CLUSTERED_FILE);
        let clustered = cluster::cluster_dataset(dataset, x, y, &self.clusters)
            .and_then(|ds| downloader::save_csv(&ds, &clustered_path));
        match clustered {
            Ok(()) => outcome.artifacts.files.push(clustered_path),
            Err(e) => {
                warn!("clustering skipped: {}", e);
                outcome.degraded.push(Degradation {
                    step: ReportStep::Cluster,
                    reason: e.to_string(),
                });
            }
        }

        Ok(outcome)
    }

    fn plot(&self, dataset: &TabularDataset, x: usize, y: usize, path: &Path) -> Result<(), String> {
        let points: Vec<(f64, f64)> = dataset
            .rows
            .iter()
            .filter_map(|row| Some((row[x].as_number()?, row[y].as_number()?)))
            .collect();

        let options = GraphOptions {
            x_label: dataset.columns[x].clone(),
            y_label: dataset.columns[y].clone(),
            ..self.graph.clone()
        };
        graph::save_scatter_graph(&points, &options, path).map_err(|e| e.to_string())
    }
}
