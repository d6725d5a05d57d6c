//! End-to-end processing of one submission.
//!
//! A submission moves through
//! `Received → Validating → {Rejected | Validated} → Processing → Packaged →
//! {Emailed | EmailSkipped}`. Rejected uploads never touch the filesystem;
//! accepted ones are worked on inside a private temporary directory that is
//! removed when processing ends, whatever the outcome.

use crate::audit::AuditNotifier;
use crate::config::AppConfig;
use crate::errors::PipelineError;
use crate::loader;
use crate::mailer::Mailer;
use crate::packager::{DeliveryPackager, DeliveryStatus};
use crate::report::{Degradation, ReportGenerator};
use crate::validator::{UploadCandidate, UploadValidator, ValidationVerdict};
use log::{debug, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Received,
    Validating,
    Rejected,
    Validated,
    Processing,
    Packaged,
    Emailed,
    /// Packaged but not emailed; the archive is only available for download
    EmailSkipped,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Rejected | RequestState::Emailed | RequestState::EmailSkipped
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Received => "received",
            RequestState::Validating => "validating",
            RequestState::Rejected => "rejected",
            RequestState::Validated => "validated",
            RequestState::Processing => "processing",
            RequestState::Packaged => "packaged",
            RequestState::Emailed => "emailed",
            RequestState::EmailSkipped => "email-skipped",
        };
        write!(f, "{}", name)
    }
}

/// Name prefix of the per-request working directories
pub const WORKDIR_PREFIX: &str = "sheetgenius-";

/// Everything the caller needs after the working directory is gone
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub verdict: ValidationVerdict,
    pub rows: usize,
    pub columns: usize,
    /// Names of the files inside the archive
    pub artifacts: Vec<String>,
    pub degraded: Vec<Degradation>,
    pub archive_name: String,
    pub archive_bytes: Vec<u8>,
    pub delivery: DeliveryStatus,
    /// Message for the user when the report was not emailed
    pub warning: Option<String>,
    /// States visited, ending in a terminal one
    pub trail: Vec<RequestState>,
}

impl SubmissionOutcome {
    pub fn state(&self) -> RequestState {
        self.trail.last().copied().unwrap_or(RequestState::Received)
    }

    /// Write the archive into `dir` under its own name
    pub fn save_archive(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = dir.as_ref().join(&self.archive_name);
        fs::write(&path, &self.archive_bytes)?;
        Ok(path)
    }
}

/// Validator, report generator, packager and audit channel wired to one config
pub struct SubmissionPipeline {
    config: Arc<AppConfig>,
    validator: UploadValidator,
    reports: ReportGenerator,
    packager: DeliveryPackager,
    audit: AuditNotifier,
    /// Parent of the per-request working directories; the system temp dir when unset
    workdir_root: Option<PathBuf>,
}

impl SubmissionPipeline {
    /// Assemble a pipeline around an explicit mailer (or none)
    pub fn new(config: Arc<AppConfig>, mailer: Option<Arc<Mailer>>) -> Result<Self, regex::Error> {
        Ok(SubmissionPipeline {
            validator: UploadValidator::new(&config)?,
            reports: ReportGenerator::default(),
            packager: DeliveryPackager::new(mailer.clone()),
            audit: AuditNotifier::new(mailer),
            workdir_root: None,
            config,
        })
    }

    /// Create per-request working directories under `root` instead of the
    /// system temp dir
    pub fn with_workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workdir_root = Some(root.into());
        self
    }

    /// Assemble a pipeline whose mailer comes from the configured credentials
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, Box<dyn Error>> {
        let mailer = match &config.mail {
            Some(settings) => Some(Arc::new(Mailer::new(settings)?)),
            None => None,
        };
        Ok(Self::new(config, mailer)?)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Validate, analyse, package and deliver one upload
    ///
    /// # Arguments
    /// * `candidate` - The upload; its stream is always read from the start,
    ///   the same bytes the validator checked
    /// * `recipient` - Customer email address for the report
    ///
    /// # Returns
    /// * `Result<SubmissionOutcome, PipelineError>` - The packaged report, or
    ///   the reason processing stopped
    pub fn process_submission<R: Read + Seek>(
        &self,
        candidate: &mut UploadCandidate<R>,
        recipient: &str,
    ) -> Result<SubmissionOutcome, PipelineError> {
        let recipient = recipient.trim();
        if recipient.is_empty() || candidate.filename.trim().is_empty() {
            return Err(PipelineError::MissingInput);
        }

        let mut trail = vec![RequestState::Received];
        advance(&mut trail, RequestState::Validating, &candidate.filename);

        let verdict = self.validator.validate(candidate);
        if !verdict.accepted {
            advance(&mut trail, RequestState::Rejected, &candidate.filename);
            let audit_error = self.audit.notify_blocked(
                &verdict.reason,
                &candidate.filename,
                candidate.declared_size,
            );
            if let Some(e) = &audit_error {
                warn!("{}: blocked without operator alert: {}", candidate.filename, e);
            }
            return Err(PipelineError::ValidationRejected {
                reason: verdict.reason,
                audit_error,
            });
        }
        advance(&mut trail, RequestState::Validated, &candidate.filename);

        let workdir = self.workdir()?;
        let upload_path = workdir.path().join(sanitize_filename(&candidate.filename));
        {
            let mut file = File::create(&upload_path)?;
            candidate.stream.seek(SeekFrom::Start(0))?;
            io::copy(&mut candidate.stream, &mut file)?;
        }

        advance(&mut trail, RequestState::Processing, &candidate.filename);
        let dataset = loader::load_dataset(&upload_path, &self.config.limits)?;
        let report = self.reports.generate(&dataset, workdir.path())?;

        let delivery = self.packager.package_and_deliver(&report.artifacts, recipient)?;
        advance(&mut trail, RequestState::Packaged, &candidate.filename);

        let archive_bytes = fs::read(&delivery.archive_path)?;
        let archive_name = delivery
            .archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let last = if delivery.ok {
            RequestState::Emailed
        } else {
            RequestState::EmailSkipped
        };
        advance(&mut trail, last, &candidate.filename);

        info!(
            "processed {} ({} rows, {} cols) into {}",
            candidate.filename,
            dataset.row_count(),
            dataset.column_count(),
            archive_name
        );

        Ok(SubmissionOutcome {
            verdict,
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            artifacts: report.artifacts.file_names(),
            degraded: report.degraded,
            archive_name,
            archive_bytes,
            warning: delivery.warning(),
            delivery: delivery.status,
            trail,
        })
    }

    fn workdir(&self) -> io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);
        match &self.workdir_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

fn advance(trail: &mut Vec<RequestState>, next: RequestState, filename: &str) {
    debug!("{}: {}", filename, next);
    trail.push(next);
}

/// Reduce a client-supplied file name to a safe basename
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`. The extension is kept so the loader can pick a parser.
///
/// # Examples
/// ```
/// use sheetgenius::pipeline::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/data set.csv"), "data_set.csv");
/// assert_eq!(sanitize_filename("C:\\Users\\me\\book.xlsx"), "book.xlsx");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !cleaned.contains(|c: char| c.is_ascii_alphanumeric()) {
        format!("upload{}", loader::extension_of(name))
    } else if cleaned.starts_with('.') {
        format!("upload{}", cleaned)
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_extension_of_odd_names() {
        assert_eq!(sanitize_filename("..csv"), "upload..csv");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename("/tmp/"), "upload");
        assert_eq!(sanitize_filename("résumé.xls"), "r_sum_.xls");
    }

    #[test]
    fn terminal_states() {
        assert!(RequestState::Rejected.is_terminal());
        assert!(RequestState::EmailSkipped.is_terminal());
        assert!(!RequestState::Packaged.is_terminal());
    }
}
