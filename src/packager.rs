//! Report packaging and delivery.
//!
//! The archive is always written, so the customer can download it whatever
//! happens to the email.

use crate::errors::PipelineError;
use crate::mailer::Mailer;
use crate::report::ReportArtifactSet;
use chrono::Utc;
use log::{info, warn};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// How the report reached (or failed to reach) the customer's inbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Emailed,
    /// Mail is not configured; the download is the only delivery
    Skipped(String),
    /// The transport rejected or could not send the message
    Failed(String),
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Emailed => "emailed",
            DeliveryStatus::Skipped(_) => "skipped",
            DeliveryStatus::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// True when the email was sent
    pub ok: bool,
    pub archive_path: PathBuf,
    pub status: DeliveryStatus,
}

impl DeliveryResult {
    /// User-facing warning for a report that was not emailed
    pub fn warning(&self) -> Option<String> {
        match &self.status {
            DeliveryStatus::Emailed => None,
            DeliveryStatus::Skipped(_) => Some(
                "Email secrets not set; skipping email. (You can still download the ZIP.)"
                    .to_string(),
            ),
            DeliveryStatus::Failed(reason) => Some(format!(
                "Email not sent ({}). Use the download instead.",
                reason
            )),
        }
    }
}

#[derive(Clone)]
pub struct DeliveryPackager {
    mailer: Option<Arc<Mailer>>,
}

impl DeliveryPackager {
    pub fn new(mailer: Option<Arc<Mailer>>) -> Self {
        DeliveryPackager { mailer }
    }

    /// Zip the artifacts next to them and email the archive to `recipient`
    ///
    /// # Arguments
    /// * `artifacts` - Files produced by the report generator
    /// * `recipient` - Customer email address
    ///
    /// # Returns
    /// * `Result<DeliveryResult, PipelineError>` - Only a failure to build the
    ///   archive is an error; email problems are reported in the status
    pub fn package_and_deliver(
        &self,
        artifacts: &ReportArtifactSet,
        recipient: &str,
    ) -> Result<DeliveryResult, PipelineError> {
        let dir = artifacts
            .files
            .first()
            .and_then(|p| p.parent())
            .ok_or_else(|| PipelineError::Packaging("no report files to package".to_string()))?;

        let archive_path = build_archive(artifacts, dir)?;
        info!("packaged {} file(s) into {}", artifacts.len(), archive_path.display());

        let status = match &self.mailer {
            None => {
                warn!("mail credentials not configured; report available by download only");
                DeliveryStatus::Skipped("mail credentials not configured".to_string())
            }
            Some(mailer) => match mailer.send_report(recipient, &archive_path) {
                Ok(()) => {
                    info!("report emailed to {}", recipient);
                    DeliveryStatus::Emailed
                }
                Err(e) => {
                    warn!("report email to {} failed: {}", recipient, e);
                    DeliveryStatus::Failed(e.to_string())
                }
            },
        };

        Ok(DeliveryResult {
            ok: status == DeliveryStatus::Emailed,
            archive_path,
            status,
        })
    }
}

/// Archive file name for a report packaged now
pub fn archive_name() -> String {
    format!("sheetgenius_report_{}.zip", Utc::now().format("%Y%m%d-%H%M%S"))
}

/// Write every artifact into a deflated ZIP in `dir`, stored under its file name
pub fn build_archive(artifacts: &ReportArtifactSet, dir: &Path) -> Result<PathBuf, PipelineError> {
    let archive_path = dir.join(archive_name());
    write_zip(artifacts, &archive_path)
        .map_err(|e| PipelineError::Packaging(e.to_string()))?;
    Ok(archive_path)
}

fn write_zip(artifacts: &ReportArtifactSet, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in &artifacts.files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or("artifact path has no file name")?;
        zip.start_file(name, options)?;
        let mut source = File::open(file)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}
