//! Upload validation.
//!
//! Every upload passes through [`UploadValidator::validate`] before any full
//! parse. The checks run in a fixed order and stop at the first failure:
//! declared size, extension, container signature, content fingerprint,
//! sample parse, column count, suspicious-content density.

use crate::config::{ALLOWED_EXTENSIONS, AppConfig, Limits, MACRO_EXTENSIONS, ScanSettings};
use crate::loader::{self, RawTable};
use log::{info, warn};
use regex::RegexSet;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// ZIP local file header, the container of `.xlsx`
const XLSX_MAGIC: &[u8] = b"PK";
/// OLE2 compound document header, the container of legacy `.xls`
const XLS_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// An upload waiting to be validated
///
/// The stream is reused for the full parse afterwards, so validation always
/// hands it back at the position it was received at.
#[derive(Debug)]
pub struct UploadCandidate<R> {
    pub filename: String,
    /// Size reported by the client; checked before any byte is read
    pub declared_size: u64,
    pub stream: R,
}

impl UploadCandidate<Cursor<Vec<u8>>> {
    /// Wrap an in-memory upload, declaring its actual length
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadCandidate {
            filename: filename.into(),
            declared_size: bytes.len() as u64,
            stream: Cursor::new(bytes),
        }
    }
}

/// Outcome of validating one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    /// Human-readable explanation, shown to the user on rejection
    pub reason: String,
    /// SHA-256 of the upload in hex, for audit logs only.
    /// Absent when the upload was rejected before it was hashed.
    pub fingerprint: Option<String>,
}

impl ValidationVerdict {
    fn accept(fingerprint: String) -> Self {
        ValidationVerdict {
            accepted: true,
            reason: format!("OK (hash: {}…)", &fingerprint[..12]),
            fingerprint: Some(fingerprint),
        }
    }

    fn reject(reason: impl Into<String>, fingerprint: Option<String>) -> Self {
        ValidationVerdict {
            accepted: false,
            reason: reason.into(),
            fingerprint,
        }
    }
}

/// Weighted suspicious-cell counts over a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanReport {
    pub weighted_hits: u64,
    pub cells: u64,
}

impl ScanReport {
    pub fn density(&self) -> f64 {
        if self.cells == 0 {
            0.0
        } else {
            self.weighted_hits as f64 / self.cells as f64
        }
    }
}

/// Density heuristic for formula-injection content
///
/// A cell scores the trigger weight when it starts with a formula trigger,
/// plus the substring weight for every dangerous substring it contains.
/// This is probabilistic: negative numbers count as triggers, and a payload
/// diluted among enough clean cells passes.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    triggers: Vec<String>,
    substrings: RegexSet,
    trigger_weight: u32,
    substring_weight: u32,
    threshold: f64,
}

impl ContentScanner {
    pub fn new(settings: &ScanSettings) -> Result<Self, regex::Error> {
        let patterns = settings
            .dangerous_substrings
            .iter()
            .map(|s| format!("(?i){}", regex::escape(s)));

        Ok(ContentScanner {
            triggers: settings.formula_triggers.clone(),
            substrings: RegexSet::new(patterns)?,
            trigger_weight: settings.trigger_weight,
            substring_weight: settings.substring_weight,
            threshold: settings.density_threshold,
        })
    }

    /// Weight contributed by one cell value
    pub fn cell_weight(&self, value: &str) -> u32 {
        let value = value.trim();
        let mut weight = 0;
        if self.triggers.iter().any(|t| value.starts_with(t.as_str())) {
            weight += self.trigger_weight;
        }
        weight += self.substrings.matches(value).iter().count() as u32 * self.substring_weight;
        weight
    }

    pub fn scan<'a>(&self, values: impl Iterator<Item = &'a str>) -> ScanReport {
        values.fold(ScanReport::default(), |mut report, value| {
            report.cells += 1;
            report.weighted_hits += self.cell_weight(value) as u64;
            report
        })
    }

    pub fn is_suspicious(&self, report: &ScanReport) -> bool {
        report.cells > 0 && report.density() > self.threshold
    }
}

pub struct UploadValidator {
    limits: Limits,
    scanner: ContentScanner,
}

impl UploadValidator {
    pub fn new(config: &AppConfig) -> Result<Self, regex::Error> {
        Ok(UploadValidator {
            limits: config.limits,
            scanner: ContentScanner::new(&config.scan)?,
        })
    }

    /// Decide whether an upload may be processed
    ///
    /// Never fails: I/O problems while inspecting the stream reject the
    /// upload. The stream position is restored before returning.
    ///
    /// # Arguments
    /// * `candidate` - The upload; its stream is read and then rewound
    ///
    /// # Returns
    /// * `ValidationVerdict` - Accept/reject flag, reason and fingerprint
    pub fn validate<R: Read + Seek>(&self, candidate: &mut UploadCandidate<R>) -> ValidationVerdict {
        let start = match candidate.stream.stream_position() {
            Ok(pos) => pos,
            Err(e) => {
                return ValidationVerdict::reject(format!("Could not read upload: {}", e), None);
            }
        };

        let verdict = self.run_checks(
            &candidate.filename,
            candidate.declared_size,
            &mut candidate.stream,
        );

        if let Err(e) = candidate.stream.seek(SeekFrom::Start(start)) {
            warn!("could not rewind upload {}: {}", candidate.filename, e);
        }

        if verdict.accepted {
            info!(
                "accepted upload {} ({} bytes, sha256 {})",
                candidate.filename,
                candidate.declared_size,
                verdict.fingerprint.as_deref().unwrap_or("-")
            );
        } else {
            warn!(
                "rejected upload {} ({} bytes, sha256 {}): {}",
                candidate.filename,
                candidate.declared_size,
                verdict.fingerprint.as_deref().unwrap_or("-"),
                verdict.reason
            );
        }
        verdict
    }

    fn run_checks<R: Read + Seek>(
        &self,
        filename: &str,
        declared_size: u64,
        stream: &mut R,
    ) -> ValidationVerdict {
        if declared_size > self.limits.max_upload_bytes {
            return ValidationVerdict::reject(
                format!(
                    "File too large ({}). Max is {} MB.",
                    human_size(declared_size),
                    self.limits.max_upload_mb()
                ),
                None,
            );
        }

        let ext = loader::extension_of(filename);
        if MACRO_EXTENSIONS.contains(&ext.as_str()) {
            return ValidationVerdict::reject(
                format!("Macro-enabled Excel ({}) is not allowed.", ext),
                None,
            );
        }
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            let mut allowed = ALLOWED_EXTENSIONS.to_vec();
            allowed.sort();
            return ValidationVerdict::reject(
                format!(
                    "Unsupported file type '{}'. Allowed: {}.",
                    ext,
                    allowed.join(", ")
                ),
                None,
            );
        }

        let head = match read_head(stream, 4) {
            Ok(head) => head,
            Err(e) => {
                return ValidationVerdict::reject(format!("Could not read upload: {}", e), None);
            }
        };
        match ext.as_str() {
            ".xlsx" if !head.starts_with(XLSX_MAGIC) => {
                return ValidationVerdict::reject(
                    "XLSX did not look like a valid Excel (ZIP) file.",
                    None,
                );
            }
            ".xls" if !head.starts_with(XLS_MAGIC) => {
                return ValidationVerdict::reject(
                    "XLS did not look like a valid Excel (OLE2) file.",
                    None,
                );
            }
            _ => {}
        }

        let fingerprint = match fingerprint(stream) {
            Ok(hash) => hash,
            Err(e) => {
                return ValidationVerdict::reject(format!("Could not read upload: {}", e), None);
            }
        };

        let sample = match sample_from_start(stream, &ext, self.limits.sample_rows) {
            Ok(sample) => sample,
            Err(e) => {
                return ValidationVerdict::reject(
                    format!("Could not parse sample of file: {}", e),
                    Some(fingerprint),
                );
            }
        };

        if sample.column_count() > self.limits.max_cols {
            return ValidationVerdict::reject(
                format!(
                    "Too many columns ({}). Max allowed: {}.",
                    sample.column_count(),
                    self.limits.max_cols
                ),
                Some(fingerprint),
            );
        }

        let report = self.scanner.scan(sample.present_values());
        if self.scanner.is_suspicious(&report) {
            warn!(
                "suspicious density {:.3} ({} weighted hits over {} cells) in {}",
                report.density(),
                report.weighted_hits,
                report.cells,
                filename
            );
            return ValidationVerdict::reject(
                "File flagged for suspicious formula/content density.",
                Some(fingerprint),
            );
        }

        ValidationVerdict::accept(fingerprint)
    }
}

/// Format a byte count as megabytes with two decimals
pub fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

fn read_head<R: Read + Seek>(stream: &mut R, len: u64) -> io::Result<Vec<u8>> {
    stream.seek(SeekFrom::Start(0))?;
    let mut head = Vec::with_capacity(len as usize);
    stream.by_ref().take(len).read_to_end(&mut head)?;
    Ok(head)
}

/// SHA-256 of the whole stream, from its first byte
fn fingerprint<R: Read + Seek>(stream: &mut R) -> io::Result<String> {
    stream.seek(SeekFrom::Start(0))?;
    let mut hasher = Sha256::new();
    io::copy(stream, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn sample_from_start<R: Read + Seek>(
    stream: &mut R,
    ext: &str,
    rows: usize,
) -> Result<RawTable, Box<dyn std::error::Error>> {
    stream.seek(SeekFrom::Start(0))?;
    loader::read_sample(stream, ext, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> ContentScanner {
        ContentScanner::new(&ScanSettings::default()).unwrap()
    }

    #[test]
    fn trigger_and_substring_weights_add_up() {
        let s = scanner();
        assert_eq!(s.cell_weight("plain"), 0);
        assert_eq!(s.cell_weight("  =SUM(A1:A2)"), 1);
        assert_eq!(s.cell_weight("-12"), 1);
        assert_eq!(s.cell_weight("run POWERSHELL now"), 3);
        assert_eq!(s.cell_weight("=HYPERLINK(\"x\") cmd.exe"), 7);
    }

    #[test]
    fn density_threshold_is_strict() {
        let s = scanner();
        // 1 hit over 10 cells is exactly 10%, not above it
        let mut cells = vec!["ok"; 9];
        cells.push("=1");
        let report = s.scan(cells.into_iter());
        assert_eq!(report.cells, 10);
        assert!(!s.is_suspicious(&report));

        let report = s.scan(vec!["=1", "=2", "ok"].into_iter());
        assert!(s.is_suspicious(&report));
    }

    #[test]
    fn empty_scan_is_not_suspicious() {
        let s = scanner();
        let report = s.scan(std::iter::empty());
        assert_eq!(report.density(), 0.0);
        assert!(!s.is_suspicious(&report));
    }

    #[test]
    fn human_size_uses_two_decimals() {
        assert_eq!(human_size(26 * 1024 * 1024), "26.00 MB");
    }
}
