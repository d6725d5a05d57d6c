//! Errors that end a submission.
//!
//! Best-effort steps (plot, clustering, email, operator alerts) never produce
//! one of these; their failures are carried in the step's own result type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Please upload a file and enter an email.")]
    MissingInput,
    /// `audit_error` is set when the operator alert could not be sent
    #[error("Upload blocked: {reason}")]
    ValidationRejected {
        reason: String,
        audit_error: Option<String>,
    },
    #[error("Could not read the file: {0}")]
    ParseFailure(String),
    #[error(
        "File too large (rows: {rows}, cols: {cols}). Limits: {max_rows} rows, {max_cols} cols."
    )]
    SizeExceeded {
        rows: usize,
        cols: usize,
        max_rows: usize,
        max_cols: usize,
    },
    #[error("Could not generate the report: {0}")]
    Report(String),
    #[error("Could not package the report: {0}")]
    Packaging(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether the failure was caused by the upload itself rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingInput
                | PipelineError::ValidationRejected { .. }
                | PipelineError::ParseFailure(_)
                | PipelineError::SizeExceeded { .. }
        )
    }
}
