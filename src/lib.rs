/*!
# SheetGenius

A paid, single-shot spreadsheet report service, built in Rust.

## Overview

A customer pays, uploads one spreadsheet and enters an email address. The
upload is screened, analysed, and the results come back both as a ZIP download
and as an email attachment. Uploads that fail screening are refused and the
operator is told about them.

## Architecture

Each submission runs synchronously through a fixed pipeline:

### Screening
- **validator**: Size ceiling, extension allow-list, container signature,
  SHA-256 fingerprint, fail-closed sample parse, column cap and a
  suspicious-content density heuristic. The upload stream is handed back at
  the position it was received at.
- **audit**: Best-effort operator alert for every blocked upload

### Analysis
- **loader**: CSV (`csv`) and Excel (`calamine`) parsing into a
  [`TabularDataset`]
- **summary**: Per-column descriptive statistics
- **graph**: Scatter plot of the first two numeric columns (`plotters`)
- **cluster**: 3-means labelling of the same two columns (`linfa`)
- **report**: Orchestrates the above; plot and clustering are best-effort

### Delivery
- **packager**: Deflated ZIP named with a UTC timestamp
- **mailer**: SMTP delivery with the operator in BCC (`lettre`)

### Web Layer (feature `web`)
- **paywall**: Payment gate and page templates (`handlebars`)
- **app**: `axum` routes, upload handling and response headers

## Configuration

All settings live in [`AppConfig`], read once from the environment (and a
`.env` file) and shared read-only. Without mail credentials the service still
runs; reports are then download-only.

## REST API Endpoints

- `/` - Paywall, or the upload form once `?paid=1` is present
- `/api/process?paid=1` - Multipart `file` + `email`; returns the report ZIP
- `/health` - Liveness check
*/

pub mod audit;
pub mod cell;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod downloader;
pub mod errors;
pub mod graph;
pub mod loader;
pub mod mailer;
pub mod packager;
pub mod pipeline;
pub mod report;
pub mod summary;
pub mod validator;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod paywall;

pub use cell::CellValue;
pub use config::AppConfig;
pub use dataset::TabularDataset;
pub use errors::PipelineError;
pub use packager::{DeliveryPackager, DeliveryResult, DeliveryStatus};
pub use pipeline::{RequestState, SubmissionOutcome, SubmissionPipeline};
pub use report::{ReportArtifactSet, ReportGenerator, ReportOutcome};
pub use validator::{UploadCandidate, UploadValidator, ValidationVerdict};
