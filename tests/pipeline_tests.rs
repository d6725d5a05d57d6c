use sheetgenius::config::{AppConfig, Limits};
use sheetgenius::mailer::REPORT_SUBJECT;
use sheetgenius::packager::DeliveryStatus;
use sheetgenius::pipeline::{RequestState, SubmissionPipeline, WORKDIR_PREFIX};
use sheetgenius::validator::UploadCandidate;
use sheetgenius::PipelineError;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

mod common;
use common::CUSTOMER;

fn pipeline_with_recorder() -> (SubmissionPipeline, common::RecordingTransport) {
    let (mailer, transport) = common::recording_mailer();
    let pipeline = SubmissionPipeline::new(Arc::new(AppConfig::default()), Some(mailer)).unwrap();
    (pipeline, transport)
}

#[test]
fn ten_row_csv_is_reported_and_emailed() {
    let (pipeline, transport) = pipeline_with_recorder();
    let mut candidate = UploadCandidate::from_bytes("people.csv", common::numeric_csv(10));

    let outcome = pipeline.process_submission(&mut candidate, CUSTOMER).unwrap();

    assert!(outcome.verdict.accepted);
    assert_eq!((outcome.rows, outcome.columns), (10, 4));
    assert_eq!(outcome.delivery, DeliveryStatus::Emailed);
    assert_eq!(outcome.state(), RequestState::Emailed);
    assert_eq!(
        outcome.trail,
        vec![
            RequestState::Received,
            RequestState::Validating,
            RequestState::Validated,
            RequestState::Processing,
            RequestState::Packaged,
            RequestState::Emailed,
        ]
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(outcome.archive_bytes.clone())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    assert_eq!(names, vec!["clustered.csv", "scatterplot.png", "summary.csv"]);
    assert!(archive.by_name("scatterplot.png").unwrap().size() > 0);

    let sent = transport.messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].raw.contains(REPORT_SUBJECT));
}

#[test]
fn missing_credentials_still_produce_the_archive() {
    let pipeline = SubmissionPipeline::new(Arc::new(AppConfig::default()), None).unwrap();
    let mut candidate = UploadCandidate::from_bytes("people.csv", common::numeric_csv(10));

    let outcome = pipeline.process_submission(&mut candidate, CUSTOMER).unwrap();

    assert_eq!(outcome.state(), RequestState::EmailSkipped);
    assert!(matches!(outcome.delivery, DeliveryStatus::Skipped(_)));
    assert!(outcome.warning.is_some());
    assert!(!outcome.archive_bytes.is_empty());

    let out = tempfile::tempdir().unwrap();
    let saved = outcome.save_archive(out.path()).unwrap();
    assert_eq!(saved.file_name().unwrap().to_string_lossy(), outcome.archive_name);
}

#[test]
fn macro_workbook_is_blocked_and_only_the_operator_hears() {
    let (pipeline, transport) = pipeline_with_recorder();
    let mut candidate = UploadCandidate::from_bytes("invoice.xlsm", b"PK\x03\x04".to_vec());

    let err = pipeline.process_submission(&mut candidate, CUSTOMER).unwrap_err();

    match err {
        PipelineError::ValidationRejected {
            reason,
            audit_error,
        } => {
            assert!(reason.contains("Macro-enabled"));
            assert!(audit_error.is_none());
        }
        other => panic!("unexpected error {:?}", other),
    }
    let sent = transport.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients, vec![common::OPERATOR.to_string()]);
    assert!(!sent[0].raw.contains(REPORT_SUBJECT));
}

#[test]
fn blank_recipient_is_missing_input() {
    let (pipeline, transport) = pipeline_with_recorder();
    let mut candidate = UploadCandidate::from_bytes("people.csv", common::numeric_csv(3));

    let err = pipeline.process_submission(&mut candidate, "   ").unwrap_err();

    assert!(matches!(err, PipelineError::MissingInput));
    assert_eq!(err.to_string(), "Please upload a file and enter an email.");
    assert!(transport.messages().is_empty());
}

#[test]
fn row_limit_applies_to_the_full_load() {
    let config = AppConfig {
        limits: Limits {
            max_rows: 5,
            ..Limits::default()
        },
        ..AppConfig::default()
    };
    let pipeline = SubmissionPipeline::new(Arc::new(config), None).unwrap();
    let mut candidate = UploadCandidate::from_bytes("people.csv", common::numeric_csv(10));

    let err = pipeline.process_submission(&mut candidate, CUSTOMER).unwrap_err();

    match err {
        PipelineError::SizeExceeded { rows, cols, max_rows, .. } => {
            assert_eq!((rows, cols, max_rows), (10, 4, 5));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn single_numeric_column_ships_summary_only() {
    let pipeline = SubmissionPipeline::new(Arc::new(AppConfig::default()), None).unwrap();
    let body = b"city,population\nOslo,700000\nLima,9700000\n".to_vec();
    let mut candidate = UploadCandidate::from_bytes("cities.csv", body);

    let outcome = pipeline.process_submission(&mut candidate, CUSTOMER).unwrap();

    assert_eq!(outcome.artifacts, vec!["summary.csv"]);
    assert!(outcome.degraded.is_empty());
}

fn leftover_workdirs(root: &Path) -> Vec<String> {
    fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(WORKDIR_PREFIX))
        .collect()
}

#[test]
fn stream_is_processed_from_the_start_whatever_its_position() {
    let pipeline = SubmissionPipeline::new(Arc::new(AppConfig::default()), None).unwrap();
    let body = common::numeric_csv(4);
    let expected = hex::encode(Sha256::digest(&body));
    let mut candidate = UploadCandidate::from_bytes("people.csv", body);
    // Start of the first data row
    candidate.stream.seek(SeekFrom::Start(22)).unwrap();

    let outcome = pipeline.process_submission(&mut candidate, CUSTOMER).unwrap();

    assert_eq!(outcome.verdict.fingerprint.as_deref(), Some(expected.as_str()));
    assert_eq!((outcome.rows, outcome.columns), (4, 4));
    let mut archive = zip::ZipArchive::new(Cursor::new(outcome.archive_bytes)).unwrap();
    let mut summary = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("summary.csv").unwrap(), &mut summary)
        .unwrap();
    // The header row and r0 are both there
    assert!(summary.lines().any(|line| line.starts_with("id,4,4,r0,1,")));
}

#[test]
fn failed_operator_alert_is_reported_with_the_rejection() {
    let transport = common::RecordingTransport::failing();
    let mailer = sheetgenius::mailer::Mailer::with_outbox(common::OPERATOR, transport).unwrap();
    let pipeline =
        SubmissionPipeline::new(Arc::new(AppConfig::default()), Some(Arc::new(mailer))).unwrap();
    let mut candidate = UploadCandidate::from_bytes("invoice.xlsm", b"PK\x03\x04".to_vec());

    let err = pipeline.process_submission(&mut candidate, CUSTOMER).unwrap_err();

    match &err {
        PipelineError::ValidationRejected { audit_error, .. } => {
            assert!(audit_error.as_deref().unwrap().contains("relay refused"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().starts_with("Upload blocked: Macro-enabled"));
}

#[test]
fn blocked_upload_creates_no_working_directory() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = SubmissionPipeline::new(Arc::new(AppConfig::default()), None)
        .unwrap()
        .with_workdir_root(root.path());
    let mut candidate = UploadCandidate::from_bytes("invoice.xlsm", b"PK\x03\x04".to_vec());

    pipeline.process_submission(&mut candidate, CUSTOMER).unwrap_err();

    assert!(leftover_workdirs(root.path()).is_empty());
}

#[test]
fn working_directory_is_removed_after_success_and_failure() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = SubmissionPipeline::new(Arc::new(AppConfig::default()), None)
        .unwrap()
        .with_workdir_root(root.path());

    let mut candidate = UploadCandidate::from_bytes("people.csv", common::numeric_csv(10));
    pipeline.process_submission(&mut candidate, CUSTOMER).unwrap();
    assert!(leftover_workdirs(root.path()).is_empty());

    let config = AppConfig {
        limits: Limits {
            max_rows: 5,
            ..Limits::default()
        },
        ..AppConfig::default()
    };
    let limited = SubmissionPipeline::new(Arc::new(config), None)
        .unwrap()
        .with_workdir_root(root.path());
    let mut candidate = UploadCandidate::from_bytes("people.csv", common::numeric_csv(10));
    let err = limited.process_submission(&mut candidate, CUSTOMER).unwrap_err();
    assert!(matches!(err, PipelineError::SizeExceeded { .. }));
    assert!(leftover_workdirs(root.path()).is_empty());
}
