#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::PipelineError;
use crate::paywall::{Pages, PaymentGate};
use crate::pipeline::{SubmissionOutcome, SubmissionPipeline};
use crate::validator::UploadCandidate;

/// Room for multipart boundaries and the email field on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

const DELIVERY_STATUS: HeaderName = HeaderName::from_static("x-delivery-status");
const DELIVERY_WARNING: HeaderName = HeaderName::from_static("x-delivery-warning");
const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub struct AppState {
    pipeline: SubmissionPipeline,
    gate: PaymentGate,
    pages: Pages,
}

impl AppState {
    pub fn new(pipeline: SubmissionPipeline) -> Result<Self, handlebars::TemplateError> {
        Ok(AppState {
            pipeline,
            gate: PaymentGate::new(),
            pages: Pages::new()?,
        })
    }
}

#[derive(Deserialize)]
struct PaidQuery {
    paid: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: String,
}

/// Build the server's routes around a shared state
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit =
        state.pipeline.config().limits.max_upload_bytes as usize + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(serve_index))
        .route("/api/process", post(process_upload))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

/// Serve the app on the configured address until the process is stopped
///
/// # Arguments
/// * `config` - Loaded configuration; mail delivery is disabled when it has no
///   credentials
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Error if the mailer, the
///   templates or the listener cannot be set up
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    if config.mail.is_none() {
        warn!("EMAIL_ADDRESS/EMAIL_PASSWORD not set; reports will be download-only");
    }

    let pipeline = SubmissionPipeline::from_config(config.clone())?;
    let state = Arc::new(AppState::new(pipeline)?);
    let app = router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn serve_index(
    Query(params): Query<PaidQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let page = if state.gate.is_unlocked(params.paid.as_deref()) {
        state.pages.upload(state.pipeline.config())
    } else {
        state.pages.paywall(&state.pipeline.config().paywall)
    };

    match page {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("page render failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn process_upload(
    Query(params): Query<PaidQuery>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let request_id = Uuid::new_v4();

    if !state.gate.is_unlocked(params.paid.as_deref()) {
        info!("[{}] upload refused: payment flag missing", request_id);
        return status_response(
            StatusCode::PAYMENT_REQUIRED,
            "payment_required",
            "Payment required. Complete checkout to unlock uploads.",
        );
    }

    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut email = String::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("[{}] malformed multipart body: {}", request_id, e);
                return status_response(e.status(), "error", &e.body_text());
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) if !filename.is_empty() => upload = Some((filename, bytes.to_vec())),
                    Ok(_) => {}
                    Err(e) => return status_response(e.status(), "error", &e.body_text()),
                }
            }
            "email" => match field.text().await {
                Ok(text) => email = text,
                Err(e) => return status_response(e.status(), "error", &e.body_text()),
            },
            _ => {}
        }
    }

    let Some((filename, bytes)) = upload else {
        return error_response(&PipelineError::MissingInput);
    };
    info!(
        "[{}] processing {} ({} bytes) for {}",
        request_id,
        filename,
        bytes.len(),
        email.trim()
    );

    let worker = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut candidate = UploadCandidate::from_bytes(filename, bytes);
        worker.pipeline.process_submission(&mut candidate, &email)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => {
            info!(
                "[{}] delivered {} ({})",
                request_id,
                outcome.archive_name,
                outcome.delivery.as_str()
            );
            archive_response(request_id, outcome)
        }
        Ok(Err(e)) => {
            info!("[{}] stopped: {}", request_id, e);
            error_response(&e)
        }
        Err(e) => {
            error!("[{}] processing task failed: {}", request_id, e);
            status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                "Processing failed unexpectedly.",
            )
        }
    }
}

fn archive_response(request_id: Uuid, outcome: SubmissionOutcome) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    headers.insert(
        DELIVERY_STATUS,
        HeaderValue::from_static(outcome.delivery.as_str()),
    );

    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        outcome.archive_name,
        urlencoding::encode(&outcome.archive_name)
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(warning) = &outcome.warning {
        if let Ok(value) = HeaderValue::from_str(&header_safe(warning)) {
            headers.insert(DELIVERY_WARNING, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID, value);
    }

    (StatusCode::OK, headers, outcome.archive_bytes).into_response()
}

fn error_response(e: &PipelineError) -> Response {
    let (status, label) = match e {
        PipelineError::MissingInput => (StatusCode::BAD_REQUEST, "error"),
        PipelineError::ValidationRejected { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "rejected"),
        _ if e.is_client_error() => (StatusCode::UNPROCESSABLE_ENTITY, "error"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };
    status_response(status, label, &e.to_string())
}

fn status_response(status: StatusCode, label: &str, message: &str) -> Response {
    (
        status,
        Json(StatusResponse {
            status: label.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Header values only carry visible ASCII
fn header_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { ' ' })
        .collect()
}
