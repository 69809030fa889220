//! REST endpoints for email classification.
//!
//! `POST /api/v1/email/classify` takes `multipart/form-data` with exactly one
//! of a `file` part or a `text` part and returns a `ClassificationResult`.
//! If the client disconnects, axum drops the handler future and with it the
//! in-flight completion call.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ClassifyError;
use crate::llm::create_provider;
use crate::pipeline::gateway::ClassificationGateway;
use crate::pipeline::normalizer::{InputNormalizer, LopdfExtractor};
use crate::pipeline::types::{ClassificationResult, UploadedFile};

/// Headroom on top of the file limit for multipart framing and the text field.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state for classification routes.
#[derive(Clone)]
pub struct AppState {
    pub normalizer: Arc<InputNormalizer>,
    pub gateway: Arc<ClassificationGateway>,
}

impl AppState {
    /// Wire the production pipeline: configured LLM provider and lopdf extraction.
    pub fn from_config(config: &AppConfig) -> crate::error::Result<Self> {
        let llm = create_provider(&config.llm)?;
        Ok(Self {
            normalizer: Arc::new(InputNormalizer::new(
                Arc::new(LopdfExtractor),
                config.max_file_size_bytes,
            )),
            gateway: Arc::new(ClassificationGateway::new(llm, config.gateway_config())),
        })
    }
}

/// Error body returned by the API.
#[derive(Debug)]
pub enum ApiError {
    Classify(ClassifyError),
    Multipart(MultipartError),
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        Self::Classify(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart(err)
    }
}

/// HTTP status for a classification failure.
pub fn status_for(err: &ClassifyError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, detail) = match self {
            Self::Classify(err) => (status_for(&err), err.kind(), err.detail().to_string()),
            Self::Multipart(err) => (err.status(), "invalid_multipart", err.body_text()),
        };
        (
            status,
            Json(serde_json::json!({ "error": kind, "detail": detail })),
        )
            .into_response()
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-classifier"
    }))
}

/// POST /api/v1/email/classify
async fn classify_email(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ClassificationResult>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("classify", %request_id);

    async move {
        let started = Instant::now();
        let (file, text) = read_form(multipart).await?;

        let outcome: Result<ClassificationResult, ClassifyError> = async {
            let content = state.normalizer.normalize(file, text).await?;
            state.gateway.classify(&content).await
        }
        .await;

        match outcome {
            Ok(result) => {
                info!(
                    category = %result.category(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Classification request completed"
                );
                Ok(Json(result))
            }
            Err(err) => {
                warn!(
                    kind = err.kind(),
                    detail = err.detail(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Classification request failed"
                );
                Err(err.into())
            }
        }
    }
    .instrument(span)
    .await
}

/// Pull the optional `file` and `text` parts out of the form.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, Option<String>), ApiError> {
    let mut file = None;
    let mut text = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if file.is_some() {
                    return Err(ClassifyError::InvalidInput(
                        "only one file may be sent".to_string(),
                    )
                    .into());
                }
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("text") => {
                if text.is_some() {
                    return Err(ClassifyError::InvalidInput(
                        "only one text field may be sent".to_string(),
                    )
                    .into());
                }
                text = Some(field.text().await?);
            }
            other => {
                debug!(field = other.unwrap_or("<unnamed>"), "Ignoring unknown form field");
            }
        }
    }

    Ok((file, text))
}

/// Build the classification REST routes.
pub fn classify_routes(state: AppState) -> Router {
    let body_limit = state.normalizer.max_file_bytes() + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/email/classify", post(classify_email))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
