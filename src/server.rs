//! HTTP route layer.
//!
//! Three validation endpoints plus a health probe. Handlers hold no
//! validation logic; they extract the request shape, delegate to the
//! library, and map outcomes to status codes:
//!
//! - `POST /validate/csv`: multipart `type` + `file`; 200 valid, 422 not,
//!   400 when a field is missing or the resource name is unknown.
//! - `POST /validate/zip`: multipart `type` + `file` (archive); 200 with
//!   per-resource detail, 422 only when every present resource fails,
//!   400 on intake failure.
//! - `GET /validate/datapackage?uri=..&relations=..`: 200 when every
//!   declared resource passes, 422 when any fails, 400 when the descriptor
//!   cannot be loaded.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::batch::BatchOrchestrator;
use crate::config::AppConfig;
use crate::engine::CsvEngine;
use crate::error::{EngineError, Result, ValidationError};
use crate::http_client::HttpFetcher;
use crate::intake::ArchiveIntake;
use crate::package::{PackageOptions, PackageValidator};
use crate::validator::ResourceValidator;

/// Shared application state: the validators plus the configuration they
/// were built from.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    validator: Arc<ResourceValidator>,
    orchestrator: BatchOrchestrator,
    packages: PackageValidator,
    config: AppConfig,
}

impl AppState {
    /// Assemble the full validation stack from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let engine = CsvEngine::new(config.validation.max_diagnostics);
        let validator = Arc::new(ResourceValidator::new(engine));
        let intake = ArchiveIntake::new(
            config.intake.scratch_dir.clone(),
            config.intake.max_archive_mb,
        );
        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&validator),
            intake,
            config.validation.clone(),
        );
        let fetcher = Arc::new(HttpFetcher::new(config.network.clone())?);
        let packages =
            PackageValidator::new(Arc::clone(&validator), fetcher, config.validation.clone());

        Ok(Self {
            inner: Arc::new(AppInner {
                validator,
                orchestrator,
                packages,
                config,
            }),
        })
    }

    pub fn validator(&self) -> &ResourceValidator {
        &self.inner.validator
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.inner.orchestrator
    }

    pub fn packages(&self) -> &PackageValidator {
        &self.inner.packages
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }
}

/// Application-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request itself is unusable: missing fields, bad archive,
    /// unloadable descriptor, unknown resource name.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::RequestShape(_)
            | ValidationError::Intake(_)
            | ValidationError::Descriptor(_)
            | ValidationError::Engine(EngineError::UnknownSchema { .. }) => {
                AppError::BadRequest(err.to_string())
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if matches!(self, AppError::Internal(_)) {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Build the complete router with all validation routes.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().server.max_upload_mb as usize * 1024 * 1024;
    Router::new()
        .route("/health", get(health))
        .route("/validate/csv", post(validate_csv))
        .route("/validate/zip", post(validate_zip))
        .route("/validate/datapackage", get(validate_datapackage))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and run the HTTP service until shutdown.
pub async fn serve(state: AppState) -> Result<()> {
    let bind = state.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("validate-hsds listening on {bind}");
    axum::serve(listener, router(state).into_make_service())
        .await
        .map_err(ValidationError::Io)?;
    Ok(())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// The two multipart fields every validation upload must carry.
struct UploadForm {
    resource_type: String,
    file: Vec<u8>,
}

async fn read_upload_form(mut multipart: Multipart) -> std::result::Result<UploadForm, AppError> {
    let mut resource_type: Option<String> = None;
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("malformed multipart payload: {e}"))
    })? {
        match field.name() {
            Some("type") => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("unreadable 'type' field: {e}"))
                })?;
                resource_type = Some(value);
            }
            Some("file") => {
                let value = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("unreadable 'file' field: {e}"))
                })?;
                file = Some(value.to_vec());
            }
            _ => {}
        }
    }

    let resource_type = resource_type.ok_or_else(|| {
        AppError::from(ValidationError::RequestShape(
            "form should contain the field \"type\" with a valid resource name".to_string(),
        ))
    })?;
    let file = file.ok_or_else(|| {
        AppError::from(ValidationError::RequestShape(
            "form should contain the field \"file\" with a valid resource data stream".to_string(),
        ))
    })?;

    Ok(UploadForm {
        resource_type,
        file,
    })
}

/// Validate one uploaded CSV stream against a named resource schema.
async fn validate_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Response, AppError> {
    let form = read_upload_form(multipart).await?;
    let result = state
        .validator()
        .validate_bytes(form.file, &form.resource_type)
        .await?;

    let status = if result.valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(result)).into_response())
}

/// Validate an uploaded archive against the whole resource catalog.
async fn validate_zip(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Response, AppError> {
    let form = read_upload_form(multipart).await?;
    let report = state.orchestrator().validate_archive(form.file).await?;

    // Mixed outcomes stay 200: an absent file and a failed file are not the
    // same thing here, so callers inspect per-resource flags. An archive
    // whose every present resource fails is unambiguously broken.
    let status = if report.all_present_failed() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)).into_response())
}

#[derive(Debug, Deserialize)]
struct DatapackageQuery {
    uri: Option<String>,
    #[serde(default)]
    relations: bool,
}

/// Validate a full data package identified by a descriptor URI.
async fn validate_datapackage(
    State(state): State<AppState>,
    Query(query): Query<DatapackageQuery>,
) -> std::result::Result<Response, AppError> {
    let uri = query.uri.ok_or_else(|| {
        AppError::from(ValidationError::RequestShape(
            "query should contain the parameter \"uri\" with a descriptor location".to_string(),
        ))
    })?;

    let report = state
        .packages()
        .validate_package(
            &uri,
            PackageOptions {
                relations: query.relations,
            },
        )
        .await?;

    let status = if report.is_valid() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(report)).into_response())
}
