//! Admin HTTP endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use blog_image_deduper_core::{
    DedupReport, DuplicateGroup, Error, FolderReport, ImageDeduper, RemovalOptions, ScanAction,
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deduper: Arc<ImageDeduper>,
}

/// Build the admin router
pub fn router(deduper: Arc<ImageDeduper>) -> Router {
    Router::new()
        .route(
            "/api/admin/remove-duplicate-images",
            post(remove_duplicate_images),
        )
        .route(
            "/api/admin/check-and-remove-duplicates",
            post(check_and_remove_duplicates),
        )
        .route("/health", get(health))
        .with_state(AppState { deduper })
}

/// Errors returned as JSON bodies
#[derive(Debug)]
pub enum ApiError {
    /// Unusable request, reported verbatim with 400
    BadRequest(String),
    /// Unexpected failure, reported with 500 and the underlying message as `details`
    Internal { error: String, details: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                warn!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal { error: message, details } => {
                error!("{}: {}", message, details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message, "details": details })),
                )
                    .into_response()
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidRequest(message) => ApiError::BadRequest(message),
            other => ApiError::Internal {
                error: "Duplicate image processing failed".to_string(),
                details: other.to_string(),
            },
        }
    }
}

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    if !value.is_object() {
        return Err(ApiError::BadRequest("Request body must be a JSON object".into()));
    }
    Ok(value)
}

fn optional_bool(body: &Value, key: &str, default: bool) -> Result<bool, ApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(value)) => Ok(*value),
        Some(_) => Err(ApiError::BadRequest(format!("{} must be a boolean", key))),
    }
}

async fn remove_duplicate_images(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DedupReport>, ApiError> {
    let body = parse_body(&body)?;

    let groups = match body.get("duplicateGroups") {
        Some(groups @ Value::Array(_)) => serde_json::from_value::<Vec<DuplicateGroup>>(
            groups.clone(),
        )
        .map_err(|e| ApiError::BadRequest(format!("Invalid duplicateGroups: {}", e)))?,
        _ => {
            return Err(ApiError::BadRequest(
                "duplicateGroups array is required".into(),
            ))
        }
    };

    let config = state.deduper.config();
    let options = RemovalOptions {
        keep_blog_connected: optional_bool(&body, "keepBlogConnected", config.keep_blog_connected)?,
        dry_run: optional_bool(&body, "dryRun", config.dry_run)?,
    };

    info!(
        "Duplicate removal requested for {} groups (dry run: {})",
        groups.len(),
        options.dry_run
    );
    Ok(Json(state.deduper.remove_duplicates(groups, options).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderScanRequest {
    folder_path: Option<String>,
    action: Option<String>,
}

async fn check_and_remove_duplicates(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FolderReport>, ApiError> {
    let body = parse_body(&body)?;
    let request: FolderScanRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid request: {}", e)))?;

    let folder = request
        .folder_path
        .as_deref()
        .map(|p| p.trim().trim_matches('/'))
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("folderPath is required".into()))?
        .to_string();

    let action = match request.action.as_deref().unwrap_or("check") {
        "check" => ScanAction::Check,
        "remove" => ScanAction::Remove,
        other => {
            return Err(ApiError::BadRequest(format!(
                "Unknown action '{}', expected check or remove",
                other
            )))
        }
    };

    let config = state.deduper.config();
    let options = RemovalOptions {
        keep_blog_connected: optional_bool(&body, "keepBlogConnected", config.keep_blog_connected)?,
        dry_run: optional_bool(&body, "dryRun", config.dry_run)?,
    };

    info!("Folder scan requested for '{}' ({:?})", folder, action);
    let report = state
        .deduper
        .scan_folder(&folder, action, options, |_| {})
        .await?;
    Ok(Json(report))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
