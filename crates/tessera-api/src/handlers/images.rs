use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tessera_core::{AppError, ErrorMetadata, ImageId, ImageRecord, RenditionSpec};
use tessera_services::BulkDeleteReport;
use utoipa::ToSchema;

use crate::constants::{COPIES_FIELD, IMAGE_FIELD};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Malformed identifiers are indistinguishable from unknown ones.
fn parse_image_id(raw: &str) -> Result<ImageId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Image {} not found", raw)))
}

/// The `image` bytes and `copies` text of an upload form.
async fn read_upload_form(mut multipart: Multipart) -> Result<(Bytes, String), HttpAppError> {
    let mut image = None;
    let mut copies = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();
        match field_name.as_str() {
            IMAGE_FIELD => image = Some(field.bytes().await?),
            COPIES_FIELD => copies = Some(field.text().await?),
            _ => {}
        }
    }

    let image =
        image.ok_or_else(|| AppError::InvalidInput("No image provided".to_string()))?;
    let copies = copies
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("No copies to make".to_string()))?;
    Ok((image, copies))
}

/// Upload an image and store its default rendition plus requested copies
///
/// The form carries the file in `image` and a JSON array of
/// `{maxWidth, maxHeight, imageFit, default}` in `copies`. Exactly one entry must be the default.
#[utoipa::path(
    post,
    path = "/api/images",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = ImageRecord),
        (status = 400, description = "Invalid form, spec list or image format", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let (data, copies) = read_upload_form(multipart).await?;
    let specs: Vec<RenditionSpec> = serde_json::from_str(&copies)
        .map_err(|e| AppError::InvalidInput(format!("Invalid copies JSON: {}", e)))?;

    let record = state.images.save(data, specs).await?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/api/images/{id}",
    tag = "images",
    params(
        ("id" = String, Path, description = "Image ID (24 hex characters)")
    ),
    responses(
        (status = 200, description = "Image metadata", body = ImageRecord),
        (status = 404, description = "Image not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_image"))]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let id = parse_image_id(&id)?;
    let record = state.images.get(id).await?;
    Ok(Json(record))
}

/// Delete an image
///
/// Deleting an already deleted image returns the record unchanged.
#[utoipa::path(
    delete,
    path = "/api/images/{id}",
    tag = "images",
    params(
        ("id" = String, Path, description = "Image ID (24 hex characters)")
    ),
    responses(
        (status = 200, description = "Deleted image record", body = ImageRecord),
        (status = 404, description = "Image not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_image"))]
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let id = parse_image_id(&id)?;
    let record = state.images.delete(id).await?;
    Ok(Json(record))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkDeleteResponse {
    /// Records deleted before the first failure, in request order
    pub deleted: Vec<ImageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<BulkDeleteFailedItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkDeleteFailedItem {
    pub id: String,
    pub code: String,
    pub error: String,
}

impl From<BulkDeleteReport> for BulkDeleteResponse {
    fn from(report: BulkDeleteReport) -> Self {
        Self {
            deleted: report.deleted,
            failed: report.failed.map(|failure| BulkDeleteFailedItem {
                id: failure.id.to_string(),
                code: failure.error.error_code().to_string(),
                error: failure.error.client_message(),
            }),
        }
    }
}

/// Delete several images in order
///
/// Stops at the first failure. Deletions before it stay applied and the response is
/// `207 Multi-Status` naming the failed id.
#[utoipa::path(
    delete,
    path = "/api/images/_bulk",
    tag = "images",
    request_body = Vec<String>,
    responses(
        (status = 200, description = "Every image deleted", body = BulkDeleteResponse),
        (status = 207, description = "Stopped at a failure", body = BulkDeleteResponse),
        (status = 400, description = "Malformed id list", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, ids), fields(operation = "bulk_delete_images", count = ids.len()))]
pub async fn bulk_delete_images(
    State(state): State<Arc<AppState>>,
    ValidatedJson(ids): ValidatedJson<Vec<ImageId>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let report = state.images.delete_many(&ids).await;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(BulkDeleteResponse::from(report))))
}
