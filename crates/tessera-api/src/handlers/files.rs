use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tessera_core::{AppError, ImageFit, ImageId, ImageSize, ImageType};

use crate::constants::{CROSS_ORIGIN_RESOURCE_POLICY, IMAGE_CACHE_CONTROL};
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RenditionQuery {
    pub size: Option<String>,
    pub fit: Option<String>,
}

/// Which stored file a request names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileRequest {
    shard_id: i32,
    id: ImageId,
    size: Option<ImageSize>,
    fit: ImageFit,
}

/// Parse `{shard}/{id}.jpg?size=..&fit=..`. Every malformed part is reported as not found.
fn parse_file_request(
    shard: &str,
    file: &str,
    query: &RenditionQuery,
) -> Result<FileRequest, AppError> {
    let not_found = || AppError::NotFound(format!("File {}/{} not found", shard, file));

    let shard_id: i32 = shard.parse().map_err(|_| not_found())?;
    if shard_id <= 0 {
        return Err(not_found());
    }
    let stem = file
        .strip_suffix(ImageType::Jpeg.extension())
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(not_found)?;
    let id: ImageId = stem.parse().map_err(|_| not_found())?;

    let size = match query.size.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<ImageSize>().map_err(|_| not_found())?),
    };
    let fit = query
        .fit
        .as_deref()
        .unwrap_or_default()
        .parse::<ImageFit>()
        .map_err(|_| not_found())?;

    Ok(FileRequest {
        shard_id,
        id,
        size,
        fit,
    })
}

/// IMF-fixdate, as used by `Last-Modified` and `If-Modified-Since`.
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// True when the client's `If-Modified-Since` is at or after `last_modified`.
/// HTTP dates carry whole seconds only. Unparseable values are ignored.
fn not_modified_since(headers: &HeaderMap, last_modified: DateTime<Utc>) -> bool {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .is_some_and(|since| last_modified.timestamp() <= since.timestamp())
}

/// Serve a stored rendition
///
/// Without `size` the default rendition is returned. With it, the copy stored for those
/// bounds and `fit` (default `contain`). Responses carry `Last-Modified`, and a matching
/// `If-Modified-Since` gets `304 Not Modified`.
#[utoipa::path(
    get,
    path = "/images/{shard_id}/{file}",
    tag = "files",
    params(
        ("shard_id" = i32, Path, description = "Shard the image lives in"),
        ("file" = String, Path, description = "`{id}.jpg`"),
        ("size" = Option<String>, Query, description = "Copy bounds, `W` or `WxH`"),
        ("fit" = Option<String>, Query, description = "`contain` (default) or `cover`")
    ),
    responses(
        (status = 200, description = "JPEG bytes", content_type = "image/jpeg"),
        (status = 304, description = "Not modified since `If-Modified-Since`"),
        (status = 404, description = "No such file", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query, headers), fields(operation = "serve_image"))]
pub async fn serve_image(
    State(state): State<Arc<AppState>>,
    Path((shard, file)): Path<(String, String)>,
    Query(query): Query<RenditionQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let request = parse_file_request(&shard, &file, &query)?;

    let rendition = state
        .images
        .read_rendition(request.shard_id, request.id, request.size, request.fit)
        .await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMAGE_CACHE_CONTROL),
    );
    response_headers.insert(
        header::HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static(CROSS_ORIGIN_RESOURCE_POLICY),
    );
    if let Ok(value) = HeaderValue::from_str(&http_date(rendition.last_modified)) {
        response_headers.insert(header::LAST_MODIFIED, value);
    }

    if not_modified_since(&headers, rendition.last_modified) {
        return Ok((StatusCode::NOT_MODIFIED, response_headers).into_response());
    }

    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    Ok((StatusCode::OK, response_headers, Body::from(rendition.data)).into_response())
}
