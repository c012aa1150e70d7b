//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use tessera_core::Config;
use tower_http::trace::TraceLayer;

use crate::api_doc::ApiDoc;
use crate::constants::{API_PREFIX, IMAGES_PATH};
use crate::handlers::{files, health, images};
use crate::state::AppState;

/// Setup all application routes
///
/// JSON endpoints live under `/api`, rendition files under `/images/{shard}/{id}.jpg`.
/// Every request body is capped at the configured upload size.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route(IMAGES_PATH, post(images::upload_image))
        .route(
            &format!("{}/_bulk", IMAGES_PATH),
            delete(images::bulk_delete_images),
        )
        .route(
            &format!("{}/{{id}}", IMAGES_PATH),
            get(images::get_image).delete(images::delete_image),
        )
        .route("/openapi.json", get(openapi_json));

    Router::new()
        .nest(API_PREFIX, api_routes)
        .route(
            &format!("{}/{{shard_id}}/{{file}}", IMAGES_PATH),
            get(files::serve_image),
        )
        .route("/health", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        .layer(DefaultBodyLimit::max(config.max_upload_size_bytes()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    Json(ApiDoc::openapi())
}
