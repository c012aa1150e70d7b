//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use tessera_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tessera API",
        version = "0.1.0",
        description = "Image ingestion and storage: uploads are re-encoded into a default rendition plus resized copies, spread over numbered shard directories."
    ),
    paths(
        handlers::images::upload_image,
        handlers::images::get_image,
        handlers::images::delete_image,
        handlers::images::bulk_delete_images,
        handlers::files::serve_image,
        handlers::health::liveness_check,
        handlers::health::readiness_check,
    ),
    components(schemas(
        models::ImageRecord,
        models::ImageVariant,
        models::ImageFit,
        models::ImageType,
        models::Rgb,
        models::RenditionSpec,
        handlers::images::BulkDeleteResponse,
        handlers::images::BulkDeleteFailedItem,
        error::ErrorResponse,
    )),
    tags(
        (name = "images", description = "Upload, inspect and delete images"),
        (name = "files", description = "Stored rendition files"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;
