//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; any `AppError` converts with `?`
//! and renders with its status, code and log level from [`ErrorMetadata`].

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tessera_core::{AppError, ErrorMetadata, LogLevel};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    /// Build the response body for `error`. Details are hidden in production and for
    /// sensitive errors.
    pub fn from_app_error(error: &AppError, is_production: bool) -> Self {
        let show_details = !is_production && !error.is_sensitive();
        Self {
            error: error.client_message(),
            details: show_details.then(|| error.detailed_message()),
            error_type: show_details.then(|| error.error_type().to_string()),
            code: error.error_code().to_string(),
            recoverable: error.is_recoverable(),
            suggested_action: error.suggested_action().map(String::from),
        }
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: both the trait and `AppError` are foreign here).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// Oversized bodies surface as 413, every other multipart failure as 400.
impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            HttpAppError(AppError::PayloadTooLarge(err.body_text()))
        } else {
            HttpAppError(AppError::InvalidInput(format!(
                "Error parsing multipart/form-data: {}",
                err.body_text()
            )))
        }
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

pub(crate) fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error,
                error_type = error_type,
                details = %error.detailed_message(),
                "Error occurred"
            );
        }
    }
}

pub(crate) fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse::from_app_error(app_error, is_production_env());
        (status, Json(body)).into_response()
    }
}
