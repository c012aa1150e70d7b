//! HTTP surface of the tessera image store: handlers, router setup and telemetry.

pub mod api_doc;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError, ValidatedJson};
pub use state::AppState;
