pub mod auth;

use serde::Serialize;
use utoipa::ToSchema;

/// Generic error body returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
