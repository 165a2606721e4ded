//! Request-id propagation.
//!
//! An inbound `x-request-id` is kept so a caller can correlate across
//! services; otherwise a fresh UUID is minted. The id is echoed on the
//! response either way.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let inbound = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let request_id = inbound.unwrap_or_else(|| Uuid::new_v4().to_string());

    // A hostile inbound value can fail header encoding; skip it rather than
    // reject the request.
    match HeaderValue::from_str(&request_id) {
        Ok(value) => {
            req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
            let mut response = next.run(req).await;
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
            response
        }
        Err(_) => next.run(req).await,
    }
}
