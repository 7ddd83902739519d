//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Prepare the inbound request for a single backend exchange
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The request is forwarded unmodified apart from `Connection: close`

use axum::http::{header, HeaderValue, Request, Version};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a UUID v4 request ID for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID set by the request-id layer, or `"unknown"`.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Mark the request as the only exchange on its backend connection.
pub fn prepare_for_backend<B>(request: &mut Request<B>) {
    *request.version_mut() = Version::HTTP_11;
    request
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
}
