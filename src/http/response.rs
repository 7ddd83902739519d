//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip the backend's connection-scoped headers before relaying
//! - Map front-end failures to HTTP status codes
//!
//! # Design Decisions
//! - Backend bodies are streamed, never buffered
//! - Pool exhaustion and shutdown → 503, unreachable or broken backend → 502

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};

use crate::http::request::X_REQUEST_ID;

const HOP_BY_HOP: [HeaderName; 3] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TRANSFER_ENCODING,
];

/// Remove headers that describe the backend connection rather than the response.
pub fn strip_hop_by_hop<B>(response: &mut Response<B>) {
    for name in HOP_BY_HOP.iter() {
        response.headers_mut().remove(name);
    }
}

/// Plain-text failure response carrying the request ID.
pub fn failure_response(status: StatusCode, message: &str, request_id: &str) -> Response<Body> {
    let mut response = (status, message.to_string()).into_response();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
