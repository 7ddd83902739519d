//! Registry of inbound handlers selectable by `module:callable` reference.

use std::collections::BTreeMap;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::http::request::request_id;
use crate::http::response::failure_response;

/// Largest request body the echo handler reads.
pub const ECHO_BODY_LIMIT: usize = 1024 * 1024;

/// A built-in inbound handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum App {
    /// Hand each request to the worker loops for forwarding.
    Forward,
    /// Answer locally with a JSON description of the request.
    Echo,
}

/// `(module, callable, handler)` triples known to the front-end.
const REGISTRY: &[(&str, &str, App)] = &[
    ("frontend", "forward", App::Forward),
    ("demo", "echo", App::Echo),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppRefError {
    #[error("app reference '{0}' must look like 'module:callable'")]
    Malformed(String),

    #[error("no module named '{0}'")]
    UnknownModule(String),

    #[error("module '{module}' has no callable '{callable}'")]
    UnknownCallable { module: String, callable: String },
}

impl App {
    /// Look up a `module:callable` reference.
    pub fn resolve(reference: &str) -> Result<Self, AppRefError> {
        let (module, callable) = reference
            .trim()
            .split_once(':')
            .filter(|(m, c)| !m.is_empty() && !c.is_empty())
            .ok_or_else(|| AppRefError::Malformed(reference.to_string()))?;

        if !REGISTRY.iter().any(|(m, _, _)| *m == module) {
            return Err(AppRefError::UnknownModule(module.to_string()));
        }

        REGISTRY
            .iter()
            .find(|(m, c, _)| *m == module && *c == callable)
            .map(|(_, _, app)| *app)
            .ok_or_else(|| AppRefError::UnknownCallable {
                module: module.to_string(),
                callable: callable.to_string(),
            })
    }

    /// The canonical reference for this handler.
    pub fn reference(&self) -> &'static str {
        match self {
            App::Forward => "frontend:forward",
            App::Echo => "demo:echo",
        }
    }
}

#[derive(Debug, Serialize)]
struct EchoReply {
    method: String,
    path: String,
    query: Option<String>,
    headers: BTreeMap<String, String>,
    body: String,
}

/// Demo handler: reply with the request's method, path, headers and body.
pub async fn echo(request: Request<Body>) -> Response<Body> {
    let id = request_id(&request);
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, ECHO_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Echo body rejected");
            return failure_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large", &id);
        }
    };

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    Json(EchoReply {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
    .into_response()
}
