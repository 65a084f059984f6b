//! Structured API error payloads.
//!
//! # Responsibilities
//! - Define the JSON error shape returned to clients
//! - Provide the canonical "not found" and "method not allowed" errors
//! - Render an error as a complete HTTP response
//!
//! # Design Decisions
//! - Optional fields are omitted from the wire format when empty (or zero)
//! - `instance` carries the request path
//! - The body is a single JSON document followed by a newline

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Content type used for every JSON body the router writes itself.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// An error you return from an HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{title}")]
pub struct ApiError {
    /// Short, human readable summary.
    pub title: String,

    /// Stable machine readable identifier, e.g. `not_found`.
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,

    /// The path of the request that caused the error.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub status_code: u16,
}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

impl ApiError {
    /// Create an error with a title and id; every other field is empty.
    pub fn new(title: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            id: id.into(),
            detail: String::new(),
            instance: String::new(),
            kind: String::new(),
            status_code: 0,
        }
    }

    /// The error returned when no route matches `path`.
    pub fn not_found(path: &str) -> Self {
        Self::new("Resource not found", "not_found")
            .with_instance(path)
            .with_status(StatusCode::NOT_FOUND)
    }

    /// The error returned when a route matches `path` but not the method.
    pub fn method_not_allowed(path: &str) -> Self {
        Self::new("Method not allowed", "method_not_allowed")
            .with_instance(path)
            .with_status(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = status.as_u16();
        self
    }

    /// HTTP status for this error. Errors without a status render as 500.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Encode the error as a newline-terminated JSON document.
    pub fn to_json_body(&self) -> Vec<u8> {
        // Plain strings and integers cannot fail to serialize.
        let mut body = serde_json::to_vec(self).unwrap_or_default();
        body.push(b'\n');
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.to_json_body()));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        response
    }
}
