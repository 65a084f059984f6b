//! JSON content type tagging.

use axum::http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::http::error::JSON_CONTENT_TYPE;

/// Layer that tags responses as `application/json; charset=utf-8`.
pub type JsonContentTypeLayer = SetResponseHeaderLayer<HeaderValue>;

/// Tag every response as JSON, replacing whatever content type the handler
/// produced. Axum gives `String` and `&str` bodies `text/plain`, which would
/// otherwise leak through.
pub fn json_content_type() -> JsonContentTypeLayer {
    SetResponseHeaderLayer::overriding(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    )
}
