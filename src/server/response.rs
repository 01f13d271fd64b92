//! Shared response writers.

use std::fmt;

use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;
use http::StatusCode;
use serde::Serialize;
use tracing::info;

use super::MEDIA_TYPE_JSON;
use crate::types::json;

/// Error bodies are cut to this many bytes.
const MAX_CAUSE_LEN: usize = 1024;

/// Plain-text error response carrying `cause`.
pub(super) fn write_err(method: &'static str, status: StatusCode, cause: impl fmt::Display) -> Response {
    let mut cause = cause.to_string();
    info!(method, status = status.as_u16(), error = %cause, "request failed");
    truncate_at_char_boundary(&mut cause, MAX_CAUSE_LEN);
    (status, cause).into_response()
}

/// `application/json` response, or a 500 if `val` does not serialize.
pub(super) fn write_json_result<T: Serialize>(method: &'static str, val: &T) -> Response {
    match json::marshal(val) {
        Ok(body) => ([(CONTENT_TYPE, MEDIA_TYPE_JSON)], body).into_response(),
        Err(e) => write_err(
            method,
            StatusCode::INTERNAL_SERVER_ERROR,
            format_args!("marshaling response: {e}"),
        ),
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
