//! `Accept` header negotiation for provider lookups.

use http::header::ACCEPT;
use http::HeaderMap;

use super::{ServerConfig, MEDIA_TYPE_JSON, MEDIA_TYPE_NDJSON, MEDIA_TYPE_WILDCARD};

/// How a provider lookup is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// One buffered `application/json` object.
    Json,
    /// `application/x-ndjson`, one record per line, flushed as produced.
    NdJson,
}

impl ResponseFormat {
    /// Result limit to ask the backend for. 0 means unbounded.
    pub fn records_limit(self, config: &ServerConfig) -> usize {
        match self {
            ResponseFormat::Json => config.records_limit,
            ResponseFormat::NdJson => config.streaming_records_limit,
        }
    }
}

/// Why no response format could be chosen.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// One of the listed media types does not parse.
    #[error("unable to parse Accept header: {0}")]
    Malformed(#[from] MediaTypeError),

    /// Every listed media type parsed but none is served.
    #[error("no supported content types")]
    Unsupported,
}

/// Syntax errors in a single media-type element.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MediaTypeError {
    /// Header value is not visible ASCII.
    #[error("header value is not valid text")]
    NotText,
    /// Empty element.
    #[error("no media type")]
    Empty,
    /// Type not followed by `/`.
    #[error("expected slash after first token")]
    ExpectedSlash,
    /// Nothing after the `/`.
    #[error("expected token after slash")]
    ExpectedSubtype,
    /// Junk after the subtype.
    #[error("unexpected content after media subtype")]
    TrailingContent,
    /// A `;key=value` parameter does not parse.
    #[error("invalid media parameter")]
    InvalidParameter,
    /// The same parameter appears twice.
    #[error("duplicate parameter name")]
    DuplicateParameter,
}

/// Pick the response format for the request's `Accept` headers.
///
/// Every element of every `Accept` value must parse; one bad element fails
/// the whole request. Streaming wins over bulk when both are acceptable,
/// unless it is disabled.
pub fn negotiate(
    headers: &HeaderMap,
    streaming_disabled: bool,
) -> Result<ResponseFormat, NegotiationError> {
    let mut values = headers.get_all(ACCEPT).iter().peekable();
    if values.peek().is_none() {
        return Ok(ResponseFormat::Json);
    }

    let mut supports_json = false;
    let mut supports_ndjson = false;
    for value in values {
        let value = value.to_str().map_err(|_| MediaTypeError::NotText)?;
        for accept in value.split(',') {
            match parse_media_type(accept)?.as_str() {
                MEDIA_TYPE_JSON | MEDIA_TYPE_WILDCARD => supports_json = true,
                MEDIA_TYPE_NDJSON => supports_ndjson = true,
                _ => {}
            }
        }
    }

    if supports_ndjson && !streaming_disabled {
        Ok(ResponseFormat::NdJson)
    } else if supports_json {
        Ok(ResponseFormat::Json)
    } else {
        Err(NegotiationError::Unsupported)
    }
}

/// Parse one media-type element, returning the lowercased `type/subtype`
/// with parameters stripped.
pub fn parse_media_type(v: &str) -> Result<String, MediaTypeError> {
    let (base, mut params) = match v.find(';') {
        Some(i) => v.split_at(i),
        None => (v, ""),
    };
    let media_type = base.trim().to_ascii_lowercase();
    check_media_type(&media_type)?;

    let mut seen: Vec<String> = Vec::new();
    loop {
        params = params.trim_start();
        if params.is_empty() {
            break;
        }
        match consume_param(params) {
            Some((key, rest)) => {
                let key = key.to_ascii_lowercase();
                if seen.contains(&key) {
                    return Err(MediaTypeError::DuplicateParameter);
                }
                seen.push(key);
                params = rest;
            }
            // a lone trailing semicolon is tolerated
            None if params.trim() == ";" => break,
            None => return Err(MediaTypeError::InvalidParameter),
        }
    }
    Ok(media_type)
}

fn check_media_type(s: &str) -> Result<(), MediaTypeError> {
    let (ty, rest) = consume_token(s);
    if ty.is_empty() {
        return Err(MediaTypeError::Empty);
    }
    if rest.is_empty() {
        return Ok(());
    }
    let rest = rest
        .strip_prefix('/')
        .ok_or(MediaTypeError::ExpectedSlash)?;
    let (subtype, rest) = consume_token(rest);
    if subtype.is_empty() {
        return Err(MediaTypeError::ExpectedSubtype);
    }
    if !rest.is_empty() {
        return Err(MediaTypeError::TrailingContent);
    }
    Ok(())
}

/// Consume `;key=value`, returning the key and the remaining input.
fn consume_param(v: &str) -> Option<(&str, &str)> {
    let v = v.strip_prefix(';')?.trim_start();
    let (key, v) = consume_token(v);
    if key.is_empty() {
        return None;
    }
    let v = v.trim_start().strip_prefix('=')?.trim_start();
    let rest = consume_value(v)?;
    Some((key, rest))
}

/// Consume a token or a quoted string, returning the remaining input.
fn consume_value(v: &str) -> Option<&str> {
    let Some(quoted) = v.strip_prefix('"') else {
        let (token, rest) = consume_token(v);
        return (!token.is_empty()).then_some(rest);
    };
    let mut escaped = false;
    for (i, c) in quoted.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Some(&quoted[i + 1..]),
            _ => {}
        }
    }
    None
}

fn consume_token(v: &str) -> (&str, &str) {
    let end = v.find(|c: char| !is_token_char(c)).unwrap_or(v.len());
    v.split_at(end)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}
