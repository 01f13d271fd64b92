//! `GET` and `PUT /routing/v1/ipns/{cid}`.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use cid::Cid;
use http::header::{HeaderName, ACCEPT, CACHE_CONTROL, CONTENT_TYPE, ETAG};
use http::{HeaderMap, StatusCode};
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use super::response::write_err;
use super::{ServerState, DEFAULT_RECORD_TTL, MEDIA_TYPE_IPNS_RECORD};
use crate::ipns::{validate_with_name, Name, NameRecord, RecordError, MAX_RECORD_SIZE};

const GET_METHOD: &str = "GetIPNSRecord";
const PUT_METHOD: &str = "PutIPNSRecord";

pub(super) async fn get_ipns_record(
    State(state): State<Arc<ServerState>>,
    Path(cid): Path<String>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    if !first_header_contains(&headers, ACCEPT, MEDIA_TYPE_IPNS_RECORD) {
        return Err(write_err(
            GET_METHOD,
            StatusCode::NOT_ACCEPTABLE,
            "content type in 'Accept' header is missing or not supported",
        ));
    }

    let name = decode_name(GET_METHOD, &cid)?;
    let record = state.backend.find_ipns_record(&name).await.map_err(|e| {
        write_err(
            GET_METHOD,
            StatusCode::INTERNAL_SERVER_ERROR,
            format_args!("delegate error: {e:#}"),
        )
    })?;

    let raw = record
        .marshal()
        .map_err(|e| write_err(GET_METHOD, StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let max_age = record.ttl().unwrap_or(DEFAULT_RECORD_TTL).as_secs();
    let etag = record_etag(&raw);
    debug!(%name, max_age, %etag, "serving name record");

    Ok((
        [
            (CONTENT_TYPE, MEDIA_TYPE_IPNS_RECORD.to_string()),
            (CACHE_CONTROL, format!("max-age={max_age}")),
            (ETAG, etag),
        ],
        raw,
    )
        .into_response())
}

pub(super) async fn put_ipns_record(
    State(state): State<Arc<ServerState>>,
    Path(cid): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, Response> {
    if !first_header_contains(&headers, CONTENT_TYPE, MEDIA_TYPE_IPNS_RECORD) {
        return Err(write_err(
            PUT_METHOD,
            StatusCode::NOT_ACCEPTABLE,
            "content type in 'Content-Type' header is missing or not supported",
        ));
    }

    let name = decode_name(PUT_METHOD, &cid)?;

    let raw = body::to_bytes(body, MAX_RECORD_SIZE).await.map_err(|e| {
        write_err(
            PUT_METHOD,
            StatusCode::BAD_REQUEST,
            format_args!("provided record is too long: {e}"),
        )
    })?;

    let invalid = |e: RecordError| {
        write_err(
            PUT_METHOD,
            StatusCode::BAD_REQUEST,
            format_args!("provided record is invalid: {e}"),
        )
    };
    let record = NameRecord::unmarshal(&raw).map_err(invalid)?;
    validate_with_name(&record, &name).map_err(invalid)?;

    state
        .backend
        .provide_ipns_record(&name, &record)
        .await
        .map_err(|e| {
            write_err(
                PUT_METHOD,
                StatusCode::INTERNAL_SERVER_ERROR,
                format_args!("delegate error: {e:#}"),
            )
        })?;

    debug!(%name, sequence = record.sequence(), "stored name record");
    Ok(StatusCode::OK.into_response())
}

fn decode_name(method: &'static str, cid: &str) -> Result<Name, Response> {
    let cid = Cid::try_from(cid).map_err(|e| {
        write_err(
            method,
            StatusCode::BAD_REQUEST,
            format_args!("unable to parse CID: {e}"),
        )
    })?;
    Name::from_cid(&cid).map_err(|e| {
        write_err(
            method,
            StatusCode::BAD_REQUEST,
            format_args!("peer ID CID is not valid: {e}"),
        )
    })
}

/// Only the first value of `name` is looked at.
fn first_header_contains(headers: &HeaderMap, name: HeaderName, needle: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(needle))
}

/// xxHash64 of the record bytes in base 32, digits `0-9a-v`.
fn record_etag(raw: &[u8]) -> String {
    format_radix32(xxh64(raw, 0))
}

fn format_radix32(mut n: u64) -> String {
    const DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while n > 0 {
        buf.push(DIGITS[(n % 32) as usize]);
        n /= 32;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn radix32_digits() {
        assert_eq!(format_radix32(0), "0");
        assert_eq!(format_radix32(31), "v");
        assert_eq!(format_radix32(32), "10");
        assert_eq!(format_radix32(u64::MAX), "fvvvvvvvvvvvv");
    }

    #[test]
    fn etag_tracks_content() {
        assert_eq!(record_etag(b"record"), record_etag(b"record"));
        assert_ne!(record_etag(b"record"), record_etag(b"record2"));
        assert!(record_etag(b"record")
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'v').contains(&b)));
    }

    #[test]
    fn only_first_header_value_counts() {
        let mut headers = HeaderMap::new();
        headers.append(ACCEPT, HeaderValue::from_static("text/plain"));
        headers.append(ACCEPT, HeaderValue::from_static(MEDIA_TYPE_IPNS_RECORD));
        assert!(!first_header_contains(&headers, ACCEPT, MEDIA_TYPE_IPNS_RECORD));

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.ipfs.ipns-record; q=1, */*"),
        );
        assert!(first_header_contains(&headers, ACCEPT, MEDIA_TYPE_IPNS_RECORD));
        assert!(!first_header_contains(&HeaderMap::new(), ACCEPT, MEDIA_TYPE_IPNS_RECORD));
    }
}
