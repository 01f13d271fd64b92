//! `GET /routing/v1/providers/{cid}`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use cid::Cid;
use futures_util::StreamExt;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use tracing::{debug, error, warn};

use super::negotiate::{negotiate, ResponseFormat};
use super::response::{write_err, write_json_result};
use super::{ServerState, MEDIA_TYPE_NDJSON};
use crate::iter::ResultIter;
use crate::types::{json, ProvidersResponse, Record};

const METHOD: &str = "FindProviders";

pub(super) async fn find_providers(
    State(state): State<Arc<ServerState>>,
    Path(cid): Path<String>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    let key = Cid::try_from(cid.as_str()).map_err(|e| {
        write_err(
            METHOD,
            StatusCode::BAD_REQUEST,
            format_args!("unable to parse CID: {e}"),
        )
    })?;

    let format = negotiate(&headers, state.config.streaming_disabled)
        .map_err(|e| write_err(METHOD, StatusCode::BAD_REQUEST, e))?;
    let limit = format.records_limit(&state.config);
    debug!(%key, ?format, limit, "finding providers");

    let records = state.backend.find_providers(key, limit).await.map_err(|e| {
        write_err(
            METHOD,
            StatusCode::INTERNAL_SERVER_ERROR,
            format_args!("delegate error: {e:#}"),
        )
    })?;

    Ok(match format {
        ResponseFormat::Json => write_json(records).await,
        ResponseFormat::NdJson => write_ndjson(records),
    })
}

/// Buffer every record, then write one JSON object.
///
/// Nothing has been sent when an error item shows up, so it still becomes a
/// proper 500.
async fn write_json(mut records: ResultIter<Record>) -> Response {
    let mut providers = Vec::new();
    while let Some(res) = records.next().await {
        match res {
            Ok(record) => providers.push(record),
            Err(e) => {
                return write_err(
                    METHOD,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format_args!("delegate error on result {}: {e:#}", providers.len()),
                )
            }
        }
    }
    write_json_result(METHOD, &ProvidersResponse { providers })
}

/// Commit to a 200 and write one line per record as it arrives.
///
/// Each record is yielded as its own body frame, so it goes out before the
/// next one is pulled. Status and headers are already sent by then: an error
/// item or a failed write just ends the body.
fn write_ndjson(records: ResultIter<Record>) -> Response {
    let body = async_stream::stream! {
        let mut records = records;
        let mut end = StreamEnd::default();
        while let Some(res) = records.next().await {
            let record = match res {
                Ok(record) => record,
                Err(e) => {
                    error!(method = METHOD, error = ?e, "ndjson iterator error");
                    break;
                }
            };
            let mut line = match json::marshal(&record) {
                Ok(line) => line,
                Err(e) => {
                    error!(method = METHOD, error = %e, "ndjson marshal error");
                    break;
                }
            };
            line.push(b'\n');
            yield Ok::<_, Infallible>(Bytes::from(line));
        }
        end.finished = true;
    };

    (
        StatusCode::OK,
        [(CONTENT_TYPE, MEDIA_TYPE_NDJSON)],
        Body::from_stream(body),
    )
        .into_response()
}

/// Logs a body that was dropped mid-stream, which is how a failed write
/// surfaces here.
#[derive(Default)]
struct StreamEnd {
    finished: bool,
}

impl Drop for StreamEnd {
    fn drop(&mut self) {
        if !self.finished {
            warn!(method = METHOD, "ndjson write error: response body dropped before completion");
        }
    }
}
