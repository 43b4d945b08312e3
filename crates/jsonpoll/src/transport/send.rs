//! JSONP send channel
//!
//! Browsers post client messages either as a form field (`d=<urlencoded
//! JSON>`) or as a raw JSON body. Either way the payload decodes to a batch
//! that is handed to the session in one go.

use std::sync::atomic::Ordering;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use jsonpoll_traits::{MessageBatch, SessionRegistry};
use percent_encoding::percent_decode_str;
use tracing::{debug, error};

use super::polling::PollingTransport;
use crate::error::{JsonpError, JsonpResult, TEXT_PLAIN};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// One year, the preflight cache lifetime browsers are told to use.
const PREFLIGHT_MAX_AGE: &str = "31536000";

/// Whether the request declares a form-encoded body
fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

/// Form decoding of a single value: `+` is a space, then percent escapes.
fn unquote_plus(value: &str) -> JsonpResult<String> {
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| JsonpError::BrokenJson)
}

/// Extract the JSON text of a send request
///
/// # Errors
///
/// [`JsonpError::PayloadExpected`] when a form body lacks the `d=` field or
/// the payload is empty, [`JsonpError::BrokenJson`] when the body is not
/// UTF-8.
pub fn decode_payload(headers: &HeaderMap, body: &[u8]) -> JsonpResult<String> {
    let text = std::str::from_utf8(body).map_err(|_| JsonpError::BrokenJson)?;

    let payload = if is_form_encoded(headers) {
        let data = text.strip_prefix("d=").ok_or(JsonpError::PayloadExpected)?;
        unquote_plus(data)?
    } else {
        text.to_string()
    };

    if payload.is_empty() {
        return Err(JsonpError::PayloadExpected);
    }
    Ok(payload)
}

/// `POST /{session_id}/jsonp_send`
pub async fn jsonp_send<T: PollingTransport>(
    State(transport): State<T>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut response = match process_send(&transport, &session_id, &headers, &body).await {
        Ok(()) => ([(header::CONTENT_TYPE, TEXT_PLAIN)], "ok").into_response(),
        Err(err) => err.into_response(),
    };

    let response_headers = response.headers_mut();
    transport.preflight(&headers, response_headers);
    transport.handle_session_cookie(&headers, response_headers);
    transport.disable_cache(response_headers);
    response
}

async fn process_send<T: PollingTransport>(
    transport: &T,
    session_id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> JsonpResult<()> {
    let session = transport
        .registry()
        .get_session(session_id)
        .filter(|session| !session.is_closed())
        .ok_or(JsonpError::SessionNotFound)?;

    let stats = transport.stats();
    let payload = decode_payload(headers, body).inspect_err(|_| {
        stats.rejected_payloads.fetch_add(1, Ordering::Relaxed);
    })?;

    let batch = MessageBatch::from_json(&payload).map_err(|err| {
        debug!(session_id, error = %err, "undecodable jsonp payload");
        stats.rejected_payloads.fetch_add(1, Ordering::Relaxed);
        JsonpError::BrokenJson
    })?;

    if let Err(err) = session.on_messages(batch).await {
        error!(session_id, error = %err, "message handler failed, closing session");
        stats.handler_failures.fetch_add(1, Ordering::Relaxed);
        session.close();
        return Err(JsonpError::HandlerFailed);
    }
    Ok(())
}

/// `OPTIONS /{session_id}/jsonp_send`
pub async fn jsonp_send_options<T: PollingTransport>(
    State(transport): State<T>,
    headers: HeaderMap,
) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let response_headers = response.headers_mut();
    transport.preflight(&headers, response_headers);
    transport.handle_session_cookie(&headers, response_headers);

    response_headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("OPTIONS, POST"),
    );
    response_headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000"),
    );
    response
}
