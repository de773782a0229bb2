// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Bodies above this size (image uploads, audio clips) are never logged
const MAX_LOGGED_BODY: usize = 64 * 1024;

/// Middleware to log request and response bodies in debug mode
///
/// Multipart uploads are passed through without buffering; everything else is
/// buffered once, logged when it is printable, and reconstructed.
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/"))
        .unwrap_or(false);

    let request = if is_multipart {
        request
    } else {
        let (parts, body) = request.into_parts();

        let bytes = to_bytes(body, usize::MAX)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        if !bytes.is_empty() && bytes.len() <= MAX_LOGGED_BODY {
            if let Ok(body_str) = std::str::from_utf8(&bytes) {
                debug!(
                    method = %parts.method,
                    uri = %parts.uri,
                    request_body = %body_str,
                    "request"
                );
            }
        }

        Request::from_parts(parts, Body::from(bytes))
    };

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();

    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() && bytes.len() <= MAX_LOGGED_BODY {
        if let Ok(body_str) = std::str::from_utf8(&bytes) {
            // Pretty-print JSON responses, skip binary ones
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body_str) {
                debug!(
                    status = %parts.status,
                    response_body = %serde_json::to_string_pretty(&json)
                        .unwrap_or_else(|_| body_str.to_string()),
                    "response"
                );
            }
        }
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
