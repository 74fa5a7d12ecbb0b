//! Streaming relay: turns an upstream [`reqwest::Response`] into an axum
//! [`Response`], preserving the upstream status code and relaying the body
//! incrementally rather than buffering it.
//!
//! Chunked transfer-encoding framing itself is left to hyper: once the
//! `Content-Length` header is stripped and the body is a stream rather than
//! a fixed buffer, hyper emits HTTP/1.1 chunked framing on the wire
//! automatically. This keeps the relay a header-filtering + stream-adapter
//! concern rather than a hand-rolled byte-framing one.

use axum::body::Body;
use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

/// Headers stripped from the incoming client request before forwarding
/// upstream. `Content-Length` and `Transfer-Encoding` are stripped too: the
/// forwarded body is a re-serialization of the parsed JSON value, not the
/// original bytes, so any length the client sent no longer describes it —
/// reqwest computes the correct `Content-Length` from the actual body it
/// sends as long as one isn't already present in the header map.
const REQUEST_HEADERS_TO_STRIP: &[HeaderName] = &[
    axum::http::header::AUTHORIZATION,
    axum::http::header::HOST,
    axum::http::header::CONTENT_LENGTH,
    axum::http::header::TRANSFER_ENCODING,
];

/// Remove `Authorization`, `Host`, `Content-Length`, and `Transfer-Encoding`
/// from the headers forwarded upstream; everything else passes through
/// unchanged.
pub fn filter_request_headers(mut headers: HeaderMap) -> HeaderMap {
    for name in REQUEST_HEADERS_TO_STRIP {
        headers.remove(name);
    }
    headers
}

/// Convert an upstream response into a client-facing one: same status code,
/// headers copied except `Content-Length` / `Transfer-Encoding` /
/// `Content-Encoding`, with `Transfer-Encoding: chunked` set explicitly, and
/// the body relayed as an incremental byte stream.
pub fn relay_response(upstream: reqwest::Response) -> Response {
    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let upstream_headers = upstream.headers().clone();

    let mut builder = Response::builder().status(status);
    for (name, value) in upstream_headers.iter() {
        if name == CONTENT_LENGTH || name == TRANSFER_ENCODING || name == CONTENT_ENCODING {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder = builder.header(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

    let body = Body::from_stream(upstream.bytes_stream());
    builder
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, HOST};

    #[test]
    fn strips_authorization_and_host() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer x:y"));
        headers.insert(HOST, HeaderValue::from_static("example.com"));
        headers.insert("x-custom", HeaderValue::from_static("keep-me"));

        let filtered = filter_request_headers(headers);
        assert!(!filtered.contains_key(AUTHORIZATION));
        assert!(!filtered.contains_key(HOST));
        assert!(filtered.contains_key("x-custom"));
    }

    #[test]
    fn strips_content_length_and_transfer_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("37"));
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let filtered = filter_request_headers(headers);
        assert!(!filtered.contains_key(CONTENT_LENGTH));
        assert!(!filtered.contains_key(TRANSFER_ENCODING));
    }
}
