//! Retrying forwarder: issues the upstream request, retrying only on
//! transport error or per-attempt deadline expiry. Any received HTTP
//! response — whatever its status code — is returned immediately and is
//! never retried.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method};
use tracing::warn;

/// Body-bearing methods get a `Content-Type: application/json` default and
/// a serialized JSON body when one was supplied.
fn is_body_bearing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Issue the upstream request against `backend_url + path (+ query)`, retrying
/// up to `attempts` total tries. Returns `None` only if every attempt failed
/// at the transport layer or timed out; any response actually received from
/// the backend — 2xx through 5xx — is returned as `Some` on the first try.
#[allow(clippy::too_many_arguments)]
pub async fn forward(
    client: &reqwest::Client,
    backend_url: &str,
    method: Method,
    path: &str,
    query: &[(String, String)],
    body: Option<&serde_json::Value>,
    headers: HeaderMap,
    attempts: u32,
    per_attempt_timeout: Duration,
) -> Option<reqwest::Response> {
    let url = format!("{}{}", backend_url.trim_end_matches('/'), path);
    let body_bearing = is_body_bearing(&method);

    // §4.6.5: only default `Content-Type` when the caller didn't already set
    // one; never clobber a caller-supplied value.
    let mut headers = headers;
    if body_bearing && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let body_bytes = if body_bearing {
        body.filter(|b| !(b.is_object() && b.as_object().map(|m| m.is_empty()).unwrap_or(false)))
            .map(|b| serde_json::to_vec(b).expect("serde_json::Value serialization cannot fail"))
    } else {
        None
    };

    for attempt in 1..=attempts.max(1) {
        let mut request = client
            .request(method.clone(), &url)
            .query(query)
            .headers(headers.clone())
            .timeout(per_attempt_timeout);

        if let Some(bytes) = &body_bytes {
            request = request.body(bytes.clone());
        }

        match tokio::time::timeout(per_attempt_timeout, request.send()).await {
            Ok(Ok(response)) => return Some(response),
            Ok(Err(e)) => {
                warn!(url, attempt, attempts, error = %e, "forward attempt: transport error");
            }
            Err(_) => {
                warn!(url, attempt, attempts, "forward attempt: deadline exceeded");
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path as path_matcher};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_first_response_without_retrying_on_5xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_matcher("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let body = serde_json::json!({"model": "m1"});
        let response = forward(
            &client,
            &server.uri(),
            Method::POST,
            "/api/chat",
            &[],
            Some(&body),
            HeaderMap::new(),
            3,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(response.unwrap().status(), 500);
    }

    #[tokio::test]
    async fn forwards_json_body_with_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({"model": "m1", "q": "hi"})))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let body = serde_json::json!({"model": "m1", "q": "hi"});
        let response = forward(
            &client,
            &server.uri(),
            Method::POST,
            "/api/chat",
            &[],
            Some(&body),
            HeaderMap::new(),
            1,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(response.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn returns_none_when_every_attempt_fails_at_transport_layer() {
        let client = reqwest::Client::new();
        let response = forward(
            &client,
            "http://127.0.0.1:1",
            Method::GET,
            "/",
            &[],
            None,
            HeaderMap::new(),
            2,
            Duration::from_millis(200),
        )
        .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn does_not_clobber_a_caller_supplied_content_type() {
        use wiremock::matchers::header;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/vnd.custom+json"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/vnd.custom+json"),
        );
        let client = reqwest::Client::new();
        let body = serde_json::json!({"model": "m1"});
        let response = forward(
            &client,
            &server.uri(),
            Method::POST,
            "/",
            &[],
            Some(&body),
            headers,
            1,
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(response.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn preserves_repeated_query_parameters_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let query = vec![
            ("tag".to_string(), "a".to_string()),
            ("tag".to_string(), "b".to_string()),
        ];
        let response = forward(
            &client,
            &server.uri(),
            Method::GET,
            "/",
            &query,
            None,
            HeaderMap::new(),
            1,
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(response.unwrap().status(), 200);
    }
}
