//! Liveness probing: a bounded HEAD request against a backend's root URL.

use std::time::Duration;

use tracing::debug;

/// Hard wall-clock deadline for a single liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Returns `true` iff `backend_url` answers within [`PROBE_TIMEOUT`] with a
/// 2xx status. Any transport error, non-2xx status, or timeout yields
/// `false`. Uses HEAD; per the spec's own open question, GET is equally
/// acceptable, but the `reqwest::Client` either way releases its connection
/// back to the pool once the response (or error) resolves, so no explicit
/// cleanup is needed.
pub async fn probe(client: &reqwest::Client, backend_url: &str) -> bool {
    let attempt = client.head(backend_url).timeout(PROBE_TIMEOUT).send();
    match tokio::time::timeout(PROBE_TIMEOUT, attempt).await {
        Ok(Ok(response)) => response.status().is_success(),
        Ok(Err(e)) => {
            debug!(backend = backend_url, error = %e, "liveness probe: transport error");
            false
        }
        Err(_) => {
            debug!(backend = backend_url, "liveness probe: deadline exceeded");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn live_backend_returning_2xx_is_alive() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        assert!(probe(&client, &server.uri()).await);
    }

    #[tokio::test]
    async fn backend_returning_5xx_is_not_alive() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        assert!(!probe(&client, &server.uri()).await);
    }

    #[tokio::test]
    async fn unreachable_backend_is_not_alive() {
        let client = reqwest::Client::new();
        assert!(!probe(&client, "http://127.0.0.1:1").await);
    }
}
