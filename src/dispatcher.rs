//! The Dispatcher: authenticates, parses, routes, and drives the
//! probe/forward/stream attempt loop for every inbound request.
//!
//! Wired as a single axum fallback handler rather than a fixed route table,
//! since the client surface is "any method, any path" (spec §6).

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::error::ProxyError;
use crate::forwarder;
use crate::prober;
use crate::relay;
use crate::snapshot::Backend;
use crate::state::AppState;

/// Paths where model-based backend selection applies. All other paths fall
/// back to the default (first) backend in the snapshot.
const MODEL_BASED_ENDPOINTS: &[&str] = &["/api/generate", "/api/chat", "/generate", "/chat"];

/// Entry point: the single fallback handler for the whole client surface.
pub async fn dispatch(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    match handle(&state, &ip, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: &AppState, ip: &str, request: Request) -> Result<Response, ProxyError> {
    let snapshot = state.snapshot.load();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_owned();
    let incoming_headers = request.headers().clone();

    // ── 4.6.1 Authentication ────────────────────────────────────────────
    let auth_header = incoming_headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let user = if snapshot.security_disabled {
        "unknown".to_owned()
    } else {
        match authenticate(auth_header, &snapshot.users) {
            Ok(username) => username,
            Err(presented) => {
                state
                    .access_log
                    .append("rejected", &presented, ip, "Denied", "None", -1, "Authentication failed")
                    .await;
                return Err(ProxyError::AuthFailure);
            }
        }
    };

    // ── 4.6.2 Parsing ───────────────────────────────────────────────────
    let query = parse_query(uri.query().unwrap_or(""));
    let body_bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| ProxyError::Internal(e.to_string()))?;
    let parsed_body: Option<serde_json::Value> = if body_bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&body_bytes).ok()
    };

    let model = parsed_body
        .as_ref()
        .and_then(|v| v.as_object())
        .and_then(|o| o.get("model"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            query
                .iter()
                .find(|(k, _)| k == "model")
                .map(|(_, v)| v.clone())
        });

    let filtered_headers = relay::filter_request_headers(incoming_headers);

    // ── 4.6.3 Routing ───────────────────────────────────────────────────
    let is_model_based = MODEL_BASED_ENDPOINTS.contains(&path.as_str());

    let (candidates, is_default_path) = if is_model_based {
        let model = model.ok_or(ProxyError::MissingModel)?;
        let candidates: Vec<Backend> = snapshot
            .backends
            .iter()
            .filter(|b| b.models.contains(&model))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(ProxyError::NoModelBackend);
        }
        (candidates, false)
    } else {
        match snapshot.backends.first() {
            Some(default) => (vec![default.clone()], true),
            None => return Err(ProxyError::DefaultBackendUnavailable),
        }
    };

    // ── 4.6.4 Attempt loop ──────────────────────────────────────────────
    let ctx = AttemptContext {
        user: &user,
        ip,
        method: method.clone(),
        path: &path,
        query: &query,
        body: parsed_body.as_ref(),
        headers: filtered_headers,
        retry_attempts: snapshot.retry_attempts,
    };

    run_attempts(state, candidates, is_default_path, ctx).await
}

struct AttemptContext<'a> {
    user: &'a str,
    ip: &'a str,
    method: Method,
    path: &'a str,
    query: &'a [(String, String)],
    body: Option<&'a serde_json::Value>,
    headers: HeaderMap,
    retry_attempts: u32,
}

async fn run_attempts(
    state: &AppState,
    mut candidates: Vec<Backend>,
    is_default_path: bool,
    ctx: AttemptContext<'_>,
) -> Result<Response, ProxyError> {
    let mut any_live = false;

    while !candidates.is_empty() {
        candidates.sort_by_key(|b| state.queue.depth(&b.name));
        let backend = candidates.remove(0);

        if !prober::probe(&state.http_client, &backend.url).await {
            continue;
        }
        any_live = true;

        state.queue.inc(&backend.name);
        let depth_after_inc = state.queue.depth(&backend.name);
        state
            .access_log
            .append("gen_request", ctx.user, ctx.ip, "Authorized", &backend.name, depth_after_inc, "")
            .await;
        info!(backend = %backend.name, user = ctx.user, "dispatching request");

        let response = forwarder::forward(
            &state.http_client,
            &backend.url,
            ctx.method.clone(),
            ctx.path,
            ctx.query,
            ctx.body,
            ctx.headers.clone(),
            ctx.retry_attempts,
            Duration::from_secs(backend.timeout_seconds),
        )
        .await;

        state.queue.dec(&backend.name);
        let depth_after_dec = state.queue.depth(&backend.name);
        state
            .access_log
            .append("gen_done", ctx.user, ctx.ip, "Authorized", &backend.name, depth_after_dec, "")
            .await;

        if let Some(upstream) = response {
            return Ok(relay::relay_response(upstream));
        }
    }

    if is_default_path {
        if any_live {
            Err(ProxyError::DefaultForwardFailed)
        } else {
            Err(ProxyError::DefaultBackendUnavailable)
        }
    } else {
        Err(ProxyError::AllCandidatesExhausted)
    }
}

/// Validate `Authorization: Bearer USERNAME:KEY` against `users`.
///
/// Returns the authenticated username on success, or the raw credentials
/// string as presented (for the rejected log row) on failure.
fn authenticate(
    header_value: &str,
    users: &crate::snapshot::AuthorizedUsers,
) -> Result<String, String> {
    let token = header_value.strip_prefix("Bearer ").ok_or_else(|| header_value.to_owned())?;
    let mut parts = token.splitn(2, ':');
    let (username, key) = match (parts.next(), parts.next()) {
        (Some(u), Some(k)) => (u, k),
        _ => return Err(token.to_owned()),
    };
    match users.get(username) {
        Some(expected_key) if expected_key == key => Ok(username.to_owned()),
        _ => Err(token.to_owned()),
    }
}

/// Decode a raw query string into an ordered list of `(name, value)` pairs,
/// preserving repeats and first-seen order.
fn parse_query(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
