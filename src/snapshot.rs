//! Config snapshot: an immutable view of backends, authorized users, and
//! dispatch policy, refreshed periodically and swapped in atomically.
//!
//! Modeled on the design note in the spec: "mutable module-level state... is
//! a refreshable configuration snapshot; model it as an immutable value
//! behind an atomic pointer swap, not global mutable variables." `ArcSwap`
//! is the idiomatic crate for exactly this shape.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::config_store::ConfigStore;

/// One AI inference endpoint the proxy can forward to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Stable identifier; its URL is acceptable.
    pub name: String,
    /// Base URL (scheme + host + port, no path).
    pub url: String,
    /// Model names this backend can serve.
    pub models: HashSet<String>,
    /// Per-attempt upstream deadline in seconds.
    pub timeout_seconds: u64,
}

/// Default per-attempt deadline when a backend row doesn't specify one.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 300;

/// `username -> key` mapping. Read-only from the Dispatcher's perspective.
pub type AuthorizedUsers = HashMap<String, String>;

/// An immutable bundle of configuration used coherently for the duration of
/// one request.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Backends in stable, stored order — used as the tie-break order when
    /// sorting candidates by load.
    pub backends: Vec<Backend>,
    pub users: AuthorizedUsers,
    pub retry_attempts: u32,
    pub security_disabled: bool,
}

impl ConfigSnapshot {
    fn empty(retry_attempts: u32, security_disabled: bool) -> Self {
        Self {
            backends: Vec::new(),
            users: HashMap::new(),
            retry_attempts,
            security_disabled,
        }
    }
}

/// Holds the current snapshot behind an atomic pointer; many readers, a
/// single writer (the refresher task).
pub struct SnapshotHandle {
    inner: ArcSwap<ConfigSnapshot>,
}

impl SnapshotHandle {
    pub fn new(initial: ConfigSnapshot) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    /// Load the current snapshot. The returned `Arc` is a stable, coherent
    /// view for the whole duration of one request, even if the refresher
    /// publishes a new snapshot concurrently.
    pub fn load(&self) -> Arc<ConfigSnapshot> {
        self.inner.load_full()
    }

    fn publish(&self, snapshot: ConfigSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }
}

/// Load one snapshot from `store`, logging and keeping defaults on failure.
async fn load_snapshot<S: ConfigStore>(
    store: &S,
    retry_attempts: u32,
    security_disabled: bool,
) -> Option<ConfigSnapshot> {
    let backends = match store.list_backends().await {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "config store: failed to list backends; keeping previous snapshot");
            return None;
        }
    };
    let users = match store.list_users().await {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "config store: failed to list users; keeping previous snapshot");
            return None;
        }
    };
    Some(ConfigSnapshot {
        backends,
        users,
        retry_attempts,
        security_disabled,
    })
}

/// Run the initial synchronous load (called once before the listener
/// accepts traffic) and return the resulting handle. If the store is
/// unreachable at boot, starts from an empty snapshot — the first requests
/// will observe no backends and get a 503, matching the spec's documented
/// boot behaviour.
pub async fn initial_snapshot<S: ConfigStore>(
    store: &S,
    retry_attempts: u32,
    security_disabled: bool,
) -> ConfigSnapshot {
    match load_snapshot(store, retry_attempts, security_disabled).await {
        Some(s) => {
            info!(backends = s.backends.len(), users = s.users.len(), "initial config snapshot loaded");
            s
        }
        None => {
            warn!("initial config load failed; starting with an empty snapshot");
            ConfigSnapshot::empty(retry_attempts, security_disabled)
        }
    }
}

/// Spawn the background refresher: reloads the snapshot from `store` every
/// `interval` and publishes it atomically. Load failures leave the previous
/// snapshot in place.
pub fn spawn_refresher<S: ConfigStore>(
    handle: Arc<SnapshotHandle>,
    store: Arc<S>,
    interval: Duration,
    retry_attempts: u32,
    security_disabled: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it, we already loaded once
        loop {
            ticker.tick().await;
            if let Some(snapshot) =
                load_snapshot(store.as_ref(), retry_attempts, security_disabled).await
            {
                handle.publish(snapshot);
            }
        }
    })
}
