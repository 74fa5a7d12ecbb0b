//! Shared application state handed to every request handler.
//!
//! Deliberately holds no reference to the config store itself — only
//! `main` needs a concrete `ConfigStore` (to boot the snapshot and spawn
//! the refresher), and [`crate::config_store::ConfigStore`] is not
//! `dyn`-safe since its methods return `impl Future`. Keeping it out of
//! `AppState` lets `AppState` stay a plain, non-generic struct.

use std::sync::Arc;

use crate::access_log::AccessLogger;
use crate::queue::QueueAccountant;
use crate::snapshot::SnapshotHandle;

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<SnapshotHandle>,
    pub queue: Arc<QueueAccountant>,
    pub access_log: Arc<AccessLogger>,
    pub http_client: reqwest::Client,
}
