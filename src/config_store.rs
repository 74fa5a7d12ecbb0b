//! The external configuration store interface.
//!
//! The spec treats the store that enumerates backends and authorized users
//! as an out-of-scope external collaborator, consumed through exactly two
//! read-only queries. [`ConfigStore`] is that seam; [`crate::db::sqlite`]
//! provides a concrete, runnable default implementation.
//!
//! Trait methods use `impl Future` in their signatures (stable since Rust
//! 1.75) so no extra `async-trait` crate is required, matching the store
//! traits elsewhere in this codebase.

use std::future::Future;

use crate::snapshot::{AuthorizedUsers, Backend};

/// Read-only queries the config snapshot refresher issues against the
/// external store.
pub trait ConfigStore: Send + Sync + 'static {
    /// List backends with their model names and timeout.
    fn list_backends(&self) -> impl Future<Output = Result<Vec<Backend>, sqlx::Error>> + Send;

    /// List authorized (username, key) pairs.
    fn list_users(&self) -> impl Future<Output = Result<AuthorizedUsers, sqlx::Error>> + Send;
}
