//! SQLite implementation of [`ConfigStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature. Migrations are run automatically
//! on startup via [`SqliteConfigStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR` (the crate root), so the directory is
//! embedded into the binary. The database file location is determined at
//! runtime by `PROXY_CONFIG_DATABASE_URL` and is **not** related to the
//! current working directory at runtime.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used deliberately so that no
//! `DATABASE_URL` environment variable is needed at compile time.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::config_store::ConfigStore;
use crate::snapshot::{Backend, AuthorizedUsers, DEFAULT_BACKEND_TIMEOUT_SECS};

/// SQLite-backed config store: `backends` and `users` tables.
#[derive(Clone, Debug)]
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    /// Open (or create) the SQLite database at `url` and run pending
    /// migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://proxy-config.db?mode=rwc"` or `"sqlite://:memory:"` for
    /// tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert or update a backend row. Exposed for tests and for whatever
    /// out-of-scope admin surface populates this store in production.
    pub async fn upsert_backend(
        &self,
        name: &str,
        url: &str,
        models: &[&str],
        timeout_seconds: Option<u64>,
        sort_order: i64,
    ) -> Result<(), sqlx::Error> {
        let models_csv = models.join(",");
        let timeout = timeout_seconds.map(|t| t as i64);
        sqlx::query(
            "INSERT INTO backends (name, url, models, timeout_seconds, sort_order) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(name) DO UPDATE SET \
                url = ?2, models = ?3, timeout_seconds = ?4, sort_order = ?5",
        )
        .bind(name)
        .bind(url)
        .bind(&models_csv)
        .bind(timeout)
        .bind(sort_order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or update an authorized user row.
    pub async fn upsert_user(&self, username: &str, api_key: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (username, api_key) VALUES (?1, ?2) \
             ON CONFLICT(username) DO UPDATE SET api_key = ?2",
        )
        .bind(username)
        .bind(api_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl ConfigStore for SqliteConfigStore {
    async fn list_backends(&self) -> Result<Vec<Backend>, sqlx::Error> {
        let rows: Vec<(String, String, String, Option<i64>)> = sqlx::query_as(
            "SELECT name, url, models, timeout_seconds FROM backends ORDER BY sort_order ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, url, models_csv, timeout_seconds)| Backend {
                name,
                url,
                models: models_csv
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
                timeout_seconds: timeout_seconds
                    .and_then(|t| u64::try_from(t).ok())
                    .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS),
            })
            .collect())
    }

    async fn list_users(&self) -> Result<AuthorizedUsers, sqlx::Error> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT username, api_key FROM users")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect::<HashMap<_, _>>())
    }
}
