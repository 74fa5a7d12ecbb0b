//! Database abstraction layer for the config store.
//!
//! [`sqlite::SqliteConfigStore`] is the default implementation of
//! [`crate::config_store::ConfigStore`]. To swap to another database
//! (Postgres, MySQL, ...), implement the trait for your own type and change
//! the concrete type constructed in `main`.

pub mod sqlite;
