//! Append-only CSV access log.
//!
//! One row per dispatch event (`gen_request`, `gen_done`, `rejected`).
//! Writes are serialized behind a [`tokio::sync::Mutex`] around the open
//! file handle so concurrent Dispatcher tasks never interleave bytes within
//! a line — the single-writer discipline the spec requires.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;

const HEADER: &str = "time_stamp,event,user_name,ip_address,access,server,nb_queued_requests_on_server,error\n";

/// Serializes writes to the CSV file at `path`.
pub struct AccessLogger {
    path: PathBuf,
    writer: Mutex<()>,
}

impl AccessLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Append one access-log row. Failures are logged to stderr via
    /// `tracing::error!` and otherwise swallowed — a log write must never
    /// fail a request.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        event: &str,
        user: &str,
        ip: &str,
        access: &str,
        server: &str,
        nb_queued: i64,
        error_text: &str,
    ) {
        let _guard = self.writer.lock().await;
        if let Err(e) = self
            .append_locked(event, user, ip, access, server, nb_queued, error_text)
            .await
        {
            error!(error = %e, path = %self.path.display(), "access log: write failed");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_locked(
        &self,
        event: &str,
        user: &str,
        ip: &str,
        access: &str,
        server: &str,
        nb_queued: i64,
        error_text: &str,
    ) -> std::io::Result<()> {
        let existed = Path::new(&self.path).exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        if !existed {
            file.write_all(HEADER.as_bytes()).await?;
        }

        let timestamp = chrono::Utc::now().to_rfc3339();
        let row = format!(
            "{},{},{},{},{},{},{},{}\n",
            json_field(&timestamp),
            json_field(event),
            json_field(user),
            json_field(ip),
            json_field(access),
            json_field(server),
            nb_queued,
            json_field(error_text),
        );
        file.write_all(row.as_bytes()).await?;
        file.flush().await
    }
}

/// JSON-string-escape a field so embedded commas/quotes/newlines are safe
/// inside a CSV cell, per the spec's "each field is serialized as a JSON
/// string" requirement.
fn json_field(value: &str) -> String {
    serde_json::to_string(value).expect("string serialization cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_header_once_then_one_row_per_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("access.csv");
        let logger = AccessLogger::new(&path);

        logger
            .append("gen_request", "alice", "1.2.3.4", "Authorized", "a", 1, "")
            .await;
        logger
            .append("gen_done", "alice", "1.2.3.4", "Authorized", "a", 0, "")
            .await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.trim_end_matches('\n'));
        assert!(lines[1].contains("\"gen_request\""));
        assert!(lines[2].contains("\"gen_done\""));
    }

    #[tokio::test]
    async fn escapes_commas_and_quotes_in_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("access.csv");
        let logger = AccessLogger::new(&path);

        logger
            .append("rejected", "alice:WRONG", "", "Denied", "None", -1, "Authentication failed")
            .await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let data_line = contents.lines().nth(1).unwrap();
        assert!(data_line.contains("\"alice:WRONG\""));
        assert!(data_line.contains("\"Authentication failed\""));
        assert!(data_line.contains(",-1,"));
    }

    #[tokio::test]
    async fn does_not_rewrite_header_when_file_already_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("access.csv");
        let logger_a = AccessLogger::new(&path);
        logger_a
            .append("gen_request", "u", "", "Authorized", "a", 1, "")
            .await;

        let logger_b = AccessLogger::new(&path);
        logger_b
            .append("gen_done", "u", "", "Authorized", "a", 0, "")
            .await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.matches("time_stamp").count(), 1);
    }
}
