//! Append-only text log of verification events.
//!
//! Every event becomes one line: `<RFC3339 UTC timestamp> - <message>`.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use mysql_pg_verify::VerifyEvent;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Render one log line, newline included.
pub fn format_line(at: DateTime<Utc>, message: &str) -> String {
    format!(
        "{} - {}\n",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        message
    )
}

/// Log file opened in append mode.
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append one line and flush it.
    pub async fn write(&mut self, message: &str) -> io::Result<()> {
        self.file
            .write_all(format_line(Utc::now(), message).as_bytes())
            .await?;
        self.file.flush().await
    }

    /// Drain `rx` until every sender is dropped. Returns the number of
    /// lines written.
    pub fn spawn(mut self, mut rx: mpsc::Receiver<VerifyEvent>) -> JoinHandle<io::Result<usize>> {
        tokio::spawn(async move {
            let mut lines = 0;
            while let Some(event) = rx.recv().await {
                if let Err(e) = self.write(&event.to_string()).await {
                    warn!("Cannot write to log file {:?}: {}", self.path, e);
                    return Err(e);
                }
                lines += 1;
            }
            Ok(lines)
        })
    }
}

/// Consume events without writing them anywhere.
pub fn discard(mut rx: mpsc::Receiver<VerifyEvent>) -> JoinHandle<io::Result<usize>> {
    tokio::spawn(async move {
        let mut seen = 0;
        while rx.recv().await.is_some() {
            seen += 1;
        }
        Ok(seen)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mysql_pg_verify::MismatchReport;

    #[test]
    fn test_line_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(
            format_line(at, "orders: check started"),
            "2024-01-01T10:00:00.000Z - orders: check started\n"
        );
    }

    #[tokio::test]
    async fn test_events_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_check_log.txt");
        std::fs::write(&path, "previous run\n").unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = LogSink::open(&path).await.unwrap().spawn(rx);
        tx.send(VerifyEvent::RowCounts {
            table: "orders".into(),
            source: 5,
            target: 6,
        })
        .await
        .unwrap();
        tx.send(VerifyEvent::TableFinished {
            report: MismatchReport::mismatch("orders", "row count differs"),
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap().unwrap(), 2);
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].ends_with(" - orders: MySQL row count - 5, PostgreSQL row count - 6"));
        assert!(lines[2].ends_with(" - orders: table does not match - reason: row count differs"));
    }

    #[tokio::test]
    async fn test_write_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new_log.txt");

        let mut sink = LogSink::open(&path).await.unwrap();
        sink.write("Configuration fingerprint: abc").await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.ends_with(" - Configuration fingerprint: abc\n"));
    }

    #[tokio::test]
    async fn test_discard_drains_channel() {
        let (tx, rx) = mpsc::channel(1);
        let handle = discard(rx);
        tx.send(VerifyEvent::TableStarted { table: "a".into() })
            .await
            .unwrap();
        drop(tx);
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }
}
