//! Failure log sinks.
//!
//! Every failed delivery is appended as one timestamped line:
//!
//! ```text
//! [2024-03-14 09:30:00] user@example.com: RCPT TO failed with 550: No such user
//! ```

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

/// One failed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    /// When the failure was recorded.
    pub at: DateTime<Local>,
    /// Recipient as given by the caller, on one line.
    pub recipient: String,
    /// What failed.
    pub message: String,
}

impl FailureEntry {
    /// Creates an entry stamped with the current local time.
    ///
    /// Line breaks in either field become spaces, so a caller-supplied
    /// recipient cannot start a new log line.
    #[must_use]
    pub fn now(recipient: &str, message: &str) -> Self {
        Self {
            at: Local::now(),
            recipient: single_line(recipient),
            message: single_line(message),
        }
    }
}

/// Replaces CR and LF with spaces.
pub(crate) fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

impl fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.recipient,
            self.message
        )
    }
}

/// Destination for failure entries.
///
/// Recording never fails the delivery; sinks report their own I/O problems
/// through `tracing`.
pub trait FailureLog: Send + Sync {
    /// Appends `entry`.
    fn record(&self, entry: &FailureEntry) -> impl Future<Output = ()> + Send;
}

/// Appends entries to a text file, creating it and its parent directories
/// on first use.
#[derive(Debug, Clone)]
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    /// Creates a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

impl FailureLog for FileLog {
    async fn record(&self, entry: &FailureEntry) {
        let line = format!("{entry}\n");
        if let Err(e) = self.append(&line).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write mail log");
        }
    }
}

/// Keeps entries in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<FailureEntry>>>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<FailureEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the recorded entries rendered as log lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }
}

impl FailureLog for MemoryLog {
    async fn record(&self, entry: &FailureEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}
