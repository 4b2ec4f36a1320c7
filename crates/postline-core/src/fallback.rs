//! Local submission through `sendmail`.
//!
//! Used when no SMTP relay is configured at all. The rendered message is
//! written to the program's stdin and its exit status decides the outcome.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Longest stderr excerpt kept in an error.
const STDERR_LIMIT: usize = 200;

/// Local submission failure.
#[derive(Debug, thiserror::Error)]
pub enum SendmailError {
    /// The program could not be started.
    #[error("cannot run {program}: {source}")]
    Spawn {
        /// Program path.
        program: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the message or waiting for the program failed.
    #[error("I/O error talking to sendmail: {0}")]
    Io(#[from] std::io::Error),

    /// The program exited unsuccessfully.
    #[error("sendmail exited with {status}{}", stderr_suffix(.stderr))]
    Exit {
        /// Exit status.
        status: ExitStatus,
        /// Trimmed start of stderr.
        stderr: String,
    },

    /// The program did not finish in time and was killed.
    #[error("sendmail timed out after {0:?}")]
    Timeout(Duration),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// A local submission program invocation.
#[derive(Debug, Clone)]
pub struct Sendmail {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl Sendmail {
    /// Invokes `program -t -i`: recipients from the headers, lone dots
    /// are not end-of-input.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_args(program, ["-t", "-i"])
    }

    /// Invokes `program` with custom arguments.
    #[must_use]
    pub fn with_args<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets how long to wait for the program.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Pipes `message` to the program and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, times out, or
    /// exits with a non-zero status.
    pub async fn send(&self, message: &[u8]) -> Result<(), SendmailError> {
        tracing::debug!(program = %self.program.display(), args = ?self.args, "Handing message to sendmail");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SendmailError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let write = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(message).await,
                None => Ok(()),
            }
        };

        // Writing and waiting run together under one timeout, so a program
        // that never drains its stdin cannot stall past the deadline. The
        // child is killed when the timed-out future drops it.
        let (write_result, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(write, child.wait_with_output())
        })
        .await
        .map_err(|_| SendmailError::Timeout(self.timeout))?;
        let output = output?;

        // A non-zero exit explains a broken pipe better than the pipe error.
        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .trim()
                .chars()
                .take(STDERR_LIMIT)
                .collect();
            return Err(SendmailError::Exit {
                status: output.status,
                stderr,
            });
        }
        write_result?;

        Ok(())
    }
}
