//! Line-oriented log capture sources.

use std::{io, process::Stdio};

use async_trait::async_trait;
use command_group::{AsyncCommandGroup, AsyncGroupChild};
use futures::FutureExt;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::command::{CommandBuildError, CommandBuilder};

/// Capture startup error.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Command build error: {0}")]
    Command(#[from] CommandBuildError),
    #[error("Spawn failed: {0}")]
    SpawnFailed(#[source] io::Error),
    #[error("Capture process has no stdout")]
    NoStdout,
}

/// A captured log stream.
///
/// Wraps the capture process (when there is one) and a buffered reader over
/// its output. The stream is drained once the buffer is empty and the
/// underlying source has nothing more ready without waiting.
pub struct LogCapture {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    partial: Vec<u8>,
    child: Option<AsyncGroupChild>,
}

impl LogCapture {
    /// Capture from an arbitrary reader, with no process attached.
    #[must_use]
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: BufReader::new(Box::new(reader)),
            partial: Vec::new(),
            child: None,
        }
    }

    /// Spawn the capture command as its own process group.
    ///
    /// # Errors
    /// Returns error if the command is invalid, cannot be found or fails to spawn.
    pub async fn spawn(command: &CommandBuilder) -> Result<Self, CaptureError> {
        let (program, args) = command.build()?.into_resolved().await?;

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.group_spawn().map_err(CaptureError::SpawnFailed)?;
        let Some(stdout) = child.inner().stdout.take() else {
            if let Err(e) = child.kill().await {
                tracing::debug!("Failed to kill capture process without stdout: {e}");
            }
            return Err(CaptureError::NoStdout);
        };

        tracing::debug!(program = %program.display(), ?args, "Spawned log capture process");
        Ok(Self {
            reader: BufReader::new(Box::new(stdout)),
            partial: Vec::new(),
            child: Some(child),
        })
    }

    /// Read one line, including its terminator, into `line`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Returns `Ok(0)` at end
    /// of stream. Cancel safe: bytes of an interrupted line are kept for the
    /// next call.
    ///
    /// # Errors
    /// Returns error if the underlying stream fails.
    pub async fn read_line(&mut self, line: &mut String) -> io::Result<usize> {
        self.reader.read_until(b'\n', &mut self.partial).await?;
        let read = self.partial.len();
        line.push_str(&String::from_utf8_lossy(&self.partial));
        self.partial.clear();
        Ok(read)
    }

    /// Whether no further data is available without waiting.
    ///
    /// Refills the buffer once if it is empty, so a burst larger than the
    /// buffer is not split into several batches. End of stream counts as
    /// drained.
    pub fn is_drained(&mut self) -> bool {
        if !self.reader.buffer().is_empty() {
            return false;
        }
        match tokio::task::unconstrained(self.reader.fill_buf()).now_or_never() {
            Some(Ok(buf)) => buf.is_empty(),
            Some(Err(_)) | None => true,
        }
    }

    /// Kill the capture process, if any. Idempotent.
    pub async fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!("Capture process already gone: {e}");
            }
        }
    }
}

/// Opens a fresh capture for each relay worker.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Open the capture stream.
    async fn open(&self) -> Result<LogCapture, CaptureError>;

    /// Whether this host can capture at all. Reported to the companion
    /// during the handshake.
    async fn is_supported(&self) -> bool {
        true
    }
}

/// Captures the output of an external command.
#[derive(Debug, Clone, Default)]
pub struct CommandCapture {
    command: CommandBuilder,
}

impl CommandCapture {
    #[must_use]
    pub const fn new(command: CommandBuilder) -> Self {
        Self { command }
    }
}

#[async_trait]
impl CaptureProvider for CommandCapture {
    async fn open(&self) -> Result<LogCapture, CaptureError> {
        LogCapture::spawn(&self.command).await
    }

    async fn is_supported(&self) -> bool {
        match self.command.build() {
            Ok(parts) => parts.into_resolved().await.is_ok(),
            Err(_) => false,
        }
    }
}
