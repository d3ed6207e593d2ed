//! Unix domain socket connector.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use diaglink_core::{
    ConnectError, ConnectorSignal, HandshakeRequest, OutboundEvent, ServiceConnector,
    ServiceError, ServiceHandle, SignalSender,
};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        UnixStream,
        unix::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};

use crate::protocol::{ClientFrame, ServerFrame, decode_line, encode_line};

/// Transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<TransportError> for ServiceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(e)
                if matches!(
                    e.kind(),
                    ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::NotConnected
                ) =>
            {
                Self::Disconnected
            }
            TransportError::Io(e) => Self::Io(e),
            TransportError::Encode(e) => Self::Remote(e.to_string()),
        }
    }
}

/// Where the companion listens by default.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("diaglink")
        .join("companion.sock")
}

/// Binds by connecting to the companion's socket.
#[derive(Debug, Clone)]
pub struct SocketConnector {
    path: PathBuf,
}

impl Default for SocketConnector {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl SocketConnector {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ServiceConnector for SocketConnector {
    async fn connect(&self, signals: SignalSender) -> Result<Arc<dyn ServiceHandle>, ConnectError> {
        let stream = UnixStream::connect(&self.path).await.map_err(|e| {
            if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused) {
                ConnectError::NotFound(self.path.display().to_string())
            } else {
                ConnectError::Io(e)
            }
        })?;
        tracing::debug!(path = %self.path.display(), "Connected to companion socket");

        let (read, write) = stream.into_split();
        tokio::spawn(read_loop(BufReader::new(read), signals));

        Ok(Arc::new(SocketHandle {
            writer: Mutex::new(write),
        }))
    }
}

/// Forward server frames until the socket closes, then report the loss.
///
/// Lines that are not valid UTF-8 are dropped like any other malformed frame.
async fn read_loop(mut reader: BufReader<OwnedReadHalf>, signals: SignalSender) {
    let mut bytes = Vec::new();
    loop {
        bytes.clear();
        match reader.read_until(b'\n', &mut bytes).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Companion socket read failed: {e}");
                break;
            }
        }

        let Ok(line) = std::str::from_utf8(&bytes) else {
            tracing::warn!("Ignoring companion frame that is not valid UTF-8");
            continue;
        };
        match decode_line::<ServerFrame>(line) {
            Ok(ServerFrame::Event { envelope }) => {
                if signals.send(ConnectorSignal::Event(envelope)).is_err() {
                    return;
                }
            }
            Ok(ServerFrame::Error { message }) => {
                tracing::warn!("Companion reported an error: {message}");
            }
            Err(e) => tracing::warn!("Ignoring malformed companion frame: {e}"),
        }
    }

    tracing::debug!("Companion socket closed");
    let _ = signals.send(ConnectorSignal::Disconnected);
}

/// Write side of a companion connection.
pub struct SocketHandle {
    writer: Mutex<OwnedWriteHalf>,
}

impl SocketHandle {
    async fn send_frame(&self, frame: &ClientFrame) -> Result<(), TransportError> {
        let line = encode_line(frame)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceHandle for SocketHandle {
    async fn init(&self, request: HandshakeRequest) -> Result<(), ServiceError> {
        Ok(self.send_frame(&ClientFrame::Init { request }).await?)
    }

    async fn send_event(&self, package: &str, event: OutboundEvent) -> Result<(), ServiceError> {
        let frame = ClientFrame::Event {
            package: package.to_string(),
            event,
        };
        Ok(self.send_frame(&frame).await?)
    }
}
