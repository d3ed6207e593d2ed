//! Traits at the seams between the client and its platform collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::event::{EventEnvelope, HandshakeRequest, OutboundEvent, PendingUpdate, RemoteStatus};

/// Failure of a call into a live service handle.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service disconnected")]
    Disconnected,
    #[error("Remote call failed: {0}")]
    Remote(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Live capability reference into the companion.
///
/// Owned by the connection manager; other components only borrow it for the
/// duration of a call.
#[async_trait]
pub trait ServiceHandle: Send + Sync {
    /// Perform the handshake. The companion answers with an `INIT` event.
    async fn init(&self, request: HandshakeRequest) -> Result<(), ServiceError>;

    /// Send an event on behalf of `package`.
    async fn send_event(&self, package: &str, event: OutboundEvent) -> Result<(), ServiceError>;
}

/// Notification produced by a connector on its delivery context.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorSignal {
    /// An inbound event from the companion.
    Event(EventEnvelope),
    /// The binding was lost.
    Disconnected,
}

/// Channel a connector delivers signals through, in arrival order.
pub type SignalSender = mpsc::UnboundedSender<ConnectorSignal>;

/// Bind failure.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Companion not found: {0}")]
    NotFound(String),
    #[error("Bind rejected: {0}")]
    Rejected(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform mechanism that attaches to the companion.
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    /// Attach to the companion.
    ///
    /// Inbound events and the eventual disconnection must be delivered
    /// through `signals`.
    async fn connect(&self, signals: SignalSender) -> Result<Arc<dyn ServiceHandle>, ConnectError>;
}

/// A system-wide notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSignal {
    pub action: String,
}

impl SystemSignal {
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

/// Platform broadcast channel.
pub trait SystemEventSource: Send + Sync {
    /// Register for signals whose action equals `action`.
    fn subscribe(&self, action: &str) -> mpsc::UnboundedReceiver<SystemSignal>;
}

/// Failure to obtain the companion's signing credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Companion is not installed")]
    NotInstalled,
    #[error("Credential unreadable: {0}")]
    Unreadable(String),
}

/// Source of the companion installation's signing credential.
pub trait CredentialSource: Send + Sync {
    /// Raw credential bytes the fingerprint is computed over.
    ///
    /// # Errors
    /// Returns error if the companion is absent or its credential cannot be read.
    fn companion_credential(&self) -> Result<Vec<u8>, CredentialError>;
}

/// Host callbacks.
///
/// Always invoked on the host's callback context, one at a time, in the
/// order the triggering events arrived.
pub trait Observer: Send + Sync {
    /// The handshake settled. `available` is `false` when no trusted
    /// companion was found.
    fn on_initialized(&self, _available: bool) {}

    /// A fresh status snapshot arrived.
    fn on_status_changed(&self, _status: &RemoteStatus) {}

    /// The companion announced a new build.
    fn on_update_available(&self, _update: &PendingUpdate) {}
}
