//! Host-facing client.

use std::sync::{Arc, Weak};

use diaglink_core::{
    AppIdentity, CredentialSource, Observer, RemoteStatus, ServiceConnector, SystemEventSource,
};
use diaglink_logcat::{CaptureProvider, CommandBuilder, CommandCapture, LogRelay};
use thiserror::Error;
use tokio::runtime::Handle;

use crate::{
    callback::{CallbackExecutor, SerialExecutor},
    config::ClientConfig,
    crash::{self, CrashReporter},
    manager::{Collaborators, ConnectionManager},
    session::{ConnectionState, Session},
    trust::{FileCredentialSource, TrustVerifier},
};

/// Client construction error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("No tokio runtime available")]
    NoRuntime,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builder for [`DiagLink`].
pub struct DiagLinkBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn ServiceConnector>>,
    events: Option<Arc<dyn SystemEventSource>>,
    credentials: Option<Arc<dyn CredentialSource>>,
    capture: Option<Arc<dyn CaptureProvider>>,
    callbacks: Option<Arc<dyn CallbackExecutor>>,
    runtime: Option<Handle>,
}

impl DiagLinkBuilder {
    #[must_use]
    pub const fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connector: None,
            events: None,
            credentials: None,
            capture: None,
            callbacks: None,
            runtime: None,
        }
    }

    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn ServiceConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn SystemEventSource>) -> Self {
        self.events = Some(events);
        self
    }

    /// Override where the companion credential comes from.
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the log capture source.
    #[must_use]
    pub fn capture(mut self, capture: Arc<dyn CaptureProvider>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Override where observer callbacks run.
    #[must_use]
    pub fn callbacks(mut self, callbacks: Arc<dyn CallbackExecutor>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// Runtime background tasks are spawned on. Defaults to the current one.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the client. Nothing is connected until [`DiagLink::install`].
    ///
    /// # Errors
    /// Returns error if the connector or event source is missing, no
    /// runtime is available, or the callback thread cannot be started.
    pub fn build(self) -> Result<DiagLink, ClientError> {
        let Self {
            config,
            connector,
            events,
            credentials,
            capture,
            callbacks,
            runtime,
        } = self;

        let connector = connector.ok_or(ClientError::MissingCollaborator("connector"))?;
        let events = events.ok_or(ClientError::MissingCollaborator("events"))?;
        let runtime = match runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| ClientError::NoRuntime)?,
        };
        let credentials = credentials.unwrap_or_else(|| {
            Arc::new(FileCredentialSource::new(config.trust.credential_path()))
        });
        let capture = capture.unwrap_or_else(|| {
            let command = CommandBuilder::new(config.log_relay.command.clone())
                .with_args(config.log_relay.filters.iter().cloned());
            Arc::new(CommandCapture::new(command))
        });
        let callbacks = match callbacks {
            Some(callbacks) => callbacks,
            None => Arc::new(SerialExecutor::spawn()?),
        };

        let identity = AppIdentity::with_metadata(config.package.clone(), config.metadata.clone());
        let session = Arc::new(Session::new(identity));
        let relay = Arc::new(LogRelay::new(config.package.clone(), capture));
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(&session),
            Collaborators {
                connector,
                events,
                trust: TrustVerifier::new(credentials, &config.trust.fingerprints),
                relay,
                callbacks,
            },
            config.log_relay.enabled,
            config.crash_report_timeout(),
            runtime,
        ));

        Ok(DiagLink {
            config,
            session,
            manager,
        })
    }
}

/// Connection between a host application and the diagnostic companion.
///
/// Status accessors block the calling thread until the companion has
/// answered the handshake (or was found to be absent). Do not call them
/// from inside an async task; use the `_async` variants there.
pub struct DiagLink {
    config: ClientConfig,
    session: Arc<Session>,
    manager: Arc<ConnectionManager>,
}

impl DiagLink {
    #[must_use]
    pub const fn builder(config: ClientConfig) -> DiagLinkBuilder {
        DiagLinkBuilder::new(config)
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Start the connection. Later calls are ignored.
    ///
    /// With crash reporting enabled, the first install also puts the crash
    /// hook in front of the process panic hook.
    pub fn install(&self, observer: Option<Arc<dyn Observer>>) -> bool {
        if !self.manager.install(observer) {
            return false;
        }
        if self.config.crash_reporting {
            let reporter = Arc::downgrade(&self.manager);
            let reporter: Weak<dyn CrashReporter> = reporter;
            if !crash::install(reporter) {
                tracing::debug!("Crash hook already installed by another client");
            }
        }
        true
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.manager.is_installed()
    }

    /// Whether the handshake has settled. Never blocks.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.gate().is_released()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Whether a trusted companion answered the handshake.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.wait_initialized() && self.session.is_available()
    }

    /// Latest status snapshot.
    #[must_use]
    pub fn remote_status(&self) -> Arc<RemoteStatus> {
        if self.wait_initialized() {
            self.session.status()
        } else {
            Arc::new(RemoteStatus::unavailable())
        }
    }

    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.remote_status().is_managed
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.remote_status().is_authorized
    }

    #[must_use]
    pub fn login_username(&self) -> Option<String> {
        self.remote_status().login_username.clone()
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.remote_status().is_stop_requested
    }

    pub async fn is_available_async(&self) -> bool {
        self.wait_initialized_async().await && self.session.is_available()
    }

    pub async fn remote_status_async(&self) -> Arc<RemoteStatus> {
        if self.wait_initialized_async().await {
            self.session.status()
        } else {
            Arc::new(RemoteStatus::unavailable())
        }
    }

    // Before install the gate would never open.
    fn wait_initialized(&self) -> bool {
        if !self.manager.is_installed() {
            return false;
        }
        self.session.gate().wait();
        true
    }

    async fn wait_initialized_async(&self) -> bool {
        if !self.manager.is_installed() {
            return false;
        }
        self.session.gate().wait_async().await;
        true
    }
}
