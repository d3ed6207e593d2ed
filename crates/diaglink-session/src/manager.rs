//! Connection lifecycle to the companion service.

use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use diaglink_core::{
    ConnectorSignal, CrashReport, Observer, OutboundEvent, RemoteStatus,
    ServiceConnector, ServiceHandle, SystemEventSource,
};
use diaglink_logcat::LogRelay;
use tokio::{runtime::Handle, sync::mpsc};

use crate::{
    callback::{CallbackExecutor, Notifier},
    crash::CrashReporter,
    dispatch::EventDispatcher,
    session::{ConnectionState, Session},
    trust::TrustVerifier,
};

/// System signal emitted when the companion process starts.
pub const ACTION_COMPANION_STARTED: &str = "diaglink.action.CompanionStarted";

/// Platform collaborators the manager drives.
pub struct Collaborators {
    pub connector: Arc<dyn ServiceConnector>,
    pub events: Arc<dyn SystemEventSource>,
    pub trust: TrustVerifier,
    pub relay: Arc<LogRelay>,
    pub callbacks: Arc<dyn CallbackExecutor>,
}

/// Owns the binding to the companion.
///
/// Binds once at install when the companion is trusted, and again on every
/// "companion started" signal. Retries are never scheduled on its own.
pub struct ConnectionManager {
    session: Arc<Session>,
    connector: Arc<dyn ServiceConnector>,
    events: Arc<dyn SystemEventSource>,
    trust: Arc<TrustVerifier>,
    relay: Arc<LogRelay>,
    callbacks: Arc<dyn CallbackExecutor>,
    log_relay_enabled: bool,
    crash_report_timeout: Duration,
    runtime: Handle,
    installed: AtomicBool,
    dispatcher: OnceLock<Arc<EventDispatcher>>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(
        session: Arc<Session>,
        collaborators: Collaborators,
        log_relay_enabled: bool,
        crash_report_timeout: Duration,
        runtime: Handle,
    ) -> Self {
        let Collaborators {
            connector,
            events,
            trust,
            relay,
            callbacks,
        } = collaborators;

        Self {
            session,
            connector,
            events,
            trust: Arc::new(trust),
            relay,
            callbacks,
            log_relay_enabled,
            crash_report_timeout,
            runtime,
            installed: AtomicBool::new(false),
            dispatcher: OnceLock::new(),
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Install the manager. Only the first call has any effect.
    ///
    /// Subscribes to the "companion started" signal, then either starts an
    /// asynchronous bind or, when no trusted companion exists, settles the
    /// session as unavailable right away.
    pub fn install(self: &Arc<Self>, observer: Option<Arc<dyn Observer>>) -> bool {
        if self.installed.swap(true, Ordering::AcqRel) {
            tracing::debug!(session = %self.session.id(), "Already installed");
            return false;
        }

        let notifier = Notifier::new(Arc::clone(&self.callbacks), observer);
        let dispatcher = self.dispatcher.get_or_init(|| {
            Arc::new(EventDispatcher::new(
                Arc::clone(&self.session),
                Arc::clone(&self.relay),
                notifier,
            ))
        });

        self.watch_system_events();

        if self.trust.is_available() {
            tracing::info!(package = %self.session.identity().package, "Companion installation detected, initializing");
            let manager = Arc::clone(self);
            self.runtime.spawn(async move { manager.bind(false).await });
        } else {
            tracing::info!("Companion is not available on this host");
            self.session.set_available(false);
            self.session.replace_status(RemoteStatus::unavailable());
            self.session.set_state(ConnectionState::Unavailable);
            dispatcher
                .notifier()
                .post(|observer| observer.on_initialized(false));
            self.session.gate().release();
        }
        true
    }

    fn watch_system_events(self: &Arc<Self>) {
        let mut signals = self.events.subscribe(ACTION_COMPANION_STARTED);
        let manager = Arc::downgrade(self);
        self.runtime.spawn(async move {
            while let Some(signal) = signals.recv().await {
                if signal.action != ACTION_COMPANION_STARTED {
                    continue;
                }
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.on_companion_started().await;
            }
        });
    }

    async fn on_companion_started(self: &Arc<Self>) {
        if self.is_trusted().await {
            tracing::info!("Companion started, rebinding");
            self.bind(true).await;
        } else {
            tracing::debug!("Companion started but is not trusted");
        }
    }

    /// Check trust off the runtime; reading the credential may block.
    async fn is_trusted(&self) -> bool {
        let trust = Arc::clone(&self.trust);
        match tokio::task::spawn_blocking(move || trust.is_available()).await {
            Ok(trusted) => trusted,
            Err(e) => {
                tracing::warn!("Trust check failed: {e}");
                false
            }
        }
    }

    /// Attach to the companion and perform the handshake.
    ///
    /// A connector failure leaves any earlier binding in place, or the
    /// session unbound if there is none; the next "companion started"
    /// signal is the only retry.
    pub async fn bind(self: &Arc<Self>, is_reconnect: bool) {
        let previous = self.session.state();
        self.session.set_state(ConnectionState::Binding);

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let service = match self.connector.connect(signals_tx).await {
            Ok(service) => service,
            Err(e) => {
                tracing::warn!("Failed to bind to companion service: {e}");
                let state = if self.session.service_handle().is_some() {
                    previous
                } else {
                    ConnectionState::Unbound
                };
                self.session.set_state(state);
                return;
            }
        };

        let generation = self.session.attach(Arc::clone(&service));
        self.session.set_state(ConnectionState::Bound);
        tracing::info!(generation, is_reconnect, "Companion service connected");

        let manager = Arc::clone(self);
        self.runtime
            .spawn(async move { manager.deliver(generation, signals_rx).await });

        let can_logcat = self.can_relay_logs().await;
        let request = self.session.identity().handshake(!is_reconnect, can_logcat);
        if let Err(e) = service.init(request).await {
            tracing::warn!(generation, "Companion service failed to be initialized: {e}");
        }
    }

    async fn can_relay_logs(&self) -> bool {
        self.log_relay_enabled && self.relay.is_supported().await
    }

    async fn deliver(
        self: Arc<Self>,
        generation: u64,
        mut signals: mpsc::UnboundedReceiver<ConnectorSignal>,
    ) {
        while let Some(signal) = signals.recv().await {
            match signal {
                ConnectorSignal::Event(_) if !self.session.is_current(generation) => {
                    tracing::debug!(generation, "Ignoring event from superseded binding");
                }
                ConnectorSignal::Event(envelope) => match self.dispatcher.get() {
                    Some(dispatcher) => dispatcher.dispatch(&envelope),
                    None => tracing::error!("Event delivered before install"),
                },
                ConnectorSignal::Disconnected => break,
            }
        }
        self.on_disconnected(generation);
    }

    fn on_disconnected(&self, generation: u64) {
        if !self.session.detach(generation) {
            tracing::debug!(generation, "Ignoring disconnect from superseded binding");
            return;
        }
        tracing::info!(generation, "Companion service disconnected");
        self.relay.disable();
        self.session.set_state(ConnectionState::Unbound);
    }

    /// Send a crash report if a service handle is live.
    ///
    /// Returns whether the report was delivered.
    pub async fn send_crash_report(&self, report: CrashReport) -> bool {
        let Some(service) = self.session.service_handle() else {
            tracing::debug!("No companion service, dropping crash report");
            return false;
        };
        send_crash_report(service.as_ref(), &self.session.identity().package, report).await
    }
}

impl CrashReporter for ConnectionManager {
    fn report_crash(&self, report: CrashReport) {
        let Some(service) = self.session.service_handle() else {
            tracing::debug!("No companion service, dropping crash report");
            return;
        };
        let package = self.session.identity().package.clone();
        let timeout = self.crash_report_timeout;

        // The panicking thread may be a runtime worker, so deliver from a
        // fresh thread with its own runtime.
        let sender = std::thread::Builder::new()
            .name("diaglink-crash-report".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::warn!("Failed to start crash report runtime: {e}");
                        return;
                    }
                };
                let delivered = runtime.block_on(async {
                    tokio::time::timeout(
                        timeout,
                        send_crash_report(service.as_ref(), &package, report),
                    )
                    .await
                });
                if delivered.is_err() {
                    tracing::warn!("Timed out sending crash report");
                }
            });

        match sender {
            Ok(sender) => {
                if sender.join().is_err() {
                    tracing::warn!("Crash report thread panicked");
                }
            }
            Err(e) => tracing::warn!("Failed to spawn crash report thread: {e}"),
        }
    }
}

async fn send_crash_report(service: &dyn ServiceHandle, package: &str, report: CrashReport) -> bool {
    match service
        .send_event(package, OutboundEvent::SendCrashReport { report })
        .await
    {
        Ok(()) => {
            tracing::debug!("Crash report sent");
            true
        }
        Err(e) => {
            tracing::warn!("Failed to send crash report: {e}");
            false
        }
    }
}
