//! Inbound event dispatch.

use std::sync::Arc;

use diaglink_core::{EventEnvelope, InboundEvent, PendingUpdate, RemoteStatus};
use diaglink_logcat::LogRelay;

use crate::{
    callback::Notifier,
    session::{ConnectionState, Session},
};

/// Routes decoded companion events to their handlers.
///
/// Runs on the connector's delivery context. Observer notifications are
/// queued on the callback context and never awaited here.
pub struct EventDispatcher {
    session: Arc<Session>,
    relay: Arc<LogRelay>,
    notifier: Notifier,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(session: Arc<Session>, relay: Arc<LogRelay>, notifier: Notifier) -> Self {
        Self {
            session,
            relay,
            notifier,
        }
    }

    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Handle one inbound envelope.
    pub fn dispatch(&self, envelope: &EventEnvelope) {
        let Some(event) = InboundEvent::decode(envelope) else {
            tracing::debug!(action = %envelope.action, "Ignoring unknown companion event");
            return;
        };

        match event {
            InboundEvent::Init(status) => self.on_initialized(status),
            InboundEvent::UpdateAvailable(update) => self.on_update_available(update),
            InboundEvent::EnableLogcat => self.on_logcat_toggled(true),
            InboundEvent::DisableLogcat => self.on_logcat_toggled(false),
        }
    }

    fn on_initialized(&self, status: RemoteStatus) {
        tracing::info!(
            session = %self.session.id(),
            is_managed = status.is_managed,
            is_authorized = status.is_authorized,
            "Companion service initialized"
        );
        let status = self.session.replace_status(status);

        self.notifier.post(move |observer| {
            observer.on_initialized(true);
            observer.on_status_changed(&status);
        });

        self.session.set_available(true);
        self.session.set_state(ConnectionState::Ready);
        self.session.gate().release();
    }

    fn on_update_available(&self, update: PendingUpdate) {
        tracing::debug!(
            serial = update.serial,
            version_code = update.version_code,
            "Update available"
        );
        self.notifier
            .post(move |observer| observer.on_update_available(&update));
    }

    fn on_logcat_toggled(&self, enabled: bool) {
        let Some(service) = self.session.service_handle() else {
            tracing::debug!(enabled, "No companion service, ignoring log relay toggle");
            return;
        };

        if enabled {
            self.relay.enable(&service);
        } else {
            self.relay.disable();
        }
    }
}
