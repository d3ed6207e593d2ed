//! Process-wide session state shared by every component.

use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use diaglink_core::{AppIdentity, InitGate, RemoteStatus, ServiceHandle};
use tokio::sync::watch;
use uuid::Uuid;

/// Binding lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live binding.
    Unbound,
    /// A bind request is in flight.
    Binding,
    /// Bound, waiting for the companion's `INIT`.
    Bound,
    /// Handshake completed.
    Ready,
    /// No trusted companion on this host.
    Unavailable,
}

struct Binding {
    generation: u64,
    service: Arc<dyn ServiceHandle>,
}

/// Session state.
///
/// Created once per process and shared through an `Arc`. The service handle
/// and the status snapshot are the only values written from more than one
/// context; both are replaced wholesale.
pub struct Session {
    id: Uuid,
    identity: AppIdentity,
    gate: InitGate,
    status: RwLock<Arc<RemoteStatus>>,
    available: AtomicBool,
    binding: RwLock<Option<Binding>>,
    next_generation: AtomicU64,
    state: watch::Sender<ConnectionState>,
}

impl Session {
    #[must_use]
    pub fn new(identity: AppIdentity) -> Self {
        let (state, _) = watch::channel(ConnectionState::Unbound);
        Self {
            id: Uuid::new_v4(),
            identity,
            gate: InitGate::new(),
            status: RwLock::new(Arc::new(RemoteStatus::unavailable())),
            available: AtomicBool::new(false),
            binding: RwLock::new(None),
            next_generation: AtomicU64::new(1),
            state,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    #[must_use]
    pub const fn gate(&self) -> &InitGate {
        &self.gate
    }

    /// Last-known status snapshot.
    #[must_use]
    pub fn status(&self) -> Arc<RemoteStatus> {
        Arc::clone(&self.status.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the snapshot, returning the stored value.
    pub fn replace_status(&self, status: RemoteStatus) -> Arc<RemoteStatus> {
        let status = Arc::new(status);
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&status);
        status
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// The live service handle, if bound.
    #[must_use]
    pub fn service_handle(&self) -> Option<Arc<dyn ServiceHandle>> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|b| Arc::clone(&b.service))
    }

    /// Store a freshly bound handle and return its generation.
    pub fn attach(&self, service: Arc<dyn ServiceHandle>) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        *self.binding.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Binding { generation, service });
        generation
    }

    /// Whether `generation` is the live binding.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|b| b.generation == generation)
    }

    /// Drop the handle if it still belongs to `generation`.
    pub fn detach(&self, generation: u64) -> bool {
        let mut binding = self.binding.write().unwrap_or_else(PoisonError::into_inner);
        if binding.as_ref().is_some_and(|b| b.generation == generation) {
            *binding = None;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(session = %self.id, ?previous, ?state, "Connection state changed");
        }
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}
