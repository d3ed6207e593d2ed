//! Test doubles for the platform collaborators.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use diaglink_core::{
    ConnectError, ConnectorSignal, CrashReport, CredentialError, CredentialSource, EventEnvelope,
    HandshakeRequest, Observer, OutboundEvent, PendingUpdate, RemoteStatus, ServiceConnector,
    ServiceError, ServiceHandle, SignalSender, SystemEventSource, SystemSignal,
};
use diaglink_logcat::{CaptureError, CaptureProvider, LogCapture};
use tokio::{io::DuplexStream, sync::mpsc};

use crate::callback::{Callback, CallbackExecutor, Notifier};

pub(crate) const TRUSTED_CREDENTIAL: &[u8] = b"abc";
pub(crate) const TRUSTED_FINGERPRINT: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

/// Records handshakes and outbound events.
#[derive(Default)]
pub(crate) struct FakeHandle {
    handshakes: Mutex<Vec<HandshakeRequest>>,
    events: Mutex<Vec<OutboundEvent>>,
    pub fail: AtomicBool,
}

impl FakeHandle {
    pub fn handshakes(&self) -> Vec<HandshakeRequest> {
        self.handshakes.lock().unwrap().clone()
    }

    pub fn crash_reports(&self) -> Vec<CrashReport> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                OutboundEvent::SendCrashReport { report } => Some(report.clone()),
                OutboundEvent::SendLogcat { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ServiceHandle for FakeHandle {
    async fn init(&self, request: HandshakeRequest) -> Result<(), ServiceError> {
        self.handshakes.lock().unwrap().push(request);
        Ok(())
    }

    async fn send_event(&self, _package: &str, event: OutboundEvent) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Disconnected);
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Hands out a fresh `FakeHandle` per bind and keeps each signal channel.
#[derive(Default)]
pub(crate) struct FakeConnector {
    connects: AtomicUsize,
    fail_next: AtomicBool,
    bindings: Mutex<Vec<(Arc<FakeHandle>, SignalSender)>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Handle of the `index`th successful bind.
    pub fn handle(&self, index: usize) -> Option<Arc<FakeHandle>> {
        self.bindings
            .lock()
            .unwrap()
            .get(index)
            .map(|(handle, _)| Arc::clone(handle))
    }

    pub fn emit(&self, index: usize, envelope: EventEnvelope) {
        self.signal(index, ConnectorSignal::Event(envelope));
    }

    pub fn disconnect(&self, index: usize) {
        self.signal(index, ConnectorSignal::Disconnected);
    }

    fn signal(&self, index: usize, signal: ConnectorSignal) {
        let bindings = self.bindings.lock().unwrap();
        let (_, tx) = bindings.get(index).expect("no such binding");
        let _ = tx.send(signal);
    }
}

#[async_trait]
impl ServiceConnector for FakeConnector {
    async fn connect(&self, signals: SignalSender) -> Result<Arc<dyn ServiceHandle>, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ConnectError::Rejected("scripted failure".to_string()));
        }
        let handle = Arc::new(FakeHandle::default());
        self.bindings
            .lock()
            .unwrap()
            .push((Arc::clone(&handle), signals));
        Ok(handle)
    }
}

/// In-memory broadcast channel.
#[derive(Default)]
pub(crate) struct FakeEvents {
    subscribers: Mutex<Vec<(String, mpsc::UnboundedSender<SystemSignal>)>>,
}

impl FakeEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscriptions(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn fire(&self, action: &str) {
        for (filter, tx) in self.subscribers.lock().unwrap().iter() {
            if filter == action {
                let _ = tx.send(SystemSignal::new(action));
            }
        }
    }
}

impl SystemEventSource for FakeEvents {
    fn subscribe(&self, action: &str) -> mpsc::UnboundedReceiver<SystemSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap()
            .push((action.to_string(), tx));
        rx
    }
}

pub(crate) struct FakeCredentials {
    credential: Result<Vec<u8>, bool>,
    delay: Duration,
}

impl FakeCredentials {
    pub fn with(credential: &[u8]) -> Arc<Self> {
        Self::slow(credential, Duration::ZERO)
    }

    /// Blocks the reading thread for `delay` on every read.
    pub fn slow(credential: &[u8], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            credential: Ok(credential.to_vec()),
            delay,
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self {
            credential: Err(false),
            delay: Duration::ZERO,
        })
    }

    pub fn unreadable() -> Arc<Self> {
        Arc::new(Self {
            credential: Err(true),
            delay: Duration::ZERO,
        })
    }
}

impl CredentialSource for FakeCredentials {
    fn companion_credential(&self) -> Result<Vec<u8>, CredentialError> {
        std::thread::sleep(self.delay);
        match &self.credential {
            Ok(bytes) => Ok(bytes.clone()),
            Err(false) => Err(CredentialError::NotInstalled),
            Err(true) => Err(CredentialError::Unreadable("permission denied".to_string())),
        }
    }
}

/// Capture streams that stay open and silent until dropped.
#[derive(Default)]
pub(crate) struct PendingCapture {
    opens: AtomicUsize,
    writers: Mutex<Vec<DuplexStream>>,
}

impl PendingCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureProvider for PendingCapture {
    async fn open(&self) -> Result<LogCapture, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (writer, reader) = tokio::io::duplex(1024);
        self.writers.lock().unwrap().push(writer);
        Ok(LogCapture::from_reader(reader))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notification {
    Initialized(bool),
    StatusChanged(RemoteStatus),
    UpdateAvailable(PendingUpdate),
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingObserver {
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    fn push(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

impl Observer for RecordingObserver {
    fn on_initialized(&self, available: bool) {
        self.push(Notification::Initialized(available));
    }

    fn on_status_changed(&self, status: &RemoteStatus) {
        self.push(Notification::StatusChanged(status.clone()));
    }

    fn on_update_available(&self, update: &PendingUpdate) {
        self.push(Notification::UpdateAvailable(update.clone()));
    }
}

/// Runs callbacks on the posting thread.
struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, callback: Callback) {
        callback();
    }
}

pub(crate) fn inline_executor() -> Arc<dyn CallbackExecutor> {
    Arc::new(InlineExecutor)
}

pub(crate) fn inline_notifier(observer: Arc<dyn Observer>) -> Notifier {
    Notifier::new(inline_executor(), Some(observer))
}

pub(crate) async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
