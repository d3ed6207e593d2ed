//! Collaborators shared by the crash hook test binaries.

#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use diaglink_core::{
    ConnectError, CrashReport, CredentialError, CredentialSource, HandshakeRequest,
    OutboundEvent, ServiceConnector, ServiceError, ServiceHandle, SignalSender,
    SystemEventSource, SystemSignal,
};
use diaglink_session::{ClientConfig, DiagLink, TrustConfig};
use tokio::sync::mpsc;

/// Collects crash reports, optionally slowly or not at all.
#[derive(Default)]
pub struct ReportSink {
    pub reports: Mutex<Vec<CrashReport>>,
    pub delay_ms: AtomicU64,
    pub fail: AtomicBool,
}

impl ReportSink {
    pub fn reports(&self) -> Vec<CrashReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceHandle for ReportSink {
    async fn init(&self, _request: HandshakeRequest) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn send_event(&self, _package: &str, event: OutboundEvent) -> Result<(), ServiceError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Remote("rejected".to_string()));
        }
        if let OutboundEvent::SendCrashReport { report } = event {
            self.reports.lock().unwrap().push(report);
        }
        Ok(())
    }
}

/// Always binds to the same sink.
#[derive(Default)]
pub struct SingleConnector {
    pub sink: Arc<ReportSink>,
    pub signals: Mutex<Option<SignalSender>>,
}

#[async_trait]
impl ServiceConnector for SingleConnector {
    async fn connect(&self, signals: SignalSender) -> Result<Arc<dyn ServiceHandle>, ConnectError> {
        *self.signals.lock().unwrap() = Some(signals);
        Ok(self.sink.clone())
    }
}

pub struct NoEvents;

impl SystemEventSource for NoEvents {
    fn subscribe(&self, _action: &str) -> mpsc::UnboundedReceiver<SystemSignal> {
        mpsc::unbounded_channel().1
    }
}

struct Credential;

impl CredentialSource for Credential {
    fn companion_credential(&self) -> Result<Vec<u8>, CredentialError> {
        Ok(b"abc".to_vec())
    }
}

/// Build a client trusting [`Credential`] and bound through `connector`.
pub fn client(connector: Arc<SingleConnector>) -> DiagLink {
    let config = ClientConfig {
        package: "com.example.app".to_string(),
        trust: TrustConfig {
            fingerprints: vec!["a9993e364706816aba3e25717850c26c9cd0d89d".to_string()],
            credential_path: None,
        },
        crash_report_timeout_ms: 500,
        ..ClientConfig::default()
    };
    DiagLink::builder(config)
        .connector(connector)
        .events(Arc::new(NoEvents))
        .credentials(Arc::new(Credential))
        .build()
        .unwrap()
}

pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn panic_in_thread(name: &str) {
    let result = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(|| panic!("boom"))
        .unwrap()
        .join();
    assert!(result.is_err());
}
