//! Enable/disable controller for the log relay.

use std::sync::{Arc, Mutex, PoisonError};

use diaglink_core::ServiceHandle;

use crate::{capture::CaptureProvider, worker::LogRelayWorker};

/// Owns at most one live relay worker per session.
pub struct LogRelay {
    package: String,
    provider: Arc<dyn CaptureProvider>,
    worker: Mutex<Option<LogRelayWorker>>,
}

impl LogRelay {
    #[must_use]
    pub fn new(package: impl Into<String>, provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            package: package.into(),
            provider,
            worker: Mutex::new(None),
        }
    }

    /// Whether the host can capture logs at all.
    pub async fn is_supported(&self) -> bool {
        self.provider.is_supported().await
    }

    /// Start relaying through `service`.
    ///
    /// No-op while a worker is alive and has not been asked to stop. Must be
    /// called from within a Tokio runtime.
    pub fn enable(&self, service: &Arc<dyn ServiceHandle>) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker
            .as_ref()
            .is_some_and(|w| w.is_alive() && !w.is_stop_requested())
        {
            tracing::debug!(package = %self.package, "Log relay already running");
            return false;
        }

        tracing::info!(package = %self.package, "Starting log relay");
        *worker = Some(LogRelayWorker::spawn(
            self.package.clone(),
            Arc::downgrade(service),
            Arc::clone(&self.provider),
        ));
        true
    }

    /// Stop the running worker, if any.
    pub fn disable(&self) -> bool {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        match worker.as_ref() {
            Some(w) if w.is_alive() && !w.is_stop_requested() => {
                tracing::info!(package = %self.package, "Stopping log relay");
                w.stop();
                true
            }
            _ => false,
        }
    }

    /// Whether a worker is alive and not stopping.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| w.is_alive() && !w.is_stop_requested())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::{
        capture::LogCapture,
        worker::tests::{OnceProvider, RecordingHandle, eventually},
    };

    #[tokio::test]
    async fn test_enable_twice_starts_one_worker() {
        let (_writer, reader) = tokio::io::duplex(64);
        let provider = OnceProvider::new(LogCapture::from_reader(reader));
        let relay = LogRelay::new("com.example.app", provider.clone());
        let service: Arc<dyn ServiceHandle> = Arc::new(RecordingHandle::default());

        assert!(relay.enable(&service));
        assert!(!relay.enable(&service));
        assert!(relay.is_running());

        eventually("capture opened", || provider.opens.load(Ordering::SeqCst) == 1).await;
        tokio::task::yield_now().await;
        assert_eq!(provider.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enable_batch_then_disable() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let relay = LogRelay::new(
            "com.example.app",
            OnceProvider::new(LogCapture::from_reader(reader)),
        );
        let handle = Arc::new(RecordingHandle::default());
        let service: Arc<dyn ServiceHandle> = handle.clone();

        relay.enable(&service);
        writer.write_all(b"l1\nl2\nl3\nl4\nl5\n").await.unwrap();
        eventually("batch", || handle.batches().len() == 1).await;
        assert_eq!(handle.batches()[0].len(), 5);

        assert!(relay.disable());
        assert!(!relay.is_running());
        assert!(!relay.disable());

        let _ = writer.write_all(b"l6\nl7\n").await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(handle.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_enable_right_after_disable_starts_fresh_worker() {
        let (_writer, reader) = tokio::io::duplex(64);
        let provider = OnceProvider::new(LogCapture::from_reader(reader));
        let relay = LogRelay::new("com.example.app", provider.clone());
        let service: Arc<dyn ServiceHandle> = Arc::new(RecordingHandle::default());

        assert!(relay.enable(&service));
        eventually("capture opened", || provider.opens.load(Ordering::SeqCst) == 1).await;

        // The stopped worker has not exited yet.
        assert!(relay.disable());
        assert!(relay.enable(&service));
        assert!(relay.is_running());
        eventually("second open", || provider.opens.load(Ordering::SeqCst) == 2).await;
    }

    #[tokio::test]
    async fn test_disable_without_worker_is_noop() {
        let (_writer, reader) = tokio::io::duplex(64);
        let relay = LogRelay::new(
            "com.example.app",
            OnceProvider::new(LogCapture::from_reader(reader)),
        );
        assert!(!relay.disable());
        assert!(relay.is_supported().await);
    }
}
