//! Background worker relaying captured log lines to the companion.

use std::sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicBool, Ordering},
};

use diaglink_core::{LogBatch, OutboundEvent, ServiceHandle};
use tokio::{sync::oneshot, task::JoinHandle};

use crate::capture::{CaptureProvider, LogCapture};

/// A running relay task.
///
/// The worker opens its capture once, batches lines until the capture
/// has nothing more ready, then hands the batch to the service handle. It
/// only holds a weak reference to the handle: once the connection manager
/// drops the handle, the next flush fails and the worker ends.
pub struct LogRelayWorker {
    stopped: Arc<AtomicBool>,
    interrupt_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: JoinHandle<()>,
}

impl LogRelayWorker {
    /// Spawn a worker on the current runtime.
    #[must_use]
    pub fn spawn(
        package: String,
        service: Weak<dyn ServiceHandle>,
        provider: Arc<dyn CaptureProvider>,
    ) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let (interrupt_tx, interrupt_rx) = oneshot::channel();

        let task = {
            let stopped = Arc::clone(&stopped);
            tokio::spawn(async move {
                let mut capture = match provider.open().await {
                    Ok(capture) => capture,
                    Err(e) => {
                        tracing::debug!(package = %package, "Log capture failed to start: {e}");
                        return;
                    }
                };

                if !stopped.load(Ordering::Acquire) {
                    tracing::debug!(package = %package, "Start relaying log capture");
                    relay_loop(&package, &service, &mut capture, &stopped, interrupt_rx).await;
                }
                capture.terminate().await;
            })
        };

        Self {
            stopped,
            interrupt_tx: Mutex::new(Some(interrupt_tx)),
            task,
        }
    }

    /// Whether the worker task is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    /// Whether `stop` has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop the worker. Idempotent, callable from any thread.
    ///
    /// Marks the worker stopped, then interrupts a pending read so the loop
    /// exits and kills the capture process.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let interrupt_tx = self
            .interrupt_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = interrupt_tx {
            let _ = tx.send(());
        }
    }
}

async fn relay_loop(
    package: &str,
    service: &Weak<dyn ServiceHandle>,
    capture: &mut LogCapture,
    stopped: &AtomicBool,
    mut interrupt_rx: oneshot::Receiver<()>,
) {
    let mut buffer: Vec<String> = Vec::new();
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            biased;
            _ = &mut interrupt_rx => {
                tracing::debug!(package = %package, "Log relay interrupted");
                break;
            }
            read = capture.read_line(&mut line) => {
                match read {
                    Ok(0) => {
                        tracing::debug!(package = %package, "Log capture reached end of stream");
                        break;
                    }
                    Ok(_) => {
                        buffer.push(normalize_line(&line));
                        if capture.is_drained() {
                            if stopped.load(Ordering::Acquire) {
                                break;
                            }
                            if !flush(package, service, &mut buffer).await {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!(package = %package, "Log capture stopped: {e}");
                        break;
                    }
                }
            }
        }
    }
}

async fn flush(package: &str, service: &Weak<dyn ServiceHandle>, buffer: &mut Vec<String>) -> bool {
    let Some(service) = service.upgrade() else {
        tracing::debug!(package = %package, "Service handle gone, stopping log relay");
        return false;
    };

    let batch = LogBatch::new(std::mem::take(buffer));
    let lines = batch.len();
    match service
        .send_event(package, OutboundEvent::SendLogcat { batch })
        .await
    {
        Ok(()) => {
            tracing::trace!(package = %package, lines, "Relayed log batch");
            true
        }
        Err(e) => {
            tracing::debug!(package = %package, "Failed to relay log batch: {e}");
            false
        }
    }
}

fn normalize_line(line: &str) -> String {
    let mut line = line.trim_end_matches(['\r', '\n']).to_owned();
    line.push('\n');
    line
}
