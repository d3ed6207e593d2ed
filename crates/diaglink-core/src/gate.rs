//! One-shot initialization latch.

use std::sync::{Condvar, Mutex, PoisonError};

use tokio::sync::Notify;

/// Blocks callers until the companion handshake has settled.
///
/// Starts closed and is released at most once. Synchronous callers use
/// [`InitGate::wait`]; async callers use [`InitGate::wait_async`] so they do
/// not park a runtime worker.
#[derive(Debug, Default)]
pub struct InitGate {
    released: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl InitGate {
    /// Create a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking check.
    #[must_use]
    pub fn is_released(&self) -> bool {
        *self.released.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release all current and future waiters.
    ///
    /// Returns `false` if the gate had already been released.
    pub fn release(&self) -> bool {
        {
            let mut released = self.released.lock().unwrap_or_else(PoisonError::into_inner);
            if *released {
                return false;
            }
            *released = true;
        }
        self.condvar.notify_all();
        self.notify.notify_waiters();
        true
    }

    /// Block the calling thread until the gate is released.
    ///
    /// If the wait is disrupted the caller proceeds with whatever state is
    /// currently known.
    pub fn wait(&self) {
        let mut released = match self.released.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Interrupted while waiting for initialization");
                return;
            }
        };
        while !*released {
            released = match self.condvar.wait(released) {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::warn!("Interrupted while waiting for initialization");
                    return;
                }
            };
        }
    }

    /// Wait for release without blocking the executor.
    pub async fn wait_async(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_released() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn test_release_only_once() {
        let gate = InitGate::new();
        assert!(!gate.is_released());
        assert!(gate.release());
        assert!(gate.is_released());
        assert!(!gate.release());
        assert!(gate.is_released());
    }

    #[test]
    fn test_wait_returns_immediately_when_released() {
        let gate = InitGate::new();
        gate.release();
        gate.wait();
    }

    #[test]
    fn test_wait_blocks_until_release() {
        let gate = Arc::new(InitGate::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    gate.wait();
                    gate.is_released()
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert!(waiters.iter().all(|w| !w.is_finished()));

        gate.release();
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }

    #[tokio::test]
    async fn test_wait_async_wakes_on_release() {
        let gate = Arc::new(InitGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait_async().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.release();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_wait_async_ready_after_release() {
        let gate = InitGate::new();
        gate.release();
        let mut wait = tokio_test::task::spawn(gate.wait_async());
        tokio_test::assert_ready!(wait.poll());
    }

    #[test]
    fn test_wait_async_pending_before_release() {
        let gate = InitGate::new();
        let mut wait = tokio_test::task::spawn(gate.wait_async());
        tokio_test::assert_pending!(wait.poll());

        gate.release();
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
    }
}
