//! Host callback execution context.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use diaglink_core::Observer;
use tokio::sync::mpsc;

/// A unit of work for the callback context.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Where observer callbacks run.
///
/// Implementations must run callbacks one at a time, in submission order,
/// and `execute` must not wait for the callback to finish.
pub trait CallbackExecutor: Send + Sync {
    fn execute(&self, callback: Callback);
}

/// Runs callbacks on a dedicated thread.
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<Callback>,
}

impl SerialExecutor {
    /// Start the callback thread. It exits once the executor is dropped.
    ///
    /// # Errors
    /// Returns error if the thread cannot be spawned.
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();
        std::thread::Builder::new()
            .name("diaglink-callbacks".to_string())
            .spawn(move || {
                while let Some(callback) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                        tracing::error!("Observer callback panicked");
                    }
                }
            })?;
        Ok(Self { tx })
    }
}

impl CallbackExecutor for SerialExecutor {
    fn execute(&self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            tracing::warn!("Callback thread is gone, dropping observer notification");
        }
    }
}

/// Posts observer notifications to the callback context.
#[derive(Clone)]
pub struct Notifier {
    executor: Arc<dyn CallbackExecutor>,
    observer: Option<Arc<dyn Observer>>,
}

impl Notifier {
    #[must_use]
    pub fn new(executor: Arc<dyn CallbackExecutor>, observer: Option<Arc<dyn Observer>>) -> Self {
        Self { executor, observer }
    }

    /// Queue `notify` for the observer. No-op without an observer.
    pub fn post<F>(&self, notify: F)
    where
        F: FnOnce(&dyn Observer) + Send + 'static,
    {
        let Some(observer) = self.observer.clone() else {
            return;
        };
        self.executor
            .execute(Box::new(move || notify(observer.as_ref())));
    }
}
