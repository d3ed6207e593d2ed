//! Companion session for host applications.
//!
//! This crate ties the pieces together:
//! - `DiagLink` - Host-facing client with blocking and async status accessors
//! - `ConnectionManager` - Binds, handshakes and rebinds on companion restart
//! - `EventDispatcher` - Routes companion events to session state and observers
//! - `TrustVerifier` - Fingerprint allow-list for the companion credential
//! - Crash hook forwarding panics to the companion

pub mod callback;
pub mod client;
pub mod config;
pub mod crash;
pub mod dispatch;
pub mod manager;
pub mod session;
pub mod trust;

#[cfg(test)]
pub(crate) mod testing;

pub use callback::{Callback, CallbackExecutor, Notifier, SerialExecutor};
pub use client::{ClientError, DiagLink, DiagLinkBuilder};
pub use config::{CONFIG_ENV, ClientConfig, ConfigError, LogRelayConfig, TrustConfig};
pub use crash::CrashReporter;
pub use dispatch::EventDispatcher;
pub use manager::{ACTION_COMPANION_STARTED, Collaborators, ConnectionManager};
pub use session::{ConnectionState, Session};
pub use trust::{COMPANION_FINGERPRINTS, FileCredentialSource, TrustVerifier};
