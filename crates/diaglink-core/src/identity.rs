//! Identity of the instrumented host application.

use std::collections::HashMap;

use serde_json::Value;

use crate::event::HandshakeRequest;

/// Who the host is, as far as the companion is concerned.
///
/// The package name attributes crash reports and log batches; metadata is
/// opaque to this crate and only travels with the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub package: String,
    pub metadata: HashMap<String, Value>,
}

impl AppIdentity {
    #[must_use]
    pub fn new(package: impl Into<String>) -> Self {
        Self::with_metadata(package, HashMap::new())
    }

    #[must_use]
    pub fn with_metadata(package: impl Into<String>, metadata: HashMap<String, Value>) -> Self {
        Self {
            package: package.into(),
            metadata,
        }
    }

    /// Build the handshake announcing this host.
    ///
    /// `is_boot` is false for binds triggered by a companion restart.
    #[must_use]
    pub fn handshake(&self, is_boot: bool, can_logcat: bool) -> HandshakeRequest {
        HandshakeRequest {
            package: self.package.clone(),
            is_boot,
            can_logcat,
            metadata: self.metadata.clone(),
        }
    }
}
