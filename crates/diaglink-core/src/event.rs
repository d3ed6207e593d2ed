//! Event envelopes exchanged with the companion process.
//!
//! Inbound events arrive as loosely-typed `{action, payload}` envelopes and
//! are decoded here, at the boundary, into [`InboundEvent`]. Missing payload
//! fields fall back to defaults instead of failing the decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound action tags.
pub mod actions {
    pub const INIT: &str = "INIT";
    pub const UPDATE_AVAILABLE: &str = "UPDATE_AVAILABLE";
    pub const ENABLE_LOGCAT: &str = "ENABLE_LOGCAT";
    pub const DISABLE_LOGCAT: &str = "DISABLE_LOGCAT";
}

/// Inbound payload keys.
pub mod keys {
    pub const IS_MANAGED: &str = "isManaged";
    pub const IS_AUTHORIZED: &str = "isAuthorized";
    pub const LOGIN_USERNAME: &str = "loginUsername";
    pub const IS_STOP_REQUESTED: &str = "isStopRequested";
    pub const SERIAL: &str = "serial";
    pub const VERSION_NAME: &str = "versionName";
    pub const VERSION_CODE: &str = "versionCode";
}

/// Key/value payload carried by an envelope.
pub type Payload = Map<String, Value>;

/// Raw event envelope as delivered by the companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Action tag.
    pub action: String,
    /// Action-specific fields.
    #[serde(default)]
    pub payload: Payload,
}

impl EventEnvelope {
    /// Create an envelope with an empty payload.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            payload: Payload::new(),
        }
    }

    /// Add a payload field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Snapshot of what the companion knows about this application.
///
/// Replaced wholesale on every `INIT`; never mutated field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    /// The companion knows and manages this package.
    pub is_managed: bool,
    /// The current companion user has this application in their list.
    pub is_authorized: bool,
    /// Username logged into the companion, if any.
    pub login_username: Option<String>,
    /// The companion asked this application to stop.
    pub is_stop_requested: bool,
}

impl RemoteStatus {
    /// Snapshot used when no companion could be reached.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    fn from_payload(payload: &Payload) -> Self {
        Self {
            is_managed: get_bool(payload, keys::IS_MANAGED),
            is_authorized: get_bool(payload, keys::IS_AUTHORIZED),
            login_username: get_string(payload, keys::LOGIN_USERNAME),
            is_stop_requested: get_bool(payload, keys::IS_STOP_REQUESTED),
        }
    }
}

/// A new build announced by the companion. Delivered once, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub serial: i32,
    pub version_name: String,
    pub version_code: i32,
}

impl PendingUpdate {
    fn from_payload(payload: &Payload) -> Self {
        Self {
            serial: get_i32(payload, keys::SERIAL),
            version_name: get_string(payload, keys::VERSION_NAME).unwrap_or_default(),
            version_code: get_i32(payload, keys::VERSION_CODE),
        }
    }
}

/// Decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Handshake completed; carries the fresh status snapshot.
    Init(RemoteStatus),
    /// A new build is available.
    UpdateAvailable(PendingUpdate),
    /// Start relaying the log stream.
    EnableLogcat,
    /// Stop relaying the log stream.
    DisableLogcat,
}

impl InboundEvent {
    /// Decode an envelope. Returns `None` for unknown actions.
    #[must_use]
    pub fn decode(envelope: &EventEnvelope) -> Option<Self> {
        let event = match envelope.action.as_str() {
            actions::INIT => Self::Init(RemoteStatus::from_payload(&envelope.payload)),
            actions::UPDATE_AVAILABLE => {
                Self::UpdateAvailable(PendingUpdate::from_payload(&envelope.payload))
            }
            actions::ENABLE_LOGCAT => Self::EnableLogcat,
            actions::DISABLE_LOGCAT => Self::DisableLogcat,
            _ => return None,
        };
        Some(event)
    }
}

/// Handshake sent right after a successful bind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    /// Host package name.
    pub package: String,
    /// `true` on the first bind after install, `false` after a reconnect signal.
    pub is_boot: bool,
    /// Whether this host is able to relay its log stream.
    pub can_logcat: bool,
    /// Host metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

/// Serialized unhandled failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashReport {
    /// Panic message, or a placeholder when the payload is not a string.
    pub message: String,
    /// `file:line:column` of the panic site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Name of the panicking thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    /// Captured backtrace text.
    #[serde(default)]
    pub backtrace: String,
}

/// Lines captured between two flush points, in arrival order.
///
/// Every line keeps its trailing `\n`, so the companion can concatenate
/// batches verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBatch {
    pub lines: Vec<String>,
}

impl LogBatch {
    #[must_use]
    pub const fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Event sent from the host to the companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundEvent {
    /// An unhandled failure in the host.
    SendCrashReport { report: CrashReport },
    /// One batch of relayed log lines.
    SendLogcat { batch: LogBatch },
}

impl OutboundEvent {
    /// Wire action tag.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::SendCrashReport { .. } => "SEND_CRASH_REPORT",
            Self::SendLogcat { .. } => "SEND_LOGCAT",
        }
    }
}

fn get_bool(payload: &Payload, key: &str) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn get_i32(payload: &Payload, key: &str) -> i32 {
    payload
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(0)
}

fn get_string(payload: &Payload, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_owned)
}
