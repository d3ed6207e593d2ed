//! Line-delimited JSON frames exchanged with the companion.

use diaglink_core::{EventEnvelope, HandshakeRequest, OutboundEvent};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Frame from the host to the companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Handshake.
    Init { request: HandshakeRequest },
    /// Outbound event on behalf of a package.
    Event { package: String, event: OutboundEvent },
}

/// Frame from the companion to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Inbound event.
    Event { envelope: EventEnvelope },
    /// The companion rejected a frame.
    Error { message: String },
}

/// Serialize `frame` as one newline-terminated line.
///
/// # Errors
/// Returns error if the frame cannot be serialized.
pub fn encode_line<T: Serialize>(frame: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line, ignoring surrounding whitespace.
///
/// # Errors
/// Returns error if the line is not a valid frame.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim())
}
