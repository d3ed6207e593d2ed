//! Transport to the diagnostic companion.
//!
//! Supports:
//! - JSON-lines framing shared with the companion
//! - Unix domain socket connector (unix only)
//! - In-process broadcaster for system signals

pub mod event_source;
pub mod protocol;
#[cfg(unix)]
pub mod socket;

pub use event_source::BroadcastEventSource;
pub use protocol::{ClientFrame, ServerFrame, decode_line, encode_line};
#[cfg(unix)]
pub use socket::{SocketConnector, SocketHandle, TransportError, default_socket_path};
