//! Log stream capture and relay.
//!
//! Provides:
//! - `CommandBuilder` - Build the capture command line
//! - `LogCapture` - A line-oriented capture stream with a "drained" signal
//! - `LogRelayWorker` - Background task batching lines into the companion
//! - `LogRelay` - Start/stop controller driven by companion events

pub mod capture;
pub mod command;
pub mod relay;
pub mod resolve;
pub mod worker;

pub use capture::{CaptureError, CaptureProvider, CommandCapture, LogCapture};
pub use command::{CommandBuildError, CommandBuilder, CommandParts, DEFAULT_CAPTURE_COMMAND};
pub use relay::LogRelay;
pub use resolve::resolve_executable_path;
pub use worker::LogRelayWorker;
