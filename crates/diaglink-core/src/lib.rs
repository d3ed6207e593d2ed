//! Core abstractions for the diagnostic companion client.
//!
//! This crate provides the fundamental building blocks:
//! - `AppIdentity` - Identity of the instrumented host package
//! - `InboundEvent` / `OutboundEvent` - Typed envelopes exchanged with the companion
//! - `InitGate` - One-shot blocking-until-ready latch
//! - Connector, service handle, event source and credential traits

pub mod identity;
pub mod event;
pub mod gate;
pub mod traits;

pub use identity::AppIdentity;
pub use event::{
    CrashReport, EventEnvelope, HandshakeRequest, InboundEvent, LogBatch, OutboundEvent,
    PendingUpdate, RemoteStatus,
};
pub use gate::InitGate;
pub use traits::{
    ConnectError, ConnectorSignal, CredentialError, CredentialSource, Observer, ServiceConnector,
    ServiceError, ServiceHandle, SignalSender, SystemEventSource, SystemSignal,
};
