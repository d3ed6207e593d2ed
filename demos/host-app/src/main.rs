//! Example host application instrumented with diaglink.
//!
//! Run with: cargo run -p host-app-demo
//!
//! Point `DIAGLINK_CONFIG` at a JSON config to override the defaults. Send
//! `SIGUSR1` to simulate a companion restart.

use std::sync::Arc;

use anyhow::Context;
use diaglink_core::{Observer, PendingUpdate, RemoteStatus};
use diaglink_session::{ACTION_COMPANION_STARTED, ClientConfig, DiagLink};
use diaglink_transport::{BroadcastEventSource, SocketConnector};
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_initialized(&self, available: bool) {
        tracing::info!(available, "Companion handshake settled");
    }

    fn on_status_changed(&self, status: &RemoteStatus) {
        tracing::info!(
            is_managed = status.is_managed,
            is_authorized = status.is_authorized,
            login_username = ?status.login_username,
            "Companion status changed"
        );
    }

    fn on_update_available(&self, update: &PendingUpdate) {
        tracing::info!(
            version_name = %update.version_name,
            version_code = update.version_code,
            "Update available"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ClientConfig::from_env().context("loading diaglink config")?;
    let connector = Arc::new(SocketConnector::default());
    tracing::info!(socket = %connector.path().display(), package = %config.package, "Starting host app");

    let events = Arc::new(BroadcastEventSource::new());
    let client = Arc::new(
        DiagLink::builder(config)
            .connector(connector)
            .events(events.clone())
            .build()?,
    );
    client.install(Some(Arc::new(LoggingObserver)));

    // Status accessors block until the handshake settles.
    let status_client = Arc::clone(&client);
    tokio::task::spawn_blocking(move || {
        let available = status_client.is_available();
        let status = status_client.remote_status();
        tracing::info!(available, ?status, "Initialized");
    });

    let mut restarts = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;
    loop {
        tokio::select! {
            Some(()) = restarts.recv() => {
                let delivered = events.broadcast(ACTION_COMPANION_STARTED);
                tracing::info!(delivered, "Simulated companion restart");
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
