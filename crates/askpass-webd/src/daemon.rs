//! Main daemon orchestration.
//!
//! This module provides the `Daemon` struct that coordinates:
//! - Obtaining the HTTP listener from a [`ListenerProvider`]
//! - Serving the prompt pages
//! - Idle shutdown and signal handling

use std::future::{Future, IntoFuture};

use anyhow::Context;
use askpass_web_core::{AnswerRelay, Config, ListenerProvider};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::idle::IdleSupervisor;
use crate::server;

/// The main daemon struct.
pub struct Daemon<L: ListenerProvider> {
    /// Where the HTTP listener comes from.
    listener_provider: L,
    /// Daemon configuration.
    config: Config,
}

impl<L: ListenerProvider> Daemon<L> {
    /// Create a daemon with default configuration.
    pub fn new(listener_provider: L) -> Self {
        Self::with_config(listener_provider, Config::default())
    }

    /// Create a daemon with the given configuration.
    pub fn with_config(listener_provider: L, config: Config) -> Self {
        Self {
            listener_provider,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the daemon until it is idle for too long or receives SIGINT or
    /// SIGTERM.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = self
            .listener_provider
            .listen()
            .await
            .context("Failed to obtain listener")?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until idle shutdown or until `signal` resolves.
    ///
    /// Once shutdown starts, for either reason, open requests get the
    /// configured grace period to finish. If they have not by then, this
    /// returns anyway and the remaining connections are dropped.
    pub async fn serve<F>(&self, listener: TcpListener, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .context("Failed to read listener address")?;
        info!(
            source = %self.listener_provider.describe(),
            "Listening on http://{}",
            addr
        );

        let supervisor = IdleSupervisor::with_grace_period(
            self.config.server.idle_timeout(),
            self.config.server.grace_period(),
        );
        let relay = AnswerRelay::from_config(&self.config.ask);
        info!(dir = %relay.ask_dir().display(), "Watching for password prompts");

        let app = server::app(relay, supervisor.clone());

        // Fires once graceful shutdown has begun, whatever triggered it.
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let idle = supervisor.clone();
        let shutdown = async move {
            tokio::select! {
                _ = idle.shutdown_requested() => {}
                _ = signal => info!("Shutdown signal received"),
            }
            let _ = started_tx.send(());
        };

        let grace_period = self.config.server.grace_period();
        let grace_elapsed = async move {
            if started_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(grace_period).await;
        };

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result.context("HTTP server failed")?;
                supervisor.mark_drained();
                info!("Server stopped");
            }
            _ = supervisor.terminated() => {
                warn!("Closing connections still open after the grace period");
            }
            _ = grace_elapsed => {
                warn!(
                    grace_secs = grace_period.as_secs_f64(),
                    "Closing connections still open after the grace period"
                );
            }
        }

        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
