//! Turnstile gateway
//!
//! A reverse proxy that sits in front of internal services and decides, for
//! every request, which backend receives it and whether a verified identity
//! must be attached first.
//!
//! # Architecture
//!
//! - **Routing**: ordered route table, first match wins
//! - **Rate limiting**: token buckets per tier and key
//! - **Identity**: header sanitization, verification, propagation
//! - **Dispatch**: the per-request pipeline tying the above together
//! - **Proxy**: streaming forwarder to the backends
//!
//! # Features
//!
//! - `tracing` - Structured logging subscriber for the binary

#![warn(clippy::all)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod proxy;
pub mod rate_limit;
pub mod routes;
pub mod routing;
pub mod state;

pub use config::{load_config, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Gateway server.
pub struct Server {
    config: GatewayConfig,
    state: Arc<GatewayState>,
}

impl Server {
    /// Validate the configuration and build the gateway state.
    pub fn new(config: GatewayConfig) -> Result<Self, anyhow::Error> {
        let state = Arc::new(GatewayState::from_config(&config)?);
        Ok(Self { config, state })
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.config.server.bind_addr();
        let listener = TcpListener::bind(&addr).await?;

        let sweeper = self.state.limiter.spawn_sweeper(self.state.sweep_interval);

        info!(
            addr = %addr,
            routes = self.state.routes.len(),
            "Gateway listening"
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        sweeper.abort();
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
