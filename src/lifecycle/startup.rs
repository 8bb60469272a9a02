//! Startup orchestration.
//!
//! Expects configuration to be loaded and logging initialised; brings up the
//! metrics exporter, binds the listener, wires signals to shutdown and serves
//! until drained.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::AuthServerConfig;
use crate::dispatch::ProcessorRegistry;
use crate::http::server::AuthServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics::{init_metrics, MetricsError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Run the server until a shutdown signal arrives and connections drain.
pub async fn run(
    config: AuthServerConfig,
    registry: ProcessorRegistry,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let address: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| {
                StartupError::MetricsAddress(config.observability.metrics_address.clone())
            })?;
        init_metrics(address)?;
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match wait_for_signal().await {
                Ok(signal) => {
                    tracing::info!(%signal, "Shutdown signal received");
                    shutdown.trigger();
                }
                Err(error) => {
                    tracing::error!(%error, "Failed to listen for shutdown signals");
                }
            }
        }
    });

    AuthServer::new(&config, registry)
        .run(listener, server_shutdown)
        .await?;
    Ok(())
}
