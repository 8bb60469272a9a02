//! Auth server accept loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Spawn one driver task per connection, wired to the dispatch layer
//! - Stop accepting on shutdown and drain live connections
//!
//! # Design Decisions
//! - A failed accept is logged and skipped; only a closed limiter ends the loop
//! - Draining is bounded by `shutdown.drain_timeout_secs`; connections still
//!   open afterwards are abandoned with the process

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::AuthServerConfig;
use crate::dispatch::{DispatchHandler, Dispatcher, ProcessorRegistry};
use crate::net::connection::ConnectionTracker;
use crate::net::driver::{drive_connection, FramingOptions};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};

/// Connection-oriented auth server.
pub struct AuthServer {
    events: Arc<DispatchHandler>,
    framing: FramingOptions,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl AuthServer {
    /// Create a server dispatching to `registry`.
    pub fn new(config: &AuthServerConfig, registry: ProcessorRegistry) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(registry), config.dispatch.execution);
        Self {
            events: Arc::new(DispatchHandler::new(dispatcher)),
            framing: FramingOptions {
                limits: config.limits,
                aggregate_chunked: config.dispatch.aggregate_chunked,
            },
            tracker: ConnectionTracker::new(),
            drain_timeout: Duration::from_secs(config.shutdown.drain_timeout_secs),
        }
    }

    /// Live-connection tracker, shared with every connection task.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Serve until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            address = ?listener.local_addr().ok(),
            max_connections = listener.max_connections(),
            execution = ?self.events.dispatcher().execution(),
            categories = ?self.events.dispatcher().registry(),
            "Auth server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        self.spawn_connection(stream, peer_addr, permit)
                    }
                    Err(ListenerError::Accept(error)) => {
                        tracing::warn!(%error, "Failed to accept connection");
                    }
                    Err(error) => return Err(error),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }
        drop(listener);

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(
                active,
                timeout_secs = self.drain_timeout.as_secs(),
                "Draining connections"
            );
        }
        if self.tracker.wait_for_drain(self.drain_timeout).await {
            tracing::info!("Auth server stopped");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timeout elapsed, abandoning open connections"
            );
        }
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer_addr: SocketAddr, permit: ConnectionPermit) {
        if let Err(error) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, %error, "Failed to set TCP_NODELAY");
        }
        let guard = self.tracker.track();
        let events = Arc::clone(&self.events);
        let framing = self.framing;

        tokio::spawn(async move {
            drive_connection(stream, guard.id(), events, framing).await;
            drop(guard);
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    type ServerTask = tokio::task::JoinHandle<Result<(), ListenerError>>;

    async fn start(config: AuthServerConfig) -> (SocketAddr, broadcast::Sender<()>, ServerTask) {
        let listener = Listener::bind(&ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 8,
        })
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);
        let server = AuthServer::new(&config, ProcessorRegistry::default());
        let handle = tokio::spawn(server.run(listener, rx));
        (addr, tx, handle)
    }

    #[tokio::test]
    async fn stops_accepting_on_shutdown() {
        let (addr, tx, handle) = start(AuthServerConfig::default()).await;

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn drain_gives_up_after_timeout() {
        let mut config = AuthServerConfig::default();
        config.shutdown.drain_timeout_secs = 0;
        let (addr, tx, handle) = start(config).await;

        // An idle connection never finishes on its own.
        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn unregistered_requests_get_no_response() {
        let (addr, tx, _handle) = start(AuthServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream
            .write_all(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_millis(200), stream.read(&mut buf)).await;
        assert!(read.is_err(), "expected no bytes from an empty registry");

        let _ = tx.send(());
    }
}
