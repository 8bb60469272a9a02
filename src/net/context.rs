//! Connection context handed to listeners and processors.
//!
//! # Responsibilities
//! - Define the handle every dispatch component uses to talk to one connection
//! - Provide the transport implementation backed by a writer task
//!
//! # Design Decisions
//! - Handles are shared (`Arc`), but there is exactly one connection behind
//!   them; once it leaves `Open`, writes and flushes are silently ignored, so
//!   a processor holding a stale handle cannot touch a closed socket
//! - `close` drops buffered output that was never flushed
//! - Commands are applied strictly in the order they were issued
//! - Every queued command counts toward a backlog until the writer task has
//!   applied it; the read loop waits for the backlog to empty before reading
//!   again, so a peer that stops reading stops being read from
//! - At most one processor is active per connection: it holds the single
//!   permit of [`ConnectionContext::processor_slot`]

use std::fmt;
use std::sync::Arc;

use futures_util::SinkExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;

use crate::http::codec::Http1Codec;
use crate::http::response::AuthResponse;
use crate::net::connection::{ConnectionId, ConnectionState};

/// The live handle to one network connection.
pub trait ConnectionContext: Send + Sync + fmt::Debug {
    fn id(&self) -> ConnectionId;

    fn state(&self) -> ConnectionState;

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a response for writing. Not sent until flushed.
    fn write(&self, response: AuthResponse);

    /// Push queued output to the peer.
    fn flush(&self);

    /// Close the connection immediately, discarding unflushed output.
    fn close(&self);

    /// Single-permit semaphore held by whichever processor is active.
    fn processor_slot(&self) -> Arc<Semaphore>;
}

/// Shared handle type used across the dispatch layer.
pub type SharedContext = Arc<dyn ConnectionContext>;

#[derive(Debug)]
enum Outbound {
    Write(AuthResponse),
    Flush,
    Close,
}

/// Transport-backed connection context.
///
/// Commands travel over an unbounded channel to a writer task that owns the
/// write half of the socket.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    state: Arc<watch::Sender<ConnectionState>>,
    backlog: Arc<watch::Sender<usize>>,
    commands: mpsc::UnboundedSender<Outbound>,
    slot: Arc<Semaphore>,
}

impl ChannelConnection {
    /// Create the context and spawn its writer task.
    pub fn open<W>(id: ConnectionId, sink: FramedWrite<W, Http1Codec>) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Open);
        let state = Arc::new(state);
        let (backlog, _) = watch::channel(0);
        let backlog = Arc::new(backlog);

        let writer = tokio::spawn(drive_writes(
            id,
            sink,
            rx,
            Arc::clone(&state),
            Arc::clone(&backlog),
        ));
        let connection = Self {
            id,
            state,
            backlog,
            commands,
            slot: Arc::new(Semaphore::new(1)),
        };
        (connection, writer)
    }

    /// Resolve once the connection has left `Open`.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state != ConnectionState::Open).await;
    }

    /// Commands queued but not yet applied by the writer task.
    pub fn backlog(&self) -> usize {
        *self.backlog.borrow()
    }

    /// Resolve once every queued command has been applied.
    ///
    /// Never resolves if the writer is stuck on a peer that does not read, or
    /// gone after close; callers race it against [`closed`](Self::closed).
    pub async fn drained(&self) {
        let mut rx = self.backlog.subscribe();
        let _ = rx.wait_for(|queued| *queued == 0).await;
    }

    fn send(&self, command: Outbound) {
        self.backlog.send_modify(|queued| *queued += 1);
        if self.commands.send(command).is_err() {
            self.backlog.send_modify(|queued| *queued = queued.saturating_sub(1));
            tracing::trace!(connection_id = %self.id, "Writer already gone");
        }
    }
}

impl ConnectionContext for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn write(&self, response: AuthResponse) {
        if self.is_open() {
            self.send(Outbound::Write(response));
        }
    }

    fn flush(&self) {
        if self.is_open() {
            self.send(Outbound::Flush);
        }
    }

    fn close(&self) {
        if begin_close(&self.state) {
            tracing::debug!(connection_id = %self.id, "Closing connection");
            self.send(Outbound::Close);
        }
    }

    fn processor_slot(&self) -> Arc<Semaphore> {
        Arc::clone(&self.slot)
    }
}

/// Open → Closing. Returns false if already past `Open`.
fn begin_close(state: &watch::Sender<ConnectionState>) -> bool {
    state.send_if_modified(|current| {
        if *current == ConnectionState::Open {
            *current = ConnectionState::Closing;
            true
        } else {
            false
        }
    })
}

async fn drive_writes<W>(
    id: ConnectionId,
    mut sink: FramedWrite<W, Http1Codec>,
    mut commands: mpsc::UnboundedReceiver<Outbound>,
    state: Arc<watch::Sender<ConnectionState>>,
    backlog: Arc<watch::Sender<usize>>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(command) = commands.recv().await {
        let result = match command {
            Outbound::Write(response) => sink.feed(response).await,
            Outbound::Flush => sink.flush().await,
            Outbound::Close => break,
        };
        backlog.send_modify(|queued| *queued = queued.saturating_sub(1));
        if let Err(error) = result {
            tracing::debug!(connection_id = %id, %error, "Write failed");
            break;
        }
    }

    begin_close(&state);
    // into_inner drops whatever is still buffered in the codec.
    let mut io = sink.into_inner();
    if let Err(error) = io.shutdown().await {
        tracing::trace!(connection_id = %id, %error, "Shutdown after close failed");
    }
    state.send_replace(ConnectionState::Closed);
}
