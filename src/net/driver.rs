//! Per-connection read loop.
//!
//! # Responsibilities
//! - Split the socket into a read loop and a writer task
//! - Turn each socket read into one read cycle of decoded units
//! - Stop reading as soon as the connection leaves `Open`
//! - Read nothing new until the output of earlier cycles has reached the socket

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, FramedWrite};

use crate::config::LimitsConfig;
use crate::dispatch::error::Fault;
use crate::dispatch::lifecycle::run_read_cycle;
use crate::http::codec::Http1Codec;
use crate::http::unit::InboundUnit;
use crate::net::connection::ConnectionId;
use crate::net::context::{ChannelConnection, SharedContext};
use crate::net::events::ConnectionEvents;

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Framing settings shared by every connection.
#[derive(Debug, Clone, Copy)]
pub struct FramingOptions {
    pub limits: LimitsConfig,
    pub aggregate_chunked: bool,
}

impl FramingOptions {
    fn codec(&self) -> Http1Codec {
        Http1Codec::new(self.limits, self.aggregate_chunked)
    }
}

/// Units decodable from the bytes buffered so far.
///
/// Stops after the first framing error; the rest of the buffer is abandoned.
pub struct DecodedUnits<'a> {
    codec: &'a mut Http1Codec,
    buf: &'a mut BytesMut,
    failed: bool,
}

impl<'a> DecodedUnits<'a> {
    pub fn new(codec: &'a mut Http1Codec, buf: &'a mut BytesMut) -> Self {
        Self {
            codec,
            buf,
            failed: false,
        }
    }
}

impl Iterator for DecodedUnits<'_> {
    type Item = Result<InboundUnit, Fault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.codec.decode(self.buf) {
            Ok(Some(unit)) => Some(Ok(unit)),
            Ok(None) => None,
            Err(error) => {
                self.failed = true;
                Some(Err(Fault::Framing(error)))
            }
        }
    }
}

/// Serve one connection until it closes.
pub async fn drive_connection<E>(
    stream: TcpStream,
    id: ConnectionId,
    events: Arc<E>,
    framing: FramingOptions,
) where
    E: ConnectionEvents + ?Sized,
{
    let peer_addr = stream.peer_addr().ok();
    let (mut reader, writer) = stream.into_split();
    let (connection, writer_task) =
        ChannelConnection::open(id, FramedWrite::new(writer, framing.codec()));
    let connection = Arc::new(connection);
    let ctx: SharedContext = connection.clone();

    let mut codec = framing.codec();
    let mut buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);

    tracing::debug!(connection_id = %id, peer_addr = ?peer_addr, "Connection open");

    while ctx.is_open() {
        tokio::select! {
            () = connection.drained() => {}
            () = connection.closed() => break,
        }
        let read = tokio::select! {
            read = reader.read_buf(&mut buf) => read,
            () = connection.closed() => break,
        };

        match read {
            Ok(0) => {
                if codec.is_mid_request() || !buf.is_empty() {
                    tracing::debug!(connection_id = %id, "Peer closed mid-request");
                } else {
                    tracing::trace!(connection_id = %id, "Peer closed");
                }
                ctx.close();
            }
            Ok(bytes) => {
                tracing::trace!(connection_id = %id, bytes, "Read cycle");
                let units = DecodedUnits::new(&mut codec, &mut buf);
                run_read_cycle(&*events, &ctx, units).await;
            }
            Err(error) => events.on_fault(&ctx, Fault::Read(error)),
        }
    }

    if let Err(error) = writer_task.await {
        tracing::warn!(connection_id = %id, %error, "Writer task failed");
    }
    tracing::debug!(connection_id = %id, state = ctx.state().as_str(), "Connection closed");
}
