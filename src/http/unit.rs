//! Units delivered by the framing layer to the connection listener.

use bytes::Bytes;

use crate::http::request::{FullRequest, RequestHead};

/// Anything the codec hands upward for one connection.
///
/// Only [`InboundUnit::Request`] is a complete application request. The
/// streaming variants appear when chunked aggregation is disabled.
#[derive(Debug, Clone)]
pub enum InboundUnit {
    /// Head and whole body assembled.
    Request(FullRequest),
    /// Head of a streaming (chunked) request.
    Head(RequestHead),
    /// One body chunk of a streaming request.
    Chunk(Bytes),
    /// End of a streaming request body.
    End,
}

impl InboundUnit {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Head(_) => "head",
            Self::Chunk(_) => "chunk",
            Self::End => "end",
        }
    }
}
