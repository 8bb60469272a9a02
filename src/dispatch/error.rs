//! Fault and processor error types.
//!
//! A [`Fault`] is anything that reaches the top of a connection's read path
//! unhandled. It has no recovery: its only effect is closing the connection.

use std::any::Any;

use thiserror::Error;

use crate::dispatch::classify::RequestCategory;
use crate::http::codec::CodecError;

/// Errors raised by processors while being built or while running.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The work item could not be constructed.
    #[error("failed to construct processor: {0}")]
    Construction(String),

    /// The work item failed while running.
    #[error("processor failed: {0}")]
    Execution(String),
}

impl ProcessorError {
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// Uncaught failure on a connection's read or dispatch path.
#[derive(Debug, Error)]
pub enum Fault {
    /// Reading from the socket failed.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Inbound bytes could not be framed into a request.
    #[error("framing error: {0}")]
    Framing(#[from] CodecError),

    /// A processor failed and did not handle it itself.
    #[error("{category} processor failed: {source}")]
    Processor {
        category: RequestCategory,
        #[source]
        source: ProcessorError,
    },

    /// Dispatch panicked.
    #[error("panic during dispatch: {0}")]
    Panic(String),
}

impl Fault {
    pub fn processor(category: RequestCategory, source: ProcessorError) -> Self {
        Self::Processor { category, source }
    }

    /// Build a fault from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self::Panic(message)
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Framing(_) => "framing",
            Self::Processor { .. } => "processor",
            Self::Panic(_) => "panic",
        }
    }
}
