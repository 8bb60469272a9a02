//! Request dispatch core.
//!
//! ```text
//! inbound unit ──► guard::admit ──► classify ──► Dispatcher ──► WorkItem
//!                     │ dropped        │ unmapped    │ unregistered
//!                     ▼                ▼             ▼
//!                  (no-op)          (no-op)       (no-op)
//!
//! read cycle end ──► flush once (if open)
//! any fault      ──► close, no flush
//! ```
//!
//! The transport calls into this layer through [`DispatchHandler`], which
//! implements [`ConnectionEvents`](crate::net::ConnectionEvents).

pub mod classify;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod handler;
pub mod lifecycle;
pub mod processor;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use classify::{classify, RequestCategory};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{Fault, ProcessorError};
pub use guard::{admit, Dropped};
pub use handler::DispatchHandler;
pub use lifecycle::{run_read_cycle, CycleOutcome};
pub use processor::{ProcessorFactory, WorkItem};
pub use registry::{ProcessorRegistry, RegistryBuilder};
