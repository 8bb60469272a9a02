//! Connection-oriented HTTP/1.1 auth server: frames requests off each
//! connection, routes them by method to registered processors, flushes once
//! per read cycle and closes the connection on any unhandled fault.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod http;
pub mod net;
pub mod processors;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AuthServerConfig;
pub use dispatch::{ProcessorFactory, ProcessorRegistry, RequestCategory, WorkItem};
pub use http::AuthServer;
pub use lifecycle::Shutdown;
