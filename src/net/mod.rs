//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, state machine, live-connection tracking)
//!     → driver.rs (read cycles: decode units, raise events)
//!     → events.rs (listener interface implemented by the dispatch layer)
//!     → context.rs (write / flush / close handle given to processors)
//!
//! Connection States:
//!     Open → Closing → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The transport knows nothing about request methods or processors

pub mod connection;
pub mod context;
pub mod driver;
pub mod events;
pub mod listener;

pub use connection::{ConnectionId, ConnectionState, ConnectionTracker};
pub use context::{ChannelConnection, ConnectionContext, SharedContext};
pub use driver::{drive_connection, FramingOptions};
pub use events::ConnectionEvents;
pub use listener::{Listener, ListenerError};
