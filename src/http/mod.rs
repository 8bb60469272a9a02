//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one driver task per connection)
//!     → codec.rs (HTTP/1.1 framing into inbound units)
//!     → unit.rs / request.rs (buffered request or streaming fragment)
//!     → [dispatch layer: guard, classify, processor]
//!     → response.rs (written by processors, encoded by codec.rs)
//! ```

pub mod codec;
pub mod request;
pub mod response;
pub mod server;
pub mod unit;

pub use codec::{CodecError, Http1Codec};
pub use request::{FullRequest, RequestHead, RequestId, X_REQUEST_ID};
pub use response::AuthResponse;
pub use server::AuthServer;
pub use unit::InboundUnit;
