//! Listener interface between the transport and the dispatch layer.

use futures_util::future::BoxFuture;

use crate::dispatch::error::Fault;
use crate::http::unit::InboundUnit;
use crate::net::context::SharedContext;

/// Callbacks the transport raises for one connection.
///
/// The transport guarantees that calls for the same connection never overlap:
/// units of one read cycle are delivered in order, each awaited before the
/// next, followed by `on_read_complete`.
pub trait ConnectionEvents: Send + Sync + 'static {
    /// A unit was decoded from the connection.
    fn on_unit<'a>(
        &'a self,
        ctx: &'a SharedContext,
        unit: InboundUnit,
    ) -> BoxFuture<'a, Result<(), Fault>>;

    /// Every unit currently available has been delivered.
    fn on_read_complete(&self, ctx: &SharedContext);

    /// Something on the read path failed and nothing handled it.
    fn on_fault(&self, ctx: &SharedContext, fault: Fault);
}
