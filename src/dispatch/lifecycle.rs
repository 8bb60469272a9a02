//! Read-cycle wrapper: flush on completion, close on fault.
//!
//! Every socket read becomes one cycle. Units are delivered in order; the first
//! fault ends the cycle, closes the connection and skips the flush. A cycle
//! that runs to completion on an open connection flushes exactly once.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::dispatch::error::Fault;
use crate::http::unit::InboundUnit;
use crate::net::context::SharedContext;
use crate::net::events::ConnectionEvents;
use crate::observability::metrics;

/// How a read cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every unit was delivered and the read-complete hook ran.
    Completed,
    /// The connection left `Open` mid-cycle; remaining units were abandoned.
    Closed,
    /// A fault ended the cycle and was handed to `on_fault`.
    Faulted,
}

/// Deliver one read cycle worth of units to `events`.
///
/// Units are pulled lazily, so nothing past a fault or a close is decoded.
pub async fn run_read_cycle<E, I>(events: &E, ctx: &SharedContext, units: I) -> CycleOutcome
where
    E: ConnectionEvents + ?Sized,
    I: IntoIterator<Item = Result<InboundUnit, Fault>>,
{
    let mut units = units.into_iter();
    loop {
        if !ctx.is_open() {
            tracing::trace!(connection_id = %ctx.id(), "Connection closed mid-cycle");
            return CycleOutcome::Closed;
        }
        let Some(unit) = units.next() else {
            break;
        };

        let delivered = match unit {
            Ok(unit) => AssertUnwindSafe(events.on_unit(ctx, unit))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(Fault::from_panic(panic))),
            Err(fault) => Err(fault),
        };
        if let Err(fault) = delivered {
            events.on_fault(ctx, fault);
            return CycleOutcome::Faulted;
        }
    }

    events.on_read_complete(ctx);
    CycleOutcome::Completed
}

/// Flush pending output. A no-op once the connection is closing.
pub fn complete_read_cycle(ctx: &SharedContext) {
    if ctx.is_open() {
        ctx.flush();
    }
}

/// Close the connection in response to an unhandled fault.
pub fn contain_fault(ctx: &SharedContext, fault: Fault) {
    tracing::warn!(
        connection_id = %ctx.id(),
        kind = fault.kind(),
        %fault,
        "Unhandled fault, closing connection"
    );
    metrics::record_fault(fault.kind());
    ctx.close();
}
