use futures_util::future::BoxFuture;

use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::error::Fault;
use crate::dispatch::guard;
use crate::dispatch::lifecycle::{complete_read_cycle, contain_fault};
use crate::http::unit::InboundUnit;
use crate::net::context::SharedContext;
use crate::net::events::ConnectionEvents;
use crate::observability::metrics;

/// Connection listener that runs every unit through guard, classifier and
/// dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchHandler {
    dispatcher: Dispatcher,
}

impl DispatchHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl ConnectionEvents for DispatchHandler {
    fn on_unit<'a>(
        &'a self,
        ctx: &'a SharedContext,
        unit: InboundUnit,
    ) -> BoxFuture<'a, Result<(), Fault>> {
        Box::pin(async move {
            let request = match guard::admit(unit) {
                Ok(request) => request,
                Err(dropped) => {
                    tracing::trace!(
                        connection_id = %ctx.id(),
                        kind = dropped.kind,
                        "Dropping unit that is not a buffered request"
                    );
                    metrics::record_dropped(dropped.kind);
                    return Ok(());
                }
            };
            self.dispatcher.dispatch(ctx, request).await?;
            Ok(())
        })
    }

    fn on_read_complete(&self, ctx: &SharedContext) {
        complete_read_cycle(ctx);
    }

    fn on_fault(&self, ctx: &SharedContext, fault: Fault) {
        contain_fault(ctx, fault);
    }
}
