//! Processor dispatch.
//!
//! # Responsibilities
//! - Classify an admitted request and look up its processor
//! - Build the work item, handing it the connection and the request
//! - Run it inline or hand it to its own task
//!
//! # Design Decisions
//! - Unclassified methods and unregistered categories are not faults: the
//!   request is dropped without a response
//! - No local recovery: build and inline run failures surface as [`Fault`]s
//! - Detached work items are flushed on success and closed on failure, since
//!   their result arrives after the read cycle has ended
//! - One processor is active per connection at a time: every work item holds
//!   the connection's processor slot while it runs, so a unit arriving behind
//!   a detached work item waits for it and responses keep request order

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::OwnedSemaphorePermit;
use tracing::Instrument;

use crate::config::Execution;
use crate::dispatch::classify::{classify, RequestCategory};
use crate::dispatch::error::Fault;
use crate::dispatch::processor::WorkItem;
use crate::dispatch::registry::ProcessorRegistry;
use crate::http::request::FullRequest;
use crate::net::context::SharedContext;
use crate::observability::{metrics, spans};

/// What happened to one admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The processor ran to completion inside the read cycle.
    Completed(RequestCategory),
    /// The processor was handed to its own task.
    Scheduled(RequestCategory),
    /// Known category, nothing registered for it.
    Unregistered(RequestCategory),
    /// Method outside the known categories.
    Unclassified,
    /// The connection closed while an earlier processor was still active.
    Abandoned(RequestCategory),
}

/// Routes requests to registered processors.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ProcessorRegistry>,
    execution: Execution,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProcessorRegistry>, execution: Execution) -> Self {
        Self {
            registry,
            execution,
        }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    /// Dispatch one request on `ctx`. The request is consumed by the processor.
    pub async fn dispatch(
        &self,
        ctx: &SharedContext,
        request: FullRequest,
    ) -> Result<DispatchOutcome, Fault> {
        let Some(category) = classify(request.method()) else {
            tracing::debug!(
                connection_id = %ctx.id(),
                request_id = %request.request_id(),
                method = %request.method(),
                "No category for method, dropping request"
            );
            metrics::record_unhandled("unclassified");
            return Ok(DispatchOutcome::Unclassified);
        };

        let Some(factory) = self.registry.get(category) else {
            tracing::debug!(
                connection_id = %ctx.id(),
                request_id = %request.request_id(),
                %category,
                path = request.path(),
                "No processor registered, dropping request"
            );
            metrics::record_unhandled(category.as_str());
            return Ok(DispatchOutcome::Unregistered(category));
        };

        let Ok(permit) = ctx.processor_slot().acquire_owned().await else {
            return Ok(DispatchOutcome::Abandoned(category));
        };
        if !ctx.is_open() {
            tracing::debug!(
                connection_id = %ctx.id(),
                request_id = %request.request_id(),
                %category,
                "Connection closed behind the active processor, dropping request"
            );
            return Ok(DispatchOutcome::Abandoned(category));
        }

        let span = spans::request_span(ctx.id(), &request, category);
        let started = Instant::now();
        tracing::debug!(parent: &span, processor = factory.name(), "Dispatching request");
        metrics::record_dispatched(category);

        let work = factory
            .build(Arc::clone(ctx), request)
            .map_err(|source| Fault::processor(category, source))?;

        match self.execution {
            Execution::Inline => {
                let _permit = permit;
                work.run()
                    .instrument(span)
                    .await
                    .map_err(|source| Fault::processor(category, source))?;
                metrics::record_dispatch_duration(category, started);
                Ok(DispatchOutcome::Completed(category))
            }
            Execution::Spawned => {
                let detached =
                    run_detached(category, Arc::clone(ctx), work, started, permit);
                tokio::spawn(detached.instrument(span));
                Ok(DispatchOutcome::Scheduled(category))
            }
        }
    }
}

async fn run_detached(
    category: RequestCategory,
    ctx: SharedContext,
    work: Box<dyn WorkItem>,
    started: Instant,
    _permit: OwnedSemaphorePermit,
) {
    let fault = match AssertUnwindSafe(work.run()).catch_unwind().await {
        Ok(Ok(())) => {
            metrics::record_dispatch_duration(category, started);
            if ctx.is_open() {
                ctx.flush();
            }
            return;
        }
        Ok(Err(source)) => Fault::processor(category, source),
        Err(panic) => Fault::from_panic(panic),
    };

    tracing::warn!(
        connection_id = %ctx.id(),
        kind = fault.kind(),
        %fault,
        "Detached processor failed, closing connection"
    );
    metrics::record_fault(fault.kind());
    ctx.close();
}
