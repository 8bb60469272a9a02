//! Processor contract.
//!
//! A processor is built fresh for every request: a [`ProcessorFactory`]
//! binds `(connection, request)` into a [`WorkItem`], and the dispatcher
//! decides whether that work item runs inside the read cycle or on its own
//! task. Whatever the work item writes goes through the connection context;
//! it must eventually leave a response on the connection or close it.

use futures_util::future::BoxFuture;

use crate::dispatch::error::ProcessorError;
use crate::http::request::FullRequest;
use crate::net::context::SharedContext;

/// Constructs work items for one request category.
pub trait ProcessorFactory: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Bind a work item to a connection and take ownership of the request.
    fn build(
        &self,
        ctx: SharedContext,
        request: FullRequest,
    ) -> Result<Box<dyn WorkItem>, ProcessorError>;
}

/// A runnable unit of work bound to one request.
pub trait WorkItem: Send + 'static {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), ProcessorError>>;
}
