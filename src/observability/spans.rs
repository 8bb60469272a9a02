//! Request spans.

use tracing::Span;

use crate::dispatch::classify::RequestCategory;
use crate::http::request::FullRequest;
use crate::net::connection::ConnectionId;

/// Span covering one dispatched request, including detached work.
pub fn request_span(
    connection_id: ConnectionId,
    request: &FullRequest,
    category: RequestCategory,
) -> Span {
    tracing::info_span!(
        "request",
        %connection_id,
        request_id = %request.request_id(),
        method = %request.method(),
        %category,
        path = request.path(),
    )
}
