//! `GetServerStatus` action: a liveness check over the normal dispatch path.

use futures_util::future::BoxFuture;
use http::StatusCode;
use serde::Serialize;

use crate::dispatch::error::ProcessorError;
use crate::http::response::AuthResponse;
use crate::processors::form_action::ActionRequest;

/// Action name the status handler is registered under.
pub const STATUS_ACTION: &str = "GetServerStatus";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: &'static str,
    version: &'static str,
    request_id: String,
}

pub fn server_status(
    request: ActionRequest,
) -> BoxFuture<'static, Result<AuthResponse, ProcessorError>> {
    Box::pin(async move {
        let body = StatusBody {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            request_id: request.request_id().to_string(),
        };
        Ok(AuthResponse::json(StatusCode::OK, &body))
    })
}
