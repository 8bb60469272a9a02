//! `Action=` routed form processor.
//!
//! # Responsibilities
//! - Decode the `application/x-www-form-urlencoded` body
//! - Route on the `Action` parameter to a registered handler
//! - Write the handler's response, tagged with the request ID
//!
//! # Design Decisions
//! - A missing or unknown action is a client error answered with a 400 JSON
//!   body; it is not a fault and leaves the connection open
//! - Handler errors are not caught here: they become faults and close the
//!   connection
//! - Undecodable bytes are parsed lossily rather than rejected

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, CONNECTION};
use http::StatusCode;
use serde::Serialize;
use url::form_urlencoded;

use crate::dispatch::error::ProcessorError;
use crate::dispatch::processor::{ProcessorFactory, WorkItem};
use crate::http::request::{FullRequest, RequestId, X_REQUEST_ID};
use crate::http::response::AuthResponse;
use crate::net::context::SharedContext;

/// Form parameter naming the action to run.
pub const ACTION_PARAM: &str = "Action";

/// Decoded form request handed to an action handler.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    action: String,
    params: BTreeMap<String, String>,
    request_id: RequestId,
    host: Option<String>,
}

impl ActionRequest {
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Look up a form parameter. The first occurrence wins.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

/// Handles one named action.
pub trait ActionHandler: Send + Sync + 'static {
    fn handle(&self, request: ActionRequest)
        -> BoxFuture<'static, Result<AuthResponse, ProcessorError>>;
}

impl<F, Fut> ActionHandler for F
where
    F: Fn(ActionRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AuthResponse, ProcessorError>> + Send + 'static,
{
    fn handle(
        &self,
        request: ActionRequest,
    ) -> BoxFuture<'static, Result<AuthResponse, ProcessorError>> {
        Box::pin(self(request))
    }
}

type ActionTable = HashMap<String, Arc<dyn ActionHandler>>;

/// Builds a work item per request that dispatches on the `Action` parameter.
#[derive(Clone, Default)]
pub struct FormActionFactory {
    actions: Arc<ActionTable>,
}

impl FormActionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`. Names match exactly.
    pub fn with_action(mut self, name: impl Into<String>, handler: impl ActionHandler) -> Self {
        let name = name.into();
        let actions = Arc::make_mut(&mut self.actions);
        if actions.insert(name.clone(), Arc::new(handler)).is_some() {
            tracing::warn!(action = %name, "Replacing registered action handler");
        }
        self
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

impl fmt::Debug for FormActionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.actions().collect();
        names.sort_unstable();
        f.debug_struct("FormActionFactory")
            .field("actions", &names)
            .finish()
    }
}

impl ProcessorFactory for FormActionFactory {
    fn name(&self) -> &str {
        "form-action"
    }

    fn build(
        &self,
        ctx: SharedContext,
        request: FullRequest,
    ) -> Result<Box<dyn WorkItem>, ProcessorError> {
        Ok(Box::new(FormActionWork {
            ctx,
            request,
            actions: Arc::clone(&self.actions),
        }))
    }
}

struct FormActionWork {
    ctx: SharedContext,
    request: FullRequest,
    actions: Arc<ActionTable>,
}

impl WorkItem for FormActionWork {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), ProcessorError>> {
        Box::pin(async move {
            let Self {
                ctx,
                request,
                actions,
            } = *self;
            let request_id = request.request_id();
            let close_after = request.wants_close();

            let response = match decode(&request) {
                Err(rejection) => {
                    tracing::debug!(%request_id, code = rejection.code(), "Rejecting form request");
                    rejection.into_response(request_id)
                }
                Ok(action_request) => match actions.get(action_request.action()) {
                    Some(handler) => {
                        tracing::debug!(
                            %request_id,
                            action = action_request.action(),
                            "Running action"
                        );
                        handler.handle(action_request).await?
                    }
                    None => {
                        let rejection = Rejection::InvalidAction(action_request.action);
                        tracing::debug!(
                            %request_id,
                            code = rejection.code(),
                            "Rejecting form request"
                        );
                        rejection.into_response(request_id)
                    }
                },
            };

            let mut response = tag_request_id(response, request_id);
            if close_after {
                response = response.with_header(CONNECTION, HeaderValue::from_static("close"));
                ctx.write(response);
                ctx.flush();
                ctx.close();
            } else {
                ctx.write(response);
            }
            Ok(())
        })
    }
}

fn decode(request: &FullRequest) -> Result<ActionRequest, Rejection> {
    let mut params = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(request.body()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }

    let action = match params.get(ACTION_PARAM) {
        Some(action) if !action.is_empty() => action.clone(),
        _ => return Err(Rejection::MissingAction),
    };

    Ok(ActionRequest {
        action,
        params,
        request_id: request.request_id(),
        host: request.host().map(str::to_owned),
    })
}

fn tag_request_id(response: AuthResponse, request_id: RequestId) -> AuthResponse {
    match HeaderValue::from_str(&request_id.to_string()) {
        Ok(value) => response.with_header(HeaderName::from_static(X_REQUEST_ID), value),
        Err(_) => response,
    }
}

#[derive(Debug)]
enum Rejection {
    MissingAction,
    InvalidAction(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    code: &'static str,
    message: String,
    request_id: &'a str,
}

impl Rejection {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingAction => "MissingAction",
            Self::InvalidAction(_) => "InvalidAction",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::MissingAction => format!("request must include the {ACTION_PARAM} parameter"),
            Self::InvalidAction(name) => format!("action '{name}' is not supported"),
        }
    }

    fn into_response(self, request_id: RequestId) -> AuthResponse {
        let request_id = request_id.to_string();
        let body = serde_json::json!({
            "error": ErrorBody {
                code: self.code(),
                message: self.message(),
                request_id: &request_id,
            }
        });
        AuthResponse::json(StatusCode::BAD_REQUEST, &body)
    }
}
