//! Fakes shared by the dispatch unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode, Version};
use tokio::sync::Semaphore;

use crate::dispatch::error::ProcessorError;
use crate::dispatch::processor::{ProcessorFactory, WorkItem};
use crate::http::request::{FullRequest, RequestHead, RequestId};
use crate::http::response::AuthResponse;
use crate::net::connection::{ConnectionId, ConnectionState};
use crate::net::context::{ConnectionContext, SharedContext};

pub(crate) fn request(method: Method, body: &'static [u8]) -> FullRequest {
    FullRequest::new(
        RequestHead::new(method, "/", Version::HTTP_11, HeaderMap::new()),
        Bytes::from_static(body),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConnEvent {
    Write(StatusCode),
    Flush,
    Close,
}

/// Connection fake that records every call made on it, including calls made
/// after close.
#[derive(Debug)]
pub(crate) struct RecordingConnection {
    id: ConnectionId,
    state: Mutex<ConnectionState>,
    events: Mutex<Vec<ConnEvent>>,
    slot: Arc<Semaphore>,
}

impl RecordingConnection {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            state: Mutex::new(ConnectionState::Open),
            events: Mutex::new(Vec::new()),
            slot: Arc::new(Semaphore::new(1)),
        })
    }

    pub(crate) fn shared(self: &Arc<Self>) -> SharedContext {
        Arc::clone(self) as SharedContext
    }

    pub(crate) fn events(&self) -> Vec<ConnEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn flushes(&self) -> usize {
        self.count(&ConnEvent::Flush)
    }

    pub(crate) fn closes(&self) -> usize {
        self.count(&ConnEvent::Close)
    }

    pub(crate) fn writes(&self) -> Vec<StatusCode> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ConnEvent::Write(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: &ConnEvent) -> usize {
        self.events().iter().filter(|event| *event == wanted).count()
    }

    fn record(&self, event: ConnEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConnectionContext for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn write(&self, response: AuthResponse) {
        self.record(ConnEvent::Write(response.status()));
    }

    fn flush(&self) {
        self.record(ConnEvent::Flush);
    }

    fn close(&self) {
        self.record(ConnEvent::Close);
        *self.state.lock().unwrap() = ConnectionState::Closed;
    }

    fn processor_slot(&self) -> Arc<Semaphore> {
        Arc::clone(&self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Write a 200 and return.
    Respond,
    /// Fail while being built.
    FailBuild,
    /// Fail while running.
    FailRun,
    /// Panic while running.
    Panic,
    /// Write, flush and close the connection itself.
    CloseConnection,
    /// Sleep briefly, then write a 202.
    Slow,
}

#[derive(Debug, Clone)]
pub(crate) struct Invocation {
    pub(crate) connection: ConnectionId,
    pub(crate) method: Method,
    pub(crate) body: Bytes,
    pub(crate) request_id: RequestId,
}

/// Factory that records each request it is handed.
pub(crate) struct RecordingFactory {
    name: String,
    behavior: Behavior,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl RecordingFactory {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            name: "recording".to_owned(),
            behavior,
            invocations: Arc::default(),
        }
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub(crate) fn invocations(&self) -> Arc<Mutex<Vec<Invocation>>> {
        Arc::clone(&self.invocations)
    }
}

impl ProcessorFactory for RecordingFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(
        &self,
        ctx: SharedContext,
        request: FullRequest,
    ) -> Result<Box<dyn WorkItem>, ProcessorError> {
        self.invocations.lock().unwrap().push(Invocation {
            connection: ctx.id(),
            method: request.method().clone(),
            body: request.body().clone(),
            request_id: request.request_id(),
        });
        if self.behavior == Behavior::FailBuild {
            return Err(ProcessorError::construction("missing credential store"));
        }
        Ok(Box::new(RecordingWork {
            ctx,
            behavior: self.behavior,
        }))
    }
}

struct RecordingWork {
    ctx: SharedContext,
    behavior: Behavior,
}

impl WorkItem for RecordingWork {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), ProcessorError>> {
        Box::pin(async move {
            match self.behavior {
                Behavior::Respond | Behavior::FailBuild => {
                    self.ctx.write(AuthResponse::new(StatusCode::OK));
                    Ok(())
                }
                Behavior::FailRun => Err(ProcessorError::execution("signature mismatch")),
                Behavior::Panic => panic!("processor blew up"),
                Behavior::Slow => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    self.ctx.write(AuthResponse::new(StatusCode::ACCEPTED));
                    Ok(())
                }
                Behavior::CloseConnection => {
                    self.ctx.write(AuthResponse::new(StatusCode::OK));
                    self.ctx.flush();
                    self.ctx.close();
                    Ok(())
                }
            }
        })
    }
}

/// Poll `condition` until it holds or a second passes.
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
