//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use authserver::config::{AuthServerConfig, Execution, ListenerConfig};
use authserver::dispatch::{ProcessorError, ProcessorRegistry, RequestCategory};
use authserver::http::AuthResponse;
use authserver::net::{Listener, ListenerError};
use authserver::processors::{ActionRequest, FormActionFactory};
use authserver::{AuthServer, Shutdown};
use futures_util::future::BoxFuture;
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
pub const SILENCE: Duration = Duration::from_millis(250);

/// A server bound to an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), ListenerError>>,
}

impl TestServer {
    /// Drain timeout is capped at one second so idle test clients never
    /// hold up `stop`.
    pub async fn start(mut config: AuthServerConfig, registry: ProcessorRegistry) -> Self {
        config.shutdown.drain_timeout_secs = config.shutdown.drain_timeout_secs.min(1);
        let listener = Listener::bind(&ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: config.listener.max_connections,
        })
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = AuthServer::new(&config, registry);
        let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    /// Server with the test form actions registered for `CREATE`.
    pub async fn with_actions(execution: Execution) -> Self {
        let mut config = AuthServerConfig::default();
        config.dispatch.execution = execution;
        Self::start(config, test_registry()).await
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

pub fn test_registry() -> ProcessorRegistry {
    let actions = FormActionFactory::new()
        .with_action("Echo", echo)
        .with_action("Fail", fail)
        .with_action("Panic", explode)
        .with_action("Slow", slow);
    ProcessorRegistry::builder()
        .register(RequestCategory::Create, actions)
        .build()
}

fn echo(request: ActionRequest) -> BoxFuture<'static, Result<AuthResponse, ProcessorError>> {
    Box::pin(async move {
        Ok(AuthResponse::json(
            StatusCode::OK,
            &serde_json::json!({
                "action": request.action(),
                "params": request.params(),
                "requestId": request.request_id().to_string(),
            }),
        ))
    })
}

fn fail(_request: ActionRequest) -> BoxFuture<'static, Result<AuthResponse, ProcessorError>> {
    Box::pin(async { Err(ProcessorError::execution("credential store unavailable")) })
}

fn explode(_request: ActionRequest) -> BoxFuture<'static, Result<AuthResponse, ProcessorError>> {
    panic!("action handler panicked")
}

fn slow(request: ActionRequest) -> BoxFuture<'static, Result<AuthResponse, ProcessorError>> {
    Box::pin(async move {
        let millis = request
            .param("DelayMs")
            .and_then(|value| value.parse().ok())
            .unwrap_or(100);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(AuthResponse::json(
            StatusCode::OK,
            &serde_json::json!({ "action": "Slow", "delayMs": millis }),
        ))
    })
}

/// Raw `POST /` with a form body.
pub fn form_post(body: &str) -> Vec<u8> {
    format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

pub async fn send(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
}

/// A parsed response as seen by the client.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Read exactly one response, leaving any later bytes unread in `pending`.
pub async fn read_response(stream: &mut TcpStream, pending: &mut Vec<u8>) -> RawResponse {
    tokio::time::timeout(REPLY_TIMEOUT, read_response_inner(stream, pending))
        .await
        .expect("timed out waiting for a response")
}

async fn read_response_inner(stream: &mut TcpStream, pending: &mut Vec<u8>) -> RawResponse {
    let head_end = loop {
        if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        fill(stream, pending).await;
    };
    let head = String::from_utf8(pending[..head_end].to_vec()).unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let length: usize = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);

    while pending.len() < head_end + length {
        fill(stream, pending).await;
    }
    let body = pending[head_end..head_end + length].to_vec();
    pending.drain(..head_end + length);
    RawResponse { status, head, body }
}

async fn fill(stream: &mut TcpStream, pending: &mut Vec<u8>) {
    let mut chunk = [0u8; 4096];
    let read = stream.read(&mut chunk).await.unwrap();
    assert!(read > 0, "connection closed before a full response arrived");
    pending.extend_from_slice(&chunk[..read]);
}

/// True if nothing arrives within [`SILENCE`] and the connection stays open.
pub async fn stays_silent(stream: &mut TcpStream) -> bool {
    let mut chunk = [0u8; 1];
    tokio::time::timeout(SILENCE, stream.read(&mut chunk))
        .await
        .is_err()
}

/// True if the server closes the connection without sending anything.
pub async fn closed_without_reply(stream: &mut TcpStream) -> bool {
    let mut out = Vec::new();
    match tokio::time::timeout(REPLY_TIMEOUT, stream.read_to_end(&mut out)).await {
        Ok(Ok(_)) => out.is_empty(),
        Ok(Err(_)) => out.is_empty(),
        Err(_) => false,
    }
}
