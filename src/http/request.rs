//! Inbound request model.
//!
//! # Responsibilities
//! - Represent a fully buffered HTTP request (head + body)
//! - Carry a request ID, honouring an inbound `x-request-id`
//! - Expose read-only accessors; the dispatcher hands the whole value to a
//!   processor, which becomes its sole consumer
//!
//! # Design Decisions
//! - Header names are case-insensitive (`http::HeaderMap` lowercases them)
//! - The request target is kept verbatim; no URI normalisation happens here

use std::fmt;

use bytes::Bytes;
use http::header::{CONNECTION, HOST};
use http::{HeaderMap, Method, Version};
use uuid::Uuid;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for a request, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reuse the caller's `x-request-id` when it is a UUID, otherwise mint one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Self)
            .unwrap_or_default()
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Request line and header block of an HTTP request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
}

impl RequestHead {
    pub fn new(
        method: Method,
        target: impl Into<String>,
        version: Version,
        headers: HeaderMap,
    ) -> Self {
        Self {
            method,
            target: target.into(),
            version,
            headers,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target exactly as received (path plus optional query).
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// A completely assembled HTTP request: head and whole body are available.
#[derive(Debug, Clone)]
pub struct FullRequest {
    head: RequestHead,
    body: Bytes,
    request_id: RequestId,
}

impl FullRequest {
    pub fn new(head: RequestHead, body: Bytes) -> Self {
        let request_id = RequestId::from_headers(head.headers());
        Self {
            head,
            body,
            request_id,
        }
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn target(&self) -> &str {
        self.head.target()
    }

    /// Path portion of the target, without the query string.
    pub fn path(&self) -> &str {
        match self.head.target().split_once('?') {
            Some((path, _)) => path,
            None => self.head.target(),
        }
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn host(&self) -> Option<&str> {
        self.headers().get(HOST).and_then(|value| value.to_str().ok())
    }

    /// Whether the client expects the connection to close after the response.
    ///
    /// HTTP/1.1 is persistent unless `Connection: close`; HTTP/1.0 closes
    /// unless `Connection: keep-alive`.
    pub fn wants_close(&self) -> bool {
        let has_token = |token: &str| {
            self.headers().get_all(CONNECTION).iter().any(|value| {
                value
                    .to_str()
                    .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
                    .unwrap_or(false)
            })
        };

        match self.version() {
            Version::HTTP_10 => !has_token("keep-alive"),
            _ => has_token("close"),
        }
    }
}
