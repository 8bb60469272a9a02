//! Outbound responses written by processors.
//!
//! The dispatch layer never builds responses itself; this type is the unit a
//! processor writes onto the connection. `Content-Length` is always computed
//! by the encoder from the body.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct AuthResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl AuthResponse {
    /// Empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Serialize `value` as a JSON body.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                Self::new(status).with_body(HeaderValue::from_static("application/json"), body)
            }
            Err(error) => {
                tracing::error!(%error, "failed to serialize response body");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Set the body and its content type.
    pub fn with_body(mut self, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.body = body.into();
        self
    }

    /// Set a header, replacing previous values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type() {
        let response = AuthResponse::json(StatusCode::OK, &serde_json::json!({"ok": true}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(&response.body()[..], br#"{"ok":true}"#);
    }

    #[test]
    fn with_header_replaces() {
        let name = HeaderName::from_static("x-request-id");
        let response = AuthResponse::new(StatusCode::NO_CONTENT)
            .with_header(name.clone(), HeaderValue::from_static("a"))
            .with_header(name.clone(), HeaderValue::from_static("b"));
        assert_eq!(response.headers().get_all(&name).iter().count(), 1);
        assert_eq!(response.headers()[&name], "b");
    }
}
