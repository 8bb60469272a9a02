//! Request classification by method.
//!
//! Matching is exact and case-sensitive, as method tokens are in HTTP:
//! `post` is an extension method, not `POST`. Extension methods have no
//! category and are treated like unregistered categories by the dispatcher.

use std::fmt;

use http::Method;
use serde::{Deserialize, Serialize};

/// Closed set of request categories, one per standard method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    /// POST
    Create,
    /// GET
    Read,
    /// PUT
    Replace,
    /// PATCH
    Modify,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// CONNECT
    Connect,
    /// TRACE
    Trace,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 9] = [
        Self::Create,
        Self::Read,
        Self::Replace,
        Self::Modify,
        Self::Delete,
        Self::Head,
        Self::Options,
        Self::Connect,
        Self::Trace,
    ];

    /// The method this category is derived from.
    pub fn method(self) -> Method {
        match self {
            Self::Create => Method::POST,
            Self::Read => Method::GET,
            Self::Replace => Method::PUT,
            Self::Modify => Method::PATCH,
            Self::Delete => Method::DELETE,
            Self::Head => Method::HEAD,
            Self::Options => Method::OPTIONS,
            Self::Connect => Method::CONNECT,
            Self::Trace => Method::TRACE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Replace => "replace",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
            Self::Connect => "connect",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a method to its category. Extension methods yield `None`.
pub fn classify(method: &Method) -> Option<RequestCategory> {
    match *method {
        Method::POST => Some(RequestCategory::Create),
        Method::GET => Some(RequestCategory::Read),
        Method::PUT => Some(RequestCategory::Replace),
        Method::PATCH => Some(RequestCategory::Modify),
        Method::DELETE => Some(RequestCategory::Delete),
        Method::HEAD => Some(RequestCategory::Head),
        Method::OPTIONS => Some(RequestCategory::Options),
        Method::CONNECT => Some(RequestCategory::Connect),
        Method::TRACE => Some(RequestCategory::Trace),
        _ => None,
    }
}
