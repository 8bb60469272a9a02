//! Admission check for inbound units.
//!
//! Only fully buffered requests go on to classification. Streaming fragments
//! are dropped without a response and without a fault.

use crate::http::request::FullRequest;
use crate::http::unit::InboundUnit;

/// A unit that was not a complete request and was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dropped {
    pub kind: &'static str,
}

/// Admit a unit for dispatch if it is a fully buffered request.
pub fn admit(unit: InboundUnit) -> Result<FullRequest, Dropped> {
    match unit {
        InboundUnit::Request(request) => Ok(request),
        other => Err(Dropped { kind: other.kind() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestHead;
    use bytes::Bytes;
    use http::{HeaderMap, Method, Version};

    fn head() -> RequestHead {
        RequestHead::new(Method::POST, "/", Version::HTTP_11, HeaderMap::new())
    }

    #[test]
    fn admits_full_requests_untouched() {
        let request = FullRequest::new(head(), Bytes::from_static(b"Action=Ping"));
        let id = request.request_id();

        let admitted = admit(InboundUnit::Request(request)).unwrap();
        assert_eq!(admitted.request_id(), id);
        assert_eq!(&admitted.body()[..], b"Action=Ping");
    }

    #[test]
    fn drops_streaming_fragments() {
        assert_eq!(admit(InboundUnit::Head(head())).unwrap_err().kind, "head");
        assert_eq!(
            admit(InboundUnit::Chunk(Bytes::from_static(b"x"))).unwrap_err().kind,
            "chunk"
        );
        assert_eq!(admit(InboundUnit::End).unwrap_err().kind, "end");
    }
}
