//! HTTP/1.1 framing for inbound requests and outbound responses.
//!
//! [`Http1Codec`] turns raw connection bytes into [`InboundUnit`]s and
//! serializes [`AuthResponse`]s. Request heads are parsed with `httparse`.
//!
//! # Body framing
//! - `Content-Length` bodies are always buffered into a [`FullRequest`].
//! - `Transfer-Encoding: chunked` bodies are buffered too when aggregation is
//!   enabled; otherwise the codec emits `Head`, `Chunk`… and `End` units.
//! - Both headers together is rejected (request smuggling vector).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, Version};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::config::LimitsConfig;
use crate::http::request::{FullRequest, RequestHead};
use crate::http::response::AuthResponse;
use crate::http::unit::InboundUnit;

/// Longest chunk-size line accepted (size plus extensions).
const MAX_CHUNK_LINE: usize = 4096;

/// Framing errors. Any of these ends the connection.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request head: {0}")]
    Parse(httparse::Error),

    #[error("invalid method token")]
    InvalidMethod,

    #[error("unsupported HTTP version")]
    UnsupportedVersion,

    #[error("invalid header field '{0}'")]
    InvalidHeader(String),

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("request has more than {limit} header fields")]
    TooManyHeaders { limit: usize },

    #[error("invalid Content-Length")]
    InvalidContentLength,

    #[error("both Content-Length and Transfer-Encoding present")]
    AmbiguousLength,

    #[error("unsupported Transfer-Encoding")]
    UnsupportedTransferEncoding,

    #[error("malformed chunked body")]
    BadChunk,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

#[derive(Debug)]
enum BodyFraming {
    Empty,
    Length(usize),
    Chunked,
}

#[derive(Debug, Clone, Copy)]
enum ChunkPhase {
    Size,
    Data(usize),
    Trailers,
}

#[derive(Debug)]
struct ChunkedBody {
    /// Present while aggregating; `None` when streaming fragments upward.
    head: Option<RequestHead>,
    body: BytesMut,
    received: usize,
    phase: ChunkPhase,
}

impl ChunkedBody {
    fn aggregating(head: RequestHead) -> Self {
        Self {
            head: Some(head),
            body: BytesMut::new(),
            received: 0,
            phase: ChunkPhase::Size,
        }
    }

    fn streaming() -> Self {
        Self {
            head: None,
            body: BytesMut::new(),
            received: 0,
            phase: ChunkPhase::Size,
        }
    }
}

#[derive(Debug)]
enum DecodeState {
    Head,
    Body { head: RequestHead, length: usize },
    Chunked(ChunkedBody),
}

/// HTTP/1.1 request decoder and response encoder.
#[derive(Debug)]
pub struct Http1Codec {
    state: DecodeState,
    limits: LimitsConfig,
    aggregate_chunked: bool,
}

impl Http1Codec {
    pub fn new(limits: LimitsConfig, aggregate_chunked: bool) -> Self {
        Self {
            state: DecodeState::Head,
            limits,
            aggregate_chunked,
        }
    }

    /// True when part of a request has been consumed but not yet emitted.
    pub fn is_mid_request(&self) -> bool {
        !matches!(self.state, DecodeState::Head)
    }

    fn decode_head(
        &self,
        src: &mut BytesMut,
    ) -> Result<Option<(RequestHead, BodyFraming)>, CodecError> {
        // Empty lines between requests are tolerated (RFC 9112 §2.2).
        while src.starts_with(b"\r\n") {
            src.advance(2);
        }
        if src.is_empty() {
            return Ok(None);
        }

        let limit = self.limits.max_head_bytes;
        let mut slots = vec![httparse::EMPTY_HEADER; self.limits.max_headers];
        let mut parsed = httparse::Request::new(&mut slots);
        let head_len = match parsed.parse(&src[..]) {
            Ok(httparse::Status::Complete(len)) => len,
            Ok(httparse::Status::Partial) if src.len() > limit => {
                return Err(CodecError::HeadTooLarge { limit });
            }
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(httparse::Error::TooManyHeaders) => {
                return Err(CodecError::TooManyHeaders {
                    limit: self.limits.max_headers,
                });
            }
            Err(error) => return Err(CodecError::Parse(error)),
        };
        if head_len > limit {
            return Err(CodecError::HeadTooLarge { limit });
        }

        let method = Method::from_bytes(parsed.method.unwrap_or_default().as_bytes())
            .map_err(|_| CodecError::InvalidMethod)?;
        let target = parsed.path.unwrap_or_default().to_owned();
        let version = match parsed.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            _ => return Err(CodecError::UnsupportedVersion),
        };

        let mut headers = HeaderMap::with_capacity(parsed.headers.len());
        for field in parsed.headers.iter() {
            let invalid = || CodecError::InvalidHeader(field.name.to_owned());
            let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_bytes(field.value).map_err(|_| invalid())?;
            headers.append(name, value);
        }

        let framing = self.body_framing(&headers)?;
        src.advance(head_len);
        Ok(Some((RequestHead::new(method, target, version, headers), framing)))
    }

    fn body_framing(&self, headers: &HeaderMap) -> Result<BodyFraming, CodecError> {
        let transfer_encoding = headers.get_all(TRANSFER_ENCODING).iter().last();
        if let Some(value) = transfer_encoding {
            if headers.contains_key(CONTENT_LENGTH) {
                return Err(CodecError::AmbiguousLength);
            }
            // Only chunked as the final coding is understood.
            let last_coding = value
                .to_str()
                .ok()
                .and_then(|v| v.rsplit(',').next())
                .map(str::trim)
                .unwrap_or_default();
            return if last_coding.eq_ignore_ascii_case("chunked") {
                Ok(BodyFraming::Chunked)
            } else {
                Err(CodecError::UnsupportedTransferEncoding)
            };
        }

        let mut length: Option<usize> = None;
        for value in headers.get_all(CONTENT_LENGTH) {
            let parsed = value
                .to_str()
                .ok()
                .map(str::trim)
                .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|v| v.parse::<usize>().ok())
                .ok_or(CodecError::InvalidContentLength)?;
            if length.is_some_and(|previous| previous != parsed) {
                return Err(CodecError::InvalidContentLength);
            }
            length = Some(parsed);
        }

        match length {
            None | Some(0) => Ok(BodyFraming::Empty),
            Some(n) if n > self.limits.max_body_bytes => Err(CodecError::BodyTooLarge {
                limit: self.limits.max_body_bytes,
            }),
            Some(n) => Ok(BodyFraming::Length(n)),
        }
    }

    fn decode_body(
        &mut self,
        head: RequestHead,
        length: usize,
        src: &mut BytesMut,
    ) -> Result<Option<InboundUnit>, CodecError> {
        if src.len() < length {
            src.reserve(length - src.len());
            self.state = DecodeState::Body { head, length };
            return Ok(None);
        }
        let body = src.split_to(length).freeze();
        Ok(Some(InboundUnit::Request(FullRequest::new(head, body))))
    }

    fn decode_chunked(
        &mut self,
        mut chunked: ChunkedBody,
        src: &mut BytesMut,
    ) -> Result<Option<InboundUnit>, CodecError> {
        loop {
            let phase = chunked.phase;
            match phase {
                ChunkPhase::Size => {
                    let Some(line_end) = find_crlf(src) else {
                        if src.len() > MAX_CHUNK_LINE {
                            return Err(CodecError::BadChunk);
                        }
                        self.state = DecodeState::Chunked(chunked);
                        return Ok(None);
                    };
                    let size = parse_chunk_size(&src[..line_end])?;
                    src.advance(line_end + 2);

                    if size == 0 {
                        chunked.phase = ChunkPhase::Trailers;
                        continue;
                    }
                    let limit = self.limits.max_body_bytes;
                    if chunked.received.saturating_add(size) > limit {
                        return Err(CodecError::BodyTooLarge { limit });
                    }
                    chunked.received += size;
                    chunked.phase = ChunkPhase::Data(size);
                }
                ChunkPhase::Data(size) => {
                    if src.len() < size + 2 {
                        src.reserve(size + 2 - src.len());
                        self.state = DecodeState::Chunked(chunked);
                        return Ok(None);
                    }
                    if &src[size..size + 2] != b"\r\n" {
                        return Err(CodecError::BadChunk);
                    }
                    let data = src.split_to(size);
                    src.advance(2);
                    chunked.phase = ChunkPhase::Size;

                    if chunked.head.is_some() {
                        chunked.body.extend_from_slice(&data);
                    } else {
                        self.state = DecodeState::Chunked(chunked);
                        return Ok(Some(InboundUnit::Chunk(data.freeze())));
                    }
                }
                ChunkPhase::Trailers => {
                    let Some(line_end) = find_crlf(src) else {
                        let limit = self.limits.max_head_bytes;
                        if src.len() > limit {
                            return Err(CodecError::HeadTooLarge { limit });
                        }
                        self.state = DecodeState::Chunked(chunked);
                        return Ok(None);
                    };
                    src.advance(line_end + 2);
                    if line_end > 0 {
                        // Trailer fields are discarded.
                        continue;
                    }
                    return Ok(Some(match chunked.head {
                        Some(head) => {
                            InboundUnit::Request(FullRequest::new(head, chunked.body.freeze()))
                        }
                        None => InboundUnit::End,
                    }));
                }
            }
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse `1*HEXDIG [ ";" chunk-ext ]`.
fn parse_chunk_size(line: &[u8]) -> Result<usize, CodecError> {
    let line = std::str::from_utf8(line).map_err(|_| CodecError::BadChunk)?;
    let size = line.split(';').next().unwrap_or_default().trim();
    if size.is_empty() || size.len() > 16 || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::BadChunk);
    }
    usize::from_str_radix(size, 16).map_err(|_| CodecError::BadChunk)
}

impl Decoder for Http1Codec {
    type Item = InboundUnit;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InboundUnit>, CodecError> {
        match std::mem::replace(&mut self.state, DecodeState::Head) {
            DecodeState::Head => {
                let Some((head, framing)) = self.decode_head(src)? else {
                    return Ok(None);
                };
                match framing {
                    BodyFraming::Empty => Ok(Some(InboundUnit::Request(FullRequest::new(
                        head,
                        Bytes::new(),
                    )))),
                    BodyFraming::Length(length) => self.decode_body(head, length, src),
                    BodyFraming::Chunked if self.aggregate_chunked => {
                        self.decode_chunked(ChunkedBody::aggregating(head), src)
                    }
                    BodyFraming::Chunked => {
                        self.state = DecodeState::Chunked(ChunkedBody::streaming());
                        Ok(Some(InboundUnit::Head(head)))
                    }
                }
            }
            DecodeState::Body { head, length } => self.decode_body(head, length, src),
            DecodeState::Chunked(chunked) => self.decode_chunked(chunked, src),
        }
    }
}

impl Encoder<AuthResponse> for Http1Codec {
    type Error = CodecError;

    fn encode(&mut self, item: AuthResponse, dst: &mut BytesMut) -> Result<(), CodecError> {
        let status = item.status();
        let length = item.body().len().to_string();

        dst.reserve(64 + item.headers().len() * 32 + item.body().len());
        dst.put_slice(b"HTTP/1.1 ");
        dst.put_slice(status.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
        dst.put_slice(b"\r\n");

        for (name, value) in item.headers() {
            if *name == CONTENT_LENGTH {
                continue;
            }
            dst.put_slice(name.as_str().as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"content-length: ");
        dst.put_slice(length.as_bytes());
        dst.put_slice(b"\r\n\r\n");
        dst.put_slice(item.body());
        Ok(())
    }
}
