//! Hosting transport seam.
//!
//! The payload engine never touches sockets. It talks to whatever hosts it
//! through [`Transport`]: take the inbound body, send a [`ResponseHead`],
//! then hand over the body as a [`ChainBody`]. The hyper server implements
//! it for real connections; tests implement it in memory.

use crate::body::ChainBody;
use crate::range::{ByteRange, unsatisfied_content_range};
use async_trait::async_trait;
use http::{HeaderValue, StatusCode, header};
use hyper::body::Body;

/// Content type of every payload response.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Error reported by a transport primitive.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Status line and headers of a payload response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub content_length: u64,
    pub content_type: &'static str,
    /// Advertise `Accept-Ranges: bytes`
    pub accept_ranges: bool,
    pub content_range: Option<String>,
    /// Whether the transport may use a sendfile-style shortcut for the body.
    /// Only a regular seekable file qualifies; synthetic chains never do.
    pub passthrough: bool,
}

impl ResponseHead {
    /// `200 OK` for a full body of `content_length` bytes.
    pub fn ok(content_length: u64) -> Self {
        Self {
            status: StatusCode::OK,
            content_length,
            content_type: CONTENT_TYPE,
            accept_ranges: false,
            content_range: None,
            passthrough: false,
        }
    }

    /// `206 Partial Content` for `range` of a `total` byte payload.
    pub fn partial(range: ByteRange, total: u64) -> Self {
        Self {
            status: StatusCode::PARTIAL_CONTENT,
            content_length: range.len(),
            content_range: Some(range.content_range(total)),
            accept_ranges: true,
            ..Self::ok(0)
        }
    }

    /// Empty-bodied error head for `status`.
    pub fn error(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::ok(0)
        }
    }

    /// `416 Range Not Satisfiable` against a `total` byte payload.
    pub fn unsatisfiable(total: u64) -> Self {
        Self {
            content_range: Some(unsatisfied_content_range(total)),
            accept_ranges: true,
            ..Self::error(StatusCode::RANGE_NOT_SATISFIABLE)
        }
    }

    pub fn with_accept_ranges(mut self, enabled: bool) -> Self {
        self.accept_ranges = enabled;
        self
    }

    /// Start an `http` response builder carrying this head.
    pub fn to_builder(&self) -> http::response::Builder {
        let mut builder = http::Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type))
            .header(header::CONTENT_LENGTH, self.content_length);

        if self.accept_ranges {
            builder = builder.header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }
        if let Some(range) = &self.content_range {
            builder = builder.header(header::CONTENT_RANGE, range.as_str());
        }
        builder
    }
}

/// What the transport did with a response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOutcome {
    /// Headers are out; send the body next
    Continue,
    /// The response ends after the headers (e.g. `HEAD`)
    HeaderOnly,
}

/// Primitives the payload handler needs from its host.
#[async_trait]
pub trait Transport: Send {
    /// Inbound request body.
    type Body: Body + Send + Unpin;

    /// Take the request body. `None` once taken, or when there is none.
    fn take_body(&mut self) -> Option<Self::Body>;

    /// Send the status line and headers.
    async fn send_header(&mut self, head: ResponseHead) -> Result<HeaderOutcome, TransportError>;

    /// Send the response body. Only called after a `Continue` outcome.
    async fn send_chain(&mut self, body: ChainBody) -> Result<(), TransportError>;
}
