//! Streaming a [`ResponseChain`] as an HTTP body.
//!
//! Pattern and inline descriptors become zero-copy [`Bytes`] slices. Zero
//! device descriptors are read from the device in bounded chunks, so a
//! multi-gigabyte payload never sits in memory at once.
//!
//! The body is polled by the transport after the handler has returned, so a
//! failure while streaming is reported by the body itself: logged once at
//! critical severity and passed to the [`FailureHook`], if any.

use crate::chain::{BufferDescriptor, ResponseChain, Source};
use crate::device::DeviceHandle;
use crate::lifecycle::RequestState;
use crate::pattern::StaticPatternBuffer;
use crate::plan::Strategy;
use bytes::{Bytes, BytesMut};
use hyper::body::{Body, Frame, SizeHint};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use tokio::io::ReadBuf;

/// Largest single read from the zero device (64KB).
pub const ZERO_CHUNK: usize = 64 * 1024;

/// Called once when a body ends early with an error.
pub type FailureHook = Arc<dyn Fn(&BodyFailure) + Send + Sync>;

/// The request a body belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendContext {
    pub path: String,
    pub length: u64,
    pub strategy: Strategy,
}

/// A body that failed after its headers went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyFailure {
    pub context: Option<SendContext>,
    pub bytes_sent: u64,
    pub error: String,
}

/// Response body that walks a descriptor chain.
///
/// Owns the zero device handle while any device-backed bytes remain to be
/// sent; dropping the body closes it.
pub struct ChainBody {
    descriptors: std::vec::IntoIter<BufferDescriptor>,
    current: Option<BufferDescriptor>,
    pattern: StaticPatternBuffer,
    device: Option<DeviceHandle>,
    total: u64,
    remaining: u64,
    context: Option<SendContext>,
    on_failure: Option<FailureHook>,
    failed: bool,
}

impl ChainBody {
    pub fn new(
        chain: ResponseChain,
        pattern: StaticPatternBuffer,
        device: Option<DeviceHandle>,
    ) -> Self {
        let total = chain.total_length();
        Self {
            descriptors: chain.into_descriptors().into_iter(),
            current: None,
            pattern,
            device,
            total,
            remaining: total,
            context: None,
            on_failure: None,
            failed: false,
        }
    }

    /// A body with no bytes.
    pub fn empty() -> Self {
        Self::new(ResponseChain::default(), StaticPatternBuffer::default(), None)
    }

    /// Attach the request this body answers, for failure reports.
    pub fn with_context(mut self, context: SendContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn on_failure(mut self, hook: FailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    /// Bytes not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        loop {
            let mut descriptor = match self.current.take() {
                Some(descriptor) => descriptor,
                None => match self.descriptors.next() {
                    Some(descriptor) => descriptor,
                    None => return Poll::Ready(None),
                },
            };
            if descriptor.length == 0 {
                continue;
            }

            let chunk = match self.memory_span(&descriptor) {
                Some(chunk) => {
                    descriptor.length = 0;
                    Ok(chunk)
                }
                None => match self.poll_device(cx, &mut descriptor) {
                    Poll::Ready(chunk) => chunk,
                    Poll::Pending => {
                        self.current = Some(descriptor);
                        return Poll::Pending;
                    }
                },
            };

            if descriptor.length > 0 {
                self.current = Some(descriptor);
            }
            if let Ok(chunk) = &chunk {
                self.remaining -= chunk.len() as u64;
            }
            return Poll::Ready(Some(chunk));
        }
    }

    /// The whole span of an in-memory descriptor, `None` for the device.
    fn memory_span(&self, descriptor: &BufferDescriptor) -> Option<Bytes> {
        let start = descriptor.offset as usize;
        let len = descriptor.length as usize;
        match &descriptor.source {
            Source::StaticPattern => Some(self.pattern.span(start, len)),
            Source::Inline(bytes) => Some(bytes.slice(start..start + len)),
            Source::ZeroDevice => None,
        }
    }

    fn poll_device(
        &mut self,
        cx: &mut Context<'_>,
        descriptor: &mut BufferDescriptor,
    ) -> Poll<io::Result<Bytes>> {
        let Some(device) = self.device.as_mut() else {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                "zero source not open",
            )));
        };

        let want = descriptor.length.min(ZERO_CHUNK as u64) as usize;
        let mut buf = BytesMut::zeroed(want);
        let mut read_buf = ReadBuf::new(&mut buf);
        ready!(device.poll_read_into(cx, &mut read_buf))?;

        let n = read_buf.filled().len();
        if n == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} returned end of file", device.path().display()),
            )));
        }
        buf.truncate(n);

        descriptor.offset += n as u64;
        descriptor.length -= n as u64;
        Poll::Ready(Ok(buf.freeze()))
    }

    fn report_failure(&mut self, error: &io::Error) {
        if self.failed {
            return;
        }
        self.failed = true;

        let failure = BodyFailure {
            context: self.context.clone(),
            bytes_sent: self.total - self.remaining,
            error: error.to_string(),
        };
        let (path, length, strategy) = match &failure.context {
            Some(ctx) => (ctx.path.as_str(), ctx.length as i64, ctx.strategy.as_str()),
            None => ("", -1, "unresolved"),
        };
        tracing::error!(
            severity = "critical",
            path,
            length,
            strategy,
            stage = %RequestState::HeadersSent,
            bytes_sent = failure.bytes_sent,
            error = %error,
            "Dali body send failed"
        );

        if let Some(hook) = &self.on_failure {
            hook(&failure);
        }
    }
}

impl fmt::Debug for ChainBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBody")
            .field("total", &self.total)
            .field("remaining", &self.remaining)
            .field("device", &self.device)
            .field("context", &self.context)
            .finish()
    }
}

impl Body for ChainBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let chunk = ready!(this.poll_chunk(cx));
        if let Some(Err(e)) = &chunk {
            this.report_failure(e);
        }
        if this.remaining == 0 {
            // Nothing left that needs the device
            this.device = None;
        }
        Poll::Ready(chunk.map(|chunk| chunk.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        self.remaining == 0
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}
