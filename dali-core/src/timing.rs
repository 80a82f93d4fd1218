//! Request body drain timing.
//!
//! [`BodyDrainTimer`] reads and discards the inbound request body between two
//! monotonic timestamps and produces a [`TimingReport`]. The report renders
//! to a fixed-shape JSON object:
//!
//! ```text
//! {"durationMicros":2000.00000000,"bytesRead":1000,"bytesPerSecond":500000.00000000}
//! ```
//!
//! The rendered width depends on the numbers, so the exact byte length is
//! computed with a dry run first; the instrumented strategy needs it to check
//! the report against the response budget before anything is allocated.

use crate::{Error, Result};
use bytes::{Buf, Bytes};
use http_body_util::BodyExt;
use hyper::body::Body;
use serde::Serialize;
use std::fmt::{self, Write};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A monotonic instant split into whole seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(secs: u64, nanos: u32) -> Self {
        Self { secs, nanos }
    }
}

/// Source of monotonic timestamps.
pub trait MonotonicClock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Monotonic clock backed by `tokio::time::Instant`.
///
/// Follows tokio's paused clock under test.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for TokioClock {
    fn now(&self) -> Timestamp {
        let since = tokio::time::Instant::now().duration_since(self.origin);
        Timestamp::new(since.as_secs(), since.subsec_nanos())
    }
}

/// Elapsed time between two timestamps in microseconds.
///
/// Borrows a second when the nanosecond difference is negative, then
/// flattens without truncation. Never negative.
pub fn elapsed_micros(start: Timestamp, end: Timestamp) -> f64 {
    let mut secs = end.secs as i128 - start.secs as i128;
    let mut nanos = end.nanos as i64 - start.nanos as i64;
    if nanos < 0 {
        secs -= 1;
        nanos += NANOS_PER_SEC;
    }
    if secs < 0 {
        return 0.0;
    }
    secs as f64 * 1_000_000.0 + nanos as f64 / 1_000.0
}

/// Outcome of draining one request body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingReport {
    pub duration_micros: f64,
    pub bytes_read: u64,
    pub bytes_per_second: f64,
}

impl TimingReport {
    pub fn new(duration_micros: f64, bytes_read: u64) -> Self {
        let duration_micros = duration_micros.max(0.0);
        let bytes_per_second = if duration_micros > 0.0 {
            bytes_read as f64 * 1_000_000.0 / duration_micros
        } else {
            0.0
        };
        Self {
            duration_micros,
            bytes_read,
            bytes_per_second,
        }
    }

    fn write_to<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "{{\"durationMicros\":{:.8},\"bytesRead\":{},\"bytesPerSecond\":{:.8}}}",
            self.duration_micros, self.bytes_read, self.bytes_per_second
        )
    }

    /// Exact byte length of [`render`](Self::render)'s output.
    pub fn rendered_len(&self) -> usize {
        let mut counter = LengthCounter(0);
        // LengthCounter never fails
        let _ = self.write_to(&mut counter);
        counter.0
    }

    /// Render into a buffer sized by the dry run.
    pub fn render(&self) -> Result<Bytes> {
        let len = self.rendered_len();
        let mut out = String::new();
        out.try_reserve_exact(len)
            .map_err(|e| Error::AllocationFailure(format!("timing report buffer: {e}")))?;
        self.write_to(&mut out)
            .map_err(|e| Error::AllocationFailure(format!("timing report: {e}")))?;
        debug_assert_eq!(out.len(), len);
        Ok(Bytes::from(out))
    }

    /// Render only if the report fits in `budget` bytes.
    pub fn render_within(&self, budget: u64) -> Result<Bytes> {
        let len = self.rendered_len() as u64;
        if len > budget {
            return Err(Error::ReportTooLargeForBudget {
                report: len,
                budget,
            });
        }
        self.render()
    }
}

struct LengthCounter(usize);

impl Write for LengthCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Drains request bodies between two clock readings.
#[derive(Debug, Clone, Default)]
pub struct BodyDrainTimer<C = TokioClock> {
    clock: C,
}

impl BodyDrainTimer<TokioClock> {
    pub fn new() -> Self {
        Self::with_clock(TokioClock::new())
    }
}

impl<C: MonotonicClock> BodyDrainTimer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Read and discard `body`, timing the whole drain.
    ///
    /// A missing body counts as zero bytes.
    pub async fn drain<B>(&self, body: Option<B>) -> Result<TimingReport>
    where
        B: Body + Unpin,
        B::Error: fmt::Display,
    {
        let start = self.clock.now();
        let mut bytes_read = 0u64;

        if let Some(mut body) = body {
            while let Some(frame) = body.frame().await {
                let frame = frame.map_err(|e| Error::BodyDiscardFailure(e.to_string()))?;
                if let Some(data) = frame.data_ref() {
                    bytes_read += data.remaining() as u64;
                }
            }
        }

        let end = self.clock.now();
        let report = TimingReport::new(elapsed_micros(start, end), bytes_read);

        tracing::debug!(
            duration_us = report.duration_micros,
            bytes_read = report.bytes_read,
            "Request body drained"
        );

        Ok(report)
    }
}
