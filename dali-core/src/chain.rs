//! Buffer descriptors and response chains.
//!
//! A [`ResponseChain`] is an ordered list of [`BufferDescriptor`]s, each
//! describing a span of response bytes without holding them: a window into
//! the shared pattern buffer, a window over the zero device, or a slice of
//! inline bytes (the timing report).
//!
//! Invariants upheld by every constructor and mutator:
//!
//! - the descriptor lengths sum to [`ResponseChain::total_length`]
//! - exactly one descriptor is flagged `is_last`, and it is the final one

use crate::{Error, Result};
use bytes::Bytes;

/// Where a descriptor's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    StaticPattern,
    ZeroDevice,
    InlineBytes,
}

/// Backing data of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The process-wide pattern quantum
    StaticPattern,
    /// The request's zero device handle (file backed)
    ZeroDevice,
    /// Bytes owned by the chain itself
    Inline(Bytes),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::StaticPattern => SourceKind::StaticPattern,
            Source::ZeroDevice => SourceKind::ZeroDevice,
            Source::Inline(_) => SourceKind::InlineBytes,
        }
    }
}

/// One span of the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Offset into the source
    pub offset: u64,
    /// Number of bytes taken from the source
    pub length: u64,
    pub source: Source,
    pub is_last: bool,
}

impl BufferDescriptor {
    pub fn new(source: Source, offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            source,
            is_last: false,
        }
    }

    #[inline]
    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// File backed rather than memory backed.
    #[inline]
    pub fn in_file(&self) -> bool {
        matches!(self.source, Source::ZeroDevice)
    }
}

/// Ordered descriptor sequence realising a payload plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseChain {
    descriptors: Vec<BufferDescriptor>,
}

impl ResponseChain {
    /// Allocate room for `count` descriptors.
    ///
    /// Fails with [`Error::AllocationFailure`] instead of aborting when the
    /// descriptor table cannot be allocated.
    pub fn with_capacity(count: u64) -> Result<Self> {
        let count = usize::try_from(count).map_err(|_| {
            Error::AllocationFailure(format!("{count} descriptors exceed the address space"))
        })?;
        let mut descriptors = Vec::new();
        descriptors.try_reserve_exact(count).map_err(|e| {
            Error::AllocationFailure(format!("descriptor table for {count} buffers: {e}"))
        })?;
        Ok(Self { descriptors })
    }

    /// Append a descriptor, moving the terminal flag onto it.
    pub fn push(&mut self, mut descriptor: BufferDescriptor) {
        if let Some(prev) = self.descriptors.last_mut() {
            prev.is_last = false;
        }
        descriptor.is_last = true;
        self.descriptors.push(descriptor);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn total_length(&self) -> u64 {
        self.descriptors.iter().map(|d| d.length).sum()
    }

    #[inline]
    pub fn descriptors(&self) -> &[BufferDescriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BufferDescriptor> {
        self.descriptors.iter()
    }

    pub fn into_descriptors(self) -> Vec<BufferDescriptor> {
        self.descriptors
    }

    /// Whether any descriptor reads from the zero device.
    pub fn in_file(&self) -> bool {
        self.descriptors.iter().any(BufferDescriptor::in_file)
    }

    /// Check the terminal-flag invariant.
    pub fn is_well_formed(&self) -> bool {
        match self.descriptors.split_last() {
            Some((last, rest)) => last.is_last && rest.iter().all(|d| !d.is_last),
            None => false,
        }
    }

    /// Restrict the chain to the byte window `[start, end)`.
    ///
    /// Descriptors are trimmed by adjusting their offset and length, so a
    /// window over the zero device stays a single descriptor.
    pub fn window(&self, start: u64, end: u64) -> ResponseChain {
        let mut windowed = ResponseChain::default();
        let mut position = 0u64;

        for descriptor in &self.descriptors {
            let span_start = position;
            let span_end = position + descriptor.length;
            position = span_end;

            let from = start.max(span_start);
            let to = end.min(span_end);
            if from >= to {
                continue;
            }

            windowed.push(BufferDescriptor::new(
                descriptor.source.clone(),
                descriptor.offset + (from - span_start),
                to - from,
            ));
        }

        if windowed.is_empty() {
            if let Some(last) = self.descriptors.last() {
                windowed.push(BufferDescriptor::new(last.source.clone(), last.offset, 0));
            }
        }

        windowed
    }

    /// Replace the first `prefix.len()` bytes of the chain with `prefix`.
    ///
    /// The total length is unchanged: the prefix is paid for out of the
    /// chain's existing budget. Fails closed when the prefix is longer than
    /// the whole chain.
    pub fn splice_prefix(&mut self, prefix: Bytes) -> Result<()> {
        let needed = prefix.len() as u64;
        let budget = self.total_length();
        if needed > budget {
            return Err(Error::ReportTooLargeForBudget {
                report: needed,
                budget,
            });
        }

        let mut remaining = needed;
        let mut consumed = 0;
        for descriptor in self.descriptors.iter_mut() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(descriptor.length);
            descriptor.offset += take;
            descriptor.length -= take;
            remaining -= take;
            if descriptor.length == 0 {
                consumed += 1;
            }
        }

        let rest = self.descriptors.split_off(consumed);
        let mut spliced = Vec::new();
        spliced.try_reserve_exact(rest.len() + 1).map_err(|e| {
            Error::AllocationFailure(format!("descriptor table for report prefix: {e}"))
        })?;
        self.descriptors = spliced;

        self.push(BufferDescriptor::new(Source::Inline(prefix), 0, needed));
        for descriptor in rest {
            self.push(descriptor);
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a ResponseChain {
    type Item = &'a BufferDescriptor;
    type IntoIter = std::slice::Iter<'a, BufferDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}
