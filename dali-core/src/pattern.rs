//! Shared pattern buffer.
//!
//! One read-only quantum of a single repeated byte, built once at startup and
//! shared by every request. Handing out a span is a reference-count bump on
//! the underlying [`Bytes`]; the buffer is never copied or mutated.

use bytes::Bytes;

/// Chunk size of the pattern-fill chain.
pub const QUANTUM: usize = 4096;

/// Byte repeated throughout the pattern buffer.
pub const PATTERN_BYTE: u8 = b'A';

/// Immutable process-wide pattern quantum.
#[derive(Debug, Clone)]
pub struct StaticPatternBuffer {
    inner: Bytes,
}

impl StaticPatternBuffer {
    /// Build the default buffer: [`QUANTUM`] copies of [`PATTERN_BYTE`].
    pub fn new() -> Self {
        Self::with_pattern(PATTERN_BYTE, QUANTUM)
    }

    pub fn with_pattern(byte: u8, len: usize) -> Self {
        Self {
            inner: Bytes::from(vec![byte; len]),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The repeated byte, or `None` for an empty buffer.
    #[inline]
    pub fn byte(&self) -> Option<u8> {
        self.inner.first().copied()
    }

    /// Zero-copy view of `len` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the span runs past the end of the buffer. Chains built by
    /// the assembler never do.
    #[inline]
    pub fn span(&self, offset: usize, len: usize) -> Bytes {
        self.inner.slice(offset..offset + len)
    }

    #[inline]
    pub fn as_bytes(&self) -> &Bytes {
        &self.inner
    }
}

impl Default for StaticPatternBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer() {
        let buffer = StaticPatternBuffer::new();
        assert_eq!(buffer.len(), QUANTUM);
        assert_eq!(buffer.byte(), Some(PATTERN_BYTE));
        assert!(buffer.as_bytes().iter().all(|&b| b == PATTERN_BYTE));
    }

    #[test]
    fn test_span_shares_storage() {
        let buffer = StaticPatternBuffer::new();
        let span = buffer.span(100, 200);
        assert_eq!(span.len(), 200);
        assert_eq!(span.as_ptr(), buffer.as_bytes()[100..].as_ptr());
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = StaticPatternBuffer::new();
        let clone = buffer.clone();
        assert_eq!(buffer.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
    }
}
