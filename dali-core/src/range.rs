//! Byte range resolution.
//!
//! Only a single range in the `bytes` unit is honoured:
//!
//! - `bytes=a-b`  -> `[a, b+1)`, with `b` clamped to the payload
//! - `bytes=a-`   -> `[a, L)`
//! - `bytes=-n`   -> the last `n` bytes
//!
//! A range that starts past the end is unsatisfiable (416). Anything else a
//! client may send (other units, multiple ranges, malformed numbers) is
//! ignored and the full payload is served.

use std::fmt;

/// A half-open byte window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `Content-Range` value for this window of a `total` byte payload.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end - 1, total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// `Content-Range` value of a 416 response.
pub fn unsatisfied_content_range(total: u64) -> String {
    format!("bytes */{total}")
}

/// What a `Range` header asks of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// Serve the whole payload
    Full,
    /// Serve a single window with 206
    Partial(ByteRange),
    /// Reject with 416
    Unsatisfiable,
}

impl RangeRequest {
    /// Resolve a raw `Range` header value against a payload of `length` bytes.
    pub fn resolve(header: Option<&str>, length: u64) -> Self {
        let Some(header) = header else {
            return RangeRequest::Full;
        };
        let Some(spec) = header.trim().strip_prefix("bytes=") else {
            return RangeRequest::Full;
        };
        if spec.contains(',') {
            return RangeRequest::Full;
        }
        let Some((first, last)) = spec.trim().split_once('-') else {
            return RangeRequest::Full;
        };
        let (first, last) = (first.trim(), last.trim());

        if first.is_empty() {
            let Ok(suffix) = last.parse::<u64>() else {
                return RangeRequest::Full;
            };
            if suffix == 0 || length == 0 {
                return RangeRequest::Unsatisfiable;
            }
            return RangeRequest::Partial(ByteRange::new(length.saturating_sub(suffix), length));
        }

        let Ok(start) = first.parse::<u64>() else {
            return RangeRequest::Full;
        };
        let end = if last.is_empty() {
            length
        } else {
            match last.parse::<u64>() {
                Ok(last) if last >= start => last.saturating_add(1).min(length),
                _ => return RangeRequest::Full,
            }
        };

        if start >= length {
            return RangeRequest::Unsatisfiable;
        }

        RangeRequest::Partial(ByteRange::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(start: u64, end: u64) -> RangeRequest {
        RangeRequest::Partial(ByteRange::new(start, end))
    }

    #[test]
    fn test_no_header() {
        assert_eq!(RangeRequest::resolve(None, 500), RangeRequest::Full);
    }

    #[test]
    fn test_closed_range() {
        let range = RangeRequest::resolve(Some("bytes=100-199"), 500);
        assert_eq!(range, partial(100, 200));
        if let RangeRequest::Partial(r) = range {
            assert_eq!(r.len(), 100);
            assert_eq!(r.content_range(500), "bytes 100-199/500");
        }
    }

    #[test]
    fn test_end_clamped() {
        assert_eq!(
            RangeRequest::resolve(Some("bytes=400-9999"), 500),
            partial(400, 500)
        );
    }

    #[test]
    fn test_open_range() {
        assert_eq!(
            RangeRequest::resolve(Some("bytes=450-"), 500),
            partial(450, 500)
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            RangeRequest::resolve(Some("bytes=-50"), 500),
            partial(450, 500)
        );
        assert_eq!(
            RangeRequest::resolve(Some("bytes=-5000"), 500),
            partial(0, 500)
        );
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(
            RangeRequest::resolve(Some("bytes=500-"), 500),
            RangeRequest::Unsatisfiable
        );
        assert_eq!(
            RangeRequest::resolve(Some("bytes=-0"), 500),
            RangeRequest::Unsatisfiable
        );
        assert_eq!(
            RangeRequest::resolve(Some("bytes=0-0"), 0),
            RangeRequest::Unsatisfiable
        );
        assert_eq!(unsatisfied_content_range(500), "bytes */500");
    }

    #[test]
    fn test_ignored_headers() {
        for header in [
            "items=0-10",
            "bytes=0-10,20-30",
            "bytes=abc-",
            "bytes=10-5",
            "bytes=5",
        ] {
            assert_eq!(
                RangeRequest::resolve(Some(header), 500),
                RangeRequest::Full,
                "{header}"
            );
        }
    }
}
