//! Byte sizes with unit suffixes.
//!
//! A size is a plain integer or an integer followed by one unit letter:
//!
//! | suffix    | multiplier |
//! |-----------|------------|
//! | `k` / `K` | 1024       |
//! | `m` / `M` | 1024²      |
//! | `g` / `G` | 1024³      |
//!
//! Both `size = 4096` and `size = "512k"` are accepted in config files.

use crate::{ConfigError, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Parse a size such as `"4096"`, `"64k"` or `"1G"` into bytes.
pub fn parse_size(value: &str) -> Result<u64> {
    let invalid = |reason: &str| ConfigError::InvalidSize {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    let (digits, multiplier) = match trimmed.char_indices().last() {
        None => return Err(invalid("empty")),
        Some((i, 'k' | 'K')) => (&trimmed[..i], KIB),
        Some((i, 'm' | 'M')) => (&trimmed[..i], MIB),
        Some((i, 'g' | 'G')) => (&trimmed[..i], GIB),
        Some(_) => (trimmed, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected digits with an optional k, m or g suffix"));
    }

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| invalid("too large"))
}

/// A byte count read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        parse_size(s).map(ByteSize)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n >= GIB && n % GIB == 0 {
            write!(f, "{}g", n / GIB)
        } else if n >= MIB && n % MIB == 0 {
            write!(f, "{}m", n / MIB)
        } else if n >= KIB && n % KIB == 0 {
            write!(f, "{}k", n / KIB)
        } else {
            write!(f, "{n}")
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

struct ByteSizeVisitor;

impl Visitor<'_> for ByteSizeVisitor {
    type Value = ByteSize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte count or a string such as \"64k\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<ByteSize, E> {
        Ok(ByteSize(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<ByteSize, E> {
        u64::try_from(v)
            .map(ByteSize)
            .map_err(|_| E::custom(format!("size cannot be negative: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ByteSize, E> {
        parse_size(v).map(ByteSize).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ByteSizeVisitor)
    }
}
