//! Per-scope payload length.
//!
//! Every routing scope carries one [`SizeConfig`]. A scope that never saw the
//! size directive is *unset*, which is distinct from an explicit zero. Nested
//! scopes are merged with their ancestors once, before serving starts:
//!
//! - a nested scope may shrink an inherited budget but never grow it
//! - an unset nested scope inherits its parent unchanged
//!
//! ```
//! use dali_core::size_config::SizeConfig;
//!
//! let server = SizeConfig::new(4096);
//! let location = SizeConfig::new(1 << 20);
//! assert_eq!(location.merge(&server).length(), Some(4096));
//! assert_eq!(SizeConfig::unset().merge(&server).length(), Some(4096));
//! ```

use serde::{Deserialize, Serialize};

/// Resolved or pending byte length for one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeConfig {
    length: Option<u64>,
}

impl SizeConfig {
    /// A scope with no size directive.
    #[inline]
    pub const fn unset() -> Self {
        Self { length: None }
    }

    /// A scope with an explicit length in bytes.
    #[inline]
    pub const fn new(length: u64) -> Self {
        Self {
            length: Some(length),
        }
    }

    #[inline]
    pub const fn length(&self) -> Option<u64> {
        self.length
    }

    #[inline]
    pub const fn is_set(&self) -> bool {
        self.length.is_some()
    }

    /// Merge this (child) scope with its parent.
    ///
    /// The parent wins when it is positive and strictly smaller than the
    /// child. Otherwise the child keeps its own value, or inherits the
    /// parent's when it has none.
    pub fn merge(&self, parent: &SizeConfig) -> SizeConfig {
        match (parent.length, self.length) {
            (Some(p), Some(c)) if p > 0 && p < c => SizeConfig::new(p),
            (_, Some(c)) => SizeConfig::new(c),
            (inherited, None) => SizeConfig { length: inherited },
        }
    }
}

impl From<u64> for SizeConfig {
    fn from(length: u64) -> Self {
        Self::new(length)
    }
}

impl From<Option<u64>> for SizeConfig {
    fn from(length: Option<u64>) -> Self {
        Self { length }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smaller_parent_wins() {
        let merged = SizeConfig::new(10_000).merge(&SizeConfig::new(500));
        assert_eq!(merged.length(), Some(500));
    }

    #[test]
    fn test_child_may_shrink() {
        let merged = SizeConfig::new(100).merge(&SizeConfig::new(500));
        assert_eq!(merged.length(), Some(100));
    }

    #[test]
    fn test_zero_parent_never_overrides() {
        let merged = SizeConfig::new(100).merge(&SizeConfig::new(0));
        assert_eq!(merged.length(), Some(100));
    }

    #[test]
    fn test_explicit_zero_child_is_kept() {
        let merged = SizeConfig::new(0).merge(&SizeConfig::new(500));
        assert_eq!(merged.length(), Some(0));
    }

    #[test]
    fn test_unset_child_inherits() {
        assert_eq!(
            SizeConfig::unset().merge(&SizeConfig::new(500)).length(),
            Some(500)
        );
        assert_eq!(
            SizeConfig::unset().merge(&SizeConfig::new(0)).length(),
            Some(0)
        );
        assert!(!SizeConfig::unset().merge(&SizeConfig::unset()).is_set());
    }

    #[test]
    fn test_unset_parent_keeps_child() {
        let merged = SizeConfig::new(42).merge(&SizeConfig::unset());
        assert_eq!(merged.length(), Some(42));
    }

    #[test]
    fn test_merge_law_exhaustive_small_domain() {
        for p in 0..20u64 {
            for c in 0..20u64 {
                let merged = SizeConfig::new(c).merge(&SizeConfig::new(p));
                let expected = if p > 0 && p < c { p } else { c };
                assert_eq!(merged.length(), Some(expected), "parent={p} child={c}");
            }
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        for len in [0u64, 1, 4096, u64::MAX] {
            let config = SizeConfig::new(len);
            assert_eq!(config.merge(&config), config);
        }
        let unset = SizeConfig::unset();
        assert_eq!(unset.merge(&unset), unset);
    }
}
