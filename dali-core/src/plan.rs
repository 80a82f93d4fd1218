//! Payload planning.
//!
//! Turns a resolved byte length and a [`Strategy`] into a [`PayloadPlan`]: the
//! quantum, how many buffers the chain will hold and the total number of
//! bytes that will actually go on the wire.
//!
//! | Strategy       | buffers            | effective total          |
//! |----------------|--------------------|--------------------------|
//! | `PatternFill`  | `max(1, ⌈L/q⌉)`    | `buffers * q` (or `L`)   |
//! | `ZeroSource`   | `1`                | `L`                      |
//! | `Instrumented` | `max(1, ⌈L/q⌉)`    | `L`                      |

use crate::pattern::QUANTUM;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the response body is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Repeated references to the shared in-memory pattern buffer
    #[serde(alias = "pattern-fill")]
    Pattern,
    /// A single window over the zero-filling device
    #[default]
    #[serde(alias = "zero-source")]
    Zero,
    /// Body drain timing report followed by pattern bytes
    Instrumented,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Pattern => "pattern",
            Strategy::Zero => "zero",
            Strategy::Instrumented => "instrumented",
        }
    }

    /// Whether responses built with this strategy honour byte ranges.
    pub fn supports_ranges(&self) -> bool {
        matches!(self, Strategy::Zero)
    }
}

/// Unknown strategy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy {0:?}, expected pattern, zero or instrumented")]
pub struct ParseStrategyError(pub String);

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pattern" | "pattern-fill" => Ok(Strategy::Pattern),
            "zero" | "zero-source" => Ok(Strategy::Zero),
            "instrumented" => Ok(Strategy::Instrumented),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length contract of the pattern-fill strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternRounding {
    /// Round up to whole quanta; a zero length still yields one quantum
    #[default]
    Quantum,
    /// Emit exactly the configured length; the last buffer is truncated
    Exact,
}

/// Buffer layout for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadPlan {
    pub requested_length: u64,
    pub strategy: Strategy,
    pub quantum: u64,
    pub buffer_count: u64,
    pub effective_total_length: u64,
}

impl PayloadPlan {
    /// Length of the buffer at `index`.
    pub fn buffer_length(&self, index: u64) -> u64 {
        if index + 1 < self.buffer_count {
            return self.quantum;
        }
        self.effective_total_length - self.quantum.saturating_mul(self.buffer_count - 1)
    }
}

/// Computes [`PayloadPlan`]s.
#[derive(Debug, Clone, Copy)]
pub struct PayloadPlanner {
    quantum: u64,
    rounding: PatternRounding,
}

impl Default for PayloadPlanner {
    fn default() -> Self {
        Self {
            quantum: QUANTUM as u64,
            rounding: PatternRounding::Quantum,
        }
    }
}

impl PayloadPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pattern-fill length contract.
    pub fn with_rounding(mut self, rounding: PatternRounding) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn rounding(&self) -> PatternRounding {
        self.rounding
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    pub fn plan(&self, length: u64, strategy: Strategy) -> Result<PayloadPlan> {
        let plan = match strategy {
            Strategy::Pattern => {
                let buffer_count = length.div_ceil(self.quantum).max(1);
                let effective_total_length = match self.rounding {
                    PatternRounding::Quantum => {
                        buffer_count.checked_mul(self.quantum).ok_or_else(|| {
                            Error::AllocationFailure(format!(
                                "{length} bytes cannot be rounded to {} byte quanta",
                                self.quantum
                            ))
                        })?
                    }
                    PatternRounding::Exact => length,
                };
                PayloadPlan {
                    requested_length: length,
                    strategy,
                    quantum: self.quantum,
                    buffer_count,
                    effective_total_length,
                }
            }
            Strategy::Zero => PayloadPlan {
                requested_length: length,
                strategy,
                quantum: length,
                buffer_count: 1,
                effective_total_length: length,
            },
            Strategy::Instrumented => PayloadPlan {
                requested_length: length,
                strategy,
                quantum: self.quantum,
                buffer_count: length.div_ceil(self.quantum).max(1),
                effective_total_length: length,
            },
        };

        tracing::trace!(
            length,
            strategy = %strategy,
            buffers = plan.buffer_count,
            total = plan.effective_total_length,
            "Payload planned"
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_rounds_up() {
        let plan = PayloadPlanner::new().plan(10_000, Strategy::Pattern).unwrap();
        assert_eq!(plan.quantum, 4096);
        assert_eq!(plan.buffer_count, 3);
        assert_eq!(plan.effective_total_length, 12_288);
    }

    #[test]
    fn test_pattern_rounding_law() {
        let planner = PayloadPlanner::new();
        for length in [1u64, 4095, 4096, 4097, 8192, 100_000] {
            let plan = planner.plan(length, Strategy::Pattern).unwrap();
            assert_eq!(plan.effective_total_length, length.div_ceil(4096) * 4096);
            assert!(plan.effective_total_length >= length);
        }
    }

    #[test]
    fn test_pattern_zero_length_yields_one_quantum() {
        let plan = PayloadPlanner::new().plan(0, Strategy::Pattern).unwrap();
        assert_eq!(plan.buffer_count, 1);
        assert_eq!(plan.effective_total_length, 4096);
    }

    #[test]
    fn test_pattern_exact_mode() {
        let planner = PayloadPlanner::new().with_rounding(PatternRounding::Exact);

        let plan = planner.plan(10_000, Strategy::Pattern).unwrap();
        assert_eq!(plan.buffer_count, 3);
        assert_eq!(plan.effective_total_length, 10_000);
        assert_eq!(plan.buffer_length(0), 4096);
        assert_eq!(plan.buffer_length(2), 10_000 - 8192);

        let empty = planner.plan(0, Strategy::Pattern).unwrap();
        assert_eq!(empty.buffer_count, 1);
        assert_eq!(empty.effective_total_length, 0);
        assert_eq!(empty.buffer_length(0), 0);
    }

    #[test]
    fn test_pattern_overflow_is_allocation_failure() {
        let err = PayloadPlanner::new()
            .plan(u64::MAX, Strategy::Pattern)
            .unwrap_err();
        assert!(matches!(err, Error::AllocationFailure(_)));
    }

    #[test]
    fn test_zero_source_is_exact() {
        for length in [0u64, 1, 500, 4096, 1 << 40] {
            let plan = PayloadPlanner::new().plan(length, Strategy::Zero).unwrap();
            assert_eq!(plan.buffer_count, 1);
            assert_eq!(plan.effective_total_length, length);
            assert_eq!(plan.buffer_length(0), length);
        }
    }

    #[test]
    fn test_instrumented_budget() {
        let plan = PayloadPlanner::new()
            .plan(10_000, Strategy::Instrumented)
            .unwrap();
        assert_eq!(plan.effective_total_length, 10_000);
        assert_eq!(plan.buffer_count, 3);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("ZERO".parse::<Strategy>(), Ok(Strategy::Zero));
        assert_eq!("pattern-fill".parse::<Strategy>(), Ok(Strategy::Pattern));
        assert_eq!("instrumented".parse::<Strategy>(), Ok(Strategy::Instrumented));
        assert_eq!(
            "gzip".parse::<Strategy>(),
            Err(ParseStrategyError("gzip".to_string()))
        );
        assert!(Strategy::Zero.supports_ranges());
        assert!(!Strategy::Pattern.supports_ranges());
    }
}
