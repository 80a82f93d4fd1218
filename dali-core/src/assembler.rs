//! Response chain assembly.
//!
//! Realises a [`PayloadPlan`] as a [`ResponseChain`]:
//!
//! - **Pattern**: `buffer_count` descriptors over the shared pattern quantum,
//!   never copied per request
//! - **Zero**: one file-backed descriptor `[0, L)` over the zero device
//! - **Instrumented**: a pattern skeleton of exactly `L` bytes whose head is
//!   later replaced by the rendered timing report

use crate::chain::{BufferDescriptor, ResponseChain, Source};
use crate::pattern::StaticPatternBuffer;
use crate::plan::{PayloadPlan, Strategy};
use crate::timing::TimingReport;
use crate::{Error, Result};

/// Builds descriptor chains against one shared pattern buffer.
#[derive(Debug, Clone, Default)]
pub struct ResponseAssembler {
    pattern: StaticPatternBuffer,
}

impl ResponseAssembler {
    pub fn new(pattern: StaticPatternBuffer) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &StaticPatternBuffer {
        &self.pattern
    }

    /// Build the chain for `plan`.
    ///
    /// For the instrumented strategy this is the skeleton; call
    /// [`prefix_report`](Self::prefix_report) once the body has been drained.
    pub fn assemble(&self, plan: &PayloadPlan) -> Result<ResponseChain> {
        let chain = match plan.strategy {
            Strategy::Pattern | Strategy::Instrumented => self.pattern_fill(plan)?,
            Strategy::Zero => self.zero_source(plan),
        };

        debug_assert!(chain.is_well_formed());
        debug_assert_eq!(chain.total_length(), plan.effective_total_length);

        tracing::trace!(
            strategy = %plan.strategy,
            descriptors = chain.len(),
            total = plan.effective_total_length,
            "Chain assembled"
        );

        Ok(chain)
    }

    fn pattern_fill(&self, plan: &PayloadPlan) -> Result<ResponseChain> {
        if plan.quantum > self.pattern.len() as u64 {
            return Err(Error::AllocationFailure(format!(
                "{} byte quantum exceeds the {} byte pattern buffer",
                plan.quantum,
                self.pattern.len()
            )));
        }

        let mut chain = ResponseChain::with_capacity(plan.buffer_count)?;
        for index in 0..plan.buffer_count {
            chain.push(BufferDescriptor::new(
                Source::StaticPattern,
                0,
                plan.buffer_length(index),
            ));
        }
        Ok(chain)
    }

    fn zero_source(&self, plan: &PayloadPlan) -> ResponseChain {
        let mut chain = ResponseChain::default();
        chain.push(BufferDescriptor::new(
            Source::ZeroDevice,
            0,
            plan.effective_total_length,
        ));
        chain
    }

    /// Put the rendered `report` at the head of an instrumented chain.
    ///
    /// The report is paid for out of the configured budget; a budget smaller
    /// than the report fails closed instead of truncating it.
    pub fn prefix_report(&self, chain: &mut ResponseChain, report: &TimingReport) -> Result<()> {
        let rendered = report.render_within(chain.total_length())?;
        chain.splice_prefix(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SourceKind;
    use crate::plan::{PatternRounding, PayloadPlanner};

    fn assembler() -> ResponseAssembler {
        ResponseAssembler::new(StaticPatternBuffer::new())
    }

    #[test]
    fn test_pattern_chain_for_10000() {
        let plan = PayloadPlanner::new().plan(10_000, Strategy::Pattern).unwrap();
        let chain = assembler().assemble(&plan).unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.total_length(), 12_288);
        for (index, descriptor) in chain.iter().enumerate() {
            assert_eq!(descriptor.kind(), SourceKind::StaticPattern);
            assert_eq!((descriptor.offset, descriptor.length), (0, 4096));
            assert_eq!(descriptor.is_last, index == 2);
        }
    }

    #[test]
    fn test_pattern_exact_chain() {
        let plan = PayloadPlanner::new()
            .with_rounding(PatternRounding::Exact)
            .plan(0, Strategy::Pattern)
            .unwrap();
        let chain = assembler().assemble(&plan).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.total_length(), 0);
        assert!(chain.is_well_formed());
    }

    #[test]
    fn test_zero_chain() {
        let plan = PayloadPlanner::new().plan(500, Strategy::Zero).unwrap();
        let chain = assembler().assemble(&plan).unwrap();

        assert_eq!(chain.len(), 1);
        let descriptor = &chain.descriptors()[0];
        assert_eq!(descriptor.kind(), SourceKind::ZeroDevice);
        assert_eq!((descriptor.offset, descriptor.length), (0, 500));
        assert!(descriptor.in_file());
        assert!(descriptor.is_last);
    }

    #[test]
    fn test_instrumented_chain_fits_budget() {
        let plan = PayloadPlanner::new()
            .plan(256, Strategy::Instrumented)
            .unwrap();
        let assembler = assembler();
        let mut chain = assembler.assemble(&plan).unwrap();
        let report = TimingReport::new(2000.0, 1000);

        assembler.prefix_report(&mut chain, &report).unwrap();

        assert_eq!(chain.total_length(), 256);
        assert_eq!(chain.descriptors()[0].kind(), SourceKind::InlineBytes);
        assert_eq!(chain.descriptors()[0].length, report.rendered_len() as u64);
        assert!(chain.is_well_formed());
    }

    #[test]
    fn test_instrumented_budget_too_small() {
        let plan = PayloadPlanner::new().plan(16, Strategy::Instrumented).unwrap();
        let assembler = assembler();
        let mut chain = assembler.assemble(&plan).unwrap();

        let err = assembler
            .prefix_report(&mut chain, &TimingReport::new(1.0, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ReportTooLargeForBudget { budget: 16, .. }
        ));
    }

    #[test]
    fn test_quantum_larger_than_pattern() {
        let assembler = ResponseAssembler::new(StaticPatternBuffer::with_pattern(b'x', 16));
        let plan = PayloadPlanner::new().plan(100, Strategy::Pattern).unwrap();
        assert!(matches!(
            assembler.assemble(&plan),
            Err(Error::AllocationFailure(_))
        ));
    }
}
