//! Payload plan command
//!
//! Shows the buffer layout a size and strategy produce, without serving.

use crate::error::CliResult;
use colored::Colorize;
use dali_config::parse_size;
use dali_core::{PatternRounding, PayloadPlan, PayloadPlanner, ResponseAssembler, Strategy};
use std::fmt::Write;

/// Descriptors listed before the rest are summarised.
const SHOWN_DESCRIPTORS: usize = 8;

pub fn execute(size: &str, strategy: Strategy, rounding: PatternRounding) -> CliResult<()> {
    let length = parse_size(size)?;
    let plan = PayloadPlanner::new()
        .with_rounding(rounding)
        .plan(length, strategy)?;

    print!("{}", render(&plan)?);
    Ok(())
}

/// Human-readable plan and chain layout.
pub fn render(plan: &PayloadPlan) -> CliResult<String> {
    let chain = ResponseAssembler::default().assemble(plan)?;
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "{}", "Payload plan".bright_cyan().bold());
    let _ = writeln!(out, "  strategy:        {}", plan.strategy);
    let _ = writeln!(out, "  requested bytes: {}", plan.requested_length);
    let _ = writeln!(out, "  quantum:         {}", plan.quantum);
    let _ = writeln!(out, "  buffers:         {}", plan.buffer_count);
    let _ = writeln!(out, "  content-length:  {}", plan.effective_total_length);
    if plan.effective_total_length != plan.requested_length {
        let _ = writeln!(
            out,
            "  {}",
            format!(
                "rounded up by {} bytes",
                plan.effective_total_length - plan.requested_length
            )
            .yellow()
        );
    }
    if plan.strategy == Strategy::Instrumented {
        let _ = writeln!(out, "  note: the timing report is written over the first bytes");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "Chain".bright_cyan().bold());
    for (index, descriptor) in chain.iter().take(SHOWN_DESCRIPTORS).enumerate() {
        let _ = writeln!(
            out,
            "  #{:<4} {:<14} offset {:<8} length {:<10}{}",
            index,
            format!("{:?}", descriptor.kind()),
            descriptor.offset,
            descriptor.length,
            if descriptor.is_last { " last" } else { "" }
        );
    }
    if chain.len() > SHOWN_DESCRIPTORS {
        let _ = writeln!(out, "  ... {} more", chain.len() - SHOWN_DESCRIPTORS);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(plan: &PayloadPlan) -> String {
        colored::control::set_override(false);
        render(plan).unwrap()
    }

    #[test]
    fn test_render_pattern_plan() {
        let plan = PayloadPlanner::new().plan(10_000, Strategy::Pattern).unwrap();
        let out = plain(&plan);

        assert!(out.contains("buffers:         3"));
        assert!(out.contains("content-length:  12288"));
        assert!(out.contains("rounded up by 2288 bytes"));
        assert_eq!(out.matches("StaticPattern").count(), 3);
        assert_eq!(out.matches(" last").count(), 1);
    }

    #[test]
    fn test_render_long_chain_is_summarised() {
        let plan = PayloadPlanner::new().plan(1 << 20, Strategy::Pattern).unwrap();
        let out = plain(&plan);
        assert!(out.contains("... 248 more"));
    }

    #[test]
    fn test_render_zero_plan() {
        let plan = PayloadPlanner::new().plan(500, Strategy::Zero).unwrap();
        let out = plain(&plan);
        assert!(out.contains("ZeroDevice"));
        assert!(!out.contains("rounded up"));
    }
}
