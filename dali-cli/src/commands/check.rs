//! Configuration check command
//!
//! Loads and validates a configuration file and prints the resolved routes.

use crate::error::CliResult;
use colored::Colorize;
use dali_config::DaliConfig;
use dali_core::RouteTable;
use std::fmt::Write;
use std::path::Path;

pub fn execute(path: &Path) -> CliResult<()> {
    let config = DaliConfig::load(path)?;
    let routes = config.route_table();

    println!(
        "{} {} ({} routes, listen {})",
        "✓".green(),
        path.display(),
        routes.len(),
        config.listen
    );
    print!("{}", render(&routes));

    let unresolved = routes.iter().filter(|r| r.length().is_none()).count();
    if unresolved > 0 {
        println!(
            "{}",
            format!("{unresolved} route(s) have no size and will answer 500").yellow()
        );
    }
    Ok(())
}

/// One line per route, longest prefix first.
pub fn render(routes: &RouteTable) -> String {
    let mut out = String::new();
    for route in routes.iter() {
        let size = match route.length() {
            Some(length) => length.to_string(),
            None => "unset".to_string(),
        };
        // Writing to a String cannot fail
        let _ = writeln!(out, "  {:<32} {:>14}  {}", route.prefix, size, route.strategy);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dali_core::{ScopeId, ScopeSettings, ScopeTree, Strategy};

    #[test]
    fn test_render_routes() {
        let mut tree = ScopeTree::new(ScopeSettings::new(1000, Some(Strategy::Zero)));
        tree.add_child(ScopeId::ROOT, "/big", ScopeSettings::new(5000, None));
        let out = render(&tree.finalize());

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("/big"));
        assert!(lines[0].contains("1000"));
        assert!(lines[1].trim_start().starts_with('/'));
    }

    #[test]
    fn test_render_unset_route() {
        let out = render(&ScopeTree::default().finalize());
        assert!(out.contains("unset"));
        assert!(out.contains("zero"));
    }
}
