//! Utilities module.
//!
//! Standard output only carries the JSON reports. Everything meant for a
//! human goes to `stderr`.

use crate::{
    criticality::Criticality,
    results::{RankedFinding, Results},
};
use anyhow::{Context, Result};
use colored::Colorize;
use log::{log_enabled, warn, Level};
use std::io::{self, Write};

/// Prints a warning to `stderr` in yellow.
pub fn print_warning<S: AsRef<str>>(warning: S) {
    if log_enabled!(Level::Warn) {
        warn!("{}", warning.as_ref());
    } else {
        eprintln!(
            "{} {}",
            "Warning:".bold().yellow(),
            warning.as_ref().yellow()
        );
    }

    if !log_enabled!(Level::Debug) {
        eprintln!(
            "If you need more information, try to run the program again with the {} flag.",
            "-v".bold()
        );
    }
}

/// Writes one line describing a finding, in the color of its criticality.
pub fn write_finding<W: Write>(out: &mut W, finding: &RankedFinding) -> io::Result<()> {
    let start = format!(
        "Possible {} criticality {} found!:",
        finding.criticality(),
        finding.finding().category()
    );
    let text = format!(
        "{} [{}]",
        finding.finding().rationale(),
        finding
            .finding()
            .evidence()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let (start, message) = match finding.criticality() {
        Criticality::Warning => (start.normal(), text.normal()),
        Criticality::Low => (start.cyan(), text.cyan()),
        Criticality::Medium => (start.yellow(), text.yellow()),
        Criticality::High | Criticality::Critical => (start.red(), text.red()),
    };
    writeln!(out, "{} {}", start, message)
}

/// Writes the JSON report of one application to `report`.
///
/// When `verbose` is set, the active findings are described on `console`
/// first.
pub fn write_report<W: Write, C: Write>(
    results: &Results,
    verbose: bool,
    report: &mut W,
    console: &mut C,
) -> Result<()> {
    if verbose {
        for finding in results.active() {
            write_finding(console, finding).context("could not print a finding")?;
        }
    }

    serde_json::to_writer_pretty(&mut *report, results)
        .context("could not serialize the results")?;
    writeln!(report).context("could not write the results")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_report;
    use crate::{
        facts::{ApplicationFacts, Component, ComponentKind},
        scan::{scan_application, ScanContext},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn it_keeps_reports_apart_from_console_output() {
        let facts = ApplicationFacts::new("com.example.console")
            .with_min_sdk(21)
            .with_component(
                Component::new("com.example.console.Main", ComponentKind::Activity)
                    .with_exported(true),
            );
        let results = scan_application(&facts, &ScanContext::builtin().unwrap()).unwrap();
        assert!(results.active().count() > 0);

        let mut report = Vec::new();
        let mut console = Vec::new();
        write_report(&results, true, &mut report, &mut console).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&report).unwrap();
        assert_eq!(parsed["app_package"], "com.example.console");
        let console = String::from_utf8(console).unwrap();
        assert_eq!(
            console.matches("Possible").count(),
            results.active().count()
        );
        assert!(!String::from_utf8(report).unwrap().contains("Possible"));

        let mut quiet_console = Vec::new();
        write_report(&results, false, &mut Vec::new(), &mut quiet_console).unwrap();
        assert!(quiet_console.is_empty());
    }
}
