//! Pattern matcher.
//!
//! Applies every rule of the registry to the fact model of one application and
//! produces the atomic findings.

use crate::{facts::ApplicationFacts, results::Finding, rules::RuleRegistry};
use log::debug;

/// Matches every rule of the registry against the facts.
///
/// The output is sorted by category, evidence and rule, and contains no
/// duplicates, so it does not depend on the evaluation order of the rules.
pub fn match_rules(facts: &ApplicationFacts, registry: &RuleRegistry) -> Vec<Finding> {
    let mut findings = Vec::new();
    for rule in registry.iter() {
        let matches = rule.evaluate(facts);
        if !matches.is_empty() {
            debug!(
                "rule `{}` matched {} time(s) in `{}`",
                rule.id(),
                matches.len(),
                facts.package()
            );
        }
        findings.extend(matches);
    }

    sort_findings(&mut findings);
    findings
}

/// Sorts atomic findings in their canonical order and removes duplicates.
pub(crate) fn sort_findings(findings: &mut Vec<Finding>) {
    findings.sort_by(|a, b| {
        a.category()
            .cmp(&b.category())
            .then_with(|| a.evidence().cmp(b.evidence()))
            .then_with(|| a.origin().cmp(b.origin()))
            .then_with(|| a.confidence().cmp(&b.confidence()))
    });
    findings.dedup_by(|a, b| a.fingerprint() == b.fingerprint());
}
