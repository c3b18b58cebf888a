//! Deduplication and ranking of findings.

use super::{Finding, SeverityTable};
use crate::{criticality::Criticality, facts::FactRef};
use serde::Serialize;
use std::{
    cmp::Ordering,
    collections::{btree_map::Entry, BTreeMap},
};

/// Finding with its assigned criticality and supersession mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedFinding {
    criticality: Criticality,
    #[serde(skip_serializing_if = "Option::is_none")]
    superseded_by: Option<String>,
    #[serde(flatten)]
    finding: Finding,
}

impl RankedFinding {
    /// Gets the ranked finding.
    pub fn finding(&self) -> &Finding {
        &self.finding
    }

    /// Gets the criticality assigned by the severity table.
    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    /// Gets the fingerprint of the composite finding superseding this one.
    pub fn superseded_by(&self) -> Option<&str> {
        self.superseded_by.as_deref()
    }

    /// Compares two findings by rank, best first.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .criticality
            .cmp(&self.criticality)
            .then_with(|| other.finding.confidence().cmp(&self.finding.confidence()))
            .then_with(|| self.finding.evidence().cmp(other.finding.evidence()))
            .then_with(|| self.finding.category().cmp(&other.finding.category()))
            .then_with(|| self.finding.origin().cmp(other.finding.origin()))
            .then_with(|| self.finding.fingerprint().cmp(other.finding.fingerprint()))
    }
}

/// Deduplicates, ranks and marks superseded findings.
///
/// Findings with the same fingerprint are merged, keeping the highest
/// confidence. An atomic finding is superseded by the best-ranked composite
/// whose evidence contains all of its own; among composites ending at the same
/// fact, the best-ranked one supersedes the rest. Findings are never dropped.
pub fn rank(findings: Vec<Finding>, severity: &SeverityTable) -> Vec<RankedFinding> {
    let mut unique: BTreeMap<String, Finding> = BTreeMap::new();
    for finding in findings {
        match unique.entry(finding.fingerprint().to_owned()) {
            Entry::Occupied(mut e) => {
                if finding.confidence() > e.get().confidence() {
                    let _ = e.insert(finding);
                }
            }
            Entry::Vacant(e) => {
                let _ = e.insert(finding);
            }
        }
    }

    let mut ranked: Vec<_> = unique
        .into_iter()
        .map(|(_, finding)| RankedFinding {
            criticality: severity.criticality(finding.category()),
            superseded_by: None,
            finding,
        })
        .collect();
    ranked.sort_by(RankedFinding::rank_cmp);

    let composites: Vec<(usize, FactRef)> = ranked
        .iter()
        .enumerate()
        .filter(|(_, r)| r.finding.is_composite())
        .filter_map(|(i, r)| r.finding.terminal().map(|t| (i, t.clone())))
        .collect();

    let mut best_by_terminal: BTreeMap<FactRef, usize> = BTreeMap::new();
    let mut superseded = Vec::new();
    for (index, terminal) in composites.iter().cloned() {
        match best_by_terminal.entry(terminal) {
            Entry::Occupied(best) => superseded.push((index, *best.get())),
            Entry::Vacant(e) => {
                let _ = e.insert(index);
            }
        }
    }

    for (index, candidate) in ranked.iter().enumerate() {
        if candidate.finding.is_composite() {
            continue;
        }
        if let Some((best, _)) = composites
            .iter()
            .find(|(i, _)| ranked[*i].finding.covers(&candidate.finding))
        {
            superseded.push((index, *best));
        }
    }

    for (index, by) in superseded {
        let fingerprint = ranked[by].finding.fingerprint().to_owned();
        ranked[index].superseded_by = Some(fingerprint);
    }

    ranked
}
