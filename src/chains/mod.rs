//! Chain linker.
//!
//! Builds the typed fact graph of an application and interprets every chain
//! template over it. The search is guided by the template: from each accepted
//! source only the edges the next step names are followed, so its cost is
//! bounded by the template length instead of the size of the graph.

mod graph;
mod template;
#[cfg(test)]
mod tests;

pub use self::{
    graph::{ChainGraph, ChainNode, EdgeKind},
    template::{
        builtin_templates, ChainTemplate, NodeConstraint, SourceStep, Step, TemplateBuilder,
        MAX_CHAIN_DEPTH, MIN_CHAIN_DEPTH,
    },
};
use crate::{
    criticality::Confidence,
    facts::{ApplicationFacts, FactRef},
    matcher::sort_findings,
    results::{Finding, FindingFlag, Origin},
};
use log::debug;
use std::collections::BTreeSet;

/// Links facts into exploit chains.
///
/// Every complete path matching a template yields exactly one composite
/// finding, whose evidence is the entry component followed by the path.
pub fn link_chains(facts: &ApplicationFacts, templates: &[ChainTemplate]) -> Vec<Finding> {
    let graph = ChainGraph::build(facts);
    debug!(
        "chain graph of `{}`: {} nodes, {} edges",
        facts.package(),
        graph.node_count(),
        graph.edge_count()
    );

    let mut findings = Vec::new();
    for template in templates {
        let paths = search(&graph, facts, template);
        if !paths.is_empty() {
            debug!(
                "template `{}` linked {} chain(s) in `{}`",
                template.id(),
                paths.len(),
                facts.package()
            );
        }
        findings.extend(
            paths
                .iter()
                .map(|path| composite_finding(facts, template, path)),
        );
    }

    sort_findings(&mut findings);
    findings
}

/// Finds every path of the graph matching the template.
pub fn search<'a>(
    graph: &ChainGraph<'a>,
    facts: &'a ApplicationFacts,
    template: &ChainTemplate,
) -> Vec<Vec<ChainNode<'a>>> {
    let mut sources: Vec<_> = facts
        .sources()
        .iter()
        .filter(|s| template.entry().accepts(s, facts))
        .collect();
    sources.sort_by(|a, b| a.id().cmp(b.id()));

    let mut paths = Vec::new();
    for source in sources {
        let entry = match graph.node(&FactRef::Component(source.component().to_owned())) {
            Some(node) => node,
            None => continue,
        };
        let mut path = vec![entry, ChainNode::Source(source)];
        follow(graph, facts, template.steps(), &mut path, &mut paths);
    }
    paths
}

fn follow<'a>(
    graph: &ChainGraph<'a>,
    facts: &'a ApplicationFacts,
    steps: &[Step],
    path: &mut Vec<ChainNode<'a>>,
    paths: &mut Vec<Vec<ChainNode<'a>>>,
) {
    let (step, rest) = match steps.split_first() {
        Some(split) => split,
        None => {
            paths.push(path.clone());
            return;
        }
    };
    let current = match path.last() {
        Some(node) => node.fact(),
        None => return,
    };

    for next in graph.successors(&current, step.edge()) {
        let fact = next.fact();
        if !step.node().accepts(&next, facts) || path.iter().any(|n| n.fact() == fact) {
            continue;
        }
        path.push(next);
        follow(graph, facts, rest, path, paths);
        let _ = path.pop();
    }
}

fn composite_finding(
    facts: &ApplicationFacts,
    template: &ChainTemplate,
    path: &[ChainNode<'_>],
) -> Finding {
    let mut flags = BTreeSet::new();
    let mut confidence = Confidence::High;
    if path.iter().any(ChainNode::is_ambiguous) {
        confidence = confidence.downgrade();
        let _ = flags.insert(FindingFlag::AmbiguousProvenance);
    }

    let crosses_unresolved = path.iter().any(|node| {
        facts
            .component(node.component())
            .map_or(false, |c| facts.has_unresolved_permission(c))
    });
    if crosses_unresolved {
        let _ = flags.insert(FindingFlag::CrossesUnresolvedPermission);
    }

    Finding::new(
        Origin::Template(template.id().to_owned()),
        template.category(),
        confidence,
        template.description(),
        path.iter().map(ChainNode::fact).collect(),
        flags,
    )
}
