//! Typed fact graph searched by the chain linker.

use crate::facts::{
    ApplicationFacts, Component, ComponentKind, FactKind, FactRef, Provenance, Sink, SinkKind,
    Source, ValueKind,
};
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Typed relation between two facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Source data reaches a sink of the same component.
    FlowsTo,
    /// An intent-dispatching sink delivers to a component.
    ForwardsIntentTo,
    /// A URI grant sink hands access to a provider.
    GrantsUriTo,
    /// A component or a `WebView` hands data to a source.
    DeliversTo,
    /// A file written by one sink is consumed by a code-loading sink.
    WritesPathConsumedBy,
    /// A code-loading sink runs the loaded code in a component.
    LoadsCodeFrom,
}

impl EdgeKind {
    /// Gets the kinds of fact the edge can start from.
    pub fn from_kinds(self) -> &'static [FactKind] {
        match self {
            Self::FlowsTo => &[FactKind::Source],
            Self::DeliversTo => &[FactKind::Component, FactKind::Sink],
            Self::ForwardsIntentTo
            | Self::GrantsUriTo
            | Self::WritesPathConsumedBy
            | Self::LoadsCodeFrom => &[FactKind::Sink],
        }
    }

    /// Gets the kind of fact the edge points to.
    pub fn to_kind(self) -> FactKind {
        match self {
            Self::FlowsTo | Self::WritesPathConsumedBy => FactKind::Sink,
            Self::DeliversTo => FactKind::Source,
            Self::ForwardsIntentTo | Self::GrantsUriTo | Self::LoadsCodeFrom => {
                FactKind::Component
            }
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FlowsTo => "flows-to",
            Self::ForwardsIntentTo => "forwards-intent-to",
            Self::GrantsUriTo => "grants-uri-to",
            Self::DeliversTo => "delivers-to",
            Self::WritesPathConsumedBy => "writes-path-consumed-by",
            Self::LoadsCodeFrom => "loads-code-from",
        };
        f.write_str(name)
    }
}

/// Node of the chain graph, borrowing the fact it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainNode<'a> {
    /// Manifest component.
    Component(&'a Component),
    /// Data source.
    Source(&'a Source),
    /// Sensitive sink.
    Sink(&'a Sink),
}

impl<'a> ChainNode<'a> {
    /// Gets the evidence reference of the node.
    pub fn fact(&self) -> FactRef {
        match self {
            Self::Component(c) => FactRef::Component(c.id().to_owned()),
            Self::Source(s) => FactRef::Source(s.id().to_owned()),
            Self::Sink(s) => FactRef::Sink(s.id().to_owned()),
        }
    }

    /// Gets the kind of the fact.
    pub fn kind(&self) -> FactKind {
        match self {
            Self::Component(_) => FactKind::Component,
            Self::Source(_) => FactKind::Source,
            Self::Sink(_) => FactKind::Sink,
        }
    }

    /// Gets the component the node is, or lives in.
    pub fn component(&self) -> &'a str {
        match self {
            Self::Component(c) => c.id(),
            Self::Source(s) => s.component(),
            Self::Sink(s) => s.component(),
        }
    }

    /// Checks if the node is a sink whose argument provenance is unknown.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            Self::Sink(s) => s.provenance() == Provenance::Unknown,
            _ => false,
        }
    }
}

/// Directed graph of components, sources and sinks of one application.
///
/// Built once per scan and read-only afterwards.
#[derive(Debug)]
pub struct ChainGraph<'a> {
    graph: DiGraph<ChainNode<'a>, EdgeKind>,
    index: BTreeMap<FactRef, NodeIndex>,
}

impl<'a> ChainGraph<'a> {
    /// Builds the graph of the given facts.
    pub fn build(facts: &'a ApplicationFacts) -> Self {
        let mut graph = Self {
            graph: DiGraph::new(),
            index: BTreeMap::new(),
        };

        for component in facts.components() {
            let _ = graph.add_node(ChainNode::Component(component));
        }
        for source in facts.sources() {
            let _ = graph.add_node(ChainNode::Source(source));
        }
        for sink in facts.sinks() {
            let _ = graph.add_node(ChainNode::Sink(sink));
        }

        for component in facts.components() {
            for source in facts.sources_of(component.id()) {
                if source.value() != ValueKind::WebviewUrl {
                    graph.add_edge(
                        &FactRef::Component(component.id().to_owned()),
                        &FactRef::Source(source.id().to_owned()),
                        EdgeKind::DeliversTo,
                    );
                }
            }
        }

        for source in facts.sources() {
            for sink in facts.sinks_of(source.component()) {
                if source.reaches(sink.provenance()) {
                    graph.add_edge(
                        &FactRef::Source(source.id().to_owned()),
                        &FactRef::Sink(sink.id().to_owned()),
                        EdgeKind::FlowsTo,
                    );
                }
            }
        }

        for sink in facts.sinks() {
            graph.add_sink_edges(facts, sink);
        }

        graph
    }

    fn add_node(&mut self, node: ChainNode<'a>) -> NodeIndex {
        let fact = node.fact();
        let index = self.graph.add_node(node);
        let _ = self.index.insert(fact, index);
        index
    }

    fn add_edge(&mut self, from: &FactRef, to: &FactRef, kind: EdgeKind) {
        if let (Some(&a), Some(&b)) = (self.index.get(from), self.index.get(to)) {
            let _ = self.graph.add_edge(a, b, kind);
        }
    }

    fn add_sink_edges(&mut self, facts: &'a ApplicationFacts, sink: &'a Sink) {
        let from = FactRef::Sink(sink.id().to_owned());
        // The attacker picks the destination of an untargeted, attacker-built intent.
        let attacker_picked = match sink.provenance() {
            Provenance::DerivedFromIntent | Provenance::Unknown => true,
            Provenance::Literal | Provenance::DerivedFromUri => false,
        };

        match sink.operation() {
            SinkKind::StartComponent | SinkKind::BroadcastSend => match sink.target() {
                Some(target) => self.add_edge(
                    &from,
                    &FactRef::Component(target.to_owned()),
                    EdgeKind::ForwardsIntentTo,
                ),
                None if attacker_picked => {
                    for component in facts.components() {
                        if component.id() != sink.component() && !facts.is_exported(component) {
                            self.add_edge(
                                &from,
                                &FactRef::Component(component.id().to_owned()),
                                EdgeKind::ForwardsIntentTo,
                            );
                        }
                    }
                }
                None => {}
            },
            SinkKind::UriGrant => match sink.target() {
                Some(target) => self.add_edge(
                    &from,
                    &FactRef::Component(target.to_owned()),
                    EdgeKind::GrantsUriTo,
                ),
                None if attacker_picked => {
                    for component in facts.components() {
                        if component.kind() == ComponentKind::Provider
                            && component.grants_uri_permissions()
                        {
                            self.add_edge(
                                &from,
                                &FactRef::Component(component.id().to_owned()),
                                EdgeKind::GrantsUriTo,
                            );
                        }
                    }
                }
                None => {}
            },
            SinkKind::WebviewLoadUrl => {
                for source in facts.sources_of(sink.component()) {
                    if source.value() == ValueKind::WebviewUrl {
                        self.add_edge(
                            &from,
                            &FactRef::Source(source.id().to_owned()),
                            EdgeKind::DeliversTo,
                        );
                    }
                }
            }
            SinkKind::FileWrite => {
                if let Some(location) = sink.location() {
                    for load in facts.sinks() {
                        if load.operation().loads_code() && load.location() == Some(location) {
                            self.add_edge(
                                &from,
                                &FactRef::Sink(load.id().to_owned()),
                                EdgeKind::WritesPathConsumedBy,
                            );
                        }
                    }
                }
            }
            SinkKind::NativeLibraryLoad | SinkKind::DynamicClassLoad => {
                if let Some(target) = sink.target() {
                    self.add_edge(
                        &from,
                        &FactRef::Component(target.to_owned()),
                        EdgeKind::LoadsCodeFrom,
                    );
                }
            }
            SinkKind::FileRead => {}
        }
    }

    /// Gets the node of a fact.
    pub fn node(&self, fact: &FactRef) -> Option<ChainNode<'a>> {
        self.index.get(fact).map(|&i| self.graph[i])
    }

    /// Gets the successors of a fact through edges of the given kind, sorted by fact.
    pub fn successors(&self, fact: &FactRef, kind: EdgeKind) -> Vec<ChainNode<'a>> {
        let index = match self.index.get(fact) {
            Some(&i) => i,
            None => return Vec::new(),
        };

        let mut successors: Vec<_> = self
            .graph
            .edges(index)
            .filter(|e| *e.weight() == kind)
            .map(|e| self.graph[e.target()])
            .collect();
        successors.sort_by_key(ChainNode::fact);
        successors.dedup_by_key(|n| n.fact());
        successors
    }

    /// Checks if there is an edge of the given kind between two facts.
    pub fn has_edge(&self, from: &FactRef, to: &FactRef, kind: EdgeKind) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self
                .graph
                .edges(a)
                .any(|e| e.target() == b && *e.weight() == kind),
            _ => false,
        }
    }

    /// Gets the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Gets the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
