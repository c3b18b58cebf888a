//! Chain templates: ordered edge and node constraints interpreted by the linker.

use super::graph::{ChainNode, EdgeKind};
use crate::{
    error::ErrorKind,
    facts::{ApplicationFacts, ComponentKind, FactKind, Provenance, SinkKind, Source, ValueKind},
    results::Category,
};
use serde::Deserialize;

/// Minimum number of hops of a chain. Shorter patterns are single-fact rules.
pub const MIN_CHAIN_DEPTH: usize = 2;
/// Maximum number of hops of a chain.
pub const MAX_CHAIN_DEPTH: usize = 5;

/// Constraint on the source a chain starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceStep {
    #[serde(default)]
    values: Vec<ValueKind>,
    #[serde(default)]
    taint: Vec<Provenance>,
    #[serde(default)]
    exported: Option<bool>,
}

impl SourceStep {
    /// Creates an entry constraint accepting the given value kinds.
    pub fn new(values: Vec<ValueKind>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Requires the source to share at least one taint class with the list.
    pub fn with_taint(mut self, taint: Vec<Provenance>) -> Self {
        self.taint = taint;
        self
    }

    /// Requires the component of the source to be (or not be) exported.
    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = Some(exported);
        self
    }

    /// Checks if the source can start a chain.
    pub fn accepts(&self, source: &Source, facts: &ApplicationFacts) -> bool {
        (self.values.is_empty() || self.values.contains(&source.value()))
            && (self.taint.is_empty() || source.taint().iter().any(|t| self.taint.contains(t)))
            && self
                .exported
                .map_or(true, |e| e == facts.is_exported_id(source.component()))
    }
}

/// Constraint on one node of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "fact", rename_all = "kebab-case")]
pub enum NodeConstraint {
    /// The node must be a component.
    Component {
        #[serde(default)]
        kinds: Vec<ComponentKind>,
        #[serde(default)]
        exported: Option<bool>,
    },
    /// The node must be a source.
    Source {
        #[serde(default)]
        values: Vec<ValueKind>,
    },
    /// The node must be a sink. `unknown` provenance is accepted and lowers the
    /// confidence of the chain.
    Sink {
        #[serde(default)]
        operations: Vec<SinkKind>,
        #[serde(default)]
        provenance: Vec<Provenance>,
        #[serde(default)]
        validated: Option<bool>,
    },
}

impl NodeConstraint {
    /// Gets the kind of fact the constraint applies to.
    pub fn kind(&self) -> FactKind {
        match self {
            Self::Component { .. } => FactKind::Component,
            Self::Source { .. } => FactKind::Source,
            Self::Sink { .. } => FactKind::Sink,
        }
    }

    /// Checks if the node satisfies the constraint.
    pub fn accepts(&self, node: &ChainNode<'_>, facts: &ApplicationFacts) -> bool {
        match (self, node) {
            (Self::Component { kinds, exported }, ChainNode::Component(c)) => {
                (kinds.is_empty() || kinds.contains(&c.kind()))
                    && exported.map_or(true, |e| e == facts.is_exported(c))
            }
            (Self::Source { values }, ChainNode::Source(s)) => {
                values.is_empty() || values.contains(&s.value())
            }
            (
                Self::Sink {
                    operations,
                    provenance,
                    validated,
                },
                ChainNode::Sink(s),
            ) => {
                (operations.is_empty() || operations.contains(&s.operation()))
                    && (provenance.is_empty()
                        || provenance.contains(&s.provenance())
                        || s.provenance() == Provenance::Unknown)
                    && validated.map_or(true, |v| v == s.is_validated())
            }
            _ => false,
        }
    }
}

/// One hop of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Step {
    edge: EdgeKind,
    node: NodeConstraint,
}

impl Step {
    /// Gets the required edge kind.
    pub fn edge(&self) -> EdgeKind {
        self.edge
    }

    /// Gets the constraint on the node the edge reaches.
    pub fn node(&self) -> &NodeConstraint {
        &self.node
    }
}

/// Multi-step exploit chain pattern.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainTemplate {
    id: String,
    category: Category,
    description: String,
    entry: SourceStep,
    steps: Vec<Step>,
}

impl ChainTemplate {
    /// Starts building a template.
    pub fn builder<S: Into<String>>(id: S, category: Category) -> TemplateBuilder {
        TemplateBuilder {
            template: Self {
                id: id.into(),
                category,
                description: String::new(),
                entry: SourceStep::default(),
                steps: Vec::new(),
            },
        }
    }

    /// Gets the identifier of the template.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the category of the chains found.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Gets the description of the template.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Gets the entry constraint.
    pub fn entry(&self) -> &SourceStep {
        &self.entry
    }

    /// Gets the steps of the template.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Checks the structure of the template: every edge must leave the kind of
    /// fact the previous step reached, and land on the kind its node expects.
    pub fn validate(&self) -> Result<(), ErrorKind> {
        let invalid = |message: String| {
            Err(ErrorKind::InvalidTemplate {
                id: self.id.clone(),
                message,
            })
        };

        if self.id.trim().is_empty() {
            return invalid("the template identifier cannot be empty".to_owned());
        }
        if self.description.trim().is_empty() {
            return invalid("every template needs a description".to_owned());
        }
        if self.steps.len() < MIN_CHAIN_DEPTH {
            return invalid(format!(
                "a chain needs at least {} steps, found {}",
                MIN_CHAIN_DEPTH,
                self.steps.len()
            ));
        }
        if self.steps.len() > MAX_CHAIN_DEPTH {
            return invalid(format!(
                "a chain has at most {} steps, found {}",
                MAX_CHAIN_DEPTH,
                self.steps.len()
            ));
        }

        let mut current = FactKind::Source;
        for (i, step) in self.steps.iter().enumerate() {
            if !step.edge.from_kinds().contains(&current) {
                return invalid(format!(
                    "step {}: a `{}` edge cannot start from a {:?} node",
                    i + 1,
                    step.edge,
                    current
                ));
            }
            if step.node.kind() != step.edge.to_kind() {
                return invalid(format!(
                    "step {}: a `{}` edge leads to a {:?} node, not a {:?} node",
                    i + 1,
                    step.edge,
                    step.edge.to_kind(),
                    step.node.kind()
                ));
            }
            current = step.node.kind();
        }

        Ok(())
    }

    /// Checks the number of steps against the configured maximum.
    pub fn check_depth(&self, max_depth: usize) -> Result<(), ErrorKind> {
        if self.steps.len() > max_depth {
            Err(ErrorKind::InvalidTemplate {
                id: self.id.clone(),
                message: format!(
                    "the template has {} steps, but the maximum chain depth is {}",
                    self.steps.len(),
                    max_depth
                ),
            })
        } else {
            Ok(())
        }
    }
}

/// Builder for chain templates.
#[derive(Debug)]
pub struct TemplateBuilder {
    template: ChainTemplate,
}

impl TemplateBuilder {
    /// Sets the description.
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.template.description = description.into();
        self
    }

    /// Sets the entry constraint.
    pub fn entry(mut self, entry: SourceStep) -> Self {
        self.template.entry = entry;
        self
    }

    /// Appends a step.
    pub fn step(mut self, edge: EdgeKind, node: NodeConstraint) -> Self {
        self.template.steps.push(Step { edge, node });
        self
    }

    /// Validates and returns the template.
    pub fn build(self) -> Result<ChainTemplate, ErrorKind> {
        self.template.validate()?;
        Ok(self.template)
    }
}

fn sink(operations: Vec<SinkKind>) -> NodeConstraint {
    NodeConstraint::Sink {
        operations,
        provenance: Vec::new(),
        validated: None,
    }
}

fn unvalidated_sink(operations: Vec<SinkKind>) -> NodeConstraint {
    NodeConstraint::Sink {
        operations,
        provenance: Vec::new(),
        validated: Some(false),
    }
}

fn source(values: Vec<ValueKind>) -> NodeConstraint {
    NodeConstraint::Source { values }
}

fn loads() -> Vec<SinkKind> {
    vec![SinkKind::NativeLibraryLoad, SinkKind::DynamicClassLoad]
}

fn sensitive() -> Vec<SinkKind> {
    vec![
        SinkKind::FileWrite,
        SinkKind::FileRead,
        SinkKind::NativeLibraryLoad,
        SinkKind::DynamicClassLoad,
        SinkKind::WebviewLoadUrl,
        SinkKind::UriGrant,
    ]
}

/// Builds the chain templates shipped with the analyzer.
pub fn builtin_templates() -> Result<Vec<ChainTemplate>, ErrorKind> {
    let intent_entry = || {
        SourceStep::new(vec![ValueKind::IntentExtra])
            .with_taint(vec![Provenance::DerivedFromIntent])
            .with_exported(true)
    };

    let templates = vec![
        ChainTemplate::builder(
            "intent-redirection-to-private-component",
            Category::IntentRedirection,
        )
        .description(
            "An exported component forwards an attacker-built Intent to a private component, \
             which then feeds the Intent data into a sensitive operation.",
        )
        .entry(intent_entry())
        .step(
            EdgeKind::FlowsTo,
            unvalidated_sink(vec![SinkKind::StartComponent]),
        )
        .step(
            EdgeKind::ForwardsIntentTo,
            NodeConstraint::Component {
                kinds: Vec::new(),
                exported: Some(false),
            },
        )
        .step(EdgeKind::DeliversTo, source(vec![ValueKind::IntentExtra]))
        .step(EdgeKind::FlowsTo, unvalidated_sink(sensitive())),
        ChainTemplate::builder(
            "path-traversal-code-write-native-load",
            Category::ArbitraryCodeExecution,
        )
        .description(
            "A provider path traversal lets the caller write into the directory the \
             application loads code from. The written code is loaded on the next start, \
             giving persistent code execution.",
        )
        .entry(
            SourceStep::new(vec![ValueKind::UriPathSegment])
                .with_taint(vec![Provenance::DerivedFromUri])
                .with_exported(true),
        )
        .step(
            EdgeKind::FlowsTo,
            NodeConstraint::Sink {
                operations: vec![SinkKind::FileWrite],
                provenance: vec![Provenance::DerivedFromUri],
                validated: Some(false),
            },
        )
        .step(EdgeKind::WritesPathConsumedBy, sink(loads())),
        ChainTemplate::builder(
            "intent-redirection-uri-grant-file-access",
            Category::UriGrantAbuse,
        )
        .description(
            "An exported component hands an attacker-built Intent back with URI grant flags, \
             opening a private provider whose path handling reaches files.",
        )
        .entry(intent_entry())
        .step(EdgeKind::FlowsTo, unvalidated_sink(vec![SinkKind::UriGrant]))
        .step(
            EdgeKind::GrantsUriTo,
            NodeConstraint::Component {
                kinds: vec![ComponentKind::Provider],
                exported: None,
            },
        )
        .step(EdgeKind::DeliversTo, source(vec![ValueKind::UriPathSegment]))
        .step(
            EdgeKind::FlowsTo,
            unvalidated_sink(vec![SinkKind::FileRead, SinkKind::FileWrite]),
        ),
        ChainTemplate::builder(
            "webview-bridge-to-sensitive-sink",
            Category::WebviewUrlInjection,
        )
        .description(
            "An attacker-supplied URL is loaded in a WebView, and data handed back by the \
             page reaches a sensitive operation of the application.",
        )
        .entry(
            SourceStep::new(vec![ValueKind::IntentExtra, ValueKind::UriPathSegment])
                .with_exported(true),
        )
        .step(
            EdgeKind::FlowsTo,
            unvalidated_sink(vec![SinkKind::WebviewLoadUrl]),
        )
        .step(EdgeKind::DeliversTo, source(vec![ValueKind::WebviewUrl]))
        .step(EdgeKind::FlowsTo, unvalidated_sink(sensitive())),
        ChainTemplate::builder("intent-payload-code-load", Category::ArbitraryCodeExecution)
            .description(
                "Intent data chooses the content or name of a file that the application \
                 later loads as code.",
            )
            .entry(intent_entry())
            .step(
                EdgeKind::FlowsTo,
                unvalidated_sink(vec![SinkKind::FileWrite]),
            )
            .step(EdgeKind::WritesPathConsumedBy, sink(loads())),
        ChainTemplate::builder(
            "written-code-loaded-into-component",
            Category::ArbitraryCodeExecution,
        )
        .description(
            "Externally controlled data is written where code is loaded from, and the loaded \
             code runs inside another component with its privileges.",
        )
        .entry(
            SourceStep::new(vec![ValueKind::IntentExtra, ValueKind::UriPathSegment])
                .with_exported(true),
        )
        .step(
            EdgeKind::FlowsTo,
            unvalidated_sink(vec![SinkKind::FileWrite]),
        )
        .step(EdgeKind::WritesPathConsumedBy, sink(loads()))
        .step(
            EdgeKind::LoadsCodeFrom,
            NodeConstraint::Component {
                kinds: Vec::new(),
                exported: None,
            },
        ),
    ];

    templates.into_iter().map(TemplateBuilder::build).collect()
}
