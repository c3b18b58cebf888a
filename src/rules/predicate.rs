//! Declarative fact predicates.

use crate::facts::{
    ApplicationFacts, ComponentKind, FactKind, FactRef, Provenance, Resolution, Sink, SinkKind,
    ValueKind,
};
use serde::Deserialize;

/// Typed condition over one kind of fact.
///
/// Empty lists match anything, `None` flags are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "fact", rename_all = "kebab-case")]
pub enum Predicate {
    /// Condition over a sink, optionally paired with a source of the same component.
    Sink {
        #[serde(default)]
        operations: Vec<SinkKind>,
        #[serde(default)]
        provenance: Vec<Provenance>,
        #[serde(default)]
        exported_component: Option<bool>,
        #[serde(default)]
        validated: Option<bool>,
        #[serde(default)]
        targeted: Option<bool>,
        #[serde(default)]
        requires_source: Option<ValueKind>,
    },
    /// Condition over a source.
    Source {
        #[serde(default)]
        values: Vec<ValueKind>,
        #[serde(default)]
        exported_component: Option<bool>,
    },
    /// Condition over a manifest component.
    Component {
        #[serde(default)]
        kinds: Vec<ComponentKind>,
        #[serde(default)]
        exported: Option<bool>,
        #[serde(default)]
        protected: Option<bool>,
        #[serde(default)]
        browsable: Option<bool>,
    },
    /// Condition over a permission edge, paired with each enforcing component.
    ///
    /// `missing_protection` only applies to permissions declared by the
    /// application: platform and dangling permissions never carry a level.
    Permission {
        #[serde(default)]
        weak: Option<bool>,
        #[serde(default)]
        missing_protection: Option<bool>,
        #[serde(default)]
        enforced_by_exported: Option<bool>,
    },
    /// Component guarded by a permission that resolves nowhere.
    UnresolvedPermission,
    /// Sink targeting a component that is not part of the application.
    UnresolvedComponent,
}

/// One successful evaluation of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<'a> {
    /// Component the matched fact lives in.
    pub component: &'a str,
    /// Ordered evidence.
    pub evidence: Vec<FactRef>,
    /// The sink provenance was `unknown` and had to be assumed.
    pub ambiguous: bool,
}

impl Predicate {
    /// Gets the fact kinds read by the predicate.
    pub fn reads(&self) -> Vec<FactKind> {
        match self {
            Self::Sink {
                requires_source: Some(_),
                ..
            } => vec![FactKind::Component, FactKind::Source, FactKind::Sink],
            Self::Sink { .. } | Self::UnresolvedComponent => {
                vec![FactKind::Component, FactKind::Sink]
            }
            Self::Source { .. } => vec![FactKind::Component, FactKind::Source],
            Self::Component { .. } => vec![FactKind::Component],
            Self::Permission { .. } | Self::UnresolvedPermission => {
                vec![FactKind::Component, FactKind::Permission]
            }
        }
    }

    /// Evaluates the predicate against every relevant fact.
    pub fn evaluate<'a>(&self, facts: &'a ApplicationFacts) -> Vec<Match<'a>> {
        match self {
            Self::Sink {
                operations,
                provenance,
                exported_component,
                validated,
                targeted,
                requires_source,
            } => facts
                .sinks()
                .iter()
                .filter(|sink| operations.is_empty() || operations.contains(&sink.operation()))
                .filter(|sink| check(*validated, sink.is_validated()))
                .filter(|sink| check(*targeted, sink.target().is_some()))
                .filter(|sink| {
                    check(*exported_component, facts.is_exported_id(sink.component()))
                })
                .filter_map(|sink| {
                    provenance_match(provenance, sink.provenance()).map(|ambiguous| (sink, ambiguous))
                })
                .flat_map(|(sink, ambiguous)| sink_matches(facts, sink, ambiguous, *requires_source))
                .collect(),
            Self::Source {
                values,
                exported_component,
            } => facts
                .sources()
                .iter()
                .filter(|source| values.is_empty() || values.contains(&source.value()))
                .filter(|source| {
                    check(*exported_component, facts.is_exported_id(source.component()))
                })
                .map(|source| Match {
                    component: source.component(),
                    evidence: vec![
                        FactRef::Component(source.component().to_owned()),
                        FactRef::Source(source.id().to_owned()),
                    ],
                    ambiguous: false,
                })
                .collect(),
            Self::Component {
                kinds,
                exported,
                protected,
                browsable,
            } => facts
                .components()
                .iter()
                .filter(|c| kinds.is_empty() || kinds.contains(&c.kind()))
                .filter(|c| check(*exported, facts.is_exported(c)))
                .filter(|c| check(*protected, c.permission().is_some()))
                .filter(|c| check(*browsable, c.is_browsable()))
                .map(|c| Match {
                    component: c.id(),
                    evidence: vec![FactRef::Component(c.id().to_owned())],
                    ambiguous: false,
                })
                .collect(),
            Self::Permission {
                weak,
                missing_protection,
                enforced_by_exported,
            } => {
                let mut matches = Vec::new();
                for edge in facts.permission_edges() {
                    if !check(*weak, edge.is_weak())
                        || !check(
                            *missing_protection,
                            edge.resolution() == Resolution::Declared
                                && edge.protection().is_none(),
                        )
                    {
                        continue;
                    }
                    for enforcer in edge.enforced_by() {
                        let component = match facts.component(enforcer) {
                            Some(c) => c,
                            None => continue,
                        };
                        if check(*enforced_by_exported, facts.is_exported(component)) {
                            matches.push(Match {
                                component: component.id(),
                                evidence: vec![
                                    FactRef::Component(component.id().to_owned()),
                                    FactRef::Permission(edge.permission().to_owned()),
                                ],
                                ambiguous: false,
                            });
                        }
                    }
                }
                matches
            }
            Self::UnresolvedPermission => facts
                .components()
                .iter()
                .filter(|c| facts.has_unresolved_permission(c))
                .filter_map(|c| {
                    c.permission().map(|permission| Match {
                        component: c.id(),
                        evidence: vec![
                            FactRef::Component(c.id().to_owned()),
                            FactRef::Permission(permission.to_owned()),
                        ],
                        ambiguous: false,
                    })
                })
                .collect(),
            Self::UnresolvedComponent => facts
                .sinks()
                .iter()
                .filter(|sink| {
                    sink.target()
                        .map_or(false, |target| facts.component(target).is_none())
                })
                .map(|sink| Match {
                    component: sink.component(),
                    evidence: vec![
                        FactRef::Component(sink.component().to_owned()),
                        FactRef::Sink(sink.id().to_owned()),
                    ],
                    ambiguous: false,
                })
                .collect(),
        }
    }
}

/// Checks an optional flag constraint.
fn check(expected: Option<bool>, actual: bool) -> bool {
    expected.map_or(true, |e| e == actual)
}

/// Matches a sink provenance against the allowed list.
///
/// Returns `Some(true)` when the provenance is `unknown` and the list had to be
/// assumed to hold, so that recall is kept and confidence lowered instead.
fn provenance_match(allowed: &[Provenance], actual: Provenance) -> Option<bool> {
    if allowed.is_empty() || allowed.contains(&actual) {
        Some(false)
    } else if actual == Provenance::Unknown {
        Some(true)
    } else {
        None
    }
}

/// Builds the matches of a sink, one per compatible source when a source is required.
fn sink_matches<'a>(
    facts: &'a ApplicationFacts,
    sink: &'a Sink,
    ambiguous: bool,
    requires_source: Option<ValueKind>,
) -> Vec<Match<'a>> {
    let component = FactRef::Component(sink.component().to_owned());
    let sink_ref = FactRef::Sink(sink.id().to_owned());

    match requires_source {
        None => vec![Match {
            component: sink.component(),
            evidence: vec![component, sink_ref],
            ambiguous,
        }],
        Some(value) => facts
            .sources_of(sink.component())
            .filter(|source| source.value() == value && source.reaches(sink.provenance()))
            .map(|source| Match {
                component: sink.component(),
                evidence: vec![
                    component.clone(),
                    FactRef::Source(source.id().to_owned()),
                    sink_ref.clone(),
                ],
                ambiguous,
            })
            .collect(),
    }
}
