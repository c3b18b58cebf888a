//! Fact model of one application.
//!
//! Facts are produced by the extraction adapters from the decompiled manifest
//! and code. Once validated they are never mutated: every later stage of the
//! scan only reads them.

mod component;
mod flow;
mod permission;

pub use self::{
    component::{Component, ComponentKind, IntentFilter},
    flow::{Provenance, Sink, SinkKind, Source, ValueKind},
    permission::{
        is_platform_permission, PermissionDeclaration, PermissionEdge, ProtectionLevel,
        Resolution,
    },
};
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Kinds of facts rules can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactKind {
    /// Manifest components.
    Component,
    /// Data sources.
    Source,
    /// Sensitive sinks.
    Sink,
    /// Permission edges.
    Permission,
}

/// Logical reference to a fact, used as finding evidence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum FactRef {
    /// Reference to a component.
    Component(String),
    /// Reference to a source.
    Source(String),
    /// Reference to a sink.
    Sink(String),
    /// Reference to a permission.
    Permission(String),
}

impl FactRef {
    /// Gets the identifier of the referenced fact.
    pub fn id(&self) -> &str {
        match self {
            Self::Component(id) | Self::Source(id) | Self::Sink(id) | Self::Permission(id) => id,
        }
    }
}

impl fmt::Display for FactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component(id) => write!(f, "component:{}", id),
            Self::Source(id) => write!(f, "source:{}", id),
            Self::Sink(id) => write!(f, "sink:{}", id),
            Self::Permission(id) => write!(f, "permission:{}", id),
        }
    }
}

/// Every fact extracted from one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFacts {
    package: String,
    #[serde(default)]
    min_sdk: u32,
    #[serde(default)]
    target_sdk: Option<u32>,
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    sinks: Vec<Sink>,
    #[serde(default)]
    permissions: Vec<PermissionDeclaration>,
}

impl ApplicationFacts {
    /// Creates an empty fact model for the given package.
    pub fn new<S: Into<String>>(package: S) -> Self {
        Self {
            package: package.into(),
            min_sdk: 0,
            target_sdk: None,
            components: Vec::new(),
            sources: Vec::new(),
            sinks: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Sets the minimum SDK of the application.
    pub fn with_min_sdk(mut self, sdk: u32) -> Self {
        self.min_sdk = sdk;
        self
    }

    /// Sets the target SDK of the application.
    pub fn with_target_sdk(mut self, sdk: u32) -> Self {
        self.target_sdk = Some(sdk);
        self
    }

    /// Adds a component.
    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Adds a source.
    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds a sink.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Adds a permission declaration.
    pub fn with_permission(mut self, permission: PermissionDeclaration) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Gets the package of the application.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Gets the minimum SDK of the application.
    pub fn min_sdk(&self) -> u32 {
        self.min_sdk
    }

    /// Gets the effective target SDK. It defaults to the minimum SDK, as on the platform.
    pub fn target_sdk(&self) -> u32 {
        self.target_sdk.unwrap_or(self.min_sdk)
    }

    /// Gets the components.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Gets the sources.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Gets the sinks.
    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// Gets the permission declarations.
    pub fn permissions(&self) -> &[PermissionDeclaration] {
        &self.permissions
    }

    /// Looks up a component by identifier.
    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id() == id)
    }

    /// Gets the sources contained in the given component.
    pub fn sources_of<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a Source> + 'a {
        self.sources.iter().filter(move |s| s.component() == component)
    }

    /// Gets the sinks contained in the given component.
    pub fn sinks_of<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a Sink> + 'a {
        self.sinks.iter().filter(move |s| s.component() == component)
    }

    /// Checks if the component is reachable by other applications.
    pub fn is_exported(&self, component: &Component) -> bool {
        component.is_exported(self.target_sdk())
    }

    /// Checks if the component with the given identifier is exported.
    pub fn is_exported_id(&self, id: &str) -> bool {
        self.component(id).map_or(false, |c| self.is_exported(c))
    }

    /// Resolves a permission reference.
    pub fn resolve_permission(&self, name: &str) -> Resolution {
        if self.permissions.iter().any(|p| p.name() == name) {
            Resolution::Declared
        } else if is_platform_permission(name) {
            Resolution::Platform
        } else {
            Resolution::Unresolved
        }
    }

    /// Checks if the component references a permission that resolves nowhere.
    pub fn has_unresolved_permission(&self, component: &Component) -> bool {
        component
            .permission()
            .map_or(false, |p| self.resolve_permission(p) == Resolution::Unresolved)
    }

    /// Builds the permission edges: every declared permission plus every
    /// referenced one, sorted by name.
    pub fn permission_edges(&self) -> Vec<PermissionEdge> {
        let mut edges = BTreeMap::new();
        for declaration in &self.permissions {
            let _ = edges.entry(declaration.name().to_owned()).or_insert_with(|| {
                PermissionEdge::new(
                    declaration.name(),
                    declaration.protection(),
                    Resolution::Declared,
                )
            });
        }

        for component in &self.components {
            if let Some(name) = component.permission() {
                edges
                    .entry(name.to_owned())
                    .or_insert_with(|| {
                        PermissionEdge::new(name, None, self.resolve_permission(name))
                    })
                    .add_enforcer(component.id());
            }
        }

        edges.into_iter().map(|(_, edge)| edge).collect()
    }

    /// Checks if the referenced fact exists in this model.
    pub fn contains(&self, fact: &FactRef) -> bool {
        match fact {
            FactRef::Component(id) => self.component(id).is_some(),
            FactRef::Source(id) => self.sources.iter().any(|s| s.id() == id),
            FactRef::Sink(id) => self.sinks.iter().any(|s| s.id() == id),
            FactRef::Permission(id) => {
                self.permissions.iter().any(|p| p.name() == id)
                    || self.components.iter().any(|c| c.permission() == Some(id.as_str()))
            }
        }
    }

    /// Validates the structural invariants of the model.
    ///
    /// Dangling permission references and missing protection levels are not
    /// errors: they are reported as findings.
    pub fn validate(&self) -> Result<(), ScanError> {
        let malformed = |fact: String, message: &str| {
            Err(ScanError::malformed(self.package.as_str(), fact, message))
        };

        let mut components = BTreeSet::new();
        for component in &self.components {
            if !components.insert(component.id()) {
                return malformed(
                    FactRef::Component(component.id().to_owned()).to_string(),
                    "duplicate component identifier",
                );
            }
        }

        let mut sources = BTreeSet::new();
        for source in &self.sources {
            let fact = FactRef::Source(source.id().to_owned()).to_string();
            if !sources.insert(source.id()) {
                return malformed(fact, "duplicate source identifier");
            }
            if !components.contains(source.component()) {
                return malformed(
                    fact,
                    &format!("references missing component `{}`", source.component()),
                );
            }
            if source.taint().is_empty() {
                return malformed(fact, "source has no taint class");
            }
        }

        let mut sinks = BTreeSet::new();
        for sink in &self.sinks {
            let fact = FactRef::Sink(sink.id().to_owned()).to_string();
            if !sinks.insert(sink.id()) {
                return malformed(fact, "duplicate sink identifier");
            }
            if !components.contains(sink.component()) {
                return malformed(
                    fact,
                    &format!("references missing component `{}`", sink.component()),
                );
            }
        }

        let mut declared = BTreeSet::new();
        for permission in &self.permissions {
            if !declared.insert(permission.name()) {
                return malformed(
                    FactRef::Permission(permission.name().to_owned()).to_string(),
                    "permission declared more than once",
                );
            }
        }

        Ok(())
    }
}
