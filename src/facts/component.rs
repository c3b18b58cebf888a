//! Manifest component facts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform default for providers: before API 17 they were exported unless told otherwise.
const PROVIDER_EXPORT_DEFAULT_SDK: u32 = 17;

/// Kind of manifest-declared entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// `<activity>` or `<activity-alias>`.
    Activity,
    /// `<service>`.
    Service,
    /// `<receiver>`.
    Receiver,
    /// `<provider>`.
    Provider,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Activity => "activity",
            Self::Service => "service",
            Self::Receiver => "receiver",
            Self::Provider => "provider",
        };
        f.write_str(name)
    }
}

/// Intent filter declared for a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFilter {
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    schemes: Vec<String>,
}

impl IntentFilter {
    /// Creates an intent filter for the given action.
    pub fn with_action<S: Into<String>>(action: S) -> Self {
        Self {
            actions: vec![action.into()],
            ..Self::default()
        }
    }

    /// Gets the actions of the filter.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(String::as_str)
    }

    /// Checks if the filter makes the component reachable from a browser link.
    pub fn is_browsable(&self) -> bool {
        self.categories
            .iter()
            .any(|c| c == "android.intent.category.BROWSABLE")
    }
}

/// One manifest-declared entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    id: String,
    kind: ComponentKind,
    #[serde(default)]
    exported: Option<bool>,
    #[serde(default)]
    permission: Option<String>,
    #[serde(default)]
    grants_uri_permissions: bool,
    #[serde(default)]
    intent_filters: Vec<IntentFilter>,
}

impl Component {
    /// Creates a component with no explicit `exported` attribute.
    pub fn new<S: Into<String>>(id: S, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            exported: None,
            permission: None,
            grants_uri_permissions: false,
            intent_filters: Vec::new(),
        }
    }

    /// Sets the explicit `android:exported` attribute.
    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = Some(exported);
        self
    }

    /// Sets the permission required to interact with the component.
    pub fn with_permission<S: Into<String>>(mut self, permission: S) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Marks the provider as granting URI permissions.
    pub fn with_uri_grants(mut self) -> Self {
        self.grants_uri_permissions = true;
        self
    }

    /// Adds an intent filter to the component.
    pub fn with_intent_filter(mut self, filter: IntentFilter) -> Self {
        self.intent_filters.push(filter);
        self
    }

    /// Gets the qualified name of the component.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the kind of the component.
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Gets the explicit `exported` attribute, if any.
    pub fn explicit_exported(&self) -> Option<bool> {
        self.exported
    }

    /// Gets the permission protecting this component.
    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    /// Checks if the provider grants URI permissions.
    pub fn grants_uri_permissions(&self) -> bool {
        self.grants_uri_permissions
    }

    /// Gets the intent filters of the component.
    pub fn intent_filters(&self) -> &[IntentFilter] {
        &self.intent_filters
    }

    /// Checks if any intent filter is reachable from a browser.
    pub fn is_browsable(&self) -> bool {
        self.intent_filters.iter().any(IntentFilter::is_browsable)
    }

    /// Computes whether other applications can reach this component.
    ///
    /// The explicit attribute wins. Without it, providers follow the target SDK
    /// default and every other kind is exported if it declares an intent filter.
    pub fn is_exported(&self, target_sdk: u32) -> bool {
        match self.exported {
            Some(exported) => exported,
            None if self.kind == ComponentKind::Provider => {
                target_sdk < PROVIDER_EXPORT_DEFAULT_SDK
            }
            None => !self.intent_filters.is_empty(),
        }
    }
}
