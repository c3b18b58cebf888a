//! Findings produced by the matcher and the chain linker.

use crate::{criticality::Confidence, error::ErrorKind, facts::FactRef};
use serde::{
    ser::{SerializeStruct, Serializer},
    Deserialize, Serialize,
};
use sha2::{Digest, Sha256};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Named vulnerability pattern of the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Attacker-supplied code ends up executed by the application.
    ArbitraryCodeExecution,
    /// An incoming intent is forwarded to a component chosen by the caller.
    IntentRedirection,
    /// A file path is built from attacker-controlled segments.
    PathTraversal,
    /// Code is loaded from a location influenced by the caller.
    DynamicCodeLoad,
    /// URI permissions are granted on attacker-controlled intents.
    UriGrantAbuse,
    /// A `WebView` loads an attacker-controlled URL.
    WebviewUrlInjection,
    /// Implicit intents can be intercepted by other applications.
    ImplicitIntentInterception,
    /// A custom permission does not keep third parties out.
    PermissionGap,
    /// Dangling permission or component reference.
    UnresolvedReference,
    /// Informational: the component is reachable by other applications.
    ExportedComponent,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::ArbitraryCodeExecution,
        Self::IntentRedirection,
        Self::PathTraversal,
        Self::DynamicCodeLoad,
        Self::UriGrantAbuse,
        Self::WebviewUrlInjection,
        Self::ImplicitIntentInterception,
        Self::PermissionGap,
        Self::UnresolvedReference,
        Self::ExportedComponent,
    ];

    /// Gets the catalogue name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArbitraryCodeExecution => "arbitrary-code-execution",
            Self::IntentRedirection => "intent-redirection",
            Self::PathTraversal => "path-traversal",
            Self::DynamicCodeLoad => "dynamic-code-load",
            Self::UriGrantAbuse => "uri-grant-abuse",
            Self::WebviewUrlInjection => "webview-url-injection",
            Self::ImplicitIntentInterception => "implicit-intent-interception",
            Self::PermissionGap => "permission-gap",
            Self::UnresolvedReference => "unresolved-reference",
            Self::ExportedComponent => "exported-component",
        }
    }
}

impl FromStr for Category {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ErrorKind::Config {
                message: format!("unknown finding category `{}`", s),
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Additional markers attached to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingFlag {
    /// Some argument provenance could not be classified.
    AmbiguousProvenance,
    /// The chain passes through a component guarded by an unresolved permission.
    CrossesUnresolvedPermission,
}

/// What produced a finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "kebab-case")]
pub enum Origin {
    /// Single-fact rule.
    Rule(String),
    /// Chain template.
    Template(String),
}

impl Origin {
    /// Gets the identifier of the rule or template.
    pub fn id(&self) -> &str {
        match self {
            Self::Rule(id) | Self::Template(id) => id,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(id) => write!(f, "rule:{}", id),
            Self::Template(id) => write!(f, "template:{}", id),
        }
    }
}

/// Atomic or composite detection.
///
/// Findings are immutable: ranking wraps them, it never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Finding {
    category: Category,
    confidence: Confidence,
    rationale: String,
    evidence: Vec<FactRef>,
    origin: Origin,
    flags: BTreeSet<FindingFlag>,
    fingerprint: String,
}

impl Finding {
    /// Creates a new finding.
    pub fn new<R: Into<String>>(
        origin: Origin,
        category: Category,
        confidence: Confidence,
        rationale: R,
        evidence: Vec<FactRef>,
        flags: BTreeSet<FindingFlag>,
    ) -> Self {
        let fingerprint = fingerprint(category, &origin, &evidence);
        Self {
            category,
            confidence,
            rationale: rationale.into(),
            evidence,
            origin,
            flags,
            fingerprint,
        }
    }

    /// Gets the category of the finding.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Gets the confidence of the finding.
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Gets the rationale of the finding.
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Gets the ordered evidence of the finding.
    pub fn evidence(&self) -> &[FactRef] {
        &self.evidence
    }

    /// Gets the rule or template that produced the finding.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Gets the chain template identifier, for composite findings.
    pub fn template(&self) -> Option<&str> {
        match &self.origin {
            Origin::Template(id) => Some(id),
            Origin::Rule(_) => None,
        }
    }

    /// Checks if the finding was produced by the chain linker.
    pub fn is_composite(&self) -> bool {
        self.template().is_some()
    }

    /// Gets the flags of the finding.
    pub fn flags(&self) -> impl Iterator<Item = FindingFlag> + '_ {
        self.flags.iter().copied()
    }

    /// Checks if the finding carries the given flag.
    pub fn has_flag(&self, flag: FindingFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Gets the stable identifier of the finding.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Checks if every piece of evidence of `other` is also evidence of this finding.
    pub fn covers(&self, other: &Self) -> bool {
        other.evidence.iter().all(|e| self.evidence.contains(e))
    }

    /// Gets the last fact of the evidence.
    pub fn terminal(&self) -> Option<&FactRef> {
        self.evidence.last()
    }
}

impl Serialize for Finding {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser_struct = serializer.serialize_struct(
            "Finding",
            if self.is_composite() { 8 } else { 7 },
        )?;
        ser_struct.serialize_field("id", &self.fingerprint)?;
        ser_struct.serialize_field("category", &self.category)?;
        ser_struct.serialize_field("confidence", &self.confidence)?;
        ser_struct.serialize_field("rationale", &self.rationale)?;
        ser_struct.serialize_field("origin", &self.origin)?;
        if let Some(template) = self.template() {
            ser_struct.serialize_field("template", template)?;
        }
        ser_struct.serialize_field("evidence", &self.evidence)?;
        ser_struct.serialize_field("flags", &self.flags)?;
        ser_struct.end()
    }
}

/// Computes the SHA-256 fingerprint of a finding.
fn fingerprint(category: Category, origin: &Origin, evidence: &[FactRef]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(origin.to_string().as_bytes());
    for fact in evidence {
        hasher.update(b"\0");
        hasher.update(fact.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}
