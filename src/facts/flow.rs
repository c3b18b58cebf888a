//! Data flow facts: sources of external data and sensitive sinks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance of the argument reaching a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Constant value embedded in the application.
    Literal,
    /// Value taken from an incoming `Intent`.
    DerivedFromIntent,
    /// Value taken from a content URI or a loaded URL.
    DerivedFromUri,
    /// The extractor could not classify the value.
    Unknown,
}

impl Provenance {
    /// Checks if the provenance was concretely classified.
    pub fn is_resolved(self) -> bool {
        self != Self::Unknown
    }

    /// Checks if the value can be influenced by another application.
    pub fn is_external(self) -> bool {
        match self {
            Self::DerivedFromIntent | Self::DerivedFromUri => true,
            Self::Literal | Self::Unknown => false,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Literal => "literal",
            Self::DerivedFromIntent => "derived-from-intent",
            Self::DerivedFromUri => "derived-from-uri",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Kind of value a source introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// `getStringExtra()`, `getParcelableExtra()` and friends.
    IntentExtra,
    /// `Uri.getLastPathSegment()`, `getPathSegments()` and friends.
    UriPathSegment,
    /// URL or page data handed back by a `WebView`.
    WebviewUrl,
}

/// Sensitive operation performed at a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkKind {
    /// File creation or write.
    FileWrite,
    /// File open for reading, including `openFile()` results.
    FileRead,
    /// `System.load()` / `System.loadLibrary()`.
    NativeLibraryLoad,
    /// `DexClassLoader`, `PathClassLoader`, `createPackageContext()`.
    DynamicClassLoad,
    /// `sendBroadcast()` and variants.
    BroadcastSend,
    /// `WebView.loadUrl()` and variants.
    WebviewLoadUrl,
    /// `startActivity()`, `startService()`, `bindService()`.
    StartComponent,
    /// Intent carrying `FLAG_GRANT_*_URI_PERMISSION`.
    UriGrant,
}

impl SinkKind {
    /// Checks if the operation turns file contents into executable code.
    pub fn loads_code(self) -> bool {
        match self {
            Self::NativeLibraryLoad | Self::DynamicClassLoad => true,
            _ => false,
        }
    }

    /// Checks if the operation dispatches an intent to another component.
    pub fn dispatches_intent(self) -> bool {
        match self {
            Self::StartComponent | Self::BroadcastSend => true,
            _ => false,
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FileWrite => "file-write",
            Self::FileRead => "file-read",
            Self::NativeLibraryLoad => "native-library-load",
            Self::DynamicClassLoad => "dynamic-class-load",
            Self::BroadcastSend => "broadcast-send",
            Self::WebviewLoadUrl => "webview-load-url",
            Self::StartComponent => "start-component",
            Self::UriGrant => "uri-grant",
        };
        f.write_str(name)
    }
}

/// Code location introducing externally influenced data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    id: String,
    component: String,
    value: ValueKind,
    taint: Vec<Provenance>,
}

impl Source {
    /// Creates a new source. The taint list names the sink provenance tags the
    /// value can show up as.
    pub fn new<I, C>(id: I, component: C, value: ValueKind, taint: Vec<Provenance>) -> Self
    where
        I: Into<String>,
        C: Into<String>,
    {
        Self {
            id: id.into(),
            component: component.into(),
            value,
            taint,
        }
    }

    /// Gets the identifier of the source.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the identifier of the containing component.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Gets the kind of value the source introduces.
    pub fn value(&self) -> ValueKind {
        self.value
    }

    /// Gets the taint classes of the source.
    pub fn taint(&self) -> &[Provenance] {
        &self.taint
    }

    /// Checks if data from this source can reach a sink argument of the given provenance.
    ///
    /// `Unknown` is accepted: ambiguous provenance lowers confidence, it never
    /// suppresses a match.
    pub fn reaches(&self, provenance: Provenance) -> bool {
        provenance == Provenance::Unknown || self.taint.contains(&provenance)
    }
}

/// Code location performing a sensitive operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    id: String,
    component: String,
    operation: SinkKind,
    provenance: Provenance,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    validated: bool,
}

impl Sink {
    /// Creates a new sink.
    pub fn new<I, C>(id: I, component: C, operation: SinkKind, provenance: Provenance) -> Self
    where
        I: Into<String>,
        C: Into<String>,
    {
        Self {
            id: id.into(),
            component: component.into(),
            operation,
            provenance,
            target: None,
            location: None,
            validated: false,
        }
    }

    /// Sets the component the operation is aimed at.
    pub fn with_target<S: Into<String>>(mut self, target: S) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the logical storage location the operation works on.
    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Marks the argument as checked before reaching the sink.
    pub fn validated(mut self) -> Self {
        self.validated = true;
        self
    }

    /// Gets the identifier of the sink.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the identifier of the containing component.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Gets the operation of the sink.
    pub fn operation(&self) -> SinkKind {
        self.operation
    }

    /// Gets the provenance of the sink argument.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Gets the targeted component, if statically known.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Gets the logical storage location, if any.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Checks if the argument is validated before reaching the sink.
    pub fn is_validated(&self) -> bool {
        self.validated
    }
}
