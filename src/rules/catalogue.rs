//! Built-in rule catalogue.

use super::{Predicate, Rule, RuleBuilder};
use crate::{
    criticality::Confidence,
    error::ErrorKind,
    facts::{Provenance, SinkKind, ValueKind},
    results::Category,
};

/// Builds the rules shipped with the analyzer.
pub fn builtin_rules() -> Result<Vec<Rule>, ErrorKind> {
    let rules = vec![
        RuleBuilder::new("intent-redirection", Category::IntentRedirection)
            .rationale(
                "An exported component takes an Intent from its extras and starts it without \
                 checking the destination. Any application can use it to reach non-exported \
                 components with this application's identity.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::StartComponent],
                provenance: vec![Provenance::DerivedFromIntent],
                exported_component: Some(true),
                validated: Some(false),
                targeted: Some(false),
                requires_source: Some(ValueKind::IntentExtra),
            }),
        RuleBuilder::new("uri-grant-redirection", Category::UriGrantAbuse)
            .rationale(
                "An Intent coming from an exported component is sent back with URI permission \
                 grant flags. The caller can obtain read or write access to private content \
                 providers.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::UriGrant],
                provenance: vec![Provenance::DerivedFromIntent],
                exported_component: Some(true),
                validated: Some(false),
                targeted: None,
                requires_source: Some(ValueKind::IntentExtra),
            }),
        RuleBuilder::new("provider-path-traversal", Category::PathTraversal)
            .rationale(
                "A file path is built from URI path segments received by an exported \
                 component. Encoded `../` segments let the caller escape the intended \
                 directory.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::FileWrite, SinkKind::FileRead],
                provenance: vec![Provenance::DerivedFromUri],
                exported_component: Some(true),
                validated: Some(false),
                targeted: None,
                requires_source: Some(ValueKind::UriPathSegment),
            }),
        RuleBuilder::new("intent-path-traversal", Category::PathTraversal)
            .confidence(Confidence::Medium)
            .rationale(
                "A file path is built from an Intent extra received by an exported \
                 component without sanitising it.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::FileWrite, SinkKind::FileRead],
                provenance: vec![Provenance::DerivedFromIntent],
                exported_component: Some(true),
                validated: Some(false),
                targeted: None,
                requires_source: Some(ValueKind::IntentExtra),
            }),
        RuleBuilder::new("dynamic-code-load", Category::DynamicCodeLoad)
            .rationale(
                "Code is loaded from a path or class name influenced by external input. If \
                 the loaded file can be replaced, the application will execute foreign code.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::DynamicClassLoad, SinkKind::NativeLibraryLoad],
                provenance: vec![Provenance::DerivedFromIntent, Provenance::DerivedFromUri],
                exported_component: None,
                validated: Some(false),
                targeted: None,
                requires_source: None,
            }),
        RuleBuilder::new("webview-url-injection", Category::WebviewUrlInjection)
            .confidence(Confidence::Medium)
            .rationale(
                "An exported component loads an externally supplied URL in a WebView. \
                 JavaScript bridges and file access of the WebView become reachable.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::WebviewLoadUrl],
                provenance: vec![Provenance::DerivedFromIntent, Provenance::DerivedFromUri],
                exported_component: Some(true),
                validated: Some(false),
                targeted: None,
                requires_source: None,
            }),
        RuleBuilder::new("implicit-broadcast", Category::ImplicitIntentInterception)
            .confidence(Confidence::Medium)
            .rationale(
                "A broadcast is sent without an explicit receiver. Any application \
                 registering a matching filter receives its data.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::BroadcastSend],
                provenance: Vec::new(),
                exported_component: None,
                validated: None,
                targeted: Some(false),
                requires_source: None,
            }),
        RuleBuilder::new("implicit-start", Category::ImplicitIntentInterception)
            .confidence(Confidence::Low)
            .rationale(
                "A component is started with an implicit Intent. Another application can \
                 register a matching filter and intercept it.",
            )
            .predicate(Predicate::Sink {
                operations: vec![SinkKind::StartComponent],
                provenance: vec![Provenance::Literal],
                exported_component: None,
                validated: None,
                targeted: Some(false),
                requires_source: None,
            }),
        RuleBuilder::new("exported-without-permission", Category::ExportedComponent)
            .rationale(
                "The component is exported and not protected by any permission. It can be \
                 used by other applications.",
            )
            .predicate(Predicate::Component {
                kinds: Vec::new(),
                exported: Some(true),
                protected: Some(false),
                browsable: None,
            }),
        RuleBuilder::new("weak-custom-permission", Category::PermissionGap)
            .confidence(Confidence::Medium)
            .rationale(
                "An exported component is protected by a custom permission with a normal or \
                 dangerous protection level. Any application can request it.",
            )
            .predicate(Predicate::Permission {
                weak: Some(true),
                missing_protection: Some(false),
                enforced_by_exported: Some(true),
            }),
        RuleBuilder::new("missing-protection-level", Category::PermissionGap)
            .rationale(
                "An exported component is protected by a custom permission declared without \
                 a protection level. The level defaults to normal, so any application can \
                 request it.",
            )
            .predicate(Predicate::Permission {
                weak: None,
                missing_protection: Some(true),
                enforced_by_exported: Some(true),
            }),
        RuleBuilder::new("unresolved-permission", Category::UnresolvedReference)
            .confidence(Confidence::Medium)
            .rationale(
                "The component requires a permission that is neither declared by the \
                 application nor a platform permission. Whoever defines it first controls \
                 who can access the component.",
            )
            .predicate(Predicate::UnresolvedPermission),
        RuleBuilder::new("unresolved-component", Category::UnresolvedReference)
            .confidence(Confidence::Low)
            .rationale(
                "The component starts, or sends data to, a component that is not part of the \
                 application. Whatever answers under that name receives the data.",
            )
            .predicate(Predicate::UnresolvedComponent),
    ];

    rules.into_iter().map(RuleBuilder::build).collect()
}
