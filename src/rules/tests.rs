//! Tests for the rule registry.
#![allow(clippy::trivial_regex)]

use super::{Predicate, Rule, RuleBuilder, RuleRegistry};
use crate::{
    criticality::{Confidence, Criticality},
    error::ErrorKind,
    facts::{
        ApplicationFacts, Component, ComponentKind, FactKind, FactRef, PermissionDeclaration,
        Provenance, Sink, SinkKind, Source, ValueKind,
    },
    results::{Category, FindingFlag, SeverityTable},
};
use pretty_assertions::assert_eq;
use regex::Regex;

fn redirecting_activity(provenance: Provenance) -> ApplicationFacts {
    ApplicationFacts::new("com.example.app")
        .with_min_sdk(21)
        .with_component(
            Component::new("com.example.app.Proxy", ComponentKind::Activity).with_exported(true),
        )
        .with_source(Source::new(
            "proxy-extra",
            "com.example.app.Proxy",
            ValueKind::IntentExtra,
            vec![Provenance::DerivedFromIntent],
        ))
        .with_sink(Sink::new(
            "proxy-start",
            "com.example.app.Proxy",
            SinkKind::StartComponent,
            provenance,
        ))
}

fn start_rule() -> Rule {
    RuleBuilder::new("test-start", Category::IntentRedirection)
        .rationale("Starts an intent received from outside.")
        .predicate(Predicate::Sink {
            operations: vec![SinkKind::StartComponent],
            provenance: vec![Provenance::DerivedFromIntent],
            exported_component: Some(true),
            validated: Some(false),
            targeted: Some(false),
            requires_source: Some(ValueKind::IntentExtra),
        })
        .build()
        .unwrap()
}

#[test]
fn it_builtin_catalogue() {
    let registry = RuleRegistry::builtin().unwrap();

    assert_eq!(registry.len(), 13);
    assert!(registry.get("intent-redirection").is_some());
    assert!(registry.get("missing-protection-level").is_some());
    for rule in registry.iter() {
        assert!(!rule.rationale().is_empty(), "{} has no rationale", rule.id());
        assert!(!rule.reads().is_empty());
    }

    let ids: Vec<_> = registry.iter().map(Rule::id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn it_has_to_check() {
    let rule = start_rule();
    assert!(rule.has_to_check("com.example.app.Proxy"));

    let included = RuleBuilder::new("included", Category::IntentRedirection)
        .rationale("r")
        .predicate(Predicate::UnresolvedPermission)
        .include_component(Regex::new(r"\.Proxy$").unwrap())
        .build()
        .unwrap();
    assert!(included.has_to_check("com.example.app.Proxy"));
    assert!(!included.has_to_check("com.example.app.Main"));

    let excluded = RuleBuilder::new("excluded", Category::IntentRedirection)
        .rationale("r")
        .predicate(Predicate::UnresolvedPermission)
        .include_component(Regex::new(r"com\.example").unwrap())
        .exclude_component(Regex::new(r"\.debug\.").unwrap())
        .build()
        .unwrap();
    assert!(excluded.has_to_check("com.example.app.Proxy"));
    assert!(!excluded.has_to_check("com.example.debug.Proxy"));
    assert!(!excluded.has_to_check("org.other.Proxy"));
}

#[test]
fn it_rejects_invalid_rules() {
    match RuleBuilder::new("no-predicate", Category::PathTraversal)
        .rationale("r")
        .build()
    {
        Err(ErrorKind::InvalidRule { id, .. }) => assert_eq!(id, "no-predicate"),
        other => panic!("unexpected build result: {:?}", other),
    }
    assert!(RuleBuilder::new("no-rationale", Category::PathTraversal)
        .predicate(Predicate::UnresolvedPermission)
        .build()
        .is_err());

    let mut registry = RuleRegistry::new();
    registry.insert(start_rule()).unwrap();
    assert!(registry.insert(start_rule()).is_err());
    assert_eq!(registry.len(), 1);
}

#[test]
fn it_reads() {
    assert_eq!(
        start_rule().reads(),
        vec![FactKind::Component, FactKind::Source, FactKind::Sink]
    );
    assert_eq!(
        Predicate::UnresolvedPermission.reads(),
        vec![FactKind::Component, FactKind::Permission]
    );
    assert_eq!(
        Predicate::UnresolvedComponent.reads(),
        vec![FactKind::Component, FactKind::Sink]
    );
}

#[test]
fn it_evaluates_resolved_provenance() {
    let facts = redirecting_activity(Provenance::DerivedFromIntent);
    let findings = start_rule().evaluate(&facts);

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].confidence(), Confidence::High);
    assert_eq!(findings[0].flags().count(), 0);
    assert_eq!(
        findings[0].evidence(),
        &[
            FactRef::Component("com.example.app.Proxy".to_owned()),
            FactRef::Source("proxy-extra".to_owned()),
            FactRef::Sink("proxy-start".to_owned()),
        ][..]
    );
}

#[test]
fn it_downgrades_unknown_provenance() {
    let facts = redirecting_activity(Provenance::Unknown);
    let findings = start_rule().evaluate(&facts);

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].confidence(), Confidence::Medium);
    assert!(findings[0].has_flag(FindingFlag::AmbiguousProvenance));

    let literal = redirecting_activity(Provenance::Literal);
    assert!(start_rule().evaluate(&literal).is_empty());
}

#[test]
fn it_skips_private_and_guarded_sinks() {
    let private = ApplicationFacts::new("com.example.app")
        .with_component(Component::new("com.example.app.Proxy", ComponentKind::Activity))
        .with_source(Source::new(
            "proxy-extra",
            "com.example.app.Proxy",
            ValueKind::IntentExtra,
            vec![Provenance::DerivedFromIntent],
        ))
        .with_sink(Sink::new(
            "proxy-start",
            "com.example.app.Proxy",
            SinkKind::StartComponent,
            Provenance::DerivedFromIntent,
        ));
    assert!(start_rule().evaluate(&private).is_empty());

    let facts = redirecting_activity(Provenance::DerivedFromIntent);
    let guarded = ApplicationFacts::new("com.example.app")
        .with_component(facts.components()[0].clone())
        .with_source(facts.sources()[0].clone())
        .with_sink(facts.sinks()[0].clone().validated());
    assert!(start_rule().evaluate(&guarded).is_empty());
}

#[test]
fn it_permission_rules() {
    let registry = RuleRegistry::builtin().unwrap();
    let facts = ApplicationFacts::new("com.example.app")
        .with_min_sdk(21)
        .with_permission(PermissionDeclaration::new("com.example.app.SYNC"))
        .with_component(
            Component::new("com.example.app.SyncReceiver", ComponentKind::Receiver)
                .with_exported(true)
                .with_permission("com.example.app.SYNC"),
        )
        .with_component(
            Component::new("com.example.app.Legacy", ComponentKind::Service)
                .with_permission("com.vendor.GONE"),
        );

    let missing = registry
        .get("missing-protection-level")
        .unwrap()
        .evaluate(&facts);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].category(), Category::PermissionGap);
    assert_eq!(
        missing[0].evidence(),
        &[
            FactRef::Component("com.example.app.SyncReceiver".to_owned()),
            FactRef::Permission("com.example.app.SYNC".to_owned()),
        ][..]
    );

    assert!(registry
        .get("weak-custom-permission")
        .unwrap()
        .evaluate(&facts)
        .is_empty());

    let unresolved = registry
        .get("unresolved-permission")
        .unwrap()
        .evaluate(&facts);
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].category(), Category::UnresolvedReference);
}

#[test]
fn it_missing_protection_only_for_declared_permissions() {
    let registry = RuleRegistry::builtin().unwrap();
    let facts = ApplicationFacts::new("com.example.app")
        .with_min_sdk(21)
        .with_component(
            Component::new("com.example.app.Cam", ComponentKind::Activity)
                .with_exported(true)
                .with_permission("android.permission.CAMERA"),
        )
        .with_component(
            Component::new("com.example.app.Gone", ComponentKind::Service)
                .with_exported(true)
                .with_permission("com.vendor.GONE"),
        );

    assert!(registry
        .get("missing-protection-level")
        .unwrap()
        .evaluate(&facts)
        .is_empty());

    let unresolved = registry
        .get("unresolved-permission")
        .unwrap()
        .evaluate(&facts);
    assert_eq!(unresolved.len(), 1);
    assert_eq!(
        unresolved[0].evidence(),
        &[
            FactRef::Component("com.example.app.Gone".to_owned()),
            FactRef::Permission("com.vendor.GONE".to_owned()),
        ][..]
    );
}

#[test]
fn it_unresolved_component() {
    let registry = RuleRegistry::builtin().unwrap();
    let facts = ApplicationFacts::new("com.example.app")
        .with_min_sdk(21)
        .with_component(
            Component::new("com.example.app.Main", ComponentKind::Activity).with_exported(true),
        )
        .with_component(Component::new(
            "com.example.app.Worker",
            ComponentKind::Service,
        ))
        .with_sink(
            Sink::new(
                "open-settings",
                "com.example.app.Main",
                SinkKind::StartComponent,
                Provenance::Literal,
            )
            .with_target("com.other.app.Settings"),
        )
        .with_sink(
            Sink::new(
                "start-worker",
                "com.example.app.Main",
                SinkKind::StartComponent,
                Provenance::Literal,
            )
            .with_target("com.example.app.Worker"),
        );

    let findings = registry
        .get("unresolved-component")
        .unwrap()
        .evaluate(&facts);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].category(), Category::UnresolvedReference);
    assert_eq!(findings[0].confidence(), Confidence::Low);
    assert_eq!(
        findings[0].evidence(),
        &[
            FactRef::Component("com.example.app.Main".to_owned()),
            FactRef::Sink("open-settings".to_owned()),
        ][..]
    );
}

#[test]
fn it_retain_min_criticality() {
    let mut registry = RuleRegistry::builtin().unwrap();
    registry.retain_min_criticality(&SeverityTable::default(), Criticality::High);

    assert!(registry.get("intent-redirection").is_some());
    assert!(registry.get("dynamic-code-load").is_some());
    assert!(registry.get("exported-without-permission").is_none());
    assert!(registry.get("webview-url-injection").is_none());
    assert!(registry.get("missing-protection-level").is_none());
}

#[test]
fn it_deserializes_rules() {
    let toml = r#"
        id = "debug-webview"
        category = "webview-url-injection"
        confidence = "low"
        rationale = "Debug activities loading URLs."
        include_component = "\\.debug\\."

        [predicate]
        fact = "sink"
        operations = ["webview-load-url"]
        provenance = ["derived-from-intent"]
    "#;

    let rule: Rule = toml::from_str(toml).unwrap();
    assert_eq!(rule.id(), "debug-webview");
    assert_eq!(rule.category(), Category::WebviewUrlInjection);
    assert_eq!(rule.confidence(), Confidence::Low);
    assert!(rule.has_to_check("com.example.debug.Browser"));
    assert!(!rule.has_to_check("com.example.Browser"));
    assert_eq!(
        rule.predicate(),
        &Predicate::Sink {
            operations: vec![SinkKind::WebviewLoadUrl],
            provenance: vec![Provenance::DerivedFromIntent],
            exported_component: None,
            validated: None,
            targeted: None,
            requires_source: None,
        }
    );

    let invalid = toml.replace("\\\\.debug\\\\.", "(");
    assert!(toml::from_str::<Rule>(&invalid).is_err());
}
