//! Tests for the chain linker.

use super::{
    builtin_templates, link_chains, ChainGraph, ChainTemplate, EdgeKind, NodeConstraint,
    SourceStep, TemplateBuilder,
};
use crate::{
    criticality::Confidence,
    facts::{
        ApplicationFacts, Component, ComponentKind, FactRef, Provenance, Sink, SinkKind, Source,
        ValueKind,
    },
    results::{Category, FindingFlag},
};
use pretty_assertions::assert_eq;

fn component(id: &str) -> FactRef {
    FactRef::Component(id.to_owned())
}

fn source(id: &str) -> FactRef {
    FactRef::Source(id.to_owned())
}

fn sink(id: &str) -> FactRef {
    FactRef::Sink(id.to_owned())
}

/// Exported provider writing `lib/` files from URI segments, and loading a library from there.
fn provider_facts(write_provenance: Provenance) -> ApplicationFacts {
    ApplicationFacts::new("com.example.store")
        .with_min_sdk(23)
        .with_component(
            Component::new("com.example.store.FileProvider", ComponentKind::Provider)
                .with_exported(true),
        )
        .with_source(Source::new(
            "segment",
            "com.example.store.FileProvider",
            ValueKind::UriPathSegment,
            vec![Provenance::DerivedFromUri],
        ))
        .with_sink(
            Sink::new(
                "write",
                "com.example.store.FileProvider",
                SinkKind::FileWrite,
                write_provenance,
            )
            .with_location("lib"),
        )
        .with_sink(
            Sink::new(
                "load",
                "com.example.store.FileProvider",
                SinkKind::NativeLibraryLoad,
                Provenance::Literal,
            )
            .with_location("lib"),
        )
}

/// Exported activity forwarding an Intent to a private activity writing files.
fn redirection_facts() -> ApplicationFacts {
    ApplicationFacts::new("com.example.shop")
        .with_min_sdk(24)
        .with_component(
            Component::new("com.example.shop.Deeplink", ComponentKind::Activity)
                .with_exported(true),
        )
        .with_component(Component::new(
            "com.example.shop.Settings",
            ComponentKind::Activity,
        ))
        .with_component(Component::new(
            "com.example.shop.Sync",
            ComponentKind::Service,
        ))
        .with_source(Source::new(
            "deeplink-extra",
            "com.example.shop.Deeplink",
            ValueKind::IntentExtra,
            vec![Provenance::DerivedFromIntent],
        ))
        .with_sink(Sink::new(
            "deeplink-start",
            "com.example.shop.Deeplink",
            SinkKind::StartComponent,
            Provenance::DerivedFromIntent,
        ))
        .with_source(Source::new(
            "settings-extra",
            "com.example.shop.Settings",
            ValueKind::IntentExtra,
            vec![Provenance::DerivedFromIntent],
        ))
        .with_sink(Sink::new(
            "settings-write",
            "com.example.shop.Settings",
            SinkKind::FileWrite,
            Provenance::DerivedFromIntent,
        ))
}

#[test]
fn it_builds_graph_edges() {
    let facts = provider_facts(Provenance::DerivedFromUri);
    let graph = ChainGraph::build(&facts);

    assert_eq!(graph.node_count(), 4);
    assert!(graph.has_edge(
        &component("com.example.store.FileProvider"),
        &source("segment"),
        EdgeKind::DeliversTo
    ));
    assert!(graph.has_edge(&source("segment"), &sink("write"), EdgeKind::FlowsTo));
    assert!(!graph.has_edge(&source("segment"), &sink("load"), EdgeKind::FlowsTo));
    assert!(graph.has_edge(
        &sink("write"),
        &sink("load"),
        EdgeKind::WritesPathConsumedBy
    ));
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn it_untargeted_intent_reaches_private_components() {
    let facts = redirection_facts();
    let graph = ChainGraph::build(&facts);

    let targets: Vec<_> = graph
        .successors(&sink("deeplink-start"), EdgeKind::ForwardsIntentTo)
        .iter()
        .map(|n| n.fact())
        .collect();
    assert_eq!(
        targets,
        vec![
            component("com.example.shop.Settings"),
            component("com.example.shop.Sync"),
        ]
    );
}

#[test]
fn it_builtin_templates() {
    let templates = builtin_templates().unwrap();

    let ids: Vec<_> = templates.iter().map(ChainTemplate::id).collect();
    assert_eq!(
        ids,
        vec![
            "intent-redirection-to-private-component",
            "path-traversal-code-write-native-load",
            "intent-redirection-uri-grant-file-access",
            "webview-bridge-to-sensitive-sink",
            "intent-payload-code-load",
            "written-code-loaded-into-component",
        ]
    );
    for template in &templates {
        assert!(template.check_depth(5).is_ok());
        assert!(template.validate().is_ok());
    }
    assert!(templates[0].check_depth(3).is_err());
}

#[test]
fn it_rejects_ill_typed_templates() {
    let too_short = ChainTemplate::builder("short", Category::PathTraversal)
        .description("d")
        .step(
            EdgeKind::FlowsTo,
            NodeConstraint::Sink {
                operations: Vec::new(),
                provenance: Vec::new(),
                validated: None,
            },
        )
        .build();
    assert!(too_short.is_err());

    let relay = |builder: TemplateBuilder| {
        builder
            .step(
                EdgeKind::FlowsTo,
                NodeConstraint::Sink {
                    operations: vec![SinkKind::StartComponent],
                    provenance: Vec::new(),
                    validated: None,
                },
            )
            .step(
                EdgeKind::ForwardsIntentTo,
                NodeConstraint::Component {
                    kinds: Vec::new(),
                    exported: Some(false),
                },
            )
            .step(
                EdgeKind::DeliversTo,
                NodeConstraint::Source { values: Vec::new() },
            )
    };
    let deepest = relay(relay(
        ChainTemplate::builder("deepest", Category::IntentRedirection).description("d"),
    ));
    assert!(deepest.build().is_err());
    let deep = relay(
        ChainTemplate::builder("deep", Category::IntentRedirection).description("d"),
    )
    .step(
        EdgeKind::FlowsTo,
        NodeConstraint::Sink {
            operations: Vec::new(),
            provenance: Vec::new(),
            validated: None,
        },
    )
    .step(
        EdgeKind::ForwardsIntentTo,
        NodeConstraint::Component {
            kinds: Vec::new(),
            exported: None,
        },
    );
    assert!(deep.build().is_ok());

    let wrong_node = ChainTemplate::builder("wrong", Category::PathTraversal)
        .description("d")
        .step(
            EdgeKind::FlowsTo,
            NodeConstraint::Component {
                kinds: Vec::new(),
                exported: None,
            },
        )
        .step(
            EdgeKind::DeliversTo,
            NodeConstraint::Source { values: Vec::new() },
        )
        .build();
    assert!(wrong_node.is_err());

    let wrong_start = ChainTemplate::builder("start", Category::PathTraversal)
        .description("d")
        .step(
            EdgeKind::WritesPathConsumedBy,
            NodeConstraint::Sink {
                operations: Vec::new(),
                provenance: Vec::new(),
                validated: None,
            },
        )
        .step(
            EdgeKind::LoadsCodeFrom,
            NodeConstraint::Component {
                kinds: Vec::new(),
                exported: None,
            },
        )
        .build();
    assert!(wrong_start.is_err());
}

#[test]
fn it_links_path_traversal_to_native_load() {
    let facts = provider_facts(Provenance::DerivedFromUri);
    let findings = link_chains(&facts, &builtin_templates().unwrap());

    assert_eq!(findings.len(), 1);
    let chain = &findings[0];
    assert_eq!(
        chain.template(),
        Some("path-traversal-code-write-native-load")
    );
    assert_eq!(chain.category(), Category::ArbitraryCodeExecution);
    assert_eq!(chain.confidence(), Confidence::High);
    assert_eq!(
        chain.evidence(),
        &[
            component("com.example.store.FileProvider"),
            source("segment"),
            sink("write"),
            sink("load"),
        ][..]
    );
}

#[test]
fn it_downgrades_unknown_write_provenance() {
    let facts = provider_facts(Provenance::Unknown);
    let findings = link_chains(&facts, &builtin_templates().unwrap());

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].confidence(), Confidence::Medium);
    assert!(findings[0].has_flag(FindingFlag::AmbiguousProvenance));
}

#[test]
fn it_links_intent_redirection_to_private_component() {
    let facts = redirection_facts();
    let findings = link_chains(&facts, &builtin_templates().unwrap());

    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].template(),
        Some("intent-redirection-to-private-component")
    );
    assert_eq!(
        findings[0].evidence(),
        &[
            component("com.example.shop.Deeplink"),
            source("deeplink-extra"),
            sink("deeplink-start"),
            component("com.example.shop.Settings"),
            source("settings-extra"),
            sink("settings-write"),
        ][..]
    );
}

#[test]
fn it_validated_sink_breaks_chain() {
    let facts = redirection_facts();
    let guarded = ApplicationFacts::new("com.example.shop")
        .with_min_sdk(24)
        .with_component(facts.components()[0].clone())
        .with_component(facts.components()[1].clone())
        .with_source(facts.sources()[0].clone())
        .with_source(facts.sources()[1].clone())
        .with_sink(facts.sinks()[0].clone().validated())
        .with_sink(facts.sinks()[1].clone());

    assert!(link_chains(&guarded, &builtin_templates().unwrap()).is_empty());
}

#[test]
fn it_flags_unresolved_permissions() {
    let facts = ApplicationFacts::new("com.example.store")
        .with_min_sdk(23)
        .with_component(
            Component::new("com.example.store.FileProvider", ComponentKind::Provider)
                .with_exported(true)
                .with_permission("com.vendor.MISSING"),
        )
        .with_source(provider_facts(Provenance::DerivedFromUri).sources()[0].clone())
        .with_sink(provider_facts(Provenance::DerivedFromUri).sinks()[0].clone())
        .with_sink(provider_facts(Provenance::DerivedFromUri).sinks()[1].clone());

    let findings = link_chains(&facts, &builtin_templates().unwrap());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].confidence(), Confidence::High);
    assert!(findings[0].has_flag(FindingFlag::CrossesUnresolvedPermission));
}

#[test]
fn it_loaded_code_target_component() {
    let facts = ApplicationFacts::new("com.example.plugins")
        .with_min_sdk(26)
        .with_component(
            Component::new("com.example.plugins.Installer", ComponentKind::Receiver)
                .with_exported(true),
        )
        .with_component(Component::new(
            "com.example.plugins.Host",
            ComponentKind::Service,
        ))
        .with_source(Source::new(
            "plugin-extra",
            "com.example.plugins.Installer",
            ValueKind::IntentExtra,
            vec![Provenance::DerivedFromIntent],
        ))
        .with_sink(
            Sink::new(
                "plugin-write",
                "com.example.plugins.Installer",
                SinkKind::FileWrite,
                Provenance::DerivedFromIntent,
            )
            .with_location("cache/dex"),
        )
        .with_sink(
            Sink::new(
                "plugin-load",
                "com.example.plugins.Host",
                SinkKind::DynamicClassLoad,
                Provenance::Literal,
            )
            .with_location("cache/dex")
            .with_target("com.example.plugins.Host"),
        );

    let findings = link_chains(&facts, &builtin_templates().unwrap());
    let templates: Vec<_> = findings.iter().filter_map(|f| f.template()).collect();
    assert_eq!(
        templates,
        vec!["intent-payload-code-load", "written-code-loaded-into-component"]
    );
    assert_eq!(
        findings[1].terminal(),
        Some(&component("com.example.plugins.Host"))
    );
}

#[test]
fn it_deserializes_templates() {
    let toml = r#"
        id = "implicit-broadcast-to-write"
        category = "implicit-intent-interception"
        description = "A broadcast reaches a receiver writing files."

        [entry]
        values = ["intent-extra"]
        exported = true

        [[steps]]
        edge = "flows-to"
        node = { fact = "sink", operations = ["broadcast-send"] }

        [[steps]]
        edge = "forwards-intent-to"
        node = { fact = "component", kinds = ["receiver"] }
    "#;

    let template: ChainTemplate = toml::from_str(toml).unwrap();
    assert_eq!(template.id(), "implicit-broadcast-to-write");
    assert_eq!(template.steps().len(), 2);
    assert_eq!(template.steps()[1].edge(), EdgeKind::ForwardsIntentTo);
    assert_eq!(
        template.entry(),
        &SourceStep::new(vec![ValueKind::IntentExtra]).with_exported(true)
    );
    assert!(template.validate().is_ok());
}
