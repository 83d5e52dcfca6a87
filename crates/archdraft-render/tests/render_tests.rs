//! Tests for archdraft-render: sanitizer, translators, router, neutral gate,
//! and the subprocess adapter against real processes

use archdraft_core::{DiagramFormat, DiagramId};
use archdraft_ir::{DiagramIr, DiagramType, Edge, Node, NodeType, RelType, Zone};
use archdraft_render::*;

fn sample_ir() -> DiagramIr {
    let mut ir = DiagramIr::initial(DiagramId::new("d1"), DiagramType::Component);
    ir.zones = vec![Zone {
        zone_id: "backend".to_string(),
        label: "Backend".to_string(),
    }];
    ir.zone_order = vec!["backend".to_string()];
    let mut service = Node::new("service", "Service", NodeType::Component);
    service.zone = Some("backend".to_string());
    let mut db = Node::new("db", "DB", NodeType::DataStore);
    db.zone = Some("backend".to_string());
    ir.nodes = vec![
        Node::new("user", "User", NodeType::Actor),
        Node::new("api", "API", NodeType::Container),
        service,
        db,
    ];
    ir.edges = vec![
        Edge::new("e1", "user", "api", RelType::Sync),
        Edge::new("e2", "api", "service", RelType::Sync),
        Edge::new("e3", "service", "db", RelType::DataFlow),
    ];
    ir
}

// ===========================================================================
// Sanitizer
// ===========================================================================

#[test]
fn plantuml_include_blocked() {
    let sanitizer = Sanitizer::new(0.5);
    let text = "@startuml\n!include https://evil/x.puml\ncomponent \"A\" as a\n@enduml";
    let outcome = sanitizer.sanitize(text, DiagramFormat::Plantuml).unwrap();
    assert_eq!(outcome.blocked_tokens, vec!["!include"]);
    assert!(!outcome.sanitized_text.contains("!include"));
    assert!(outcome.sanitized_text.contains("component"));
}

#[test]
fn plantuml_background_image_blocked() {
    let sanitizer = Sanitizer::new(0.9);
    let text = "skinparam backgroundImage url(https://x/y.png)\ncomponent \"A\" as a";
    let outcome = sanitizer.sanitize(text, DiagramFormat::Plantuml).unwrap();
    assert!(outcome
        .blocked_tokens
        .contains(&"skinparam backgroundImage".to_string()));
}

#[test]
fn mermaid_init_block_blocked() {
    let sanitizer = Sanitizer::new(0.9);
    let text = "%%{init: {'theme':'dark'}}%%\nflowchart TD\n    a --> b";
    let outcome = sanitizer.sanitize(text, DiagramFormat::Mermaid).unwrap();
    assert_eq!(outcome.blocked_tokens, vec!["%%{init"]);
    assert!(outcome.sanitized_text.starts_with("flowchart TD"));
}

#[test]
fn mermaid_html_label_stripped_not_dropped() {
    let sanitizer = Sanitizer::new(0.9);
    let text = "flowchart TD\n    a[\"<b>Bold</b> label\"] --> b";
    let outcome = sanitizer.sanitize(text, DiagramFormat::Mermaid).unwrap();
    assert_eq!(outcome.blocked_tokens, vec!["html_label"]);
    assert!(outcome.sanitized_text.contains("Bold label"));
    assert!(!outcome.sanitized_text.contains("<b>"));
}

#[test]
fn mostly_blocked_input_rejected() {
    let sanitizer = Sanitizer::new(0.2);
    let text = "!include a\n!include b\n!include c\ncomponent \"A\" as a";
    let err = sanitizer
        .sanitize(text, DiagramFormat::Plantuml)
        .unwrap_err();
    assert_eq!(err.kind(), "UNSAFE_INPUT");
}

#[test]
fn whitelist_keeps_small_grammar() {
    let sanitizer = Sanitizer::new(0.9);
    let text = "@startuml\ncomponent \"A\" as a\nactor \"U\" as u\nu --> a\nskinparam monochrome true\nskinparam backgroundColor #222\n@enduml";
    let outcome = sanitizer.sanitize_whitelist(text).unwrap();
    assert!(outcome.sanitized_text.contains("skinparam monochrome"));
    assert!(!outcome.sanitized_text.contains("backgroundColor"));
    assert_eq!(outcome.blocked_tokens, vec!["skinparam"]);
}

// ===========================================================================
// Translators
// ===========================================================================

#[test]
fn translate_is_deterministic() {
    let ir = sample_ir();
    for format in [
        DiagramFormat::Mermaid,
        DiagramFormat::Plantuml,
        DiagramFormat::Structurizr,
    ] {
        let a = translate(&ir, format).unwrap();
        let b = translate(&ir, format).unwrap();
        assert_eq!(a, b, "{} output must be byte-identical", format);
    }
}

#[test]
fn node_order_is_canonical() {
    let ir = sample_ir();
    let mut shuffled = ir.clone();
    shuffled.nodes.reverse();
    for format in [
        DiagramFormat::Mermaid,
        DiagramFormat::Plantuml,
        DiagramFormat::Structurizr,
    ] {
        assert_eq!(
            translate(&ir, format).unwrap(),
            translate(&shuffled, format).unwrap(),
            "{} output must not depend on declaration order",
            format
        );
    }
}

#[test]
fn mermaid_emits_zones_as_subgraphs() {
    let text = translate(&sample_ir(), DiagramFormat::Mermaid).unwrap();
    assert!(text.contains("subgraph backend[\"Backend\"]"));
    assert!(text.contains("user --> api"));
}

#[test]
fn mermaid_escapes_labels() {
    let mut ir = sample_ir();
    ir.node_mut("api").unwrap().label = "API \"edge\" <svc>".to_string();
    let text = translate(&ir, DiagramFormat::Mermaid).unwrap();
    assert!(!text.contains("\"edge\""));
    assert!(text.contains("#quot;edge#quot;"));
    assert!(!text.contains("<svc>"));
}

#[test]
fn plantuml_wraps_in_startuml() {
    let text = translate(&sample_ir(), DiagramFormat::Plantuml).unwrap();
    assert!(text.starts_with("@startuml\n"));
    assert!(text.ends_with("@enduml\n"));
    assert!(text.contains("package \"Backend\""));
    assert!(text.contains("database \"DB\" as db"));
}

#[test]
fn no_aesthetic_directives_emitted() {
    let mut ir = sample_ir();
    ir.global_intent.mood = Some("calm".to_string());
    ir.node_intent
        .insert("storage".to_string(), serde_json::json!({"mood": "muted"}));
    for format in [
        DiagramFormat::Mermaid,
        DiagramFormat::Plantuml,
        DiagramFormat::Structurizr,
    ] {
        let text = translate(&ir, format).unwrap();
        assert!(!text.contains("calm"), "{}: intent leaked", format);
        assert!(!text.contains("muted"), "{}: intent leaked", format);
        assert!(!text.contains("skinparam"), "{}: aesthetics leaked", format);
    }
}

#[test]
fn hidden_nodes_and_their_edges_skipped() {
    let mut ir = sample_ir();
    ir.node_mut("db").unwrap().hidden = true;
    let text = translate(&ir, DiagramFormat::Mermaid).unwrap();
    assert!(!text.contains("db"));
    assert!(!text.contains("e3"));
    assert!(!text.contains("service -->|"));
}

#[test]
fn sequence_via_structurizr_unsupported() {
    let mut ir = sample_ir();
    ir.diagram_type = DiagramType::Sequence;
    for e in &mut ir.edges {
        e.sequence = Some(1);
    }
    let err = translate(&ir, DiagramFormat::Structurizr).unwrap_err();
    assert_eq!(err.kind(), "UNSUPPORTED_FEATURE");
}

#[test]
fn sequence_orders_by_ordinal() {
    let mut ir = sample_ir();
    ir.diagram_type = DiagramType::Sequence;
    ir.edges[0].sequence = Some(3);
    ir.edges[1].sequence = Some(1);
    ir.edges[2].sequence = Some(2);
    let text = translate(&ir, DiagramFormat::Mermaid).unwrap();
    let api_pos = text.find("api->>service").unwrap();
    let svc_pos = text.find("service->>db").unwrap();
    let user_pos = text.find("user->>api").unwrap();
    assert!(api_pos < svc_pos && svc_pos < user_pos);
}

// ===========================================================================
// Router
// ===========================================================================

#[test]
fn router_table_is_deterministic() {
    assert_eq!(
        route(DiagramType::Sequence, None).unwrap().renderer,
        DiagramFormat::Mermaid
    );
    assert_eq!(
        route(DiagramType::Flow, None).unwrap().renderer,
        DiagramFormat::Mermaid
    );
    assert_eq!(
        route(DiagramType::Component, None).unwrap().renderer,
        DiagramFormat::Structurizr
    );
    assert_eq!(
        route(DiagramType::Context, None).unwrap().renderer,
        DiagramFormat::Structurizr
    );
}

#[test]
fn router_override_wins() {
    let decision = route(DiagramType::Component, Some("plantuml")).unwrap();
    assert_eq!(decision.renderer, DiagramFormat::Plantuml);
    assert!(decision.justification.contains("override"));
}

#[test]
fn router_rejects_unknown_override() {
    let err = route(DiagramType::Component, Some("graphviz")).unwrap_err();
    assert_eq!(err.kind(), "UNSUPPORTED_FEATURE");
}

#[test]
fn fallback_row_is_plantuml() {
    let decision = fallback();
    assert_eq!(decision.renderer, DiagramFormat::Plantuml);
    assert!(decision.justification.contains("fallback"));
}

// ===========================================================================
// Neutral-SVG gate
// ===========================================================================

#[test]
fn neutral_svg_passes_unchanged() {
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="none" stroke="black"/><text>API</text></svg>"##;
    let outcome = neutralize(svg).unwrap();
    assert!(!outcome.was_modified);
    assert_eq!(outcome.svg, svg);
    assert!(is_neutral(svg));
}

#[test]
fn themed_fill_is_stripped() {
    let svg = r##"<svg><rect fill="#ff6600" stroke="black"/></svg>"##;
    let outcome = neutralize(svg).unwrap();
    assert!(outcome.was_modified);
    assert!(!outcome.svg.contains("#ff6600"));
    assert!(outcome.svg.contains("stroke=\"black\""));
    assert_eq!(outcome.stripped, vec!["fill=#ff6600"]);
}

#[test]
fn theme_style_block_is_stripped() {
    let svg = "<svg><style>.node { fill: #123456; }</style><rect/></svg>";
    let outcome = neutralize(svg).unwrap();
    assert!(!outcome.svg.contains("style"));
    assert!(outcome.stripped.contains(&"style_block".to_string()));
}

#[test]
fn style_block_wrapping_markup_rejected() {
    let svg = "<svg><style>.x { fill: red; } <rect/></style></svg>";
    let err = neutralize(svg).unwrap_err();
    assert_eq!(err.kind(), "VALIDATION_FAILED");
}

#[test]
fn unterminated_style_block_rejected() {
    let svg = "<svg><style>.x { fill: red; }<rect/></svg>";
    assert!(neutralize(svg).is_err());
}

#[test]
fn inline_style_attr_keeps_non_theme_decls() {
    let svg = r##"<svg><rect style="fill:#abc; opacity:0.5"/></svg>"##;
    let outcome = neutralize(svg).unwrap();
    assert!(outcome.svg.contains("opacity:0.5"));
    assert!(!outcome.svg.contains("#abc"));
}

// ===========================================================================
// Subprocess adapter - real processes
// ===========================================================================

#[tokio::test]
async fn adapter_captures_stdout_svg() {
    let command = vec!["cat".to_string()];
    let outcome = render_subprocess(&command, "<svg><rect/></svg>", 5_000)
        .await
        .unwrap();
    assert_eq!(outcome.svg, "<svg><rect/></svg>");
    assert_eq!(outcome.command, "cat");
}

#[tokio::test]
async fn adapter_rejects_non_svg_output() {
    let command = vec!["cat".to_string()];
    let err = render_subprocess(&command, "plain text", 5_000)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "RENDER_FAILED");
}

#[tokio::test]
async fn adapter_reports_nonzero_exit() {
    let command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo boom >&2; exit 3".to_string(),
    ];
    let err = render_subprocess(&command, "", 5_000).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("3"));
    assert!(message.contains("boom"));
}

#[tokio::test]
async fn adapter_enforces_deadline() {
    let command = vec!["sleep".to_string(), "30".to_string()];
    let err = render_subprocess(&command, "", 100).await.unwrap_err();
    assert_eq!(err.kind(), "RENDER_FAILED");
    assert!(err.to_string().contains("timed out"));
}
