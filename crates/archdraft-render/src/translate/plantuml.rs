//! PlantUML emitter

use super::{temporal_order, visible};
use archdraft_core::Result;
use archdraft_ir::{DiagramIr, DiagramType, Edge, Node, NodeType, RelType};

pub fn emit(ir: &DiagramIr) -> Result<String> {
    match ir.diagram_type {
        DiagramType::Sequence => emit_sequence(ir),
        _ => emit_structural(ir),
    }
}

fn emit_structural(ir: &DiagramIr) -> Result<String> {
    let (nodes, edges) = visible(ir);
    let mut out = String::from("@startuml\n");

    for node in nodes.iter().filter(|n| n.zone.is_none()) {
        out.push_str(&node_decl(node, 0));
    }
    let mut zone_ids: Vec<&str> = ir.zone_order.iter().map(String::as_str).collect();
    for zone in &ir.zones {
        if !zone_ids.contains(&zone.zone_id.as_str()) {
            zone_ids.push(&zone.zone_id);
        }
    }
    for zone_id in zone_ids {
        let members: Vec<&&Node> = nodes
            .iter()
            .filter(|n| n.zone.as_deref() == Some(zone_id))
            .collect();
        if members.is_empty() {
            continue;
        }
        let label = ir
            .zones
            .iter()
            .find(|z| z.zone_id == zone_id)
            .map(|z| z.label.as_str())
            .unwrap_or(zone_id);
        out.push_str(&format!("package \"{}\" {{\n", escape(label)));
        for node in members {
            out.push_str(&node_decl(node, 1));
        }
        out.push_str("}\n");
    }

    for edge in &edges {
        out.push_str(&edge_decl(edge));
    }
    out.push_str("@enduml\n");
    Ok(out)
}

fn emit_sequence(ir: &DiagramIr) -> Result<String> {
    let (nodes, edges) = visible(ir);
    let mut out = String::from("@startuml\n");
    for node in &nodes {
        out.push_str(&format!(
            "participant \"{}\" as {}\n",
            escape(&node.label),
            node.node_id
        ));
    }
    for edge in temporal_order(&edges) {
        let arrow = match edge.rel_type {
            RelType::Async => "->>",
            _ => "->",
        };
        if edge.label.is_empty() {
            out.push_str(&format!("{} {} {}\n", edge.from_id, arrow, edge.to_id));
        } else {
            out.push_str(&format!(
                "{} {} {} : {}\n",
                edge.from_id,
                arrow,
                edge.to_id,
                escape(&edge.label)
            ));
        }
    }
    out.push_str("@enduml\n");
    Ok(out)
}

fn node_decl(node: &Node, indent: usize) -> String {
    let pad = "    ".repeat(indent);
    let label = escape(&node.label);
    let keyword = match node.node_type {
        NodeType::System => "rectangle",
        NodeType::Container | NodeType::Component => "component",
        NodeType::DataStore => "database",
        NodeType::External => "cloud",
        NodeType::Actor => "actor",
    };
    format!("{}{} \"{}\" as {}\n", pad, keyword, label, node.node_id)
}

fn edge_decl(edge: &Edge) -> String {
    let arrow = match edge.rel_type {
        RelType::Async | RelType::Replication | RelType::SecretDistribution | RelType::Monitoring => {
            "..>"
        }
        _ => "-->",
    };
    if edge.label.is_empty() {
        format!("{} {} {}\n", edge.from_id, arrow, edge.to_id)
    } else {
        format!(
            "{} {} {} : {}\n",
            edge.from_id,
            arrow,
            edge.to_id,
            escape(&edge.label)
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('"', "'").replace('\n', " ")
}
