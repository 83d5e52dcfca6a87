//! Structurizr DSL emitter
//!
//! Structural diagrams only. The DSL has no sequence-diagram concept, so
//! temporal types fail with UNSUPPORTED_FEATURE rather than being faked.

use super::visible;
use archdraft_core::{Error, Result};
use archdraft_ir::{DiagramIr, Node, NodeType};

pub fn emit(ir: &DiagramIr) -> Result<String> {
    if !ir.diagram_type.is_structural() {
        return Err(Error::UnsupportedFeature(format!(
            "structurizr cannot express {} diagrams",
            ir.diagram_type.as_str()
        )));
    }

    let (nodes, edges) = visible(ir);
    let mut out = String::from("workspace {\n    model {\n");

    for node in nodes.iter().filter(|n| n.zone.is_none()) {
        out.push_str(&node_decl(node, 2));
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
        out.push_str(&format!("        group \"{}\" {{\n", escape(label)));
        for node in members {
            out.push_str(&node_decl(node, 3));
        }
        out.push_str("        }\n");
    }

    for edge in &edges {
        if edge.label.is_empty() {
            out.push_str(&format!(
                "        {} -> {}\n",
                edge.from_id, edge.to_id
            ));
        } else {
            out.push_str(&format!(
                "        {} -> {} \"{}\"\n",
                edge.from_id,
                edge.to_id,
                escape(&edge.label)
            ));
        }
    }

    out.push_str("    }\n    views {\n        systemLandscape landscape {\n            include *\n            autoLayout\n        }\n    }\n}\n");
    Ok(out)
}

fn node_decl(node: &Node, indent: usize) -> String {
    let pad = "    ".repeat(indent);
    let label = escape(&node.label);
    let keyword = match node.node_type {
        NodeType::Actor => "person",
        _ => "softwareSystem",
    };
    format!("{}{} = {} \"{}\"\n", pad, node.node_id, keyword, label)
}

fn escape(text: &str) -> String {
    text.replace('"', "'").replace('\n', " ")
}
