//! Mermaid emitter

use super::{temporal_order, visible};
use archdraft_core::Result;
use archdraft_ir::{DiagramIr, DiagramType, Edge, Node, NodeType, RelType};

pub fn emit(ir: &DiagramIr) -> Result<String> {
    if ir.diagram_type.is_structural() {
        emit_flowchart(ir)
    } else {
        match ir.diagram_type {
            DiagramType::Sequence => emit_sequence(ir),
            // flow and story render as flowcharts with ordered edges
            _ => emit_flowchart(ir),
        }
    }
}

fn emit_flowchart(ir: &DiagramIr) -> Result<String> {
    let (nodes, edges) = visible(ir);
    let mut out = String::from("flowchart TD\n");

    // zoneless nodes first, then each zone as a subgraph
    for node in nodes.iter().filter(|n| n.zone.is_none()) {
        out.push_str(&format!("    {}\n", node_decl(node)));
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
        out.push_str(&format!("    subgraph {}[\"{}\"]\n", zone_id, escape(label)));
        for node in members {
            out.push_str(&format!("        {}\n", node_decl(node)));
        }
        out.push_str("    end\n");
    }

    for edge in &edges {
        out.push_str(&format!("    {}\n", edge_decl(edge)));
    }
    Ok(out)
}

fn emit_sequence(ir: &DiagramIr) -> Result<String> {
    let (nodes, edges) = visible(ir);
    let mut out = String::from("sequenceDiagram\n");
    for node in &nodes {
        out.push_str(&format!(
            "    participant {} as {}\n",
            node.node_id,
            escape(&node.label)
        ));
    }
    for edge in temporal_order(&edges) {
        let arrow = match edge.rel_type {
            RelType::Async => "-)",
            _ => "->>",
        };
        if edge.label.is_empty() {
            out.push_str(&format!("    {}{}{}: \n", edge.from_id, arrow, edge.to_id));
        } else {
            out.push_str(&format!(
                "    {}{}{}: {}\n",
                edge.from_id,
                arrow,
                edge.to_id,
                escape(&edge.label)
            ));
        }
    }
    Ok(out)
}

fn node_decl(node: &Node) -> String {
    let label = escape(&node.label);
    match node.node_type {
        NodeType::Actor => format!("{}((\"{}\"))", node.node_id, label),
        NodeType::DataStore => format!("{}[(\"{}\")]", node.node_id, label),
        NodeType::External => format!("{}[[\"{}\"]]", node.node_id, label),
        _ => format!("{}[\"{}\"]", node.node_id, label),
    }
}

fn edge_decl(edge: &Edge) -> String {
    let arrow = match edge.rel_type {
        RelType::Async | RelType::Replication | RelType::SecretDistribution | RelType::Monitoring => {
            "-.->"
        }
        RelType::Control => "==>",
        _ => "-->",
    };
    if edge.label.is_empty() {
        format!("{} {} {}", edge.from_id, arrow, edge.to_id)
    } else {
        format!("{} {}|{}| {}", edge.from_id, arrow, escape(&edge.label), edge.to_id)
    }
}

fn escape(text: &str) -> String {
    text.replace('"', "#quot;")
        .replace('<', "#lt;")
        .replace('>', "#gt;")
        .replace('\n', " ")
}
