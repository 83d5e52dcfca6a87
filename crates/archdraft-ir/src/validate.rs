//! IR validator
//!
//! Collects every violation instead of failing on the first one; the caller
//! gets the full reason list. There is no partial acceptance: one reason is
//! enough to reject a write.

use crate::model::{DiagramIr, GlobalIntent};
use archdraft_core::{Error, Result};
use std::collections::HashSet;

/// Substrings that mean renderer syntax leaked into a label.
const RENDERER_SYNTAX: &[&str] = &[
    "@startuml",
    "@enduml",
    "%%{",
    "!include",
    "!import",
    "!pragma",
    "skinparam",
    "```",
];

fn is_normalized_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn looks_like_css(value: &str) -> bool {
    value.contains('#') && value.chars().filter(|c| c.is_ascii_hexdigit()).count() >= 3
        || value.contains("px")
        || value.contains("rgb(")
        || value.contains("url(")
}

/// Run all checks, returning every violation found. Empty means pass.
pub fn check(ir: &DiagramIr) -> Vec<String> {
    let mut reasons = Vec::new();

    if ir.version < 1 {
        reasons.push(format!("version must be >= 1, got {}", ir.version));
    }
    if let Some(parent) = ir.parent_version {
        if parent >= ir.version {
            reasons.push(format!(
                "parent_version {} must be strictly below version {}",
                parent, ir.version
            ));
        }
    }

    let mut node_ids: HashSet<&str> = HashSet::new();
    for node in &ir.nodes {
        if !is_normalized_id(&node.node_id) {
            reasons.push(format!(
                "node id '{}' is not lower_snake_case",
                node.node_id
            ));
        }
        if !node_ids.insert(&node.node_id) {
            reasons.push(format!("duplicate node id '{}'", node.node_id));
        }
        if !(0.0..=1.0).contains(&node.confidence) {
            reasons.push(format!(
                "node '{}' confidence {} outside [0,1]",
                node.node_id, node.confidence
            ));
        }
        for token in RENDERER_SYNTAX {
            if node.label.contains(token) {
                reasons.push(format!(
                    "node '{}' label contains renderer syntax '{}'",
                    node.node_id, token
                ));
            }
        }
        if let Some(zone) = &node.zone {
            if !ir.zones.iter().any(|z| &z.zone_id == zone) {
                reasons.push(format!(
                    "node '{}' references unknown zone '{}'",
                    node.node_id, zone
                ));
            }
        }
        if let Some(hint) = &node.placement_hint {
            if hint.chars().any(|c| c.is_ascii_digit()) {
                reasons.push(format!(
                    "node '{}' placement hint '{}' looks like a coordinate",
                    node.node_id, hint
                ));
            }
        }
    }

    let mut edge_ids: HashSet<&str> = HashSet::new();
    for edge in &ir.edges {
        if !edge_ids.insert(&edge.edge_id) {
            reasons.push(format!("duplicate edge id '{}'", edge.edge_id));
        }
        if !node_ids.contains(edge.from_id.as_str()) {
            reasons.push(format!(
                "edge '{}' endpoint '{}' does not resolve to a node",
                edge.edge_id, edge.from_id
            ));
        }
        if !node_ids.contains(edge.to_id.as_str()) {
            reasons.push(format!(
                "edge '{}' endpoint '{}' does not resolve to a node",
                edge.edge_id, edge.to_id
            ));
        }
        if !(0.0..=1.0).contains(&edge.confidence) {
            reasons.push(format!(
                "edge '{}' confidence {} outside [0,1]",
                edge.edge_id, edge.confidence
            ));
        }
        for token in RENDERER_SYNTAX {
            if edge.label.contains(token) {
                reasons.push(format!(
                    "edge '{}' label contains renderer syntax '{}'",
                    edge.edge_id, token
                ));
            }
        }
        if edge.sequence.is_some() && ir.diagram_type.is_structural() {
            reasons.push(format!(
                "edge '{}' carries a temporal ordinal on a {} diagram",
                edge.edge_id,
                ir.diagram_type.as_str()
            ));
        }
    }

    let zone_ids: HashSet<&str> = ir.zones.iter().map(|z| z.zone_id.as_str()).collect();
    if zone_ids.len() != ir.zones.len() {
        reasons.push("duplicate zone ids".to_string());
    }
    for zone in &ir.zone_order {
        if !zone_ids.contains(zone.as_str()) {
            reasons.push(format!("zone_order references unknown zone '{}'", zone));
        }
    }

    check_intent_words(&ir.global_intent, &mut reasons);
    for (key, value) in ir.node_intent.iter().chain(ir.edge_intent.iter()) {
        let rendered = value.to_string();
        if looks_like_css(&rendered) {
            reasons.push(format!("intent '{}' contains concrete styling", key));
        }
    }

    reasons
}

fn check_intent_words(intent: &GlobalIntent, reasons: &mut Vec<String>) {
    for (field, value) in [
        ("mood", &intent.mood),
        ("density", &intent.density),
        ("palette", &intent.palette),
    ] {
        if let Some(v) = value {
            if looks_like_css(v) {
                reasons.push(format!("global intent {} contains concrete styling", field));
            }
        }
    }
}

/// Validate or return `VALIDATION_FAILED` with the full reason list.
pub fn validate_strict(ir: &DiagramIr) -> Result<()> {
    let reasons = check(ir);
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(reasons))
    }
}
