//! Patch engine
//!
//! The only sanctioned way to mutate a diagram. Applies a closed set of
//! operations to a deep copy of the parent IR, re-validates, and returns the
//! child IR plus a summary. Purely functional: the parent is untouched and
//! nothing here performs I/O.

use crate::model::{DiagramIr, DiagramType, GlobalIntent, Node, RelType};
use crate::validate;
use archdraft_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a `style` op may write. Anything outside the three intent roots is
/// rejected with PATCH_PATH_FORBIDDEN.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "scope")]
pub enum StylePath {
    GlobalIntent,
    NodeIntent { role: String },
    EdgeIntent { rel_type: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Rename the label of a node or edge addressed by id.
    EditText { block_id: String, text: String },
    /// Relative placement word. Coordinates are not expressible here.
    Reposition { node_id: String, placement: String },
    /// Write intent words under one of the three intent roots.
    Style {
        #[serde(flatten)]
        path: StylePath,
        intent: Value,
    },
    Hide { node_id: String },
    Show { node_id: String },
    Annotate { node_id: String, note: String },
    AddBlock { node: Node },
    /// Remove a node; dependent edges go first.
    RemoveBlock { node_id: String },
    UpdateNodeLabel { node_id: String, label: String },
    UpdateEdgeLabel { edge_id: String, label: String },
    DeleteNode { node_id: String },
    DeleteEdge { edge_id: String },
    MoveZone {
        node_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        zone: Option<String>,
    },
    UpdateGlobalIntent { intent: GlobalIntent },
    ConvertDiagramType { to: DiagramType },
}

impl PatchOp {
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::EditText { .. } => "edit_text",
            PatchOp::Reposition { .. } => "reposition",
            PatchOp::Style { .. } => "style",
            PatchOp::Hide { .. } => "hide",
            PatchOp::Show { .. } => "show",
            PatchOp::Annotate { .. } => "annotate",
            PatchOp::AddBlock { .. } => "add_block",
            PatchOp::RemoveBlock { .. } => "remove_block",
            PatchOp::UpdateNodeLabel { .. } => "update_node_label",
            PatchOp::UpdateEdgeLabel { .. } => "update_edge_label",
            PatchOp::DeleteNode { .. } => "delete_node",
            PatchOp::DeleteEdge { .. } => "delete_edge",
            PatchOp::MoveZone { .. } => "move_zone",
            PatchOp::UpdateGlobalIntent { .. } => "update_global_intent",
            PatchOp::ConvertDiagramType { .. } => "convert_diagram_type",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PatchSummary {
    pub operations: Vec<String>,
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub edges_removed: usize,
    pub labels_changed: usize,
    pub intents_updated: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Apply `ops` in order to a deep copy of `parent`. The result carries
/// `version = parent.version + 1` and is re-validated before being returned;
/// any failure aborts the whole patch.
pub fn apply_patch(parent: &DiagramIr, ops: &[PatchOp]) -> Result<(DiagramIr, PatchSummary)> {
    let mut ir = parent.clone();
    ir.parent_version = Some(parent.version);
    ir.version = parent.version + 1;
    ir.metadata.created_at = chrono::Utc::now();
    ir.metadata.validation_warnings.clear();

    let mut summary = PatchSummary::default();

    for op in ops {
        apply_one(&mut ir, op, &mut summary)?;
        summary.operations.push(op.name().to_string());
    }

    validate::validate_strict(&ir)?;
    Ok((ir, summary))
}

fn missing(kind: &str, id: &str) -> Error {
    Error::validation(vec![format!("{} '{}' does not exist", kind, id)])
}

fn apply_one(ir: &mut DiagramIr, op: &PatchOp, summary: &mut PatchSummary) -> Result<()> {
    match op {
        PatchOp::EditText { block_id, text } => {
            if let Some(node) = ir.node_mut(block_id) {
                node.label = text.clone();
            } else if let Some(edge) = ir.edge_mut(block_id) {
                edge.label = text.clone();
            } else {
                return Err(missing("block", block_id));
            }
            summary.labels_changed += 1;
        }
        PatchOp::Reposition { node_id, placement } => {
            if placement.chars().any(|c| c.is_ascii_digit()) {
                return Err(Error::forbidden_path("reposition", "layout coordinates"));
            }
            let node = ir.node_mut(node_id).ok_or_else(|| missing("node", node_id))?;
            node.placement_hint = Some(placement.clone());
        }
        PatchOp::Style { path, intent } => {
            apply_style(ir, path, intent)?;
            summary.intents_updated += 1;
        }
        PatchOp::Hide { node_id } => {
            let node = ir.node_mut(node_id).ok_or_else(|| missing("node", node_id))?;
            node.hidden = true;
        }
        PatchOp::Show { node_id } => {
            let node = ir.node_mut(node_id).ok_or_else(|| missing("node", node_id))?;
            node.hidden = false;
        }
        PatchOp::Annotate { node_id, note } => {
            let node = ir.node_mut(node_id).ok_or_else(|| missing("node", node_id))?;
            node.annotations.push(note.clone());
        }
        PatchOp::AddBlock { node } => {
            if ir.has_node(&node.node_id) {
                return Err(Error::validation(vec![format!(
                    "node '{}' already exists",
                    node.node_id
                )]));
            }
            ir.nodes.push(node.clone());
            summary.nodes_added += 1;
        }
        PatchOp::RemoveBlock { node_id } | PatchOp::DeleteNode { node_id } => {
            if !ir.has_node(node_id) {
                return Err(missing("node", node_id));
            }
            let before = ir.edges.len();
            ir.edges
                .retain(|e| e.from_id != *node_id && e.to_id != *node_id);
            summary.edges_removed += before - ir.edges.len();
            ir.nodes.retain(|n| n.node_id != *node_id);
            summary.nodes_removed += 1;
        }
        PatchOp::UpdateNodeLabel { node_id, label } => {
            let node = ir.node_mut(node_id).ok_or_else(|| missing("node", node_id))?;
            node.label = label.clone();
            summary.labels_changed += 1;
        }
        PatchOp::UpdateEdgeLabel { edge_id, label } => {
            let edge = ir.edge_mut(edge_id).ok_or_else(|| missing("edge", edge_id))?;
            edge.label = label.clone();
            summary.labels_changed += 1;
        }
        PatchOp::DeleteEdge { edge_id } => {
            if ir.edge(edge_id).is_none() {
                return Err(missing("edge", edge_id));
            }
            ir.edges.retain(|e| e.edge_id != *edge_id);
            summary.edges_removed += 1;
        }
        PatchOp::MoveZone { node_id, zone } => {
            let node = ir.node_mut(node_id).ok_or_else(|| missing("node", node_id))?;
            node.zone = zone.clone();
        }
        PatchOp::UpdateGlobalIntent { intent } => {
            merge_global_intent(&mut ir.global_intent, intent);
            summary.intents_updated += 1;
        }
        PatchOp::ConvertDiagramType { to } => {
            convert_diagram_type(ir, *to, summary);
        }
    }
    Ok(())
}

fn apply_style(ir: &mut DiagramIr, path: &StylePath, intent: &Value) -> Result<()> {
    match path {
        StylePath::GlobalIntent => {
            let parsed: GlobalIntent = serde_json::from_value(intent.clone())
                .map_err(|e| Error::validation(vec![format!("bad global intent: {}", e)]))?;
            merge_global_intent(&mut ir.global_intent, &parsed);
        }
        StylePath::NodeIntent { role } => {
            ir.node_intent.insert(role.clone(), intent.clone());
        }
        StylePath::EdgeIntent { rel_type } => {
            ir.edge_intent.insert(rel_type.clone(), intent.clone());
        }
    }
    Ok(())
}

fn merge_global_intent(current: &mut GlobalIntent, update: &GlobalIntent) {
    if update.mood.is_some() {
        current.mood = update.mood.clone();
    }
    if update.density.is_some() {
        current.density = update.density.clone();
    }
    if update.palette.is_some() {
        current.palette = update.palette.clone();
    }
}

/// Deterministic type conversion. Downgrading from a temporal type to a
/// structural one rewrites `control` relations to `sync` and drops every
/// temporal ordinal; upgrading to a temporal type numbers edges in their
/// declared order.
fn convert_diagram_type(ir: &mut DiagramIr, to: DiagramType, summary: &mut PatchSummary) {
    let from = ir.diagram_type;
    ir.diagram_type = to;
    if to.is_structural() {
        for edge in &mut ir.edges {
            if edge.rel_type == RelType::Control {
                edge.rel_type = RelType::Sync;
            }
            edge.sequence = None;
        }
    } else if from.is_structural() {
        for (i, edge) in ir.edges.iter_mut().enumerate() {
            edge.sequence = Some(i as u32 + 1);
        }
    }
    summary
        .warnings
        .extend(conversion_warnings(from, to));
}

fn conversion_warnings(from: DiagramType, to: DiagramType) -> Vec<String> {
    if from == to {
        vec!["conversion to the same diagram type".to_string()]
    } else if !from.is_structural() && to.is_structural() {
        vec![format!(
            "temporal ordering lost converting {} to {}",
            from.as_str(),
            to.as_str()
        )]
    } else {
        Vec::new()
    }
}
