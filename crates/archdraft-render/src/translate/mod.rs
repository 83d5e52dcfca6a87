//! IR-to-dialect translators
//!
//! Three deterministic compilers. The same IR always yields byte-identical
//! text: nodes are emitted in canonical order (zones by declared
//! `zone_order`, node ids lexicographic within a zone), edges in declared
//! order, and nothing aesthetic is ever emitted - palette and mood stay in
//! the intent maps.

mod mermaid;
mod plantuml;
mod structurizr;

use archdraft_core::{DiagramFormat, Result};
use archdraft_ir::DiagramIr;

/// Table-driven dispatch over the supported dialects.
pub fn translate(ir: &DiagramIr, format: DiagramFormat) -> Result<String> {
    match format {
        DiagramFormat::Mermaid => mermaid::emit(ir),
        DiagramFormat::Plantuml => plantuml::emit(ir),
        DiagramFormat::Structurizr => structurizr::emit(ir),
    }
}

/// Visible nodes in canonical order, with edges filtered to visible
/// endpoints. Shared by all three emitters.
pub(crate) fn visible<'a>(
    ir: &'a DiagramIr,
) -> (Vec<&'a archdraft_ir::Node>, Vec<&'a archdraft_ir::Edge>) {
    let nodes: Vec<&archdraft_ir::Node> = ir
        .canonical_node_order()
        .into_iter()
        .filter(|n| !n.hidden)
        .collect();
    let edges = ir
        .edges
        .iter()
        .filter(|e| {
            nodes.iter().any(|n| n.node_id == e.from_id)
                && nodes.iter().any(|n| n.node_id == e.to_id)
        })
        .collect();
    (nodes, edges)
}

/// Edges in temporal order for sequence-family diagrams: by `sequence`
/// ordinal, declared position as the tiebreak.
pub(crate) fn temporal_order<'a>(
    edges: &[&'a archdraft_ir::Edge],
) -> Vec<&'a archdraft_ir::Edge> {
    let mut ordered: Vec<(usize, &archdraft_ir::Edge)> =
        edges.iter().copied().enumerate().collect();
    ordered.sort_by_key(|(i, e)| (e.sequence.unwrap_or(u32::MAX), *i));
    ordered.into_iter().map(|(_, e)| e).collect()
}
