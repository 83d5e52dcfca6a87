//! Renderer router
//!
//! Deterministic selection per diagram intent, with the planner's
//! `rendering_service` override taking precedence. Both the choice and the
//! one-line justification land in the execution record.

use archdraft_core::{DiagramFormat, Error, Result};
use archdraft_ir::DiagramType;

#[derive(Clone, Debug, PartialEq)]
pub struct RouteDecision {
    pub renderer: DiagramFormat,
    pub justification: String,
}

pub fn route(diagram_type: DiagramType, override_service: Option<&str>) -> Result<RouteDecision> {
    if let Some(service) = override_service {
        let renderer = match service {
            "mermaid" => DiagramFormat::Mermaid,
            "structurizr" => DiagramFormat::Structurizr,
            "plantuml" => DiagramFormat::Plantuml,
            other => {
                return Err(Error::UnsupportedFeature(format!(
                    "unknown rendering service '{}'",
                    other
                )));
            }
        };
        return Ok(RouteDecision {
            renderer,
            justification: format!("planner override: rendering_service={}", service),
        });
    }

    let decision = match diagram_type {
        DiagramType::Sequence | DiagramType::Flow | DiagramType::Story => RouteDecision {
            renderer: DiagramFormat::Mermaid,
            justification: format!("{} diagrams route to mermaid", diagram_type.as_str()),
        },
        DiagramType::Context | DiagramType::Container | DiagramType::Component => RouteDecision {
            renderer: DiagramFormat::Structurizr,
            justification: format!("{} diagrams route to structurizr", diagram_type.as_str()),
        },
    };
    Ok(decision)
}

/// The fallback renderer for anything the primary cannot express.
pub fn fallback() -> RouteDecision {
    RouteDecision {
        renderer: DiagramFormat::Plantuml,
        justification: "plantuml is the uml/fallback renderer".to_string(),
    }
}
