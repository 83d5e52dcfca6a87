//! JSON Schemas binding the two LLM call sites
//!
//! A planner or styling response that does not validate against these never
//! reaches the rest of the runtime.

use serde_json::{json, Value};

pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "required": ["intent", "steps"],
        "additionalProperties": false,
        "properties": {
            "intent": { "type": "string", "minLength": 1 },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["tool_id"],
                    "additionalProperties": false,
                    "properties": {
                        "tool_id": { "type": "string", "minLength": 1 },
                        "arguments": { "type": "object" },
                        "rendering_service": {
                            "type": "string",
                            "enum": ["mermaid", "structurizr", "plantuml"]
                        },
                        "llm_diagram": {
                            "type": "object",
                            "required": ["format", "diagram", "schema_version"],
                            "additionalProperties": false,
                            "properties": {
                                "format": {
                                    "type": "string",
                                    "enum": ["plantuml", "mermaid", "structurizr"]
                                },
                                "diagram": { "type": "string" },
                                "schema_version": { "type": "string" }
                            }
                        },
                        "depends_on": {
                            "type": "array",
                            "items": { "type": "integer", "minimum": 0 }
                        }
                    }
                }
            }
        }
    })
}

pub fn styling_schema() -> Value {
    json!({
        "type": "object",
        "required": ["mode", "intent", "reasoning"],
        "additionalProperties": false,
        "properties": {
            "mode": {
                "type": "string",
                "enum": ["patch_ops", "updated_ir", "error"]
            },
            "intent": { "type": "string" },
            "reasoning": { "type": "string" },
            "patch_ops": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["op"],
                    "properties": { "op": { "type": "string" } }
                }
            },
            "ir": { "type": "object" },
            "explanation": { "type": "string" }
        }
    })
}
