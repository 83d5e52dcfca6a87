//! Unified response envelope
//!
//! Every assistant-facing output uses this exact shape; the chat surface
//! never receives an ad-hoc body or an HTTP error for an expected failure.

use crate::types::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Diagram,
    Analysis,
    Text,
    Mixed,
    Animation,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    Diagram,
    Analysis,
    Animation,
    Action,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub block_type: BlockType,
    pub payload: Value,
}

impl Block {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            block_type: BlockType::Text,
            payload: json!({ "text": content.into() }),
        }
    }

    /// Diagram blocks reference an artifact by `image_id`; the SVG itself is
    /// fetched separately to keep envelopes small.
    pub fn diagram(image_id: impl Into<String>, diagram_id: impl Into<String>, version: u64) -> Self {
        Self {
            block_type: BlockType::Diagram,
            payload: json!({
                "image_id": image_id.into(),
                "diagram_id": diagram_id.into(),
                "ir_version": version,
            }),
        }
    }

    pub fn analysis(score: f64, findings: Value) -> Self {
        Self {
            block_type: BlockType::Analysis,
            payload: json!({ "score": score, "findings": findings }),
        }
    }

    /// Action blocks invite the client to retry or redirect, e.g. after a
    /// renderer failure.
    pub fn action(action: impl Into<String>, detail: Value) -> Self {
        Self {
            block_type: BlockType::Action,
            payload: json!({ "action": action.into(), "detail": detail }),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EnvelopeState {
    pub ir_version: Option<u64>,
    pub has_diagram: bool,
    pub analysis_score: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub response_type: ResponseType,
    pub blocks: Vec<Block>,
    pub state: EnvelopeState,
    pub confidence: f64,
    pub session_id: SessionId,
}

impl ResponseEnvelope {
    /// Derive `response_type` from the block mix: one dominant block type
    /// maps directly, anything heterogeneous is `mixed`.
    pub fn from_blocks(session_id: SessionId, blocks: Vec<Block>, state: EnvelopeState, confidence: f64) -> Self {
        let response_type = classify(&blocks);
        Self {
            response_type,
            blocks,
            state,
            confidence,
            session_id,
        }
    }

    pub fn text_only(session_id: SessionId, content: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            blocks: vec![Block::text(content)],
            state: EnvelopeState::default(),
            confidence: 1.0,
            session_id,
        }
    }
}

fn classify(blocks: &[Block]) -> ResponseType {
    let mut has_diagram = false;
    let mut has_analysis = false;
    let mut has_animation = false;
    let mut has_other = false;
    for block in blocks {
        match block.block_type {
            BlockType::Diagram => has_diagram = true,
            BlockType::Analysis => has_analysis = true,
            BlockType::Animation => has_animation = true,
            BlockType::Text | BlockType::Action => has_other = true,
        }
    }
    let rich = [has_diagram, has_analysis, has_animation]
        .iter()
        .filter(|&&b| b)
        .count();
    match (rich, has_other) {
        (0, _) => ResponseType::Text,
        (1, false) if has_diagram => ResponseType::Diagram,
        (1, false) if has_analysis => ResponseType::Analysis,
        (1, false) => ResponseType::Animation,
        _ => ResponseType::Mixed,
    }
}
