//! Render-diagram tool - the whole IR-to-neutral-SVG pipeline
//!
//! Two inputs exist: a committed IR version (the normal path) or an
//! LLM-authored diagram the planner chose to carry. The second never reaches
//! a renderer unsanitized, and both paths end behind the neutral-SVG gate.
//! Rendered artifacts are cached by `(diagram_id, version, renderer)`.

use crate::deps::ToolDeps;
use crate::registry::{CallContext, McpTool, ToolDescriptor, ToolMode, ToolOutput};
use crate::tools::resolve_diagram_id;
use archdraft_core::{
    AuditArtifacts, AuditMode, DiagramFormat, DiagramId, Error, LlmDiagram, RenderedArtifact,
    Result, StylingAudit,
};
use archdraft_ir::text_hash;
use archdraft_render::{fallback, neutralize, render_subprocess, route, translate, Sanitizer};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub struct RenderDiagramTool {
    deps: Arc<ToolDeps>,
}

impl RenderDiagramTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }

    fn renderer_command(&self, format: DiagramFormat) -> Vec<String> {
        let renderers = &self.deps.config.renderers;
        match format {
            DiagramFormat::Mermaid => renderers.mermaid.clone(),
            DiagramFormat::Structurizr => renderers.structurizr.clone(),
            DiagramFormat::Plantuml => renderers.plantuml.clone(),
        }
    }

    fn sanitize_audit(
        &self,
        ctx: &CallContext,
        diagram_id: &DiagramId,
        original: &str,
        sanitized: Option<&str>,
        warnings: Vec<String>,
        blocked_tokens: Vec<String>,
    ) -> String {
        let audit = StylingAudit {
            audit_id: uuid::Uuid::new_v4().to_string(),
            plan_id: Some(ctx.plan_id.clone()),
            diagram_id: diagram_id.clone(),
            mode: AuditMode::PreRender,
            user_prompt: String::new(),
            extracted_intent: "render llm-authored diagram".to_string(),
            styling_plan: Value::Null,
            execution_steps: vec!["sanitize".to_string()],
            agent_reasoning: String::new(),
            llm_diagram: Some(original.to_string()),
            sanitized_diagram: sanitized.map(String::from),
            validation_warnings: warnings,
            blocked_tokens,
            artifacts: AuditArtifacts::PreRender {
                renderer_input_before: original.to_string(),
                renderer_input_after: sanitized.unwrap_or_default().to_string(),
            },
            created_at: Utc::now(),
        };
        self.deps.stores.audits.append(audit)
    }

    fn neutral_audit(
        &self,
        ctx: &CallContext,
        diagram_id: &DiagramId,
        svg_before: &str,
        svg_after: &str,
        stripped: Vec<String>,
    ) -> String {
        let audit = StylingAudit {
            audit_id: uuid::Uuid::new_v4().to_string(),
            plan_id: Some(ctx.plan_id.clone()),
            diagram_id: diagram_id.clone(),
            mode: AuditMode::PostSvg,
            user_prompt: String::new(),
            extracted_intent: "strip theme styling from rendered svg".to_string(),
            styling_plan: Value::Null,
            execution_steps: vec!["neutralize".to_string()],
            agent_reasoning: String::new(),
            llm_diagram: None,
            sanitized_diagram: None,
            validation_warnings: Vec::new(),
            blocked_tokens: stripped,
            artifacts: AuditArtifacts::PostSvg {
                svg_before: svg_before.to_string(),
                svg_after: svg_after.to_string(),
            },
            created_at: Utc::now(),
        };
        self.deps.stores.audits.append(audit)
    }

    /// Render an LLM-authored diagram after sanitization.
    async fn render_llm_diagram(
        &self,
        llm: &LlmDiagram,
        args: &Value,
        ctx: &CallContext,
    ) -> Result<ToolOutput> {
        let diagram_id =
            resolve_diagram_id(&self.deps, args, ctx).unwrap_or_else(DiagramId::generate);
        let sanitizer = Sanitizer::new(self.deps.config.sanitizer_block_threshold);

        let outcome = match sanitizer.sanitize(&llm.diagram, llm.format) {
            Ok(outcome) => outcome,
            Err(error) => {
                // rejected outright: audit the original, render nothing
                let blocked = match &error {
                    Error::UnsafeInput { blocked_tokens } => blocked_tokens.clone(),
                    _ => Vec::new(),
                };
                let audit_id = self.sanitize_audit(
                    ctx,
                    &diagram_id,
                    &llm.diagram,
                    None,
                    vec!["input rejected before rendering".to_string()],
                    blocked,
                );
                return Ok(ToolOutput::failed(error).with_audit(audit_id));
            }
        };

        let mut audit_id = None;
        if !outcome.blocked_tokens.is_empty() {
            audit_id = Some(self.sanitize_audit(
                ctx,
                &diagram_id,
                &llm.diagram,
                Some(&outcome.sanitized_text),
                outcome.warnings.clone(),
                outcome.blocked_tokens.clone(),
            ));
        }

        let renderer = match ctx.rendering_service.as_deref() {
            Some("mermaid") => DiagramFormat::Mermaid,
            Some("structurizr") => DiagramFormat::Structurizr,
            Some("plantuml") => DiagramFormat::Plantuml,
            _ => llm.format,
        };
        let rendered = render_subprocess(
            &self.renderer_command(renderer),
            &outcome.sanitized_text,
            self.deps.config.renderers.timeout_ms,
        )
        .await?;

        let neutral = neutralize(&rendered.svg)?;
        if neutral.was_modified {
            let id = self.neutral_audit(
                ctx,
                &diagram_id,
                &rendered.svg,
                &neutral.svg,
                neutral.stripped.clone(),
            );
            audit_id.get_or_insert(id);
        }

        let artifact = RenderedArtifact {
            artifact_id: uuid::Uuid::new_v4().to_string(),
            diagram_id: diagram_id.clone(),
            version: 0,
            renderer: renderer.as_str().to_string(),
            svg: neutral.svg,
            structure_hash: text_hash(&outcome.sanitized_text),
            created_at: Utc::now(),
        };
        let image_id = self.deps.stores.artifacts.insert(artifact);

        let output = ToolOutput::payload(json!({
            "image_id": image_id,
            "diagram_id": diagram_id,
            "ir_version": 0,
            "renderer": renderer.as_str(),
            "justification": "planner-supplied diagram text",
            "command": rendered.command,
            "cached": false,
        }))
        .with_warnings(outcome.warnings);
        Ok(match audit_id {
            Some(id) => output.with_audit(id),
            None => output,
        })
    }
}

#[async_trait::async_trait]
impl McpTool for RenderDiagramTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_id: "render_diagram".to_string(),
            description: "Translate a committed IR version (or a sanitized LLM diagram) \
                          into dialect text, render it to SVG, and pass the neutral gate."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "diagram_id": { "type": "string" },
                    "version": { "type": "integer", "minimum": 1 }
                }
            }),
            output_schema: json!({
                "type": "object",
                "required": ["image_id", "diagram_id", "renderer"],
                "properties": {
                    "image_id": { "type": "string" },
                    "diagram_id": { "type": "string" },
                    "ir_version": { "type": "integer" },
                    "renderer": { "type": "string" },
                    "justification": { "type": "string" },
                    "command": { "type": "string" },
                    "cached": { "type": "boolean" }
                }
            }),
            mode: ToolMode::Render,
        }
    }

    async fn execute(&self, args: Value, ctx: &CallContext) -> Result<ToolOutput> {
        if let Some(llm) = ctx.llm_diagram.clone() {
            return self.render_llm_diagram(&llm, &args, ctx).await;
        }

        let diagram_id = resolve_diagram_id(&self.deps, &args, ctx)
            .ok_or_else(|| Error::not_found("no diagram for this session"))?;
        let ir = match args["version"].as_u64() {
            Some(version) => self.deps.ir.get(&diagram_id, version)?,
            None => self.deps.ir.latest(&diagram_id)?,
        };

        let decision = route(ir.diagram_type, ctx.rendering_service.as_deref())?;

        // the routed renderer may not express this diagram; plantuml is the
        // uml/fallback row of the routing table
        let (renderer, justification, dialect_text) = match translate(&ir, decision.renderer) {
            Ok(text) => (decision.renderer, decision.justification, text),
            Err(Error::UnsupportedFeature(reason)) => {
                let fb = fallback();
                let text = translate(&ir, fb.renderer)?;
                info!(diagram = %diagram_id, %reason, "routed renderer unsupported, falling back");
                (
                    fb.renderer,
                    format!("{} ({})", fb.justification, reason),
                    text,
                )
            }
            Err(e) => return Err(e),
        };

        if let Some(cached) = self
            .deps
            .stores
            .artifacts
            .cached(&diagram_id, ir.version, renderer.as_str())
        {
            return Ok(ToolOutput::payload(json!({
                "image_id": cached.artifact_id,
                "diagram_id": diagram_id,
                "ir_version": ir.version,
                "renderer": renderer.as_str(),
                "justification": justification,
                "cached": true,
            })));
        }
        let rendered = render_subprocess(
            &self.renderer_command(renderer),
            &dialect_text,
            self.deps.config.renderers.timeout_ms,
        )
        .await?;

        let neutral = neutralize(&rendered.svg)?;
        let mut audit_id = None;
        if neutral.was_modified {
            audit_id = Some(self.neutral_audit(
                ctx,
                &diagram_id,
                &rendered.svg,
                &neutral.svg,
                neutral.stripped.clone(),
            ));
        }

        let artifact = RenderedArtifact {
            artifact_id: uuid::Uuid::new_v4().to_string(),
            diagram_id: diagram_id.clone(),
            version: ir.version,
            renderer: renderer.as_str().to_string(),
            svg: neutral.svg,
            structure_hash: ir.structure_hash(),
            created_at: Utc::now(),
        };
        let image_id = self.deps.stores.artifacts.insert(artifact);
        info!(diagram = %diagram_id, version = ir.version, renderer = renderer.as_str(), "rendered");

        let output = ToolOutput::payload(json!({
            "image_id": image_id,
            "diagram_id": diagram_id,
            "ir_version": ir.version,
            "renderer": renderer.as_str(),
            "justification": justification,
            "command": rendered.command,
            "cached": false,
        }));
        Ok(match audit_id {
            Some(id) => output.with_audit(id),
            None => output,
        })
    }
}
