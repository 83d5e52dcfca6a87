//! Ingest-repo tool - hand a repository to the background queue

use crate::deps::ToolDeps;
use crate::registry::{CallContext, McpTool, ToolDescriptor, ToolMode, ToolOutput};
use archdraft_core::Result;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct IngestRepoTool {
    deps: Arc<ToolDeps>,
}

impl IngestRepoTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait::async_trait]
impl McpTool for IngestRepoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_id: "ingest_repo".to_string(),
            description: "Queue background ingestion of a repository; a cached result for \
                          the same (url, commit) returns immediately."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["repo_url"],
                "properties": {
                    "repo_url": { "type": "string", "minLength": 1 },
                    "commit_hash": { "type": "string" }
                }
            }),
            output_schema: json!({
                "type": "object",
                "required": ["job_id", "status"],
                "properties": {
                    "job_id": { "type": "string" },
                    "status": { "type": "string" },
                    "cached": { "type": "boolean" },
                    "result": {}
                }
            }),
            mode: ToolMode::Ingest,
        }
    }

    async fn execute(&self, args: Value, _ctx: &CallContext) -> Result<ToolOutput> {
        let repo_url = args["repo_url"].as_str().unwrap_or_default();
        let commit_hash = args["commit_hash"].as_str().map(String::from);

        let job = self.deps.ingest.submit(repo_url, commit_hash).await?;
        let cached = job.status == archdraft_core::JobStatus::Complete;

        let mut payload = json!({
            "job_id": job.job_id,
            "status": job.status,
            "cached": cached,
        });
        if cached {
            if let (Some(obj), Some(result)) = (payload.as_object_mut(), job.result) {
                obj.insert("result".to_string(), result);
            }
        }
        Ok(ToolOutput::payload(payload))
    }
}
