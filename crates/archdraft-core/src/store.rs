//! In-memory append-only stores
//!
//! The persistence engine proper is an external collaborator; these stores
//! implement its contract in-process: immutable identifiers, append-only
//! writes, no deletion. Records are superseded, never mutated in place,
//! except for the narrow state transitions each store exposes.

use crate::error::{Error, Result};
use crate::types::{
    ChatMessage, DiagramId, ExecutionRecord, IngestionJob, JobStatus, PlanRecord, PlanStatus,
    RenderedArtifact, SessionId, SessionRecord, StylingAudit,
};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

#[derive(Default)]
pub struct PlanStore {
    plans: DashMap<String, PlanRecord>,
    executions: DashMap<String, Vec<ExecutionRecord>>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a plan. Insertion happens before any execution starts.
    pub fn insert(&self, plan: PlanRecord) {
        self.executions.entry(plan.plan_id.clone()).or_default();
        self.plans.insert(plan.plan_id.clone(), plan);
    }

    pub fn get(&self, plan_id: &str) -> Option<PlanRecord> {
        self.plans.get(plan_id).map(|p| p.clone())
    }

    pub fn set_status(&self, plan_id: &str, status: PlanStatus) {
        if let Some(mut plan) = self.plans.get_mut(plan_id) {
            plan.status = status;
            plan.executed = matches!(
                status,
                PlanStatus::Executed | PlanStatus::PartiallyExecuted
            );
        }
    }

    pub fn record_execution(&self, record: ExecutionRecord) {
        self.executions
            .entry(record.plan_id.clone())
            .or_default()
            .push(record);
    }

    pub fn executions(&self, plan_id: &str) -> Vec<ExecutionRecord> {
        self.executions
            .get(plan_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn list(&self) -> Vec<String> {
        self.plans.iter().map(|p| p.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[derive(Default)]
pub struct AuditStore {
    audits: DashMap<String, StylingAudit>,
    by_diagram: DashMap<DiagramId, Vec<String>>,
}

impl AuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, audit: StylingAudit) -> String {
        let audit_id = audit.audit_id.clone();
        self.by_diagram
            .entry(audit.diagram_id.clone())
            .or_default()
            .push(audit_id.clone());
        self.audits.insert(audit_id.clone(), audit);
        audit_id
    }

    pub fn get(&self, audit_id: &str) -> Option<StylingAudit> {
        self.audits.get(audit_id).map(|a| a.clone())
    }

    /// Audits for a diagram in commit order.
    pub fn for_diagram(&self, diagram_id: &DiagramId) -> Vec<StylingAudit> {
        self.by_diagram
            .get(diagram_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<StylingAudit> {
        self.audits.iter().map(|a| a.clone()).collect()
    }
}

#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<String, IngestionJob>,
    /// Cache key `(repo_url, commit_hash)` -> job_id of a completed job.
    cache: DashMap<(String, String), String>,
}

fn cache_key(repo_url: &str, commit_hash: Option<&str>) -> (String, String) {
    (repo_url.to_string(), commit_hash.unwrap_or("").to_string())
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: IngestionJob) {
        self.jobs.insert(job.job_id.clone(), job);
    }

    pub fn get(&self, job_id: &str) -> Option<IngestionJob> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    /// Atomic state transition. Terminal states are immutable; a second
    /// transition attempt on a terminal job is rejected.
    pub fn transition(
        &self,
        job_id: &str,
        status: JobStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<()> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::not_found(format!("job {}", job_id)))?;
        if job.status.is_terminal() {
            return Err(Error::internal(format!(
                "job {} is terminal ({:?})",
                job_id, job.status
            )));
        }
        job.status = status;
        job.updated_at = Utc::now();
        if result.is_some() {
            job.result = result;
        }
        if error.is_some() {
            job.error = error;
        }
        if status == JobStatus::Complete {
            let key = cache_key(&job.repo_url, job.commit_hash.as_deref());
            self.cache.insert(key, job.job_id.clone());
        }
        Ok(())
    }

    /// Completed job for this `(url, commit)`, if one exists.
    pub fn cached(&self, repo_url: &str, commit_hash: Option<&str>) -> Option<IngestionJob> {
        let key = cache_key(repo_url, commit_hash);
        self.cache.get(&key).and_then(|id| self.get(&id))
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, SessionRecord>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> SessionRecord {
        let record = SessionRecord::new(SessionId::generate());
        self.sessions.insert(record.session_id.clone(), record.clone());
        record
    }

    pub fn get_or_create(&self, session_id: &SessionId) -> SessionRecord {
        self.sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionRecord::new(session_id.clone()))
            .clone()
    }

    pub fn get(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn append_message(&self, session_id: &SessionId, message: ChatMessage) {
        self.sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionRecord::new(session_id.clone()))
            .messages
            .push(message);
    }

    pub fn set_active_diagram(&self, session_id: &SessionId, diagram_id: DiagramId) {
        self.sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionRecord::new(session_id.clone()))
            .active_diagram = Some(diagram_id);
    }

    pub fn list(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[derive(Default)]
pub struct ArtifactStore {
    artifacts: DashMap<String, RenderedArtifact>,
    /// Render cache: `(diagram_id, version, renderer)` -> artifact_id.
    by_render_key: DashMap<(DiagramId, u64, String), String>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, artifact: RenderedArtifact) -> String {
        let id = artifact.artifact_id.clone();
        self.by_render_key.insert(
            (
                artifact.diagram_id.clone(),
                artifact.version,
                artifact.renderer.clone(),
            ),
            id.clone(),
        );
        self.artifacts.insert(id.clone(), artifact);
        id
    }

    pub fn get(&self, artifact_id: &str) -> Option<RenderedArtifact> {
        self.artifacts.get(artifact_id).map(|a| a.clone())
    }

    pub fn cached(
        &self,
        diagram_id: &DiagramId,
        version: u64,
        renderer: &str,
    ) -> Option<RenderedArtifact> {
        self.by_render_key
            .get(&(diagram_id.clone(), version, renderer.to_string()))
            .and_then(|id| self.get(&id))
    }
}

/// Everything the gateway wires together. Stores are created at startup and
/// shared behind `Arc`s; the MCP registry and tools receive clones.
#[derive(Clone, Default)]
pub struct Stores {
    pub plans: Arc<PlanStore>,
    pub audits: Arc<AuditStore>,
    pub jobs: Arc<JobStore>,
    pub sessions: Arc<SessionStore>,
    pub artifacts: Arc<ArtifactStore>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }
}
