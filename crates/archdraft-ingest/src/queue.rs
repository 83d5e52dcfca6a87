//! Ingestion job queue
//!
//! A fixed worker pool consuming one mpsc queue. Submission is cheap and
//! synchronous: cache hit returns the completed job immediately, otherwise a
//! queued job record is persisted and its id goes on the queue. Workers own
//! the whole clone-extract-emit pipeline and drive the job state machine
//! `queued -> processing -> complete|failed`.

use crate::extract::{extract_structure, structure_to_ir};
use crate::github;
use archdraft_core::store::JobStore;
use archdraft_core::{Error, IngestConfig, IngestionJob, JobStatus, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

pub struct IngestQueue {
    jobs: Arc<JobStore>,
    tx: mpsc::Sender<String>,
}

impl IngestQueue {
    /// Create the queue and start its worker pool.
    pub fn start(jobs: Arc<JobStore>, config: IngestConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<String>(256);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..config.workers.max(1) {
            let rx = rx.clone();
            let jobs = jobs.clone();
            let config = config.clone();
            tokio::spawn(async move {
                loop {
                    let job_id = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job_id) = job_id else {
                        break;
                    };
                    run_job(&jobs, &job_id, &config, worker_id).await;
                }
            });
        }

        Arc::new(Self { jobs, tx })
    }

    /// Enqueue an ingestion, or return the cached completed job for this
    /// `(url, commit)` without re-cloning.
    pub async fn submit(
        &self,
        repo_url: &str,
        commit_hash: Option<String>,
    ) -> Result<IngestionJob> {
        github::validate_repo_url(repo_url)?;

        if let Some(cached) = self.jobs.cached(repo_url, commit_hash.as_deref()) {
            info!(job = %cached.job_id, url = repo_url, "ingestion cache hit");
            return Ok(cached);
        }

        let job = IngestionJob::queued(repo_url, commit_hash);
        self.jobs.insert(job.clone());
        self.tx
            .send(job.job_id.clone())
            .await
            .map_err(|_| Error::IngestFailed("ingestion queue is closed".to_string()))?;
        Ok(job)
    }

    pub fn status(&self, job_id: &str) -> Result<IngestionJob> {
        self.jobs
            .get(job_id)
            .ok_or_else(|| Error::not_found(format!("job {}", job_id)))
    }
}

async fn run_job(jobs: &JobStore, job_id: &str, config: &IngestConfig, worker_id: usize) {
    let Some(job) = jobs.get(job_id) else {
        warn!(job = job_id, "queued job vanished before processing");
        return;
    };
    if jobs
        .transition(job_id, JobStatus::Processing, None, None)
        .is_err()
    {
        return;
    }
    info!(worker = worker_id, job = job_id, url = %job.repo_url, "ingestion started");

    let outcome = tokio::time::timeout(
        Duration::from_millis(config.job_timeout_ms),
        process(&job, config),
    )
    .await;

    match outcome {
        Ok(Ok(result)) => {
            if let Err(e) = jobs.transition(job_id, JobStatus::Complete, Some(result), None) {
                error!(job = job_id, "failed to record completion: {}", e);
            }
        }
        Ok(Err(e)) => {
            let _ = jobs.transition(job_id, JobStatus::Failed, None, Some(e.to_string()));
        }
        Err(_) => {
            let _ = jobs.transition(
                job_id,
                JobStatus::Failed,
                None,
                Some(format!("job overran {}ms deadline", config.job_timeout_ms)),
            );
        }
    }
}

async fn process(job: &IngestionJob, config: &IngestConfig) -> Result<serde_json::Value> {
    let workdir = scratch_dir(&job.job_id);
    let result = process_in(job, config, &workdir).await;
    let _ = std::fs::remove_dir_all(&workdir);
    result
}

async fn process_in(
    job: &IngestionJob,
    config: &IngestConfig,
    workdir: &PathBuf,
) -> Result<serde_json::Value> {
    let commit = github::clone_shallow(
        &job.repo_url,
        job.commit_hash.as_deref(),
        workdir,
        config.clone_timeout_ms,
    )
    .await?;

    let repo_name = repo_name_of(&job.repo_url);
    // extraction is blocking filesystem work; keep it off the async threads
    let root = workdir.clone();
    let structure = tokio::task::spawn_blocking(move || extract_structure(&root, &repo_name))
        .await
        .map_err(|e| Error::internal(format!("extraction task panicked: {}", e)))??;

    let ir = structure_to_ir(&structure);
    archdraft_ir::validate_strict(&ir)?;

    let mut result = structure.to_result_json(&ir);
    if let Some(obj) = result.as_object_mut() {
        obj.insert("commit".to_string(), serde_json::json!(commit));
    }
    Ok(result)
}

fn scratch_dir(job_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("archdraft-ingest-{}", job_id))
}

fn repo_name_of(url: &str) -> String {
    url.trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .unwrap_or("repo")
        .to_string()
}
