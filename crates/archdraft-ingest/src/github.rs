//! Repository fetch
//!
//! URL validation and shallow cloning via the git binary. `file://` URLs are
//! accepted so local mirrors and tests work without the network.

use archdraft_core::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Accepts `https://github.com/{owner}/{repo}` (an optional trailing `.git`
/// or slash is tolerated) and `file://` URLs for local mirrors.
pub fn validate_repo_url(url: &str) -> Result<()> {
    if url.starts_with("file://") {
        return Ok(());
    }
    let rest = url
        .strip_prefix("https://github.com/")
        .ok_or_else(|| Error::IngestFailed(format!("not a github url: {}", url)))?;
    let rest = rest.trim_end_matches('/').trim_end_matches(".git");
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() != 2 {
        return Err(Error::IngestFailed(format!(
            "expected github.com/owner/repo, got {}",
            url
        )));
    }
    if segments
        .iter()
        .any(|s| !s.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)))
    {
        return Err(Error::IngestFailed(format!("suspicious repo path: {}", url)));
    }
    Ok(())
}

/// Shallow clone into `dest`. When `commit` is given it is checked out after
/// the clone; a commit unreachable from the shallow tip fails the job.
/// Returns the commit hash actually checked out.
pub async fn clone_shallow(
    url: &str,
    commit: Option<&str>,
    dest: &Path,
    timeout_ms: u64,
) -> Result<String> {
    validate_repo_url(url)?;
    debug!("cloning {} into {}", url, dest.display());

    run_git(
        &[
            "clone",
            "--depth",
            "1",
            "--quiet",
            url,
            &dest.to_string_lossy(),
        ],
        None,
        timeout_ms,
    )
    .await?;

    if let Some(commit) = commit {
        run_git(&["checkout", "--quiet", commit], Some(dest), timeout_ms).await?;
    }

    let head = run_git(&["rev-parse", "HEAD"], Some(dest), timeout_ms).await?;
    Ok(head.trim().to_string())
}

async fn run_git(args: &[&str], cwd: Option<&Path>, timeout_ms: u64) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        cmd.output().await
    })
    .await
    .map_err(|_| Error::IngestFailed(format!("git {} timed out", args.first().unwrap_or(&""))))?
    .map_err(|e| Error::IngestFailed(format!("git failed to start: {}", e)))?;

    if !output.status.success() {
        return Err(Error::IngestFailed(format!(
            "git {} exited with {}: {}",
            args.first().unwrap_or(&""),
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
