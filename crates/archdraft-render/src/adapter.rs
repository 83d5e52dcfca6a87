//! Renderer subprocess adapter
//!
//! Uniform invocation of the containerized renderers: dialect text on
//! stdin, SVG expected on stdout, stderr captured, deadline enforced. The
//! command line that ran is part of the outcome so execution records can
//! carry it.

use archdraft_core::{Error, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct RenderOutcome {
    pub svg: String,
    pub command: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Run one renderer process to completion. Non-zero exit or a missing SVG
/// on stdout is RENDER_FAILED; overrunning the deadline kills the process.
pub async fn render_subprocess(
    command: &[String],
    dialect_text: &str,
    timeout_ms: u64,
) -> Result<RenderOutcome> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::RenderFailed("empty renderer command".to_string()))?;
    let command_line = command.join(" ");
    debug!("renderer: {}", command_line);

    let started = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::RenderFailed(format!("failed to spawn '{}': {}", program, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(dialect_text.as_bytes())
            .await
            .map_err(|e| Error::RenderFailed(format!("stdin write failed: {}", e)))?;
        // close stdin so the renderer sees EOF
        drop(stdin);
    }

    let waited = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        child.wait_with_output(),
    )
    .await;

    let output = match waited {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(Error::RenderFailed(format!("wait failed: {}", e))),
        Err(_) => {
            return Err(Error::RenderFailed(format!(
                "renderer timed out after {}ms",
                timeout_ms
            )));
        }
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(Error::RenderFailed(format!(
            "renderer exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }
    if !stdout.contains("<svg") {
        return Err(Error::RenderFailed(
            "renderer produced no SVG on stdout".to_string(),
        ));
    }

    Ok(RenderOutcome {
        svg: stdout,
        command: command_line,
        stderr,
        duration_ms,
    })
}
