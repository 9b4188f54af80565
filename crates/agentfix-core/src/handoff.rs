//! JSON hand-off files passed between run stages.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::error::{AgentFixError, AgentFixResult};

/// Default output of `sentry fetch`.
pub const DEFAULT_ISSUES_FILE: &str = "/tmp/sentry-issues.json";

/// Default output of `sentry sync`.
pub const DEFAULT_TO_FIX_FILE: &str = "/tmp/sentry-to-fix.json";

/// Default output of `sentry contexts`.
pub const DEFAULT_CONTEXTS_FILE: &str = "/tmp/sentry-fix-contexts.json";

/// Read and deserialize a hand-off file.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> AgentFixResult<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| handoff_error(path, e))?;
    serde_json::from_str(&raw).map_err(|e| handoff_error(path, e))
}

/// Write `value` as pretty-printed JSON with a trailing newline.
///
/// Missing parent directories are created.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AgentFixResult<()> {
    let mut body = serde_json::to_string_pretty(value).map_err(|e| handoff_error(path, e))?;
    body.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| handoff_error(path, e))?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| handoff_error(path, e))?;

    debug!(path = %path.display(), "Wrote hand-off file");
    Ok(())
}

fn handoff_error(path: &Path, error: impl std::fmt::Display) -> AgentFixError {
    AgentFixError::Handoff {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
