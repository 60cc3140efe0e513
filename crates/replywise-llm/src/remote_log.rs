//! Best-effort remote failure log.
//!
//! Failures are pushed to an append-only side channel. Nothing here is ever
//! surfaced to the user: [`spawn_append`] detaches the write and drops any
//! error after a debug line.
//!
//! [`GithubLog`] writes one file per message into a GitHub repository via the
//! contents API:
//!
//! ```text
//! PUT https://api.github.com/repos/{owner}/{repo}/contents/logs/log-{millis}.txt
//! {"message": "Add log logs/log-{millis}.txt", "content": "<base64>"}
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::{LlmError, Result};
use crate::store::ConfigStore;
use crate::transport::{HttpRequest, HttpTransport};

/// Default GitHub REST API root.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// An append-only sink for failure text.
#[async_trait]
pub trait FailureLog: Send + Sync {
    /// Append one message.
    async fn append(&self, message: &str) -> Result<()>;
}

/// Append `message` on a detached task, ignoring the outcome.
pub fn spawn_append(log: Arc<dyn FailureLog>, message: String) {
    tokio::spawn(async move {
        if let Err(e) = log.append(&message).await {
            debug!(error = %e, "remote failure log append failed");
        }
    });
}

/// Encode log text for the wire: base64 of its UTF-8 bytes.
pub fn encode_log_content(message: &str) -> String {
    STANDARD.encode(message.as_bytes())
}

/// Inverse of [`encode_log_content`].
pub fn decode_log_content(encoded: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| LlmError::UnexpectedResponse(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| LlmError::UnexpectedResponse(format!("invalid utf-8: {e}")))
}

/// Writes failure logs into a GitHub repository.
///
/// Credentials are read from the live [`ConfigStore`] on every append, so a
/// settings change takes effect immediately. When token, owner or repo is
/// unset every append is a silent no-op.
pub struct GithubLog {
    transport: Arc<dyn HttpTransport>,
    store: ConfigStore,
    api_base: String,
}

impl GithubLog {
    pub fn new(transport: Arc<dyn HttpTransport>, store: ConfigStore) -> Self {
        Self {
            transport,
            store,
            api_base: GITHUB_API_BASE.to_string(),
        }
    }

    /// Point at a different API root (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Upload `message`. Returns the repository path written, or `None` when
    /// the log is not configured.
    pub async fn upload(&self, message: &str) -> Result<Option<String>> {
        let Some(remote) = self.store.snapshot().remote_log.filter(|r| r.is_configured()) else {
            return Ok(None);
        };

        let path = format!("logs/log-{}.txt", chrono::Utc::now().timestamp_millis());
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            remote.github_owner.trim(),
            remote.github_repo.trim(),
            path
        );
        let body = serde_json::json!({
            "message": format!("Add log {path}"),
            "content": encode_log_content(message),
        });

        let mut request = HttpRequest::post_json(url, &body);
        request.method = reqwest::Method::PUT;
        request.headers.push((
            "Authorization".into(),
            format!("Bearer {}", remote.github_token.expose()),
        ));
        // GitHub rejects requests without a user agent.
        request
            .headers
            .push(("User-Agent".into(), concat!("replywise/", env!("CARGO_PKG_VERSION")).into()));

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(LlmError::HttpStatus {
                status: response.status,
            });
        }
        debug!(path = %path, "failure log uploaded");
        Ok(Some(path))
    }
}

#[async_trait]
impl FailureLog for GithubLog {
    async fn append(&self, message: &str) -> Result<()> {
        self.upload(message).await.map(|_| ())
    }
}
