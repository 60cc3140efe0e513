//! Fixed-schedule retry for a single HTTP call.
//!
//! [`fetch_with_retry`] sends a request through any [`HttpTransport`] up to
//! [`RetryPolicy::max_attempts`] times. Both transport errors and non-2xx
//! responses are retried; the wait before retry `i` is `delays[i]`, with no
//! jitter and no exponential growth.
//!
//! Every non-success response is reported to the optional [`FailureLog`] as
//! `"HTTP <status>: <body text>"`, fire-and-forget. The body is read on a
//! detached task bounded by [`ERROR_BODY_READ_TIMEOUT`], so a failed response
//! whose body never completes cannot hold up the next attempt.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{LlmError, Result};
use crate::remote_log::FailureLog;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// How long a failed response's body may take to arrive for the failure log.
pub const ERROR_BODY_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempt budget and delay schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    /// 3 attempts on the 500/1000/2000 ms schedule.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: [500, 1000, 2000].map(Duration::from_millis).to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Build a policy.
    ///
    /// Returns `None` if `max_attempts` is zero or `delays` has fewer than
    /// `max_attempts - 1` entries.
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Option<Self> {
        if max_attempts == 0 || delays.len() < (max_attempts - 1) as usize {
            return None;
        }
        Some(Self {
            max_attempts,
            delays,
        })
    }

    /// Convenience for millisecond literals.
    pub fn from_millis(max_attempts: u32, delays_ms: &[u64]) -> Option<Self> {
        Self::new(
            max_attempts,
            delays_ms.iter().copied().map(Duration::from_millis).collect(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before retry number `attempt + 1` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delays
            .get(attempt as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Send `request`, retrying failures according to `policy`.
///
/// Returns the first 2xx response. After the last attempt the error is the
/// one returned by that attempt, or [`LlmError::HttpStatus`] if it produced
/// a non-success response.
pub async fn fetch_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: &RetryPolicy,
    on_http_error: Option<&Arc<dyn FailureLog>>,
) -> Result<HttpResponse> {
    let mut attempt = 0;
    loop {
        let err = match transport.send(request).await {
            Ok(response) if response.is_success() => {
                if attempt > 0 {
                    debug!(url = %request.url, attempt, "request succeeded after retry");
                }
                return Ok(response);
            }
            Ok(response) => {
                let status = response.status;
                if let Some(log) = on_http_error {
                    report_http_error(log.clone(), response);
                }
                LlmError::HttpStatus { status }
            }
            Err(err) => err,
        };

        if attempt + 1 >= policy.max_attempts() {
            return Err(err);
        }

        let delay = policy.delay_after(attempt);
        warn!(
            url = %request.url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after failed attempt"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// On a detached task, read the failed body and hand
/// `"HTTP <status>: <text>"` to the log.
///
/// A body that fails or takes longer than [`ERROR_BODY_READ_TIMEOUT`] is not
/// logged.
fn report_http_error(log: Arc<dyn FailureLog>, response: HttpResponse) {
    let status = response.status;
    tokio::spawn(async move {
        let text = match tokio::time::timeout(ERROR_BODY_READ_TIMEOUT, response.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                debug!(status, error = %e, "could not read error body for failure log");
                return;
            }
            Err(_) => {
                debug!(status, "error body still pending, not logged");
                return;
            }
        };
        if let Err(e) = log.append(&format!("HTTP {status}: {text}")).await {
            debug!(error = %e, "remote failure log append failed");
        }
    });
}
