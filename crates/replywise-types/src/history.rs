//! Request history records.
//!
//! One [`HistoryEntry`] is appended per completed request. Entries are
//! immutable once appended; the store keeps only the most recent
//! [`HISTORY_CAPACITY`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{ProviderId, Usage};

/// Maximum number of entries retained by any history store.
pub const HISTORY_CAPACITY: usize = 100;

/// Maximum characters of the prompt kept in [`HistoryEntry::input_summary`].
pub const INPUT_SUMMARY_CHARS: usize = 280;

/// Outcome of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Error,
}

/// Timing and usage metrics for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderId,
    pub model: String,
    pub input_summary: String,
    pub output_text: String,
    #[serde(default)]
    pub tokens_prompt: Option<u32>,
    #[serde(default)]
    pub tokens_completion: Option<u32>,
    #[serde(default)]
    pub tokens_total: Option<u32>,
    #[serde(default)]
    pub time_to_first_token_ms: Option<u64>,
    pub duration_ms: u64,
    #[serde(default)]
    pub tokens_per_second: Option<f64>,
    pub status: HistoryStatus,
}

impl HistoryEntry {
    /// Build an entry, deriving the summary and throughput fields.
    ///
    /// `tokens_per_second` is only set when completion tokens are known and
    /// `duration_ms` is non-zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: ProviderId,
        model: impl Into<String>,
        prompt: &str,
        output_text: impl Into<String>,
        usage: Option<Usage>,
        time_to_first_token_ms: Option<u64>,
        duration_ms: u64,
        status: HistoryStatus,
    ) -> Self {
        let tokens_per_second = usage
            .filter(|_| duration_ms > 0)
            .map(|u| u.completion_tokens as f64 / (duration_ms as f64 / 1000.0));

        Self {
            timestamp: Utc::now(),
            provider,
            model: model.into(),
            input_summary: summarize_input(prompt),
            output_text: output_text.into(),
            tokens_prompt: usage.map(|u| u.prompt_tokens),
            tokens_completion: usage.map(|u| u.completion_tokens),
            tokens_total: usage.map(|u| u.total_tokens),
            time_to_first_token_ms,
            duration_ms,
            tokens_per_second,
            status,
        }
    }
}

/// Truncate a prompt to [`INPUT_SUMMARY_CHARS`] characters.
pub fn summarize_input(prompt: &str) -> String {
    prompt.chars().take(INPUT_SUMMARY_CHARS).collect()
}
