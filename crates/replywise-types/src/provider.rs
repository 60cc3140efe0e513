//! Provider identifiers, auth schemes and token usage.
//!
//! This module contains:
//! - [`ProviderId`]: the closed set of supported LLM providers
//! - [`AuthScheme`]: how a credential is attached to a request
//! - [`Usage`]: token counts normalized across provider naming conventions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Provider identifiers ─────────────────────────────────────────────────

/// One of the supported LLM providers.
///
/// `Custom` is a user-defined OpenAI-compatible endpoint. The serialized
/// form is the lowercase name; `"claude"` is accepted as an alias for
/// [`ProviderId::Anthropic`] because older stored settings used it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// api.openai.com
    Openai,
    /// openrouter.ai
    Openrouter,
    /// api.anthropic.com
    #[serde(alias = "claude")]
    Anthropic,
    /// api.mistral.ai
    Mistral,
    /// User-supplied OpenAI-compatible endpoint.
    Custom,
}

impl ProviderId {
    /// Every provider, in display order.
    pub const ALL: [ProviderId; 5] = [
        ProviderId::Openai,
        ProviderId::Openrouter,
        ProviderId::Anthropic,
        ProviderId::Mistral,
        ProviderId::Custom,
    ];

    /// The lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Openai => "openai",
            ProviderId::Openrouter => "openrouter",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Mistral => "mistral",
            ProviderId::Custom => "custom",
        }
    }
}

impl Default for ProviderId {
    fn default() -> Self {
        ProviderId::Openai
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderId::Openai),
            "openrouter" => Ok(ProviderId::Openrouter),
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "mistral" => Ok(ProviderId::Mistral),
            "custom" => Ok(ProviderId::Custom),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

// ── Auth schemes ─────────────────────────────────────────────────────────

/// How a credential is attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    #[serde(rename = "bearer")]
    Bearer,
    /// `x-api-key: <key>`
    #[serde(rename = "x-api-key")]
    XApiKey,
    /// No credential at all (local or open endpoints).
    #[serde(rename = "none")]
    None,
}

impl AuthScheme {
    /// Whether a credential must be present before a request can be sent.
    pub fn requires_credential(&self) -> bool {
        !matches!(self, AuthScheme::None)
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthScheme::Bearer => "bearer",
            AuthScheme::XApiKey => "x-api-key",
            AuthScheme::None => "none",
        })
    }
}

// ── Usage ────────────────────────────────────────────────────────────────

/// Token usage for one completion.
///
/// Providers report usage either as `prompt_tokens`/`completion_tokens`/
/// `total_tokens` (OpenAI style) or `input_tokens`/`output_tokens`
/// (Anthropic style). [`Usage::from_value`] accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens billed for the call.
    pub total_tokens: u32,
}

impl Usage {
    /// Normalize a provider `usage` object.
    ///
    /// Missing parts count as zero and a missing total defaults to the sum
    /// of the two parts. Returns `None` if `value` is not a JSON object.
    pub fn from_value(value: &serde_json::Value) -> Option<Usage> {
        let obj = value.as_object()?;
        let count = |primary: &str, alias: &str| -> Option<u32> {
            obj.get(primary)
                .or_else(|| obj.get(alias))
                .and_then(|v| v.as_u64())
                .map(|n| n.min(u32::MAX as u64) as u32)
        };

        let prompt_tokens = count("prompt_tokens", "input_tokens").unwrap_or(0);
        let completion_tokens = count("completion_tokens", "output_tokens").unwrap_or(0);
        let total_tokens = obj
            .get("total_tokens")
            .and_then(|v| v.as_u64())
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens));

        Some(Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_id_parses_aliases() {
        assert_eq!("claude".parse::<ProviderId>().unwrap(), ProviderId::Anthropic);
        assert_eq!(" OpenRouter ".parse::<ProviderId>().unwrap(), ProviderId::Openrouter);
        assert!("gemini".parse::<ProviderId>().is_err());
    }

    #[test]
    fn provider_id_serde_uses_lowercase() {
        let json = serde_json::to_string(&ProviderId::Mistral).unwrap();
        assert_eq!(json, "\"mistral\"");
        let parsed: ProviderId = serde_json::from_str("\"claude\"").unwrap();
        assert_eq!(parsed, ProviderId::Anthropic);
    }

    #[test]
    fn auth_scheme_wire_names() {
        let parsed: AuthScheme = serde_json::from_str("\"x-api-key\"").unwrap();
        assert_eq!(parsed, AuthScheme::XApiKey);
        assert_eq!(AuthScheme::None.to_string(), "none");
        assert!(!AuthScheme::None.requires_credential());
        assert!(AuthScheme::Bearer.requires_credential());
    }

    #[test]
    fn usage_openai_naming() {
        let usage = Usage::from_value(&json!({
            "prompt_tokens": 12, "completion_tokens": 30, "total_tokens": 42
        }))
        .unwrap();
        assert_eq!(usage, Usage { prompt_tokens: 12, completion_tokens: 30, total_tokens: 42 });
    }

    #[test]
    fn usage_anthropic_naming_sums_total() {
        let usage = Usage::from_value(&json!({"input_tokens": 7, "output_tokens": 5})).unwrap();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 12);
    }

    #[test]
    fn usage_rejects_non_objects() {
        assert!(Usage::from_value(&json!(null)).is_none());
        assert!(Usage::from_value(&json!([1, 2])).is_none());
    }
}
