//! Per-provider request builders and response parsers.
//!
//! Two wire dialects are spoken:
//!
//! | Adapter          | Endpoint            | Body                          | Response            |
//! |------------------|---------------------|-------------------------------|---------------------|
//! | `OpenAiCompat`   | `/chat/completions` | chat-completions, streaming   | SSE or one JSON     |
//! | `Anthropic`      | `/messages`         | messages, never streaming     | one JSON            |
//!
//! OpenAI, OpenRouter, Mistral and custom endpoints all use `OpenAiCompat`.

use replywise_types::{AuthScheme, ProviderId, SecretString, Usage};
use serde_json::{Value, json};

use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::transport::HttpRequest;

/// Completion length cap sent with every request.
pub const MAX_TOKENS: u32 = 150;

/// Sampling temperature for chat-completions requests.
pub const TEMPERATURE: f64 = 0.7;

/// `anthropic-version` header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A complete, non-streamed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Wire dialect of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapter {
    OpenAiCompat,
    Anthropic,
}

impl Adapter {
    pub fn for_provider(id: ProviderId) -> Self {
        match id {
            ProviderId::Anthropic => Adapter::Anthropic,
            ProviderId::Openai
            | ProviderId::Openrouter
            | ProviderId::Mistral
            | ProviderId::Custom => Adapter::OpenAiCompat,
        }
    }

    /// Whether requests ask for a streamed body.
    pub fn streams(&self) -> bool {
        matches!(self, Adapter::OpenAiCompat)
    }

    /// Full URL requests are POSTed to.
    pub fn endpoint(&self, config: &ProviderConfig) -> String {
        let base = config.base_url.trim_end_matches('/');
        match self {
            Adapter::OpenAiCompat => format!("{base}/chat/completions"),
            Adapter::Anthropic => format!("{base}/messages"),
        }
    }

    /// JSON body for `prompt`.
    pub fn body(&self, config: &ProviderConfig, prompt: &str) -> Value {
        let messages = json!([{"role": "user", "content": prompt}]);
        match self {
            Adapter::OpenAiCompat => json!({
                "messages": messages,
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
                "stream": true,
                "model": config.model,
            }),
            Adapter::Anthropic => json!({
                "model": config.model,
                "messages": messages,
                "max_tokens": MAX_TOKENS,
            }),
        }
    }

    /// Build the completion request.
    ///
    /// Anthropic requests carry exactly `Content-Type`, `x-api-key` and
    /// `anthropic-version`. Chat-completions requests carry `Content-Type`,
    /// the auth header for the configured scheme (none for
    /// [`AuthScheme::None`]) and the provider's extra headers.
    pub fn build_request(
        &self,
        config: &ProviderConfig,
        credential: Option<&SecretString>,
        prompt: &str,
    ) -> HttpRequest {
        let mut request = HttpRequest::post_json(self.endpoint(config), &self.body(config, prompt));
        match self {
            Adapter::Anthropic => {
                request.headers = vec![
                    ("Content-Type".into(), "application/json".into()),
                    (
                        "x-api-key".into(),
                        credential.map(|c| c.expose().to_string()).unwrap_or_default(),
                    ),
                    ("anthropic-version".into(), ANTHROPIC_VERSION.into()),
                ];
            }
            Adapter::OpenAiCompat => {
                request
                    .headers
                    .extend(auth_headers(config.auth_scheme, credential));
                request.headers.extend(
                    config
                        .headers
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
            }
        }
        request
    }

    /// Parse a single JSON response body.
    ///
    /// # Errors
    ///
    /// - [`LlmError::ProviderReported`] when the body is an `error` envelope
    /// - [`LlmError::UnexpectedResponse`] when it is not JSON or has no text
    pub fn parse_body(&self, body: &[u8]) -> Result<Completion> {
        let value: Value = serde_json::from_slice(body)?;

        if let Some(message) = error_envelope(&value) {
            return Err(LlmError::ProviderReported(message));
        }

        let pointer = match self {
            Adapter::OpenAiCompat => "/choices/0/message/content",
            Adapter::Anthropic => "/content/0/text",
        };
        let text = value
            .pointer(pointer)
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::UnexpectedResponse(format!("missing {pointer}")))?;

        Ok(Completion {
            text: text.to_string(),
            usage: value.get("usage").and_then(Usage::from_value),
        })
    }
}

/// Headers that attach `credential` under `scheme`.
///
/// Empty for [`AuthScheme::None`] or a missing credential.
pub fn auth_headers(scheme: AuthScheme, credential: Option<&SecretString>) -> Vec<(String, String)> {
    let Some(key) = credential.filter(|c| !c.is_blank()) else {
        return Vec::new();
    };
    match scheme {
        AuthScheme::Bearer => vec![("Authorization".into(), format!("Bearer {}", key.expose()))],
        AuthScheme::XApiKey => vec![("x-api-key".into(), key.expose().to_string())],
        AuthScheme::None => Vec::new(),
    }
}

/// The message of a JSON `error` envelope, if `value` is one.
fn error_envelope(value: &Value) -> Option<String> {
    let error = value.get("error").filter(|e| !e.is_null())?;
    let message = match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    };
    Some(message)
}
