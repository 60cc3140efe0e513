//! Provider configuration and resolution.
//!
//! [`resolve`] maps a [`ProviderId`] plus the user's [`StoredConfig`] to a
//! [`ProviderConfig`]: base URL, auth scheme, model and any extra headers.
//! Resolution is pure; it never touches the network.

use std::collections::BTreeMap;

use replywise_types::{AuthScheme, ProviderId, StoredConfig};
use serde::Serialize;

use crate::error::{LlmError, Result};

/// API version path every base URL ends in.
pub const API_VERSION_PATH: &str = "/v1";

/// Fully resolved connection details for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderConfig {
    /// Which provider this is.
    pub id: ProviderId,

    /// Base URL, always ending in [`API_VERSION_PATH`] (e.g. "https://api.openai.com/v1").
    pub base_url: String,

    /// How the credential is attached.
    pub auth_scheme: AuthScheme,

    /// The provider's built-in default model.
    pub default_model: String,

    /// The model requests are sent with: the user's override, else the default.
    pub model: String,

    /// Environment variable consulted when no key is stored.
    pub api_key_env: String,

    /// Extra HTTP headers sent on every request to this provider.
    pub headers: BTreeMap<String, String>,
}

impl ProviderConfig {
    /// Whether a credential must be looked up before sending.
    pub fn requires_credential(&self) -> bool {
        self.auth_scheme.requires_credential()
    }
}

/// Fixed connection details of one provider.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProvider {
    pub id: ProviderId,
    /// `None` for [`ProviderId::Custom`], whose URL is user-supplied.
    pub base_url: Option<&'static str>,
    pub auth_scheme: AuthScheme,
    pub default_model: &'static str,
    pub api_key_env: &'static str,
}

/// Returns the built-in definition for `id`.
pub fn builtin(id: ProviderId) -> BuiltinProvider {
    match id {
        ProviderId::Openai => BuiltinProvider {
            id,
            base_url: Some("https://api.openai.com/v1"),
            auth_scheme: AuthScheme::Bearer,
            default_model: "gpt-4o-mini",
            api_key_env: "OPENAI_API_KEY",
        },
        ProviderId::Openrouter => BuiltinProvider {
            id,
            base_url: Some("https://openrouter.ai/api/v1"),
            auth_scheme: AuthScheme::Bearer,
            default_model: "openai/gpt-4o-mini",
            api_key_env: "OPENROUTER_API_KEY",
        },
        ProviderId::Anthropic => BuiltinProvider {
            id,
            base_url: Some("https://api.anthropic.com/v1"),
            auth_scheme: AuthScheme::XApiKey,
            default_model: "claude-3-5-haiku-latest",
            api_key_env: "ANTHROPIC_API_KEY",
        },
        ProviderId::Mistral => BuiltinProvider {
            id,
            base_url: Some("https://api.mistral.ai/v1"),
            auth_scheme: AuthScheme::Bearer,
            default_model: "mistral-small-latest",
            api_key_env: "MISTRAL_API_KEY",
        },
        ProviderId::Custom => BuiltinProvider {
            id,
            base_url: None,
            auth_scheme: AuthScheme::Bearer,
            default_model: "gpt-4o-mini",
            api_key_env: "CUSTOM_LLM_API_KEY",
        },
    }
}

/// Attribution headers OpenRouter asks clients to send.
fn extra_headers(id: ProviderId) -> BTreeMap<String, String> {
    match id {
        ProviderId::Openrouter => BTreeMap::from([
            ("HTTP-Referer".into(), "https://web.whatsapp.com".into()),
            ("X-Title".into(), "AI Suggested Replies For WhatsApp".into()),
        ]),
        _ => BTreeMap::new(),
    }
}

/// Resolve `id` against the stored settings.
///
/// # Errors
///
/// Returns [`LlmError::InvalidEndpoint`] when `id` is
/// [`ProviderId::Custom`] and its stored URL is missing or cannot be
/// normalized by [`sanitize_custom_base`].
pub fn resolve(id: ProviderId, stored: &StoredConfig) -> Result<ProviderConfig> {
    let def = builtin(id);

    let (base_url, auth_scheme) = match def.base_url {
        Some(url) => (url.to_string(), def.auth_scheme),
        None => {
            let raw = stored
                .url_for(id)
                .ok_or_else(|| LlmError::InvalidEndpoint("no base URL configured".into()))?;
            let scheme = stored.auth_scheme_for(id).unwrap_or(def.auth_scheme);
            (sanitize_custom_base(raw)?, scheme)
        }
    };

    let model = stored
        .model_for(id)
        .unwrap_or(def.default_model)
        .to_string();

    Ok(ProviderConfig {
        id,
        base_url,
        auth_scheme,
        default_model: def.default_model.to_string(),
        model,
        api_key_env: def.api_key_env.to_string(),
        headers: extra_headers(id),
    })
}

/// Normalize a user-supplied base URL to `<scheme>://<host>[:port]/v1`.
///
/// Any path, query or fragment is discarded.
///
/// # Errors
///
/// [`LlmError::InvalidEndpoint`] if `raw` is not an absolute `http`/`https`
/// URL with a host.
pub fn sanitize_custom_base(raw: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(raw.trim())
        .map_err(|e| LlmError::InvalidEndpoint(format!("{raw}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(LlmError::InvalidEndpoint(format!(
            "{raw}: unsupported scheme {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(LlmError::InvalidEndpoint(format!("{raw}: missing host")));
    }

    url.set_path(API_VERSION_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(url: &str, scheme: Option<AuthScheme>) -> StoredConfig {
        let mut cfg = StoredConfig {
            api_choice: ProviderId::Custom,
            ..Default::default()
        };
        cfg.provider_urls.insert(ProviderId::Custom, url.into());
        if let Some(s) = scheme {
            cfg.auth_schemes.insert(ProviderId::Custom, s);
        }
        cfg
    }

    #[test]
    fn every_builtin_base_ends_in_version_path() {
        for id in ProviderId::ALL {
            if let Some(url) = builtin(id).base_url {
                assert!(url.ends_with(API_VERSION_PATH), "{id}: {url}");
            }
        }
    }

    #[test]
    fn builtin_resolution_uses_defaults() {
        let cfg = resolve(ProviderId::Anthropic, &StoredConfig::default()).unwrap();
        assert_eq!(cfg.base_url, "https://api.anthropic.com/v1");
        assert_eq!(cfg.auth_scheme, AuthScheme::XApiKey);
        assert_eq!(cfg.model, cfg.default_model);
        assert!(cfg.headers.is_empty());
    }

    #[test]
    fn user_model_overrides_default() {
        let mut stored = StoredConfig::default();
        stored.model_names.insert(ProviderId::Openai, "gpt-4.1".into());
        let cfg = resolve(ProviderId::Openai, &stored).unwrap();
        assert_eq!(cfg.model, "gpt-4.1");
        assert_eq!(cfg.default_model, "gpt-4o-mini");
    }

    #[test]
    fn builtin_ignores_stored_url_and_scheme() {
        let mut stored = custom("http://evil.example", Some(AuthScheme::None));
        stored.provider_urls.insert(ProviderId::Mistral, "http://x".into());
        stored.auth_schemes.insert(ProviderId::Mistral, AuthScheme::None);
        let cfg = resolve(ProviderId::Mistral, &stored).unwrap();
        assert_eq!(cfg.base_url, "https://api.mistral.ai/v1");
        assert_eq!(cfg.auth_scheme, AuthScheme::Bearer);
    }

    #[test]
    fn openrouter_carries_attribution_headers() {
        let cfg = resolve(ProviderId::Openrouter, &StoredConfig::default()).unwrap();
        assert_eq!(
            cfg.headers.get("HTTP-Referer").map(String::as_str),
            Some("https://web.whatsapp.com")
        );
        assert!(cfg.headers.contains_key("X-Title"));
    }

    #[test]
    fn custom_base_is_sanitized() {
        let stored = custom("https://llm.local:8443/some/path?x=1#frag", None);
        let cfg = resolve(ProviderId::Custom, &stored).unwrap();
        assert_eq!(cfg.base_url, "https://llm.local:8443/v1");
        assert_eq!(cfg.auth_scheme, AuthScheme::Bearer);
    }

    #[test]
    fn custom_scheme_none_needs_no_credential() {
        let stored = custom("http://localhost:11434", Some(AuthScheme::None));
        let cfg = resolve(ProviderId::Custom, &stored).unwrap();
        assert_eq!(cfg.base_url, "http://localhost:11434/v1");
        assert!(!cfg.requires_credential());
    }

    #[test]
    fn custom_without_url_is_invalid() {
        let err = resolve(ProviderId::Custom, &StoredConfig::default()).unwrap_err();
        assert!(matches!(err, LlmError::InvalidEndpoint(_)));
    }

    #[test]
    fn sanitize_rejects_bad_urls() {
        for bad in ["not a url", "/relative/v1", "ftp://host/v1", "mailto:a@b.c", ""] {
            assert!(
                matches!(sanitize_custom_base(bad), Err(LlmError::InvalidEndpoint(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
