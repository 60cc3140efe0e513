//! Stored configuration schema.
//!
//! Mirrors the settings a user saves from the options page. Keys are
//! camelCase on disk (`apiChoice`, `modelNames`, ...) and snake_case aliases
//! are accepted. Unknown fields are silently ignored and every field has a
//! default, so a partial or empty file always loads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::{AuthScheme, ProviderId};
use crate::secret::SecretString;

// ── Root config ──────────────────────────────────────────────────────────

/// Everything the pipeline reads from persistent settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfig {
    /// The provider used for new requests.
    #[serde(default, alias = "api_choice")]
    pub api_choice: ProviderId,

    /// Per-provider model override. A blank entry means "use the default".
    #[serde(default, alias = "model_names")]
    pub model_names: BTreeMap<ProviderId, String>,

    /// Per-provider base URL. Only consulted for [`ProviderId::Custom`].
    #[serde(default, alias = "provider_urls")]
    pub provider_urls: BTreeMap<ProviderId, String>,

    /// Per-provider auth scheme. Only consulted for [`ProviderId::Custom`].
    #[serde(default, alias = "auth_schemes")]
    pub auth_schemes: BTreeMap<ProviderId, AuthScheme>,

    /// Decrypted API keys. Never serialized back out.
    #[serde(default, alias = "api_keys", skip_serializing)]
    pub api_keys: BTreeMap<ProviderId, SecretString>,

    /// Remote failure-log destination.
    #[serde(default, alias = "remote_log")]
    pub remote_log: Option<RemoteLogConfig>,
}

impl StoredConfig {
    /// The user's model override for `id`, if one is set and non-blank.
    pub fn model_for(&self, id: ProviderId) -> Option<&str> {
        self.model_names
            .get(&id)
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
    }

    /// The stored base URL for `id`, if any.
    pub fn url_for(&self, id: ProviderId) -> Option<&str> {
        self.provider_urls
            .get(&id)
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
    }

    /// The stored auth scheme for `id`, if any.
    pub fn auth_scheme_for(&self, id: ProviderId) -> Option<AuthScheme> {
        self.auth_schemes.get(&id).copied()
    }

    /// The stored credential for `id`, if one is set and non-blank.
    pub fn api_key_for(&self, id: ProviderId) -> Option<&SecretString> {
        self.api_keys.get(&id).filter(|k| !k.is_blank())
    }
}

// ── Remote log ───────────────────────────────────────────────────────────

/// GitHub repository that receives failure logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLogConfig {
    /// Token with `contents: write` on the repository.
    #[serde(default, alias = "github_token")]
    pub github_token: SecretString,

    /// Repository owner (user or organization).
    #[serde(default, alias = "github_owner")]
    pub github_owner: String,

    /// Repository name.
    #[serde(default, alias = "github_repo")]
    pub github_repo: String,
}

impl RemoteLogConfig {
    /// Whether token, owner and repo are all present.
    pub fn is_configured(&self) -> bool {
        !self.github_token.is_blank()
            && !self.github_owner.trim().is_empty()
            && !self.github_repo.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_loads_defaults() {
        let cfg: StoredConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, StoredConfig::default());
        assert_eq!(cfg.api_choice, ProviderId::Openai);
        assert!(cfg.remote_log.is_none());
    }

    #[test]
    fn camel_case_layout() {
        let json = r#"{
            "apiChoice": "custom",
            "modelNames": {"custom": "llama3", "openai": "  "},
            "providerUrls": {"custom": "http://localhost:11434/anything"},
            "authSchemes": {"custom": "none"},
            "apiKeys": {"openai": " sk-1 "},
            "remoteLog": {"githubToken": "ghp", "githubOwner": "me", "githubRepo": "logs"},
            "somethingElse": true
        }"#;
        let cfg: StoredConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.api_choice, ProviderId::Custom);
        assert_eq!(cfg.model_for(ProviderId::Custom), Some("llama3"));
        assert_eq!(cfg.model_for(ProviderId::Openai), None);
        assert_eq!(
            cfg.url_for(ProviderId::Custom),
            Some("http://localhost:11434/anything")
        );
        assert_eq!(cfg.auth_scheme_for(ProviderId::Custom), Some(AuthScheme::None));
        assert_eq!(cfg.api_key_for(ProviderId::Openai).unwrap().expose(), "sk-1");
        assert!(cfg.remote_log.as_ref().unwrap().is_configured());
    }

    #[test]
    fn snake_case_aliases() {
        let json = r#"{"api_choice": "claude", "model_names": {"anthropic": "x"}}"#;
        let cfg: StoredConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.api_choice, ProviderId::Anthropic);
        assert_eq!(cfg.model_for(ProviderId::Anthropic), Some("x"));
    }

    #[test]
    fn api_keys_never_serialized() {
        let mut cfg = StoredConfig::default();
        cfg.api_keys.insert(ProviderId::Openai, SecretString::new("sk-secret"));
        let out = serde_json::to_string(&cfg).unwrap();
        assert!(!out.contains("sk-secret"));
        assert!(!out.contains("apiKeys"));
    }

    #[test]
    fn blank_key_is_not_configured() {
        let mut cfg = StoredConfig::default();
        cfg.api_keys.insert(ProviderId::Mistral, SecretString::new("   "));
        assert!(cfg.api_key_for(ProviderId::Mistral).is_none());
    }

    #[test]
    fn remote_log_requires_all_parts() {
        let partial = RemoteLogConfig {
            github_token: SecretString::new("t"),
            github_owner: "o".into(),
            github_repo: String::new(),
        };
        assert!(!partial.is_configured());
    }
}
