//! Endpoint and credential probe.
//!
//! [`probe_endpoint`] issues `GET <base_url>/models` with the provider's
//! auth headers. It answers "does this key work?" for keyed providers and
//! "is anything listening?" for keyless custom endpoints.

use std::fmt;

use replywise_types::{ProviderId, SecretString};
use tracing::debug;

use crate::adapter::{ANTHROPIC_VERSION, auth_headers};
use crate::config::ProviderConfig;
use crate::transport::{HttpRequest, HttpTransport};

/// Result of probing a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The credential was accepted.
    KeyVerified,
    /// The endpoint answered but rejected the credential.
    InvalidKey,
    /// Keyless endpoint answered with success.
    EndpointReachable,
    /// Keyless endpoint answered with a non-success status.
    EndpointError(u16),
    /// No HTTP response at all.
    ConnectionError(String),
    /// A credential is required and none is stored.
    MissingCredential,
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeOutcome::KeyVerified | ProbeOutcome::EndpointReachable)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::KeyVerified => write!(f, "API key verified"),
            ProbeOutcome::InvalidKey => write!(f, "Invalid API key"),
            ProbeOutcome::EndpointReachable => write!(f, "Endpoint reachable"),
            ProbeOutcome::EndpointError(status) => write!(f, "Endpoint error: HTTP {status}"),
            ProbeOutcome::ConnectionError(msg) => write!(f, "Connection error: {msg}"),
            ProbeOutcome::MissingCredential => write!(f, "No API key configured"),
        }
    }
}

/// Probe `config` with `credential`.
///
/// Keyed built-in providers without a credential short-circuit to
/// [`ProbeOutcome::MissingCredential`] with no I/O. A custom endpoint is
/// probed even without a credential, since it may not need one.
pub async fn probe_endpoint(
    transport: &dyn HttpTransport,
    config: &ProviderConfig,
    credential: Option<&SecretString>,
) -> ProbeOutcome {
    let credential = credential.filter(|c| !c.is_blank());
    let keyed = config.requires_credential();

    if keyed && credential.is_none() && config.id != ProviderId::Custom {
        return ProbeOutcome::MissingCredential;
    }

    let url = format!("{}/models", config.base_url.trim_end_matches('/'));
    let mut request = HttpRequest::get(url);
    request
        .headers
        .extend(auth_headers(config.auth_scheme, credential));
    if config.id == ProviderId::Anthropic {
        request
            .headers
            .push(("anthropic-version".into(), ANTHROPIC_VERSION.into()));
    }
    request
        .headers
        .extend(config.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

    let response = match transport.send(&request).await {
        Ok(r) => r,
        Err(e) => return ProbeOutcome::ConnectionError(e.to_string()),
    };
    debug!(provider = %config.id, status = response.status, "probe answered");

    match (keyed && credential.is_some(), response.is_success()) {
        (true, true) => ProbeOutcome::KeyVerified,
        (true, false) => ProbeOutcome::InvalidKey,
        (false, true) => ProbeOutcome::EndpointReachable,
        (false, false) => ProbeOutcome::EndpointError(response.status),
    }
}
