//! Credential lookup and caching.
//!
//! A [`CredentialVault`] produces the plaintext credential for a provider
//! (decrypting it if the backing store is encrypted). [`CredentialCache`]
//! keeps the result in memory so each provider is loaded once per cache
//! lifetime, and drops everything when the configuration reports a
//! credential change.
//!
//! Invalidation bumps a generation counter instead of locking out readers:
//! a request that already holds a credential finishes with it, and a load
//! that was started before the bump is returned to its caller but never
//! written back into the cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use replywise_types::{ProviderId, SecretString};
use tracing::{debug, trace};

use crate::config::builtin;
use crate::error::Result;
use crate::store::{ConfigChange, ConfigObserver, ConfigStore};

/// Source of plaintext credentials.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Load the credential for `provider`. `Ok(None)` means none is stored.
    async fn load(&self, provider: ProviderId) -> Result<Option<SecretString>>;
}

// ── Vaults ───────────────────────────────────────────────────────────────

/// Reads `apiKeys` from the live configuration, falling back to the
/// provider's environment variable (e.g. `OPENAI_API_KEY`).
#[derive(Debug, Clone)]
pub struct ConfigVault {
    store: ConfigStore,
}

impl ConfigVault {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// Stored key first, then the provider's environment variable.
    pub fn lookup(&self, provider: ProviderId) -> Option<SecretString> {
        if let Some(key) = self.store.snapshot().api_key_for(provider) {
            return Some(key.clone());
        }
        let env_var = builtin(provider).api_key_env;
        let from_env = std::env::var(env_var)
            .ok()
            .map(SecretString::from)
            .filter(|k| !k.is_blank());
        if from_env.is_some() {
            trace!(provider = %provider, env_var, "credential taken from environment");
        }
        from_env
    }
}

#[async_trait]
impl CredentialVault for ConfigVault {
    async fn load(&self, provider: ProviderId) -> Result<Option<SecretString>> {
        Ok(self.lookup(provider))
    }
}

/// Fixed in-memory credentials.
#[derive(Debug, Default)]
pub struct StaticVault {
    keys: Mutex<BTreeMap<ProviderId, SecretString>>,
}

impl StaticVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(self, provider: ProviderId, key: impl Into<SecretString>) -> Self {
        self.set(provider, key);
        self
    }

    pub fn set(&self, provider: ProviderId, key: impl Into<SecretString>) {
        self.keys.lock().insert(provider, key.into());
    }

    pub fn remove(&self, provider: ProviderId) {
        self.keys.lock().remove(&provider);
    }
}

#[async_trait]
impl CredentialVault for StaticVault {
    async fn load(&self, provider: ProviderId) -> Result<Option<SecretString>> {
        Ok(self
            .keys
            .lock()
            .get(&provider)
            .filter(|k| !k.is_blank())
            .cloned())
    }
}

// ── Cache ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CachedCredential {
    generation: u64,
    value: Option<SecretString>,
}

/// Per-provider credential cache in front of a [`CredentialVault`].
pub struct CredentialCache {
    vault: Arc<dyn CredentialVault>,
    generation: AtomicU64,
    entries: Mutex<HashMap<ProviderId, CachedCredential>>,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("generation", &self.generation())
            .field("cached", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl CredentialCache {
    pub fn new(vault: Arc<dyn CredentialVault>) -> Self {
        Self {
            vault,
            generation: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Build a cache and subscribe it to `store` so credential edits
    /// invalidate it.
    pub fn subscribed(vault: Arc<dyn CredentialVault>, store: &ConfigStore) -> Arc<Self> {
        let cache = Arc::new(Self::new(vault));
        store.subscribe(cache.clone());
        cache
    }

    /// The current generation. Bumped by every [`invalidate`](Self::invalidate).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Return the credential for `provider`, loading it on first use.
    pub async fn get(&self, provider: ProviderId) -> Result<Option<SecretString>> {
        let generation = self.generation();
        if let Some(hit) = self.entries.lock().get(&provider)
            && hit.generation == generation
        {
            return Ok(hit.value.clone());
        }

        debug!(provider = %provider, generation, "loading credential");
        let value = self.vault.load(provider).await?;

        let mut entries = self.entries.lock();
        if self.generation() == generation {
            entries.insert(
                provider,
                CachedCredential {
                    generation,
                    value: value.clone(),
                },
            );
        }
        Ok(value)
    }

    /// Forget every cached credential.
    pub fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.entries.lock().clear();
        debug!(generation, "credential cache invalidated");
    }
}

impl ConfigObserver for CredentialCache {
    fn on_config_change(&self, change: &ConfigChange) {
        if !change.credentials.is_empty() {
            self.invalidate();
        }
    }
}
