//! Live configuration store with change notification.
//!
//! [`ConfigStore`] is a cheap-to-clone handle to the current
//! [`StoredConfig`]. Readers take snapshots; writers go through
//! [`ConfigStore::update`], which diffs old against new and notifies every
//! subscribed [`ConfigObserver`] with the resulting [`ConfigChange`].

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use replywise_types::{ProviderId, StoredConfig};
use tracing::debug;

/// What changed between two configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChange {
    /// Providers whose stored credential was added, removed or altered.
    pub credentials: BTreeSet<ProviderId>,
    /// The selected provider changed.
    pub api_choice: bool,
    /// Any model override changed.
    pub models: bool,
    /// Any custom URL or auth scheme changed.
    pub endpoints: bool,
    /// The remote log destination changed.
    pub remote_log: bool,
}

impl ConfigChange {
    /// Diff two configurations.
    pub fn between(old: &StoredConfig, new: &StoredConfig) -> Self {
        let credentials = ProviderId::ALL
            .into_iter()
            .filter(|id| old.api_keys.get(id) != new.api_keys.get(id))
            .collect();

        Self {
            credentials,
            api_choice: old.api_choice != new.api_choice,
            models: old.model_names != new.model_names,
            endpoints: old.provider_urls != new.provider_urls
                || old.auth_schemes != new.auth_schemes,
            remote_log: old.remote_log != new.remote_log,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Receives a callback after every effective configuration change.
///
/// Called synchronously on the writer's thread with no store lock held.
pub trait ConfigObserver: Send + Sync {
    fn on_config_change(&self, change: &ConfigChange);
}

struct Inner {
    config: RwLock<StoredConfig>,
    observers: Mutex<Vec<Arc<dyn ConfigObserver>>>,
}

/// Shared handle to the live configuration.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("config", &*self.inner.config.read())
            .field("observers", &self.inner.observers.lock().len())
            .finish()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(StoredConfig::default())
    }
}

impl ConfigStore {
    pub fn new(config: StoredConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A copy of the current configuration.
    pub fn snapshot(&self) -> StoredConfig {
        self.inner.config.read().clone()
    }

    /// Register an observer for future changes.
    pub fn subscribe(&self, observer: Arc<dyn ConfigObserver>) {
        self.inner.observers.lock().push(observer);
    }

    /// Mutate the configuration in place and notify observers of the diff.
    ///
    /// Observers are not called when nothing changed.
    pub fn update(&self, edit: impl FnOnce(&mut StoredConfig)) -> ConfigChange {
        let change = {
            let mut config = self.inner.config.write();
            let before = config.clone();
            edit(&mut *config);
            ConfigChange::between(&before, &*config)
        };
        self.notify(&change);
        change
    }

    /// Replace the whole configuration.
    pub fn replace(&self, config: StoredConfig) -> ConfigChange {
        self.update(|current| *current = config)
    }

    fn notify(&self, change: &ConfigChange) {
        if change.is_empty() {
            return;
        }
        debug!(
            credentials = change.credentials.len(),
            api_choice = change.api_choice,
            endpoints = change.endpoints,
            "configuration changed"
        );
        let observers: Vec<_> = self.inner.observers.lock().clone();
        for observer in observers {
            observer.on_config_change(change);
        }
    }
}
