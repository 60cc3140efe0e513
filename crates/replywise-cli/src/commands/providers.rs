//! `replywise providers` -- show the resolved configuration of every provider.
//!
//! # Example
//!
//! ```text
//! replywise providers
//! ```

use replywise_llm::{ConfigStore, ConfigVault, ProviderConfig, resolve};
use replywise_types::{ProviderId, StoredConfig};

use super::discover_config_path;

/// One printable line per provider. Never includes secret values.
pub fn describe(config: &StoredConfig) -> Vec<String> {
    let vault = ConfigVault::new(ConfigStore::new(config.clone()));
    ProviderId::ALL
        .iter()
        .map(|&id| {
            let marker = if id == config.api_choice { "*" } else { " " };
            match resolve(id, config) {
                Ok(resolved) => {
                    let key = key_status(&resolved, vault.lookup(id).is_some());
                    format!(
                        "{marker} {:<11} {:<32} model={:<28} auth={:<10} key={key}",
                        id.as_str(),
                        resolved.base_url,
                        resolved.model,
                        resolved.auth_scheme.to_string()
                    )
                }
                Err(e) => format!("{marker} {:<11} not configured ({e})", id.as_str()),
            }
        })
        .collect()
}

fn key_status(resolved: &ProviderConfig, present: bool) -> &'static str {
    match (resolved.requires_credential(), present) {
        (false, _) => "not needed",
        (true, true) => "set",
        (true, false) => "missing",
    }
}

/// Run the providers command.
pub fn run(config: &StoredConfig) {
    match discover_config_path() {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: defaults"),
    }
    println!();
    for line in describe(config) {
        println!("{line}");
    }
}
