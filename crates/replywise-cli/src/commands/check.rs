//! `replywise check` -- probe the selected provider.

use std::sync::Arc;

use clap::Args;
use replywise_llm::{ConfigStore, ConfigVault, ReqwestTransport, TimeoutTransport, probe_endpoint, resolve};
use replywise_types::{ProviderId, StoredConfig};

/// Arguments for the `check` subcommand.
#[derive(Args)]
pub struct CheckArgs {
    /// Provider to probe instead of the configured one.
    #[arg(short, long)]
    pub provider: Option<ProviderId>,
}

/// Run the `check` command. Fails when the probe does not succeed.
pub async fn run(args: CheckArgs, config: StoredConfig) -> anyhow::Result<()> {
    let provider = args.provider.unwrap_or(config.api_choice);
    let resolved = resolve(provider, &config).map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    let credential = ConfigVault::new(ConfigStore::new(config)).lookup(provider);

    let transport = TimeoutTransport::new(Arc::new(ReqwestTransport::new()));
    let outcome = probe_endpoint(&transport, &resolved, credential.as_ref()).await;

    println!("{provider} ({}): {outcome}", resolved.base_url);
    if !outcome.is_ok() {
        anyhow::bail!("check failed for {provider}");
    }
    Ok(())
}
