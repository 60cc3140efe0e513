//! `replywise send` -- dispatch one prompt and stream the reply to stdout.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Args;
use parking_lot::Mutex;
use replywise_llm::{
    ConfigStore, DispatchSettings, Dispatcher, GithubLog, JsonFileHistory, ReqwestTransport,
    UiSurface,
};
use replywise_types::{Ack, DispatchRequest, MessagingError, ProviderId, RouteEvent, StoredConfig, Usage};
use tokio::sync::oneshot;

/// Arguments for the `send` subcommand.
#[derive(Args)]
pub struct SendArgs {
    /// Prompt text. Multiple words are joined with spaces.
    #[arg(required = true)]
    pub prompt: Vec<String>,

    /// Provider to use instead of the configured one
    /// (openai, openrouter, anthropic, mistral, custom).
    #[arg(short, long)]
    pub provider: Option<ProviderId>,

    /// Model to use instead of the configured one.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Also record failed requests in history.
    #[arg(long)]
    pub record_failures: bool,
}

/// How long to wait for history to be written after the terminal event.
const HISTORY_GRACE: Duration = Duration::from_secs(2);

/// How a request ended, as seen by the terminal.
type Outcome = Result<Option<Usage>, String>;

/// Prints routed events to stdout and reports the terminal one.
struct TerminalSurface {
    finished: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl TerminalSurface {
    fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                finished: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn finish(&self, outcome: Outcome) {
        if let Some(tx) = self.finished.lock().take() {
            let _ = tx.send(outcome);
        }
    }
}

#[async_trait]
impl UiSurface for TerminalSurface {
    async fn deliver(&self, event: RouteEvent) -> Result<Ack, MessagingError> {
        let mut stdout = std::io::stdout().lock();
        match event {
            RouteEvent::Token { text } => {
                write!(stdout, "{text}").map_err(|e| MessagingError::Other(e.to_string()))?;
                stdout.flush().map_err(|e| MessagingError::Other(e.to_string()))?;
            }
            RouteEvent::Done { usage } => {
                let _ = writeln!(stdout);
                self.finish(Ok(usage));
            }
            RouteEvent::Error { message } => self.finish(Err(message)),
        }
        Ok(Ack)
    }
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(config: &mut StoredConfig, args: &SendArgs) {
    if let Some(provider) = args.provider {
        config.api_choice = provider;
    }
    if let Some(model) = args.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        config.model_names.insert(config.api_choice, model.to_string());
    }
}

/// Run the `send` command.
pub async fn run(args: SendArgs, mut config: StoredConfig) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args);
    let prompt = args.prompt.join(" ");
    let store = ConfigStore::new(config);
    let transport = Arc::new(ReqwestTransport::new());

    let settings = DispatchSettings {
        record_failures: args.record_failures,
        ..DispatchSettings::default()
    };
    let history = Arc::new(JsonFileHistory::new(super::history_path()?));
    let failure_log = Arc::new(GithubLog::new(transport.clone(), store.clone()));
    let dispatcher = Dispatcher::new(store, transport)
        .with_settings(settings)
        .with_history(history)
        .with_failure_log(failure_log);

    let (surface, finished) = TerminalSurface::new();
    let request = DispatchRequest::new(prompt);
    tracing::debug!(request_id = %request.request_id, "sending prompt");
    let handle = dispatcher.dispatch(request, Arc::new(surface));

    let outcome = finished.await;
    // Let the pipeline finish writing history before exiting.
    if tokio::time::timeout(HISTORY_GRACE, handle).await.is_err() {
        tracing::debug!("pipeline still running at exit");
    }

    match outcome {
        Ok(Ok(usage)) => {
            if let Some(usage) = usage {
                tracing::info!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    total_tokens = usage.total_tokens,
                    "usage"
                );
            }
            Ok(())
        }
        Ok(Err(message)) => anyhow::bail!("{message}"),
        Err(_) => anyhow::bail!("request ended without a reply"),
    }
}
