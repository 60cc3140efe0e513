//! Request dispatcher: one prompt in, routed events out.
//!
//! [`Dispatcher::dispatch`] registers the request with the
//! [`ResultRouter`] and spawns a task that:
//!
//! 1. resolves the selected provider and its credential
//! 2. builds the provider-specific request
//! 3. sends it through [`fetch_with_retry`] with a per-attempt timeout
//! 4. decodes the body as an SSE stream or a single JSON answer, routing
//!    tokens as they arrive
//! 5. appends a [`HistoryEntry`] with timing and usage metrics
//!
//! Every failure is classified with [`LlmError::user_message`], routed as an
//! `error` event and pushed to the remote failure log.
//!
//! When the router abandons a request the task drops the in-flight pipeline,
//! closing the connection. An abandoned request never records success.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use replywise_types::{
    DispatchRequest, HistoryEntry, HistoryStatus, ProviderId, RequestId, RouteEvent, StoredConfig,
    Usage,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::config::{ProviderConfig, builtin, resolve};
use crate::credentials::{ConfigVault, CredentialCache};
use crate::error::{LlmError, Result};
use crate::history::{HistoryStore, MemoryHistory};
use crate::remote_log::{FailureLog, spawn_append};
use crate::retry::{RetryPolicy, fetch_with_retry};
use crate::router::{NO_RESPONSE_MESSAGE, ResultRouter, UiSurface};
use crate::sse::{StreamDecoder, StreamEvent};
use crate::store::ConfigStore;
use crate::transport::{DEFAULT_ATTEMPT_TIMEOUT, HttpResponse, HttpTransport, TimeoutTransport};

/// Tunables for every dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Attempt budget and backoff schedule.
    pub retry: RetryPolicy,
    /// Deadline for each individual attempt.
    pub attempt_timeout: Duration,
    /// Idle time after which the router abandons a request.
    pub abandon_after: Duration,
    /// Also record failed requests in history.
    pub record_failures: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            abandon_after: crate::router::DEFAULT_ABANDON_AFTER,
            record_failures: false,
        }
    }
}

/// What a successful request produced.
struct Completed {
    model: String,
    text: String,
    usage: Option<Usage>,
    first_token_at: Option<Instant>,
}

/// Orchestrates the request pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    store: ConfigStore,
    credentials: Arc<CredentialCache>,
    transport: Arc<dyn HttpTransport>,
    router: ResultRouter,
    history: Arc<dyn HistoryStore>,
    failure_log: Option<Arc<dyn FailureLog>>,
    settings: DispatchSettings,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("credentials", &self.credentials)
            .field("settings", &self.settings)
            .field("failure_log", &self.failure_log.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// A dispatcher with default settings, in-memory history, no failure
    /// log, and credentials read from `store` (cached and invalidated on
    /// credential edits).
    pub fn new(store: ConfigStore, transport: Arc<dyn HttpTransport>) -> Self {
        let settings = DispatchSettings::default();
        let credentials = CredentialCache::subscribed(Arc::new(ConfigVault::new(store.clone())), &store);
        Self {
            router: ResultRouter::new(settings.abandon_after),
            store,
            credentials,
            transport,
            history: Arc::new(MemoryHistory::new()),
            failure_log: None,
            settings,
        }
    }

    /// Replace the settings. A new abandonment timeout rebuilds the router,
    /// keeping its fallback surface.
    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        if settings.abandon_after != self.router.abandon_after() {
            self.router = self.router.reconfigured(settings.abandon_after);
        }
        self.settings = settings;
        self
    }

    /// Use `router`; its abandonment timeout becomes the settings' one.
    pub fn with_router(mut self, router: ResultRouter) -> Self {
        self.settings.abandon_after = router.abandon_after();
        self.router = router;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<CredentialCache>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_failure_log(mut self, log: Arc<dyn FailureLog>) -> Self {
        self.failure_log = Some(log);
        self
    }

    pub fn router(&self) -> &ResultRouter {
        &self.router
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Start `request`; results arrive at `target` through the router.
    ///
    /// Returns immediately. The handle resolves once the request has been
    /// fully processed; callers may ignore it.
    pub fn dispatch(&self, request: DispatchRequest, target: Arc<dyn UiSurface>) -> JoinHandle<()> {
        let abandoned = self.router.register(request.request_id.clone(), target);
        let this = self.clone();
        tokio::spawn(async move { this.run(request.prompt, request.request_id, abandoned).await })
    }

    async fn run(&self, prompt: String, id: RequestId, abandoned: CancellationToken) {
        let started = Instant::now();
        let stored = self.store.snapshot();
        let provider = stored.api_choice;
        debug!(request_id = %id, provider = %provider, "dispatching request");

        let outcome = tokio::select! {
            biased;
            _ = abandoned.cancelled() => None,
            result = self.execute(&stored, provider, &prompt, &id) => Some(result),
        };
        // A body that ends while the router gives up still counts as abandoned.
        let outcome = outcome.filter(|_| !abandoned.is_cancelled());

        match outcome {
            None => {
                info!(request_id = %id, provider = %provider, "request abandoned, pipeline stopped");
                if self.settings.record_failures {
                    let entry = HistoryEntry::new(
                        provider,
                        model_name(provider, &stored),
                        &prompt,
                        NO_RESPONSE_MESSAGE.to_string(),
                        None,
                        None,
                        started.elapsed().as_millis() as u64,
                        HistoryStatus::Error,
                    );
                    self.record(entry).await;
                }
            }
            Some(Ok(done)) => {
                let duration = started.elapsed();
                info!(
                    request_id = %id,
                    provider = %provider,
                    duration_ms = duration.as_millis() as u64,
                    chars = done.text.chars().count(),
                    "request completed"
                );
                let ttft = done
                    .first_token_at
                    .map(|t| t.saturating_duration_since(started).as_millis() as u64);
                let entry = HistoryEntry::new(
                    provider,
                    done.model,
                    &prompt,
                    done.text,
                    done.usage,
                    ttft,
                    duration.as_millis() as u64,
                    HistoryStatus::Success,
                );
                self.record(entry).await;
            }
            Some(Err(err)) => {
                let message = err.user_message();
                warn!(request_id = %id, provider = %provider, error = %err, "request failed");
                self.router
                    .route(&id, RouteEvent::Error { message: message.clone() })
                    .await;

                if let Some(log) = &self.failure_log
                    && err != LlmError::MissingCredential
                {
                    spawn_append(log.clone(), format!("LLM request failed: {err}"));
                }

                if self.settings.record_failures {
                    let entry = HistoryEntry::new(
                        provider,
                        model_name(provider, &stored),
                        &prompt,
                        message,
                        None,
                        None,
                        started.elapsed().as_millis() as u64,
                        HistoryStatus::Error,
                    );
                    self.record(entry).await;
                }
            }
        }
    }

    async fn execute(
        &self,
        stored: &StoredConfig,
        provider: ProviderId,
        prompt: &str,
        id: &RequestId,
    ) -> Result<Completed> {
        let config = resolve(provider, stored)?;
        let credential = if config.requires_credential() {
            Some(
                self.credentials
                    .get(provider)
                    .await?
                    .ok_or(LlmError::MissingCredential)?,
            )
        } else {
            None
        };

        let adapter = Adapter::for_provider(provider);
        let request = adapter.build_request(&config, credential.as_ref(), prompt);
        let transport = TimeoutTransport::with_timeout(self.transport.clone(), self.settings.attempt_timeout);
        let response = fetch_with_retry(
            &transport,
            &request,
            &self.settings.retry,
            self.failure_log.as_ref(),
        )
        .await?;

        if adapter.streams() {
            self.consume_open_ai_compat(&config, adapter, response, id).await
        } else {
            self.consume_json(&config, adapter, response.bytes().await?, id).await
        }
    }

    /// Stream or single JSON, decided by content type, then by sniffing the
    /// first bytes when the content type says neither.
    async fn consume_open_ai_compat(
        &self,
        config: &ProviderConfig,
        adapter: Adapter,
        response: HttpResponse,
        id: &RequestId,
    ) -> Result<Completed> {
        let content_type = response.content_type();
        let mut body = response.into_body();

        let mut head = Vec::new();
        let streaming = match content_type.as_deref() {
            Some("text/event-stream") => true,
            Some("application/json") => false,
            _ => {
                while let Some(chunk) = body.next().await {
                    head.extend_from_slice(&chunk?);
                    if !head.iter().all(u8::is_ascii_whitespace) {
                        break;
                    }
                }
                head.trim_ascii_start().starts_with(b"data:")
            }
        };

        if !streaming {
            while let Some(chunk) = body.next().await {
                head.extend_from_slice(&chunk?);
            }
            return self.consume_json(config, adapter, head, id).await;
        }

        let mut decoder = StreamDecoder::new();
        let mut events = decoder.feed(head.trim_ascii_start());
        loop {
            for event in events {
                self.route_stream_event(id, event).await;
            }
            match body.next().await {
                Some(chunk) => events = decoder.feed(&chunk?),
                None => break,
            }
        }
        for event in decoder.finish() {
            self.route_stream_event(id, event).await;
        }

        Ok(Completed {
            model: config.model.clone(),
            text: decoder.accumulated_text().to_string(),
            usage: decoder.usage(),
            first_token_at: decoder.first_token_at(),
        })
    }

    async fn consume_json(
        &self,
        config: &ProviderConfig,
        adapter: Adapter,
        body: Vec<u8>,
        id: &RequestId,
    ) -> Result<Completed> {
        let completion = adapter.parse_body(&body)?;
        let first_token_at = Instant::now();

        if !completion.text.is_empty() {
            self.router
                .route(id, RouteEvent::Token { text: completion.text.clone() })
                .await;
        }
        self.router
            .route(id, RouteEvent::Done { usage: completion.usage })
            .await;

        Ok(Completed {
            model: config.model.clone(),
            text: completion.text,
            usage: completion.usage,
            first_token_at: Some(first_token_at),
        })
    }

    async fn route_stream_event(&self, id: &RequestId, event: StreamEvent) {
        let event = match event {
            StreamEvent::Token { text } => RouteEvent::Token { text },
            StreamEvent::Done { usage } => RouteEvent::Done { usage },
        };
        self.router.route(id, event).await;
    }

    async fn record(&self, entry: HistoryEntry) {
        if let Err(e) = self.history.append(entry).await {
            warn!(error = %e, "failed to append history entry");
        }
    }
}

/// The model a request for `provider` would use, even if resolution fails.
fn model_name(provider: ProviderId, stored: &StoredConfig) -> String {
    stored
        .model_for(provider)
        .unwrap_or(builtin(provider).default_model)
        .to_string()
}
