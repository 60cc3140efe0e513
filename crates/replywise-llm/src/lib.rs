//! LLM request pipeline for replywise.
//!
//! Turns a prompt into a stream of routed reply events using whichever
//! provider the stored configuration selects.
//!
//! # Architecture
//!
//! - [`ConfigStore`] holds the live [`StoredConfig`](replywise_types::StoredConfig)
//!   and notifies observers of edits
//! - [`resolve`] turns a provider id into a concrete [`ProviderConfig`]
//! - [`CredentialCache`] loads API keys through a [`CredentialVault`]
//! - [`Adapter`] builds provider-specific requests and parses JSON answers
//! - [`fetch_with_retry`] sends over a [`TimeoutTransport`] with backoff
//! - [`StreamDecoder`] turns SSE bytes into token events
//! - [`ResultRouter`] delivers events to a [`UiSurface`] and abandons
//!   silent requests
//! - [`Dispatcher`] wires all of the above together per request
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use replywise_llm::{ConfigStore, Dispatcher, ReqwestTransport};
//! use replywise_types::DispatchRequest;
//!
//! let store = ConfigStore::default();
//! let dispatcher = Dispatcher::new(store, Arc::new(ReqwestTransport::new()));
//! dispatcher
//!     .dispatch(DispatchRequest::new("Suggest a reply to: see you at 6?"), surface)
//!     .await?;
//! ```

pub mod adapter;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod probe;
pub mod remote_log;
pub mod retry;
pub mod router;
pub mod sse;
pub mod store;
pub mod transport;

pub use adapter::{Adapter, Completion};
pub use config::{ProviderConfig, builtin, resolve, sanitize_custom_base};
pub use credentials::{ConfigVault, CredentialCache, CredentialVault, StaticVault};
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use error::{LlmError, Result};
pub use history::{HistoryStore, JsonFileHistory, MemoryHistory};
pub use probe::{ProbeOutcome, probe_endpoint};
pub use remote_log::{FailureLog, GithubLog};
pub use retry::{RetryPolicy, fetch_with_retry};
pub use router::{ResultRouter, UiSurface};
pub use sse::{StreamDecoder, StreamEvent};
pub use store::{ConfigChange, ConfigObserver, ConfigStore};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TimeoutTransport};
