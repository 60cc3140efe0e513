//! # replywise-types
//!
//! Core type definitions for the replywise suggested-reply pipeline.
//!
//! This crate is the foundation of the dependency graph and performs no
//! I/O. It contains:
//!
//! - **[`provider`]** -- [`ProviderId`], [`AuthScheme`] and normalized [`Usage`]
//! - **[`config`]** -- The stored settings schema
//! - **[`secret`]** -- [`SecretString`] for credentials
//! - **[`event`]** -- Dispatch requests and routed events
//! - **[`history`]** -- Per-request history records
//! - **[`error`]** -- [`MessagingError`]

pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod provider;
pub mod secret;

pub use config::{RemoteLogConfig, StoredConfig};
pub use error::MessagingError;
pub use event::{Ack, DispatchRequest, RequestId, RouteEvent};
pub use history::{HistoryEntry, HistoryStatus};
pub use provider::{AuthScheme, ProviderId, Usage};
pub use secret::SecretString;
