//! Message shapes exchanged with UI surfaces.
//!
//! [`DispatchRequest`] arrives from a surface and starts a request;
//! [`RouteEvent`]s flow back to whichever surface registered the
//! [`RequestId`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provider::Usage;

/// Correlation token joining a dispatch to its routed events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh random id (UUID v4).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Inbound: a surface asks for a completion of `prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub prompt: String,
    #[serde(default)]
    pub request_id: RequestId,
}

impl DispatchRequest {
    /// A request with a freshly generated id.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            request_id: RequestId::new(),
        }
    }
}

/// Outbound: one event for a single request.
///
/// A request sees zero or more `Token`s followed by exactly one terminal
/// `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteEvent {
    Token { text: String },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    Error { message: String },
}

impl RouteEvent {
    /// `Done` and `Error` end a request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RouteEvent::Token { .. })
    }
}

/// Acknowledgement returned by a surface that accepted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack;
