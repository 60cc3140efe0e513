//! Errors raised by UI surfaces when they are handed a routed event.

use thiserror::Error;

/// Failure to deliver a [`RouteEvent`](crate::event::RouteEvent) to a surface.
///
/// The router treats every variant the same way: one fallback error
/// notification, then the entry is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessagingError {
    /// The surface (tab, window, terminal) has gone away.
    #[error("surface disconnected")]
    Disconnected,

    /// The surface is alive but rejected the event.
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// Catch-all for errors that do not fit other variants.
    #[error("{0}")]
    Other(String),
}
