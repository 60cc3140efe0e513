//! Redacting wrapper for provider credentials.
//!
//! API keys and log tokens travel through configuration snapshots, the
//! credential cache and request builders. [`SecretString`] keeps them out
//! of `Debug`/`Display` output and out of anything serialized back to disk.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A credential value that never appears in logs or serialized output.
///
/// - `Debug` prints `"[REDACTED]"` (or `""` when empty)
/// - `Display` prints `[REDACTED]` (or nothing when empty)
/// - `Serialize` always emits an empty string
/// - `Deserialize` accepts a plain string and trims surrounding whitespace,
///   the same way a pasted key is trimmed before it is stored
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value. Only request builders should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the value is empty or whitespace only.
    ///
    /// A blank credential is treated as "not configured" everywhere.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "\"\"")
        } else {
            write!(f, "\"[REDACTED]\"")
        }
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            write!(f, "[REDACTED]")
        }
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SecretString(raw.trim().to_string()))
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        SecretString(s.to_string())
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}
