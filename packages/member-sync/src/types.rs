//! Identifiers shared by every adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned by a remote client capability.
///
/// Adapters never inspect it; it is wrapped with the failing operation and
/// handed back to the caller.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for remote client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Opaque user handle assigned by a remote system.
///
/// Only meaningful within the remote instance that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteUserId(String);

impl RemoteUserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteUserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RemoteUserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
