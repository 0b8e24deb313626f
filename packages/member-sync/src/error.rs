//! Typed errors for the membership adapters.
//!
//! Every variant carries the dotted name of the operation that failed
//! (`slack.conversation.remove.kick_user`, `opsgenie.oncall.add`, ...) so a
//! caller can diagnose a failure without the adapter retrying anything.

use thiserror::Error;

use crate::types::ClientError;

/// Errors that can occur during adapter operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote listing, lookup, invite or removal call failed
    #[error("{operation}({target}) -> {source}")]
    Remote {
        operation: &'static str,
        target: String,
        #[source]
        source: ClientError,
    },

    /// Removal was requested before any identity mapping was learned
    #[error("{operation} -> cache is empty, run fetch first")]
    CacheEmpty { operation: &'static str },

    /// Removal reached an email the cache has no identifier for
    #[error("{operation} -> no cached user ID for {email}")]
    NotCached {
        operation: &'static str,
        email: String,
    },

    /// The backing source cannot be mutated
    #[error("{operation} -> adapter is read-only")]
    ReadOnly { operation: &'static str },

    /// The cancellation token fired
    #[error("{operation} -> operation cancelled")]
    Cancelled { operation: &'static str },

    /// Configuration missing or malformed
    #[error("config error: {key}: {reason}")]
    Config { key: &'static str, reason: String },
}

impl SyncError {
    pub(crate) fn remote(
        operation: &'static str,
        target: impl Into<String>,
        source: ClientError,
    ) -> Self {
        Self::Remote {
            operation,
            target: target.into(),
            source,
        }
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, SyncError>;
