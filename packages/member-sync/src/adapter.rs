//! The operations every membership adapter exposes.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A remote group whose members are identified by email.
///
/// Operations take `&mut self`: an adapter owns mutable state (its identity
/// cache) and is driven by one caller at a time, typically a fetch followed by
/// adds and/or removes. No operation retries; retry policy belongs to the
/// caller.
#[async_trait]
pub trait Adapter: Send {
    /// Current member emails of the remote group, in no guaranteed order.
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Vec<String>>;

    /// Add members by email.
    async fn add_members(&mut self, emails: &[String], cancel: &CancellationToken) -> Result<()>;

    /// Remove members by email.
    async fn remove_members(
        &mut self,
        emails: &[String],
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Fail with [`SyncError::Cancelled`](crate::SyncError::Cancelled) once the token has fired.
pub(crate) fn ensure_active(cancel: &CancellationToken, operation: &'static str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(crate::SyncError::Cancelled { operation });
    }
    Ok(())
}
