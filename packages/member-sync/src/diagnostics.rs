//! Per-adapter log routing.
//!
//! Adapters log through `tracing`. A host that wants an adapter's events to
//! go somewhere other than its default subscriber hands a [`Dispatch`] in at
//! construction; each operation then runs under that dispatcher only for as
//! long as its future is being polled. Nothing here touches the global
//! subscriber.

use std::future::Future;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

#[derive(Clone, Default)]
pub struct Diagnostics {
    dispatch: Option<Dispatch>,
}

impl Diagnostics {
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// Run `fut` with this adapter's dispatcher as the default, if one was set.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}
