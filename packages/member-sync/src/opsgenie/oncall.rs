//! Reads the email addresses of the people on call for an Opsgenie schedule.
//!
//! An on-call rotation is derived from the schedule, so it cannot be edited
//! member by member: `add_members` and `remove_members` always fail with
//! [`SyncError::ReadOnly`] and never reach Opsgenie.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapter::{ensure_active, Adapter};
use crate::config::OpsgenieConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SyncError};
use crate::types::ClientResult;

/// The subset of the Opsgenie schedule API used by [`OnCall`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleClient: Send + Sync {
    async fn get_on_calls(&self, request: &OnCallRequest) -> ClientResult<OnCallResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleIdentifierType {
    Id,
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnCallRequest {
    /// Return recipients as a flat list of users rather than a team tree.
    pub flat: bool,
    pub date: DateTime<Utc>,
    pub schedule_identifier_type: ScheduleIdentifierType,
    pub schedule_identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnCallResult {
    #[serde(default)]
    pub on_call_recipients: Vec<String>,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct OnCall<C> {
    client: C,
    schedule_id: String,
    clock: Clock,
    diagnostics: Diagnostics,
}

impl<C: ScheduleClient> OnCall<C> {
    pub fn new(client: C, schedule_id: impl Into<String>) -> Self {
        Self {
            client,
            schedule_id: schedule_id.into(),
            clock: Arc::new(Utc::now),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn from_config(client: C, config: &OpsgenieConfig) -> Self {
        Self::new(client, config.schedule_id.clone())
    }

    /// Replace the source of "now" used to pick the rotation.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.diagnostics = Diagnostics::new(dispatch);
        self
    }

    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    async fn on_call_emails(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        const OPERATION: &str = "opsgenie.oncall.fetch.get_on_calls";

        info!(schedule = %self.schedule_id, "Fetching on-call recipients from Opsgenie schedule");

        let request = OnCallRequest {
            flat: true,
            date: (self.clock)(),
            schedule_identifier_type: ScheduleIdentifierType::Id,
            schedule_identifier: self.schedule_id.clone(),
        };

        ensure_active(cancel, OPERATION)?;

        let result = self
            .client
            .get_on_calls(&request)
            .await
            .map_err(|e| SyncError::remote(OPERATION, &self.schedule_id, e))?;

        info!(
            schedule = %self.schedule_id,
            count = result.on_call_recipients.len(),
            "Fetched on-call recipients successfully"
        );

        Ok(result.on_call_recipients)
    }
}

#[async_trait]
impl<C: ScheduleClient> Adapter for OnCall<C> {
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.diagnostics.scope(self.on_call_emails(cancel)).await
    }

    async fn add_members(
        &mut self,
        _emails: &[String],
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(SyncError::ReadOnly {
            operation: "opsgenie.oncall.add",
        })
    }

    async fn remove_members(
        &mut self,
        _emails: &[String],
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(SyncError::ReadOnly {
            operation: "opsgenie.oncall.remove",
        })
    }
}

impl<C> std::fmt::Debug for OnCall<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnCall")
            .field("schedule_id", &self.schedule_id)
            .finish()
    }
}
