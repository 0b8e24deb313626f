//! Adapter configuration loaded from environment variables.
//!
//! Tokens are loaded for the host, which builds the remote client; adapters
//! only receive the group identifier and tuning knobs.

use dotenvy::dotenv;
use secrecy::SecretString;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::pacing::{FixedDelay, DEFAULT_DELAY};
use crate::slack::conversation::DEFAULT_PAGE_LIMIT;

/// Settings for a Slack conversation adapter.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub token: SecretString,
    pub conversation_id: String,
    pub page_limit: u32,
    /// Minimum spacing between two `conversations.kick` calls
    pub removal_delay: Duration,
}

impl SlackConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, for hosts with their own config source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            token: required(&lookup, "SLACK_TOKEN")?.into(),
            conversation_id: required(&lookup, "SLACK_CONVERSATION_ID")?,
            page_limit: parsed(&lookup, "SLACK_PAGE_LIMIT")?.unwrap_or(DEFAULT_PAGE_LIMIT),
            removal_delay: parsed(&lookup, "SLACK_REMOVAL_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DELAY),
        })
    }

    pub fn pacer(&self) -> FixedDelay {
        FixedDelay::new(self.removal_delay)
    }
}

/// Settings for an Opsgenie on-call adapter.
#[derive(Debug, Clone)]
pub struct OpsgenieConfig {
    pub api_key: SecretString,
    pub schedule_id: String,
}

impl OpsgenieConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: required(&lookup, "OPSGENIE_API_KEY")?.into(),
            schedule_id: required(&lookup, "OPSGENIE_SCHEDULE_ID")?,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SyncError::Config {
            key,
            reason: "must be set".to_string(),
        }),
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| SyncError::Config {
                key,
                reason: format!("must be a valid number: {}", e),
            })
        })
        .transpose()
}
