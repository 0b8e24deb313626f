//! Stateful group-membership adapters.
//!
//! Each adapter exposes the same three operations over a remote group:
//! fetch the current member emails, add members by email, and remove members
//! by email. The remote APIs address members by their own user IDs, so the
//! mutable adapters learn an email -> ID mapping while fetching and adding,
//! and use it when removing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use member_sync::{Adapter, Conversation};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let mut conversation = Conversation::new(slack_client, "C0123456");
//!
//! let current = conversation.fetch(&cancel).await?;
//! conversation.add_members(&["new@example.com".into()], &cancel).await?;
//! conversation.remove_members(&["gone@example.com".into()], &cancel).await?;
//! ```
//!
//! # Modules
//!
//! - [`adapter`] - The three-operation `Adapter` trait
//! - [`slack`] - Slack conversation adapter (mutable, cached)
//! - [`opsgenie`] - Opsgenie on-call adapter (read-only)
//! - [`cache`] - Email -> remote user ID cache
//! - [`pacing`] - Pacing between destructive remote calls
//! - [`config`] - Environment-driven configuration
//! - [`testing`] - Scripted remote clients for tests

pub mod adapter;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod opsgenie;
pub mod pacing;
pub mod slack;
pub mod testing;
pub mod types;

pub use adapter::Adapter;
pub use cache::IdentityCache;
pub use config::{OpsgenieConfig, SlackConfig};
pub use diagnostics::Diagnostics;
pub use error::{Result, SyncError};
pub use opsgenie::oncall::{OnCall, ScheduleClient};
pub use pacing::{Cancelled, FixedDelay, GovernorPacer, Pacer, Unpaced};
pub use slack::conversation::{Conversation, ConversationClient};
pub use types::{ClientError, ClientResult, RemoteUserId};

pub use secrecy::SecretString;
pub use tokio_util::sync::CancellationToken;
