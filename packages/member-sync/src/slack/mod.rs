//! Slack adapters.
//!
//! - `Conversation` - Synchronises emails with the members of a Slack conversation

pub mod conversation;
pub mod types;

pub use conversation::{Conversation, ConversationClient};
pub use types::{MembersPage, MembersPageRequest, SlackUser, UserProfile};
