use serde::{Deserialize, Serialize};

use crate::types::RemoteUserId;

/// Request for one page of conversation members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembersPageRequest {
    #[serde(rename = "channel")]
    pub conversation_id: String,
    /// Empty for the first page, otherwise the previous page's cursor.
    pub cursor: String,
    pub limit: u32,
}

/// One page of conversation member IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MembersPage {
    pub members: Vec<RemoteUserId>,
    /// `None` or an empty string means this was the last page.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl MembersPage {
    pub fn new(members: Vec<RemoteUserId>, next_cursor: impl Into<String>) -> Self {
        Self {
            members,
            next_cursor: Some(next_cursor.into()),
        }
    }

    pub fn last(members: Vec<RemoteUserId>) -> Self {
        Self {
            members,
            next_cursor: None,
        }
    }

    /// The cursor to request next, if pagination should continue.
    pub fn continuation(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|cursor| !cursor.is_empty())
    }
}

/// A Slack user as returned by `users.info` and `users.lookupByEmail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: RemoteUserId,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub profile: UserProfile,
}

impl SlackUser {
    pub fn human(id: impl Into<RemoteUserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_bot: false,
            profile: UserProfile {
                email: email.into(),
            },
        }
    }

    pub fn bot(id: impl Into<RemoteUserId>, email: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::human(id, email)
        }
    }

    pub fn email(&self) -> &str {
        &self.profile.email
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub email: String,
}
