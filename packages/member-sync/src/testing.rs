//! Testing utilities including scripted remote clients.
//!
//! These let hosts exercise the adapters without a real Slack workspace.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::slack::conversation::ConversationClient;
use crate::slack::types::{MembersPage, MembersPageRequest, SlackUser};
use crate::types::{ClientError, ClientResult, RemoteUserId};

/// Record of a call made to the mock conversation client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationCall {
    UsersInConversation { request: MembersPageRequest },
    UsersInfo { user_ids: Vec<RemoteUserId> },
    UserByEmail { email: String },
    InviteUsers { conversation_id: String, user_ids: Vec<RemoteUserId> },
    KickUser { conversation_id: String, user_id: RemoteUserId },
}

#[derive(Default)]
struct MockState {
    /// Pages by the cursor that requests them
    pages: HashMap<String, MembersPage>,
    users: Vec<SlackUser>,
    page_failures: HashMap<String, String>,
    users_info_failure: Option<String>,
    lookup_failures: HashMap<String, String>,
    invite_failure: Option<String>,
    kick_failures: HashMap<RemoteUserId, String>,
    /// Cancel this token once this many calls have been made
    cancel_after: Option<(usize, CancellationToken)>,
    calls: Vec<ConversationCall>,
}

/// Scripted Slack client for testing.
///
/// Clones share state, so a test can hand one clone to the adapter and keep
/// another to inspect the recorded calls.
///
/// # Example
///
/// ```rust
/// use member_sync::slack::{MembersPage, SlackUser};
/// use member_sync::testing::MockConversationClient;
///
/// let client = MockConversationClient::new()
///     .with_page("", MembersPage::last(vec!["U1".into()]))
///     .with_user(SlackUser::human("U1", "foo@example.com"));
/// ```
#[derive(Clone, Default)]
pub struct MockConversationClient {
    state: Arc<RwLock<MockState>>,
}

impl MockConversationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` when the members listing is requested with `cursor`.
    pub fn with_page(self, cursor: impl Into<String>, page: MembersPage) -> Self {
        self.state.write().unwrap().pages.insert(cursor.into(), page);
        self
    }

    /// Add a user to the directory behind `users.info` and `users.lookupByEmail`.
    pub fn with_user(self, user: SlackUser) -> Self {
        self.state.write().unwrap().users.push(user);
        self
    }

    pub fn fail_page(self, cursor: impl Into<String>, error: impl Into<String>) -> Self {
        self.state
            .write()
            .unwrap()
            .page_failures
            .insert(cursor.into(), error.into());
        self
    }

    pub fn fail_users_info(self, error: impl Into<String>) -> Self {
        self.state.write().unwrap().users_info_failure = Some(error.into());
        self
    }

    pub fn fail_lookup(self, email: impl Into<String>, error: impl Into<String>) -> Self {
        self.state
            .write()
            .unwrap()
            .lookup_failures
            .insert(email.into(), error.into());
        self
    }

    pub fn fail_invite(self, error: impl Into<String>) -> Self {
        self.state.write().unwrap().invite_failure = Some(error.into());
        self
    }

    pub fn fail_kick(self, user_id: impl Into<RemoteUserId>, error: impl Into<String>) -> Self {
        self.state
            .write()
            .unwrap()
            .kick_failures
            .insert(user_id.into(), error.into());
        self
    }

    /// Cancel `token` as soon as `calls` calls have been recorded.
    pub fn cancel_after(self, calls: usize, token: CancellationToken) -> Self {
        self.state.write().unwrap().cancel_after = Some((calls, token));
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ConversationCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Members listing requests, in order.
    pub fn page_requests(&self) -> Vec<MembersPageRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConversationCall::UsersInConversation { request } => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Cursors sent with each members listing request.
    pub fn page_cursors(&self) -> Vec<String> {
        self.page_requests().into_iter().map(|r| r.cursor).collect()
    }

    pub fn invite_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ConversationCall::InviteUsers { .. }))
            .count()
    }

    /// IDs passed to `kick_user`, including attempts that failed.
    pub fn kick_requests(&self) -> Vec<RemoteUserId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConversationCall::KickUser { user_id, .. } => Some(user_id),
                _ => None,
            })
            .collect()
    }

    pub fn reset_calls(&self) {
        self.state.write().unwrap().calls.clear();
    }

    fn record(&self, call: ConversationCall) {
        let mut state = self.state.write().unwrap();
        state.calls.push(call);

        if let Some((after, token)) = &state.cancel_after {
            if state.calls.len() >= *after {
                token.cancel();
            }
        }
    }
}

#[async_trait]
impl ConversationClient for MockConversationClient {
    async fn users_in_conversation(
        &self,
        request: &MembersPageRequest,
    ) -> ClientResult<MembersPage> {
        self.record(ConversationCall::UsersInConversation {
            request: request.clone(),
        });

        let state = self.state.read().unwrap();
        if let Some(error) = state.page_failures.get(&request.cursor) {
            return Err(error.clone().into());
        }

        state
            .pages
            .get(&request.cursor)
            .cloned()
            .ok_or_else(|| format!("no page scripted for cursor {:?}", request.cursor).into())
    }

    async fn users_info(&self, user_ids: &[RemoteUserId]) -> ClientResult<Vec<SlackUser>> {
        self.record(ConversationCall::UsersInfo {
            user_ids: user_ids.to_vec(),
        });

        let state = self.state.read().unwrap();
        if let Some(error) = &state.users_info_failure {
            return Err(error.clone().into());
        }

        user_ids
            .iter()
            .map(|id| {
                state
                    .users
                    .iter()
                    .find(|user| &user.id == id)
                    .cloned()
                    .ok_or_else(|| ClientError::from(format!("user_not_found: {}", id)))
            })
            .collect()
    }

    async fn user_by_email(&self, email: &str) -> ClientResult<SlackUser> {
        self.record(ConversationCall::UserByEmail {
            email: email.to_string(),
        });

        let state = self.state.read().unwrap();
        if let Some(error) = state.lookup_failures.get(email) {
            return Err(error.clone().into());
        }

        state
            .users
            .iter()
            .find(|user| user.email() == email)
            .cloned()
            .ok_or_else(|| "users_not_found".into())
    }

    async fn invite_users(
        &self,
        conversation_id: &str,
        user_ids: &[RemoteUserId],
    ) -> ClientResult<()> {
        self.record(ConversationCall::InviteUsers {
            conversation_id: conversation_id.to_string(),
            user_ids: user_ids.to_vec(),
        });

        match &self.state.read().unwrap().invite_failure {
            Some(error) => Err(error.clone().into()),
            None => Ok(()),
        }
    }

    async fn kick_user(&self, conversation_id: &str, user_id: &RemoteUserId) -> ClientResult<()> {
        self.record(ConversationCall::KickUser {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.clone(),
        });

        match self.state.read().unwrap().kick_failures.get(user_id) {
            Some(error) => Err(error.clone().into()),
            None => Ok(()),
        }
    }
}
