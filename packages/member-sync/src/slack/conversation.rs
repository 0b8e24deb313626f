//! Synchronises email addresses with the members of a Slack conversation.
//!
//! The adapter needs a Slack client authenticated as an app that has been
//! added to the conversation. It only depends on [`ConversationClient`], the
//! handful of Slack calls it actually makes, so any client (or test double)
//! exposing those calls will do.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{ensure_active, Adapter};
use crate::cache::IdentityCache;
use crate::config::SlackConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SyncError};
use crate::pacing::{FixedDelay, Pacer};
use crate::slack::types::{MembersPage, MembersPageRequest, SlackUser};
use crate::types::{ClientResult, RemoteUserId};

/// Members requested per page of `conversations.members`.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// The subset of the Slack Web API used by [`Conversation`].
#[async_trait]
pub trait ConversationClient: Send + Sync {
    /// `conversations.members`: one page of member IDs.
    async fn users_in_conversation(
        &self,
        request: &MembersPageRequest,
    ) -> ClientResult<MembersPage>;

    /// `users.info` for a batch of IDs.
    async fn users_info(&self, user_ids: &[RemoteUserId]) -> ClientResult<Vec<SlackUser>>;

    /// `users.lookupByEmail`.
    async fn user_by_email(&self, email: &str) -> ClientResult<SlackUser>;

    /// `conversations.invite` for a batch of IDs.
    async fn invite_users(
        &self,
        conversation_id: &str,
        user_ids: &[RemoteUserId],
    ) -> ClientResult<()>;

    /// `conversations.kick` for a single ID.
    async fn kick_user(&self, conversation_id: &str, user_id: &RemoteUserId) -> ClientResult<()>;
}

pub struct Conversation<C> {
    client: C,
    conversation_id: String,
    /// email -> Slack ID, needed by `remove_members`.
    cache: IdentityCache,
    page_limit: u32,
    pacer: Arc<dyn Pacer>,
    diagnostics: Diagnostics,
}

impl<C: ConversationClient> Conversation<C> {
    pub fn new(client: C, conversation_id: impl Into<String>) -> Self {
        Self {
            client,
            conversation_id: conversation_id.into(),
            cache: IdentityCache::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
            pacer: Arc::new(FixedDelay::default()),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Build from loaded configuration. The token in `config` is for the host's
    /// client; the adapter only takes the conversation and pacing settings.
    pub fn from_config(client: C, config: &SlackConfig) -> Self {
        Self::new(client, config.conversation_id.clone())
            .with_page_limit(config.page_limit)
            .with_pacer(config.pacer())
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    /// Replace the pacing between removals (default: one second).
    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Arc::new(pacer);
        self
    }

    /// Share a pacer with other adapters, so their removals draw from one
    /// budget.
    pub fn with_shared_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Route this adapter's log events to `dispatch`.
    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.diagnostics = Diagnostics::new(dispatch);
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The email -> Slack ID mappings learned so far.
    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Page through `conversations.members` until Slack stops returning a cursor.
    async fn list_member_ids(&self, cancel: &CancellationToken) -> Result<Vec<RemoteUserId>> {
        const OPERATION: &str = "slack.conversation.fetch.users_in_conversation";

        let mut request = MembersPageRequest {
            conversation_id: self.conversation_id.clone(),
            cursor: String::new(),
            limit: self.page_limit,
        };
        let mut member_ids = Vec::new();

        loop {
            ensure_active(cancel, OPERATION)?;

            let page = self
                .client
                .users_in_conversation(&request)
                .await
                .map_err(|e| SyncError::remote(OPERATION, &self.conversation_id, e))?;

            debug!(
                conversation = %self.conversation_id,
                members = page.members.len(),
                "Fetched page of conversation members"
            );

            let next = page.continuation().map(str::to_owned);
            member_ids.extend(page.members);

            match next {
                Some(cursor) => request.cursor = cursor,
                None => break,
            }
        }

        Ok(member_ids)
    }

    async fn fetch_members(&mut self, cancel: &CancellationToken) -> Result<Vec<String>> {
        const OPERATION: &str = "slack.conversation.fetch.users_info";

        info!(conversation = %self.conversation_id, "Fetching accounts from Slack conversation");

        let member_ids = self.list_member_ids(cancel).await?;

        let users = if member_ids.is_empty() {
            Vec::new()
        } else {
            ensure_active(cancel, OPERATION)?;
            self.client
                .users_info(&member_ids)
                .await
                .map_err(|e| SyncError::remote(OPERATION, &self.conversation_id, e))?
        };

        let mut emails = Vec::with_capacity(users.len());
        let mut observed = HashMap::with_capacity(users.len());

        for user in users.into_iter().filter(|user| !user.is_bot) {
            emails.push(user.profile.email.clone());
            observed.insert(user.profile.email, user.id);
        }

        self.cache.replace_with(observed);

        info!(
            conversation = %self.conversation_id,
            count = emails.len(),
            "Fetched accounts successfully"
        );

        Ok(emails)
    }

    async fn invite_members(
        &mut self,
        emails: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        const LOOKUP: &str = "slack.conversation.add.user_by_email";
        const INVITE: &str = "slack.conversation.add.invite_users";

        if emails.is_empty() {
            return Ok(());
        }

        info!(
            conversation = %self.conversation_id,
            ?emails,
            "Adding accounts to Slack conversation"
        );

        let mut user_ids = Vec::with_capacity(emails.len());

        // Every email must resolve before the conversation is touched.
        for email in emails {
            ensure_active(cancel, LOOKUP)?;

            let user = self
                .client
                .user_by_email(email)
                .await
                .map_err(|e| SyncError::remote(LOOKUP, email, e))?;

            self.cache.insert(email.clone(), user.id.clone());
            user_ids.push(user.id);
        }

        ensure_active(cancel, INVITE)?;

        if let Err(e) = self.client.invite_users(&self.conversation_id, &user_ids).await {
            // Which of the invites landed is unknown; force a fresh fetch.
            self.cache.reset();
            warn!(conversation = %self.conversation_id, "Invite failed, identity cache discarded");

            return Err(SyncError::remote(INVITE, &self.conversation_id, e));
        }

        info!(conversation = %self.conversation_id, "Finished adding accounts successfully");

        Ok(())
    }

    async fn kick_members(&mut self, emails: &[String], cancel: &CancellationToken) -> Result<()> {
        const OPERATION: &str = "slack.conversation.remove.kick_user";

        info!(
            conversation = %self.conversation_id,
            ?emails,
            "Removing accounts from Slack conversation"
        );

        if self.cache.is_empty() {
            return Err(SyncError::CacheEmpty {
                operation: "slack.conversation.remove",
            });
        }

        for email in emails {
            let user_id = self
                .cache
                .get(email)
                .cloned()
                .ok_or_else(|| SyncError::NotCached {
                    operation: "slack.conversation.remove",
                    email: email.clone(),
                })?;

            self.pacer
                .acquire(cancel)
                .await
                .map_err(|_| SyncError::Cancelled { operation: OPERATION })?;
            ensure_active(cancel, OPERATION)?;

            self.client
                .kick_user(&self.conversation_id, &user_id)
                .await
                .map_err(|e| {
                    let target = format!("{}, {} ({})", self.conversation_id, email, user_id);
                    SyncError::remote(OPERATION, target, e)
                })?;

            self.pacer.completed();
            self.cache.evict(email);
            debug!(conversation = %self.conversation_id, %user_id, "Removed account");
        }

        info!(conversation = %self.conversation_id, "Finished removing accounts successfully");

        Ok(())
    }
}

#[async_trait]
impl<C: ConversationClient> Adapter for Conversation<C> {
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let diagnostics = self.diagnostics.clone();
        diagnostics.scope(self.fetch_members(cancel)).await
    }

    async fn add_members(&mut self, emails: &[String], cancel: &CancellationToken) -> Result<()> {
        let diagnostics = self.diagnostics.clone();
        diagnostics.scope(self.invite_members(emails, cancel)).await
    }

    async fn remove_members(
        &mut self,
        emails: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let diagnostics = self.diagnostics.clone();
        diagnostics.scope(self.kick_members(emails, cancel)).await
    }
}

impl<C> std::fmt::Debug for Conversation<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("conversation_id", &self.conversation_id)
            .field("cached", &self.cache.len())
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::Unpaced;
    use crate::testing::{ConversationCall, MockConversationClient};

    fn emails(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn adapter(client: &MockConversationClient) -> Conversation<MockConversationClient> {
        Conversation::new(client.clone(), "C0TEST").with_pacer(Unpaced)
    }

    #[test]
    fn test_new_makes_no_calls() {
        let client = MockConversationClient::new();
        let conversation = Conversation::new(client.clone(), "C0TEST");

        assert_eq!(conversation.conversation_id(), "C0TEST");
        assert!(conversation.cache().is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_follows_cursors_and_skips_bots() {
        let client = MockConversationClient::new()
            .with_page("", MembersPage::new(vec!["U1".into(), "B1".into()], "c1"))
            .with_page("c1", MembersPage::last(vec!["U2".into()]))
            .with_user(SlackUser::human("U1", "foo@example.com"))
            .with_user(SlackUser::bot("B1", "bot@example.com"))
            .with_user(SlackUser::human("U2", "bar@example.com"));
        let mut conversation = adapter(&client);

        let mut fetched = conversation.fetch(&CancellationToken::new()).await.unwrap();
        fetched.sort();

        assert_eq!(fetched, emails(&["bar@example.com", "foo@example.com"]));
        assert_eq!(conversation.cache().len(), 2);
        assert!(!conversation.cache().contains("bot@example.com"));
        assert_eq!(client.page_cursors(), vec!["".to_string(), "c1".to_string()]);
        assert_eq!(client.page_requests()[0].limit, DEFAULT_PAGE_LIMIT);
    }

    #[tokio::test]
    async fn test_fetch_page_failure_leaves_cache_untouched() {
        let client = MockConversationClient::new()
            .with_page("", MembersPage::new(vec!["U1".into()], "c1"))
            .with_user(SlackUser::human("U1", "foo@example.com"))
            .fail_page("c1", "ratelimited");
        let mut conversation = adapter(&client);
        conversation.cache.insert("old@example.com", "U0".into());

        let err = conversation.fetch(&CancellationToken::new()).await.unwrap_err();

        assert!(err.to_string().contains("ratelimited"));
        assert!(err
            .to_string()
            .starts_with("slack.conversation.fetch.users_in_conversation(C0TEST)"));
        assert!(conversation.cache().contains("old@example.com"));
        assert_eq!(conversation.cache().len(), 1);
        assert!(!client
            .calls()
            .iter()
            .any(|call| matches!(call, ConversationCall::UsersInfo { .. })));
    }

    #[tokio::test]
    async fn test_fetch_users_info_failure_leaves_cache_untouched() {
        let client = MockConversationClient::new()
            .with_page("", MembersPage::last(vec!["U1".into()]))
            .fail_users_info("user_not_found");
        let mut conversation = adapter(&client);
        conversation.cache.insert("old@example.com", "U0".into());

        let err = conversation.fetch(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Remote { operation: "slack.conversation.fetch.users_info", .. }
        ));
        assert_eq!(conversation.cache().get("old@example.com"), Some(&RemoteUserId::from("U0")));
        assert_eq!(conversation.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_empty_conversation_skips_users_info() {
        let client = MockConversationClient::new().with_page("", MembersPage::last(vec![]));
        let mut conversation = adapter(&client);

        let fetched = conversation.fetch(&CancellationToken::new()).await.unwrap();

        assert!(fetched.is_empty());
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_drops_mappings_for_departed_members() {
        let client = MockConversationClient::new()
            .with_page("", MembersPage::last(vec!["U1".into()]))
            .with_user(SlackUser::human("U1", "foo@example.com"));
        let mut conversation = adapter(&client);
        conversation.cache.insert("departed@example.com", "U9".into());

        conversation.fetch(&CancellationToken::new()).await.unwrap();

        assert!(!conversation.cache().contains("departed@example.com"));
        assert_eq!(conversation.cache().get("foo@example.com"), Some(&RemoteUserId::from("U1")));
    }

    #[tokio::test]
    async fn test_add_resolves_then_invites_once() {
        let client = MockConversationClient::new()
            .with_user(SlackUser::human("U1", "foo@example.com"))
            .with_user(SlackUser::human("U2", "bar@example.com"));
        let mut conversation = adapter(&client);

        conversation
            .add_members(
                &emails(&["foo@example.com", "bar@example.com"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![
                ConversationCall::UserByEmail { email: "foo@example.com".into() },
                ConversationCall::UserByEmail { email: "bar@example.com".into() },
                ConversationCall::InviteUsers {
                    conversation_id: "C0TEST".into(),
                    user_ids: vec!["U1".into(), "U2".into()],
                },
            ]
        );
        assert_eq!(conversation.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_add_lookup_failure_never_invites() {
        let client = MockConversationClient::new()
            .with_user(SlackUser::human("U1", "foo@example.com"));
        let mut conversation = adapter(&client);

        let err = conversation
            .add_members(
                &emails(&["foo@example.com", "missing@example.com"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("slack.conversation.add.user_by_email(missing@example.com)"));
        assert_eq!(client.invite_count(), 0);
        // Resolved before the failure, so already recorded.
        assert!(conversation.cache().contains("foo@example.com"));
    }

    #[tokio::test]
    async fn test_add_invite_failure_discards_whole_cache() {
        let client = MockConversationClient::new()
            .with_page("", MembersPage::last(vec!["U1".into()]))
            .with_user(SlackUser::human("U1", "foo@example.com"))
            .with_user(SlackUser::human("U2", "bar@example.com"))
            .fail_invite("cant_invite");
        let mut conversation = adapter(&client);
        let cancel = CancellationToken::new();
        conversation.fetch(&cancel).await.unwrap();

        let err = conversation
            .add_members(&emails(&["bar@example.com"]), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Remote { operation: "slack.conversation.add.invite_users", .. }
        ));
        assert!(conversation.cache().is_empty());
    }

    #[tokio::test]
    async fn test_add_cancelled_after_lookups_keeps_resolved_ids_and_never_invites() {
        let cancel = CancellationToken::new();
        let client = MockConversationClient::new()
            .with_user(SlackUser::human("U1", "foo@example.com"))
            .with_user(SlackUser::human("U2", "bar@example.com"))
            .cancel_after(2, cancel.clone());
        let mut conversation = adapter(&client);

        let err = conversation
            .add_members(&emails(&["foo@example.com", "bar@example.com"]), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Cancelled { operation: "slack.conversation.add.invite_users" }
        ));
        assert_eq!(client.invite_count(), 0);
        assert_eq!(conversation.cache().get("foo@example.com"), Some(&RemoteUserId::from("U1")));
        assert_eq!(conversation.cache().get("bar@example.com"), Some(&RemoteUserId::from("U2")));
    }

    #[tokio::test]
    async fn test_add_empty_list_is_a_no_op() {
        let client = MockConversationClient::new();
        let mut conversation = adapter(&client);

        conversation.add_members(&[], &CancellationToken::new()).await.unwrap();

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_on_fresh_adapter_is_cache_empty() {
        let client = MockConversationClient::new();
        let mut conversation = adapter(&client);

        let err = conversation
            .remove_members(&emails(&["foo@example.com"]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::CacheEmpty { .. }));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_evicts_each_success_and_stops_at_failure() {
        let client = MockConversationClient::new()
            .with_page("", MembersPage::last(vec!["U1".into(), "U2".into(), "U3".into()]))
            .with_user(SlackUser::human("U1", "a@x.com"))
            .with_user(SlackUser::human("U2", "b@x.com"))
            .with_user(SlackUser::human("U3", "c@x.com"))
            .fail_kick("U2", "cant_kick_self");
        let mut conversation = adapter(&client);
        let cancel = CancellationToken::new();
        conversation.fetch(&cancel).await.unwrap();

        let err = conversation
            .remove_members(&emails(&["a@x.com", "b@x.com", "c@x.com"]), &cancel)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "slack.conversation.remove.kick_user(C0TEST, b@x.com (U2)) -> cant_kick_self"
        );
        assert!(!conversation.cache().contains("a@x.com"));
        assert!(conversation.cache().contains("b@x.com"));
        assert!(conversation.cache().contains("c@x.com"));
        assert_eq!(
            client.kick_requests(),
            vec![RemoteUserId::from("U1"), RemoteUserId::from("U2")]
        );
    }

    #[tokio::test]
    async fn test_remove_unknown_email_issues_no_call() {
        let client = MockConversationClient::new()
            .with_user(SlackUser::human("U1", "a@x.com"));
        let mut conversation = adapter(&client);
        let cancel = CancellationToken::new();
        conversation.add_members(&emails(&["a@x.com"]), &cancel).await.unwrap();

        let err = conversation
            .remove_members(&emails(&["stranger@x.com"]), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NotCached { ref email, .. } if email == "stranger@x.com"));
        assert!(client.kick_requests().is_empty());
        assert!(conversation.cache().contains("a@x.com"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_calls() {
        let client = MockConversationClient::new()
            .with_page("", MembersPage::last(vec!["U1".into()]))
            .with_user(SlackUser::human("U1", "a@x.com"));
        let mut conversation = adapter(&client);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let fetch = conversation.fetch(&cancel).await.unwrap_err();
        let add = conversation.add_members(&emails(&["a@x.com"]), &cancel).await.unwrap_err();

        assert!(matches!(fetch, SyncError::Cancelled { .. }));
        assert!(matches!(add, SyncError::Cancelled { .. }));
        assert!(client.calls().is_empty());
    }
}
