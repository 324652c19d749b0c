/// Conversation directory
///
/// Fetches and maintains the ordered list of conversation summaries. A
/// failed refresh surfaces an error but preserves the last-known-good
/// list; create/rename/delete are thin proxies over the REST contract.
use crate::error::{ChatError, Result};
use crate::model::{sort_by_timestamp, Conversation};
use crate::rest::RestClient;
use crate::store::{ChatStore, StoreUpdate};
use crate::wire::ConversationSummary;
use tracing::warn;

#[derive(Clone)]
pub struct ConversationDirectory {
    rest: RestClient,
    store: ChatStore,
    user_id: Option<String>,
}

impl ConversationDirectory {
    pub fn new(rest: RestClient, store: ChatStore, user_id: Option<String>) -> Self {
        Self {
            rest,
            store,
            user_id,
        }
    }

    fn user(&self) -> Result<&str> {
        self.user_id.as_deref().ok_or(ChatError::MissingIdentity)
    }

    /// Refetch all summaries and merge them into the store. Merging is
    /// keyed by conversation id and preserves already-fetched message
    /// lists (the summary payload carries none). Failure keeps the
    /// existing list and records the error.
    pub async fn refresh(&self) -> Result<()> {
        let user = match self.user() {
            Ok(user) => user,
            Err(e) => {
                self.store
                    .update(StoreUpdate::Directory, |state| {
                        state.directory_error = Some(e.to_string());
                        state.directory_loading = false;
                    })
                    .await;
                return Err(e);
            }
        };
        self.store
            .update(StoreUpdate::Directory, |state| {
                state.directory_loading = true;
                state.directory_error = None;
            })
            .await;

        match self.rest.list_conversations(user).await {
            Ok(summaries) => {
                let mapped: Vec<Conversation> = summaries
                    .iter()
                    .map(|s| Conversation::from_summary(s, user))
                    .collect();
                self.store
                    .update(StoreUpdate::Conversations, |state| {
                        let mut next = mapped;
                        for conversation in &mut next {
                            if let Some(existing) = state.conversation(&conversation.id) {
                                conversation.messages = existing.messages.clone();
                            }
                        }
                        sort_by_timestamp(&mut next);
                        state.conversations = next;
                        state.directory_loading = false;
                    })
                    .await;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to list conversations, keeping existing: {}", e);
                self.store
                    .update(StoreUpdate::Directory, |state| {
                        state.directory_error = Some(e.to_string());
                        state.directory_loading = false;
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Create a conversation with the given participants. The creation
    /// response is not guaranteed to carry the full summary shape, so the
    /// caller follows up with `refresh`.
    pub async fn create(&self, participant_ids: Vec<String>) -> Result<ConversationSummary> {
        let user = self.user()?;
        self.rest.create_conversation(user, participant_ids).await
    }

    /// Record a failed directory operation for inline display
    async fn record_failure(&self, e: &ChatError) {
        self.store
            .update(StoreUpdate::Directory, |state| {
                state.directory_error = Some(e.to_string());
            })
            .await;
    }

    /// Delete a conversation; removes the local entry only after server success
    pub async fn delete(&self, conversation_id: &str) -> Result<()> {
        let user = self.user()?;
        if let Err(e) = self.rest.delete_conversation(conversation_id, user).await {
            self.record_failure(&e).await;
            return Err(e);
        }
        self.store
            .update(StoreUpdate::Conversations, |state| {
                state.conversations.retain(|c| c.id != conversation_id);
                if state.selected_id.as_deref() == Some(conversation_id) {
                    state.selected_id = None;
                }
            })
            .await;
        Ok(())
    }

    /// Rename a group conversation; mutates the local entry on success
    pub async fn rename(&self, conversation_id: &str, title: &str) -> Result<()> {
        let user = self.user()?;
        if let Err(e) = self
            .rest
            .rename_conversation(conversation_id, user, title)
            .await
        {
            self.record_failure(&e).await;
            return Err(e);
        }
        let title = title.to_string();
        self.store
            .update_conversation(conversation_id, |c| c.name = title)
            .await;
        Ok(())
    }
}
