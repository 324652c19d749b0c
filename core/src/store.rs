/// Chat store — the single process-local state owner
///
/// An explicit, constructed object rather than module-level mutable state.
/// Readers subscribe to `StoreUpdate` notifications and take snapshots;
/// only the engine and directory mutate, and every mutation reads current
/// state under the write lock immediately before writing. External event
/// adapters (e.g. another client session) feed the same mutator path.
use crate::model::{Conversation, TypingEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// What changed, for subscribers that render selectively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreUpdate {
    Conversations,
    Selection,
    Input,
    Typing,
    Directory,
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    /// Sorted by last activity, newest first
    pub conversations: Vec<Conversation>,
    pub selected_id: Option<String>,
    /// Compose-input buffer
    pub input: String,
    /// Set while an edit is in progress
    pub editing_message_id: Option<String>,
    /// Remote typing entries per conversation
    pub typing: HashMap<String, Vec<TypingEntry>>,
    /// Last directory failure, surfaced inline until retried
    pub directory_error: Option<String>,
    pub directory_loading: bool,
}

impl ChatState {
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn selected(&self) -> Option<&Conversation> {
        let id = self.selected_id.as_deref()?;
        self.conversation(id)
    }
}

#[derive(Clone)]
pub struct ChatStore {
    state: Arc<RwLock<ChatState>>,
    updates: broadcast::Sender<StoreUpdate>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(ChatState::default())),
            updates,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreUpdate> {
        self.updates.subscribe()
    }

    /// Read access without cloning the whole state
    pub async fn read<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Full snapshot for readers that need owned data
    pub async fn snapshot(&self) -> ChatState {
        self.state.read().await.clone()
    }

    /// Apply one mutation and notify subscribers. The closure sees current
    /// state under the write lock, so there are no stale-read writes.
    pub async fn update<R>(
        &self,
        kind: StoreUpdate,
        f: impl FnOnce(&mut ChatState) -> R,
    ) -> R {
        let mut state = self.state.write().await;
        let result = f(&mut state);
        drop(state);
        let _ = self.updates.send(kind);
        result
    }

    /// Mutate one conversation by id; returns false (and does not notify)
    /// when the conversation is unknown. The keyed lookup is what makes
    /// late-arriving results for non-selected conversations apply safely.
    pub async fn update_conversation(
        &self,
        conversation_id: &str,
        f: impl FnOnce(&mut Conversation),
    ) -> bool {
        let mut state = self.state.write().await;
        let Some(conversation) = state.conversation_mut(conversation_id) else {
            return false;
        };
        f(conversation);
        drop(state);
        let _ = self.updates.send(StoreUpdate::Conversations);
        true
    }

    pub async fn selected_id(&self) -> Option<String> {
        self.state.read().await.selected_id.clone()
    }

    /// Fold one remote typing signal. Self-originated events are the
    /// caller's concern; this only maintains the (conversation, user) set.
    pub async fn set_typing(
        &self,
        conversation_id: &str,
        user_id: &str,
        user_name: Option<String>,
        is_typing: bool,
    ) {
        let changed = {
            let mut state = self.state.write().await;
            let entries = state.typing.entry(conversation_id.to_string()).or_default();
            let existing = entries.iter().position(|e| e.user_id == user_id);
            let changed = match (is_typing, existing) {
                (true, Some(idx)) => {
                    entries[idx] = TypingEntry {
                        user_id: user_id.to_string(),
                        user_name,
                    };
                    true
                }
                (true, None) => {
                    entries.push(TypingEntry {
                        user_id: user_id.to_string(),
                        user_name,
                    });
                    true
                }
                (false, Some(idx)) => {
                    entries.remove(idx);
                    true
                }
                (false, None) => false,
            };
            if state
                .typing
                .get(conversation_id)
                .is_some_and(|e| e.is_empty())
            {
                state.typing.remove(conversation_id);
            }
            changed
        };
        if changed {
            let _ = self.updates.send(StoreUpdate::Typing);
        }
    }

    /// Remote typing entries for one conversation
    pub async fn typing_for(&self, conversation_id: &str) -> Vec<TypingEntry> {
        self.state
            .read()
            .await
            .typing
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn typing_entries_are_keyed_by_user() {
        let store = ChatStore::new();
        store.set_typing("c1", "u2", None, true).await;
        store
            .set_typing("c1", "u2", Some("Alice".to_string()), true)
            .await;
        store.set_typing("c1", "u3", None, true).await;

        let entries = store.typing_for("c1").await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_name.as_deref(), Some("Alice"));

        store.set_typing("c1", "u2", None, false).await;
        store.set_typing("c1", "u3", None, false).await;
        assert!(store.typing_for("c1").await.is_empty());
        // removing again is a no-op
        store.set_typing("c1", "u3", None, false).await;
    }

    #[tokio::test]
    async fn updates_notify_subscribers() {
        let store = ChatStore::new();
        let mut rx = store.subscribe();
        store
            .update(StoreUpdate::Input, |state| {
                state.input = "hello".to_string();
            })
            .await;
        assert_eq!(rx.recv().await.unwrap(), StoreUpdate::Input);
        assert_eq!(store.read(|s| s.input.clone()).await, "hello");
    }

    #[tokio::test]
    async fn unknown_conversation_update_is_ignored() {
        let store = ChatStore::new();
        let applied = store
            .update_conversation("missing", |c| c.unread += 1)
            .await;
        assert!(!applied);
    }
}
