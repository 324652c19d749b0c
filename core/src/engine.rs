/// Message synchronization engine
///
/// Owns every mutation of the chat store: optimistic local writes from UI
/// actions, reconciliation against REST responses, and the idempotent fold
/// of push events. Network failures during reads degrade to last-known-good
/// state; failures during writes fall back to optimistic local state that
/// the next authoritative fetch supersedes. A fold never enters an error
/// state — bad events are logged and skipped, one at a time.
use crate::events::PushEvent;
use crate::model::{sort_by_timestamp, Message};
use crate::receipts::{DeliveryStatus, ReactionState};
use crate::rest::RestClient;
use crate::store::{ChatStore, StoreUpdate};
use crate::wire::BackendMessage;
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SyncEngine {
    rest: RestClient,
    store: ChatStore,
    /// Resolved local identity; mutating operations are no-ops without one
    user_id: Option<String>,
}

impl SyncEngine {
    pub fn new(rest: RestClient, store: ChatStore, user_id: Option<String>) -> Self {
        Self {
            rest,
            store,
            user_id,
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    fn user(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Fold inbound push events until the channel closes
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<PushEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Push event stream ended");
    }

    // ─── UI-facing operations ────────────────────────────────────────────────

    /// Switch the active conversation. Selecting triggers a full message
    /// refetch and a mark-read up to the last message from someone else;
    /// the local unread counter is zeroed once the mark-read call has been
    /// issued, regardless of its outcome (divergence until the next fetch
    /// is a known, accepted state).
    pub async fn select_conversation(&self, conversation_id: Option<&str>) {
        self.store
            .update(StoreUpdate::Selection, |state| {
                state.selected_id = conversation_id.map(str::to_string);
            })
            .await;

        let (Some(id), Some(user)) = (conversation_id, self.user()) else {
            return;
        };

        let backend = match self.rest.get_messages(id, user).await {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Failed to fetch messages for {}, keeping local data: {}", id, e);
                return;
            }
        };
        let mapped: Vec<Message> = backend
            .iter()
            .map(|m| Message::from_backend(m, user))
            .collect();
        self.store
            .update_conversation(id, |c| c.messages = mapped)
            .await;

        let last_other = backend
            .iter()
            .filter(|m| m.sender_id != user)
            .max_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(last_other) = last_other {
            if let Err(e) = self.rest.update_last_read(id, user, &last_other.id).await {
                warn!("Failed to mark conversation {} read: {}", id, e);
            }
            self.store.update_conversation(id, |c| c.unread = 0).await;
        }
    }

    /// Update the compose-input buffer
    pub async fn set_input(&self, text: &str) {
        self.store
            .update(StoreUpdate::Input, |state| {
                state.input = text.to_string();
            })
            .await;
    }

    /// Load a message body into the input buffer and record the edit target
    pub async fn start_edit(&self, message_id: &str) {
        self.store
            .update(StoreUpdate::Input, |state| {
                let Some(body) = state
                    .selected()
                    .and_then(|c| c.message(message_id))
                    .map(|m| m.body.clone())
                else {
                    return;
                };
                state.editing_message_id = Some(message_id.to_string());
                state.input = body;
            })
            .await;
    }

    pub async fn cancel_edit(&self) {
        self.store
            .update(StoreUpdate::Input, |state| {
                state.editing_message_id = None;
                state.input.clear();
            })
            .await;
    }

    /// Send the given body to the active conversation, or apply it as an
    /// edit when one is in progress. No-op on blank input, no selection,
    /// or no identity.
    pub async fn send(&self, body: &str) {
        let Some(user) = self.user() else { return };
        let body = body.trim();
        if body.is_empty() {
            return;
        }
        let (selected, editing) = self
            .store
            .read(|s| (s.selected_id.clone(), s.editing_message_id.clone()))
            .await;
        let Some(conversation_id) = selected else { return };

        if let Some(editing_id) = editing {
            self.apply_edit(&conversation_id, &editing_id, user, body).await;
        } else {
            self.apply_send(&conversation_id, user, body).await;
        }

        self.store
            .update(StoreUpdate::Input, |state| {
                state.editing_message_id = None;
                state.input.clear();
            })
            .await;
    }

    async fn apply_edit(&self, conversation_id: &str, message_id: &str, user: &str, body: &str) {
        match self
            .rest
            .edit_message(conversation_id, message_id, user, body)
            .await
        {
            Ok(updated) => {
                let mapped = Message::from_backend(&updated, user);
                self.store
                    .update_conversation(conversation_id, |c| {
                        if let Some(m) = c.message_mut(message_id) {
                            *m = mapped;
                        }
                    })
                    .await;
            }
            Err(e) => {
                warn!("Failed to edit via backend, updating locally: {}", e);
                let body = body.to_string();
                self.store
                    .update_conversation(conversation_id, |c| {
                        if let Some(m) = c.message_mut(message_id) {
                            m.body = body;
                        }
                    })
                    .await;
            }
        }
    }

    async fn apply_send(&self, conversation_id: &str, user: &str, body: &str) {
        match self.rest.send_message(conversation_id, user, body).await {
            Ok(created) => {
                let mapped = Message::from_backend(&created, user);
                self.store
                    .update(StoreUpdate::Conversations, |state| {
                        if let Some(c) = state.conversation_mut(conversation_id) {
                            c.last_message = created.body.clone();
                            c.timestamp = created.created_at.clone();
                            // The push-event refetch may have landed first;
                            // replace by id instead of appending a duplicate
                            match c.message_mut(&mapped.id) {
                                Some(existing) => *existing = mapped,
                                None => c.messages.push(mapped),
                            }
                        }
                        sort_by_timestamp(&mut state.conversations);
                    })
                    .await;
            }
            Err(e) => {
                // Availability over consistency: keep the UI responsive with
                // a provisional message; the next fetch replaces it
                warn!("Failed to send to backend, appending locally: {}", e);
                let local = Message::local_fallback(body);
                let body = body.to_string();
                self.store
                    .update(StoreUpdate::Conversations, |state| {
                        if let Some(c) = state.conversation_mut(conversation_id) {
                            c.last_message = body;
                            c.timestamp = local.created_at.clone();
                            c.messages.push(local);
                        }
                        sort_by_timestamp(&mut state.conversations);
                    })
                    .await;
            }
        }
    }

    /// Soft-delete: tombstone locally on success and failure alike, so the
    /// content disappears immediately; the next sync is authoritative
    pub async fn delete_message(&self, message_id: &str) {
        let Some(user) = self.user() else { return };
        let Some(conversation_id) = self.store.selected_id().await else {
            return;
        };
        if let Err(e) = self
            .rest
            .delete_message(&conversation_id, message_id, user)
            .await
        {
            warn!("Failed to delete via backend, marking locally: {}", e);
        }
        self.store
            .update_conversation(&conversation_id, |c| {
                if let Some(m) = c.message_mut(message_id) {
                    m.is_deleted = true;
                    m.body.clear();
                }
            })
            .await;
    }

    /// One reaction per user per message, last-chosen-wins: remove when
    /// re-picking the same emoji, change when picking a different one,
    /// add otherwise. The response carries the authoritative message.
    pub async fn react(&self, message_id: &str, emoji: &str) {
        let Some(user) = self.user() else { return };
        if emoji.is_empty() {
            return;
        }
        let existing = self
            .store
            .read(|s| {
                s.conversations
                    .iter()
                    .find_map(|c| c.message(message_id))
                    .and_then(|m| m.reactions.my_reaction().map(str::to_string))
            })
            .await;

        let result = match existing.as_deref() {
            Some(current) if current == emoji => {
                self.rest.remove_reaction(message_id, user, emoji).await
            }
            Some(_) => self.rest.change_reaction(message_id, user, emoji).await,
            None => self.rest.add_reaction(message_id, user, emoji).await,
        };

        match result {
            Ok(updated) => self.fold_canonical_message(&updated).await,
            Err(e) => warn!("Failed to update reaction: {}", e),
        }
    }

    /// Replace one message with the canonical state a write returned
    async fn fold_canonical_message(&self, updated: &BackendMessage) {
        let Some(user) = self.user() else { return };
        let mapped = Message::from_backend(updated, user);
        self.store
            .update_conversation(&updated.conversation_id, |c| {
                if let Some(m) = c.message_mut(&mapped.id) {
                    *m = mapped;
                }
            })
            .await;
    }

    // ─── Reconciliation ──────────────────────────────────────────────────────

    /// Full refetch of one conversation's messages. The fetched list is
    /// authoritative and used verbatim; the merge is keyed by conversation
    /// id, so a late result for a non-selected conversation applies safely.
    pub async fn sync_conversation(&self, conversation_id: &str, bump_unread: bool) {
        let Some(user) = self.user() else { return };
        let backend = match self.rest.get_messages(conversation_id, user).await {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Failed to sync conversation {}: {}", conversation_id, e);
                return;
            }
        };
        let mapped: Vec<Message> = backend
            .iter()
            .map(|m| Message::from_backend(m, user))
            .collect();
        let latest = backend.last().cloned();

        self.store
            .update(StoreUpdate::Conversations, |state| {
                let selected = state.selected_id.clone();
                let Some(c) = state.conversation_mut(conversation_id) else {
                    return;
                };
                c.messages = mapped;
                if let Some(latest) = &latest {
                    c.last_message = latest.body.clone();
                    c.timestamp = latest.created_at.clone();
                }
                c.unread = if selected.as_deref() == Some(conversation_id) {
                    0
                } else if bump_unread {
                    c.unread + 1
                } else {
                    c.unread
                };
                sort_by_timestamp(&mut state.conversations);
            })
            .await;
    }

    // ─── Event fold ──────────────────────────────────────────────────────────

    /// Apply one inbound push event to current state. Idempotent: applying
    /// the same event twice never corrupts state.
    pub async fn handle_event(&self, event: PushEvent) {
        match event {
            PushEvent::NewMessage {
                conversation_id,
                message,
            } => {
                // Events carry a minimal shape; a full refetch guarantees we
                // never diverge on fields the event omits and sidesteps races
                // with a concurrent optimistic send
                let selected = self.store.selected_id().await;
                let is_selected = selected.as_deref() == Some(conversation_id.as_str());
                self.sync_conversation(&conversation_id, !is_selected).await;

                if is_selected {
                    if let Some(user) = self.user() {
                        if message.sender_id != user {
                            if let Err(e) = self
                                .rest
                                .update_last_read(&conversation_id, user, &message.id)
                                .await
                            {
                                warn!("Failed to mark message read: {}", e);
                            }
                        }
                    }
                }
            }
            PushEvent::MessageEdited {
                conversation_id,
                message,
            } => {
                self.store
                    .update_conversation(&conversation_id, |c| {
                        let is_last = c.messages.last().map(|m| m.id == message.id).unwrap_or(false);
                        let Some(m) = c.message_mut(&message.id) else {
                            return;
                        };
                        m.body = message.body.clone();
                        m.is_edited = true;
                        if is_last {
                            c.last_message = message.body.clone();
                        }
                    })
                    .await;
            }
            PushEvent::MessageDeleted {
                conversation_id,
                message_id,
                ..
            } => {
                self.store
                    .update_conversation(&conversation_id, |c| {
                        if let Some(m) = c.message_mut(&message_id) {
                            m.is_deleted = true;
                            m.body.clear();
                        }
                        c.recompute_preview();
                    })
                    .await;
            }
            PushEvent::MessageRead {
                conversation_id,
                user_id,
                message_id,
                message_ids,
                ..
            } => {
                if self.user() == Some(user_id.as_str()) {
                    return;
                }
                let mut ids: BTreeSet<String> = message_ids.unwrap_or_default().into_iter().collect();
                if let Some(id) = message_id {
                    ids.insert(id);
                }
                if ids.is_empty() {
                    return;
                }
                self.store
                    .update_conversation(&conversation_id, |c| {
                        for m in &mut c.messages {
                            if ids.contains(&m.id)
                                && m.is_own()
                                && m.status != Some(DeliveryStatus::Seen)
                            {
                                m.status = Some(DeliveryStatus::Seen);
                            }
                        }
                    })
                    .await;
                // Safety net: re-sync so local state, including receipt
                // maps, matches the backend
                self.sync_conversation(&conversation_id, false).await;
            }
            PushEvent::MessageReactionUpdated {
                conversation_id,
                message_id,
                reactions,
                ..
            } => {
                let me = self.user().unwrap_or_default().to_string();
                let state = ReactionState::derive(Some(&reactions), &me);
                self.store
                    .update_conversation(&conversation_id, |c| {
                        if let Some(m) = c.message_mut(&message_id) {
                            m.reactions = state;
                        }
                    })
                    .await;
            }
            PushEvent::PresenceUpdate {
                user_id,
                is_online,
                last_seen,
            } => {
                self.store
                    .update(StoreUpdate::Conversations, |state| {
                        for c in state
                            .conversations
                            .iter_mut()
                            .filter(|c| c.friend_id.as_deref() == Some(user_id.as_str()))
                        {
                            c.is_online = is_online;
                            // last_seen is only stamped on disconnect; an
                            // online update keeps the previous value
                            if !is_online {
                                if let Some(ls) = &last_seen {
                                    c.last_seen = Some(ls.clone());
                                }
                            }
                        }
                    })
                    .await;
            }
            PushEvent::TypingStart {
                conversation_id,
                user_id,
                sender_name,
            } => {
                if self.user() == Some(user_id.as_str()) {
                    return;
                }
                self.store
                    .set_typing(&conversation_id, &user_id, sender_name, true)
                    .await;
            }
            PushEvent::TypingStop {
                conversation_id,
                user_id,
                ..
            } => {
                if self.user() == Some(user_id.as_str()) {
                    return;
                }
                self.store
                    .set_typing(&conversation_id, &user_id, None, false)
                    .await;
            }
        }
    }
}
