/// REST collaborator client
///
/// Typed wrapper over the backend's HTTP contract. The requesting user
/// travels in the `user-id` header; message bodies travel as query
/// parameters, reactions as JSON, mirroring what the backend expects.
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::wire::{
    BackendMessage, ConversationSummary, MessageDeletion, NewConversationRequest,
    ReactionRequest, RenameConversationRequest,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::warn;

const USER_ID_HEADER: &str = "user-id";

#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, user_id: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .request(method, url)
            .header(USER_ID_HEADER, user_id)
    }

    /// Decode a response, mapping non-success statuses to `ChatError::Api`
    /// with the body preserved
    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("API request failed: {} {}", status, body);
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>().await?)
    }

    async fn check(resp: Response) -> Result<()> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("API request failed: {} {}", status, body);
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    // ─── Messages ────────────────────────────────────────────────────────────

    /// GET /conversations/{id}/messages — authoritative, server-ordered list
    pub async fn get_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Vec<BackendMessage>> {
        let path = format!("/conversations/{}/messages", conversation_id);
        let resp = self.request(Method::GET, &path, user_id).send().await?;
        Self::decode(resp).await
    }

    /// POST /conversations/{id}/messages?body=...
    pub async fn send_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        body: &str,
    ) -> Result<BackendMessage> {
        let path = format!("/conversations/{}/messages", conversation_id);
        let resp = self
            .request(Method::POST, &path, user_id)
            .query(&[("body", body)])
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// PUT /conversations/{id}/messages/{messageId}?new_body=...
    pub async fn edit_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        user_id: &str,
        new_body: &str,
    ) -> Result<BackendMessage> {
        let path = format!("/conversations/{}/messages/{}", conversation_id, message_id);
        let resp = self
            .request(Method::PUT, &path, user_id)
            .query(&[("new_body", new_body)])
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// DELETE /conversations/{id}/messages/{messageId}
    pub async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        user_id: &str,
    ) -> Result<MessageDeletion> {
        let path = format!("/conversations/{}/messages/{}", conversation_id, message_id);
        let resp = self.request(Method::DELETE, &path, user_id).send().await?;
        Self::decode(resp).await
    }

    /// POST /conversations/{id}/read?message_id=... — marks everything up to
    /// and including the given message as read by the caller
    pub async fn update_last_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        message_id: &str,
    ) -> Result<()> {
        let path = format!("/conversations/{}/read", conversation_id);
        let resp = self
            .request(Method::POST, &path, user_id)
            .query(&[("message_id", message_id)])
            .send()
            .await?;
        Self::check(resp).await
    }

    // ─── Reactions ───────────────────────────────────────────────────────────

    /// POST /messages/{id}/reactions
    pub async fn add_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<BackendMessage> {
        let path = format!("/messages/{}/reactions", message_id);
        let resp = self
            .request(Method::POST, &path, user_id)
            .json(&ReactionRequest {
                reaction_type: emoji.to_string(),
            })
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// PUT /messages/{id}/reactions — replaces the caller's previous reaction
    pub async fn change_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<BackendMessage> {
        let path = format!("/messages/{}/reactions", message_id);
        let resp = self
            .request(Method::PUT, &path, user_id)
            .json(&ReactionRequest {
                reaction_type: emoji.to_string(),
            })
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// DELETE /messages/{id}/reactions/{reaction_type}
    pub async fn remove_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<BackendMessage> {
        let path = format!("/messages/{}/reactions/{}", message_id, emoji);
        let resp = self.request(Method::DELETE, &path, user_id).send().await?;
        Self::decode(resp).await
    }

    // ─── Conversation directory ──────────────────────────────────────────────

    /// GET /api/messages/conversations
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let resp = self
            .request(Method::GET, "/api/messages/conversations", user_id)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// POST /api/messages/new_conversation — the response is not guaranteed
    /// to carry the full summary shape; callers re-fetch the directory
    pub async fn create_conversation(
        &self,
        user_id: &str,
        participant_ids: Vec<String>,
    ) -> Result<ConversationSummary> {
        let resp = self
            .request(Method::POST, "/api/messages/new_conversation", user_id)
            .json(&NewConversationRequest { participant_ids })
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// PATCH /api/messages/conversations/{id}
    pub async fn rename_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
        title: &str,
    ) -> Result<()> {
        let path = format!("/api/messages/conversations/{}", conversation_id);
        let resp = self
            .request(Method::PATCH, &path, user_id)
            .json(&RenameConversationRequest {
                title: title.to_string(),
            })
            .send()
            .await?;
        Self::check(resp).await
    }

    /// DELETE /api/messages/conversations/{id}
    pub async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let path = format!("/api/messages/conversations/{}", conversation_id);
        let resp = self.request(Method::DELETE, &path, user_id).send().await?;
        Self::check(resp).await
    }
}
