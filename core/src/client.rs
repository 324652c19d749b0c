/// Application root — wires store, REST client, engine, directory, typing
/// coordinator, and the push channel together
use crate::channel::{self, ChannelHandle, ChannelStatus};
use crate::config::Config;
use crate::directory::ConversationDirectory;
use crate::engine::SyncEngine;
use crate::error::{ChatError, Result};
use crate::rest::RestClient;
use crate::store::ChatStore;
use crate::typing::TypingCoordinator;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub struct ChatClient {
    config: Config,
    store: ChatStore,
    engine: SyncEngine,
    directory: ConversationDirectory,
    user_id: Option<String>,
    typing: Option<TypingCoordinator>,
    channel: Option<ChannelHandle>,
    fold_task: Option<JoinHandle<()>>,
}

impl ChatClient {
    /// Build an unstarted client. `user_id` is the resolved local identity;
    /// without one, every mutating operation is a no-op.
    pub fn new(config: Config, user_id: Option<String>) -> Result<Self> {
        let rest = RestClient::new(&config)?;
        let store = ChatStore::new();
        let engine = SyncEngine::new(rest.clone(), store.clone(), user_id.clone());
        let directory = ConversationDirectory::new(rest, store.clone(), user_id.clone());
        Ok(Self {
            config,
            store,
            engine,
            directory,
            user_id,
            typing: None,
            channel: None,
            fold_task: None,
        })
    }

    /// Connect the push channel, start folding events, and load the
    /// directory. A directory failure degrades (error recorded in the
    /// store) rather than failing startup.
    pub async fn start(&mut self) -> Result<()> {
        let user = self.user_id.clone().ok_or(ChatError::MissingIdentity)?;
        let url = self.config.ws_url_for(&user)?;
        info!("Starting chat client for {} against {}", user, url);

        let (handle, events) = channel::spawn(url, self.config.reconnect_interval);
        self.typing = Some(TypingCoordinator::new(
            handle.sender(),
            self.config.typing_stop_after,
        ));
        let engine = self.engine.clone();
        self.fold_task = Some(tokio::spawn(async move {
            engine.run(events).await;
        }));
        self.channel = Some(handle);

        let _ = self.directory.refresh().await;
        Ok(())
    }

    /// Switch the active conversation; force-stops local typing for the
    /// previous one first
    pub async fn select_conversation(&self, conversation_id: Option<&str>) {
        if let Some(typing) = &self.typing {
            typing.stop();
        }
        self.engine.select_conversation(conversation_id).await;
    }

    /// Feed one compose-buffer change: updates the store and drives the
    /// typing coordinator
    pub async fn input_changed(&self, text: &str) {
        self.engine.set_input(text).await;
        if let Some(typing) = &self.typing {
            let selected = self.store.selected_id().await;
            typing.input_changed(selected.as_deref(), text);
        }
    }

    /// Send the current compose buffer (or apply the in-progress edit)
    pub async fn send(&self) {
        let body = self.store.read(|s| s.input.clone()).await;
        if let Some(typing) = &self.typing {
            typing.stop();
        }
        self.engine.send(&body).await;
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn directory(&self) -> &ConversationDirectory {
        &self.directory
    }

    pub fn typing(&self) -> Option<&TypingCoordinator> {
        self.typing.as_ref()
    }

    /// Channel status for UI indicators; None before `start`
    pub fn channel_status(&self) -> Option<watch::Receiver<ChannelStatus>> {
        self.channel.as_ref().map(|c| c.status())
    }

    /// Stop typing, the fold loop, and the push channel
    pub fn shutdown(&mut self) {
        if let Some(typing) = self.typing.take() {
            typing.stop();
        }
        if let Some(task) = self.fold_task.take() {
            task.abort();
        }
        if let Some(channel) = self.channel.take() {
            channel.shutdown();
        }
        info!("Chat client stopped");
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
