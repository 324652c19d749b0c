/// ChatLink - Realtime Conversation Synchronization Core
///
/// The client-side state machine of a chat application: it reconciles a
/// local conversation/message model against a REST backend and a push
/// event channel, keeping one canonical, consistently ordered view of
/// every conversation across optimistic local mutations, asynchronous
/// REST responses, and out-of-band push events.

pub mod channel;
pub mod client;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod receipts;
pub mod rest;
pub mod store;
pub mod typing;
pub mod wire;

pub use channel::ChannelStatus;
pub use client::ChatClient;
pub use config::Config;
pub use directory::ConversationDirectory;
pub use engine::SyncEngine;
pub use error::{ChatError, Result};
pub use events::{OutboundEvent, PushEvent};
pub use model::{Conversation, Message, TypingEntry};
pub use rest::RestClient;
pub use store::{ChatStore, StoreUpdate};
pub use typing::TypingCoordinator;
