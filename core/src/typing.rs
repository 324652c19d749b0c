/// Typing presence coordinator — local emission side
///
/// Emits one `typing_start` when the compose buffer first becomes
/// non-empty for the active conversation, and one `typing_stop` after the
/// inactivity window, when the buffer empties, or when the conversation
/// changes. At most one conversation is "typing" locally at a time.
/// Remote typing aggregation is the store's per-conversation entry set,
/// fed by the engine's event fold.
use crate::events::OutboundEvent;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Default)]
struct LocalTyping {
    /// Conversation an un-stopped typing_start was sent for
    conversation_id: Option<String>,
    /// Pending inactivity timer; aborted on every keystroke
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct TypingCoordinator {
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    stop_after: Duration,
    inner: Arc<Mutex<LocalTyping>>,
}

impl TypingCoordinator {
    pub fn new(outbound: mpsc::UnboundedSender<OutboundEvent>, stop_after: Duration) -> Self {
        Self {
            outbound,
            stop_after,
            inner: Arc::new(Mutex::new(LocalTyping::default())),
        }
    }

    /// Feed one input-buffer change for the active conversation. Passing
    /// `None` (no selection) or an empty buffer force-stops; a different
    /// conversation than the one currently typing stops the old one first.
    pub fn input_changed(&self, conversation_id: Option<&str>, input: &str) {
        let Some(conversation_id) = conversation_id else {
            self.stop();
            return;
        };

        let switching = {
            let inner = self.inner.lock().expect("typing state poisoned");
            inner
                .conversation_id
                .as_deref()
                .is_some_and(|current| current != conversation_id)
        };
        if switching {
            self.stop();
        }

        if input.trim().is_empty() {
            self.stop();
            return;
        }

        let mut inner = self.inner.lock().expect("typing state poisoned");
        if inner.conversation_id.is_none() {
            let _ = self.outbound.send(OutboundEvent::TypingStart {
                conversation_id: conversation_id.to_string(),
            });
            inner.conversation_id = Some(conversation_id.to_string());
        }

        // Every keystroke resets the inactivity timer
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        let this = self.clone();
        let stop_after = self.stop_after;
        inner.timer = Some(tokio::spawn(async move {
            sleep(stop_after).await;
            this.stop();
        }));
    }

    /// Emit `typing_stop` for the recorded conversation, if any. Idempotent;
    /// also invoked on conversation change and shutdown so the timer never
    /// fires against a stale conversation id.
    pub fn stop(&self) {
        let (conversation_id, timer) = {
            let mut inner = self.inner.lock().expect("typing state poisoned");
            (inner.conversation_id.take(), inner.timer.take())
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(conversation_id) = conversation_id {
            let _ = self
                .outbound
                .send(OutboundEvent::TypingStop { conversation_id });
        }
    }
}

impl Drop for LocalTyping {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
