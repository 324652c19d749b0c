/// Transport channel — persistent per-user push connection
///
/// A spawned task owns the websocket. Inbound text frames parse to
/// `PushEvent` and flow out an mpsc; malformed frames are logged and
/// skipped so one bad payload never stops the stream. Outbound events
/// serialize onto the socket; while disconnected they are dropped, not
/// queued. Any close or error reconnects after a fixed interval.
use crate::events::{OutboundEvent, PushEvent};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Connection state, mirrored for UI readers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Idle,
    Connecting,
    Open,
    Error,
}

/// Handle to a running channel task
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    status: watch::Receiver<ChannelStatus>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Sender for client→server events. Sends while disconnected are dropped.
    pub fn sender(&self) -> mpsc::UnboundedSender<OutboundEvent> {
        self.outbound.clone()
    }

    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Spawn the channel task for one user's endpoint. Returns the handle and
/// the stream of parsed inbound events.
pub fn spawn(
    url: String,
    reconnect_interval: Duration,
) -> (ChannelHandle, mpsc::UnboundedReceiver<PushEvent>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(ChannelStatus::Idle);

    let task = tokio::spawn(run(url, reconnect_interval, events_tx, outbound_rx, status_tx));

    (
        ChannelHandle {
            outbound: outbound_tx,
            status: status_rx,
            task,
        },
        events_rx,
    )
}

async fn run(
    url: String,
    reconnect_interval: Duration,
    events_tx: mpsc::UnboundedSender<PushEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundEvent>,
    status_tx: watch::Sender<ChannelStatus>,
) {
    loop {
        let _ = status_tx.send(ChannelStatus::Connecting);
        match connect_async(&url).await {
            Ok((ws, _response)) => {
                info!("Push channel connected: {}", url);
                let _ = status_tx.send(ChannelStatus::Open);
                let (mut sink, mut stream) = ws.split();

                loop {
                    tokio::select! {
                        out = outbound_rx.recv() => {
                            let Some(event) = out else {
                                // All senders dropped: shut the channel down
                                let _ = sink.send(Message::Close(None)).await;
                                let _ = status_tx.send(ChannelStatus::Idle);
                                return;
                            };
                            let text = match serde_json::to_string(&event) {
                                Ok(text) => text,
                                Err(e) => {
                                    warn!("Failed to serialize outbound event: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                error!("Push channel send error: {}", e);
                                break;
                            }
                        }
                        frame = stream.next() => {
                            match frame {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<PushEvent>(text.as_str()) {
                                        Ok(event) => {
                                            debug!(
                                                "Push event received (conversation {:?})",
                                                event.conversation_id()
                                            );
                                            if events_tx.send(event).is_err() {
                                                // Receiver gone: nothing left to fold into
                                                let _ = status_tx.send(ChannelStatus::Idle);
                                                return;
                                            }
                                        }
                                        Err(e) => {
                                            warn!("Skipping malformed push event: {}", e);
                                        }
                                    }
                                }
                                Some(Ok(Message::Ping(_)))
                                | Some(Ok(Message::Pong(_)))
                                | Some(Ok(Message::Binary(_)))
                                | Some(Ok(Message::Frame(_))) => {}
                                Some(Ok(Message::Close(_))) | None => {
                                    info!("Push channel closed by server");
                                    break;
                                }
                                Some(Err(e)) => {
                                    error!("Push channel read error: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Push channel connect failed: {}", e);
            }
        }

        let _ = status_tx.send(ChannelStatus::Error);

        // Fixed-interval reconnect; outbound events arriving while
        // disconnected are dropped rather than queued
        let wait = sleep(reconnect_interval);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = &mut wait => break,
                out = outbound_rx.recv() => {
                    match out {
                        Some(event) => debug!("Dropping outbound event while disconnected: {:?}", event),
                        None => {
                            let _ = status_tx.send(ChannelStatus::Idle);
                            return;
                        }
                    }
                }
            }
        }
    }
}
