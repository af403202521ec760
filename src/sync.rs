//! Realtime sync client.
//!
//! A supervised actor task owns the WebSocket connection to the backend,
//! applies every inbound message to the resource cache and the activity
//! log, and reconnects after a fixed delay when the channel drops. The
//! actor is the only code that ever opens the channel, so at most one
//! connection is live at a time by construction.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use crate::activity::{LogEntry, LogLevel};
use crate::context::SyncContext;
use crate::error::Result;
use crate::protocol::WsMessage;

/// Fixed delay before reopening a dropped channel. No backoff: the backend
/// expects clients to poll it back at this cadence.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Lifecycle of the realtime channel. Owned exclusively by the actor;
/// observable through [`SyncHandle::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Inbound half of an established realtime channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = std::result::Result<Message, WsError>> + Send>>;

/// Seam between the reconnect loop and the transport, so the loop can be
/// driven by a scripted connection in tests.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<MessageStream>;
}

/// Production connector: `ws://<host>/ws` via tungstenite.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(host: &str) -> Self {
        Self {
            url: format!("ws://{host}/ws"),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<MessageStream> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        Ok(Box::pin(stream))
    }
}

/// Handle to a running sync actor. Dropping it also cancels the actor.
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Tear down the session: stop reconnecting, drop the connection, wait
    /// for the actor to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the sync actor for this session.
pub fn spawn<C: Connector>(ctx: SyncContext, connector: C) -> SyncHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let task = tokio::spawn(run(ctx, connector, state_tx, shutdown_rx));
    SyncHandle {
        shutdown: shutdown_tx,
        state: state_rx,
        task,
    }
}

async fn run<C: Connector>(
    ctx: SyncContext,
    connector: C,
    state: watch::Sender<ConnectionState>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let _ = state.send(ConnectionState::Connecting);
        let connected = tokio::select! {
            res = connector.connect() => res,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok(stream) => {
                let _ = state.send(ConnectionState::Connected);
                info!("realtime channel connected");
                ctx.append_log(LogEntry::new(
                    LogLevel::System,
                    "Connected to Docker Ant backend",
                    None,
                ))
                .await;
                if read_frames(&ctx, stream, &mut shutdown).await.is_break() {
                    break;
                }
            }
            Err(e) => {
                debug!("realtime connect failed: {e}");
            }
        }

        let _ = state.send(ConnectionState::Disconnected);
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = shutdown.changed() => break,
        }
    }
    let _ = state.send(ConnectionState::Disconnected);
}

/// Pump frames until the channel drops (Continue: reconnect) or shutdown is
/// requested (Break).
async fn read_frames(
    ctx: &SyncContext,
    mut stream: MessageStream,
    shutdown: &mut watch::Receiver<bool>,
) -> std::ops::ControlFlow<()> {
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = shutdown.changed() => return std::ops::ControlFlow::Break(()),
        };
        match frame {
            Some(Ok(Message::Text(text))) => apply_message(ctx, &text).await,
            Some(Ok(Message::Close(_))) | None => {
                warn!("realtime channel closed");
                ctx.append_log(LogEntry::new(
                    LogLevel::Warning,
                    "Lost connection to Docker Ant backend, retrying",
                    None,
                ))
                .await;
                return std::ops::ControlFlow::Continue(());
            }
            Some(Ok(_)) => {} // ping/pong/binary frames carry no state
            Some(Err(e)) => {
                warn!("realtime channel error: {e}");
                ctx.append_log(LogEntry::new(
                    LogLevel::Error,
                    format!("Connection error: {e}"),
                    None,
                ))
                .await;
                return std::ops::ControlFlow::Continue(());
            }
        }
    }
}

/// Decode one inbound frame and apply it to the cache and the log.
///
/// Unparseable payloads are dropped with a diagnostic: the channel stays up
/// and no state changes. Unknown message types are ignored.
pub async fn apply_message(ctx: &SyncContext, text: &str) {
    let msg: WsMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("discarding unparseable frame: {e}");
            return;
        }
    };

    match msg {
        WsMessage::Init {
            containers,
            images,
            networks,
            volumes,
        } => {
            ctx.cache
                .write()
                .await
                .set_all(containers, images, networks, volumes);
        }
        WsMessage::ContainerUpdate { containers } => {
            ctx.cache
                .write()
                .await
                .set(crate::cache::CollectionKey::Containers, containers);
        }
        WsMessage::ContainerCreated { data } => {
            ctx.cache
                .write()
                .await
                .invalidate(crate::cache::CollectionKey::Containers);
            ctx.append_log(LogEntry::new(
                LogLevel::Success,
                format!("Container created: {}", data.label()),
                data.id,
            ))
            .await;
        }
        WsMessage::ContainerEvent {
            container_id,
            action,
            status,
            message,
        } => {
            ctx.cache
                .write()
                .await
                .invalidate(crate::cache::CollectionKey::Containers);
            let level = if status == "error" {
                LogLevel::Error
            } else {
                LogLevel::Success
            };
            let message = message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Container {action}"));
            ctx.append_log(LogEntry::new(level, message, Some(container_id)))
                .await;
        }
        WsMessage::NetworkCreated { data } => {
            ctx.cache
                .write()
                .await
                .invalidate(crate::cache::CollectionKey::Networks);
            ctx.append_log(LogEntry::new(
                LogLevel::Success,
                format!("Network created: {}", data.label()),
                None,
            ))
            .await;
        }
        WsMessage::VolumeCreated { data } => {
            ctx.cache
                .write()
                .await
                .invalidate(crate::cache::CollectionKey::Volumes);
            ctx.append_log(LogEntry::new(
                LogLevel::Success,
                format!("Volume created: {}", data.label()),
                None,
            ))
            .await;
        }
        WsMessage::ActivityLog { data } => {
            ctx.append_log(data).await;
        }
        WsMessage::Unknown => {}
    }
}
