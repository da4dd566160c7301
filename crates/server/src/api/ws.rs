//! WebSocket support for real-time session updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use stillfade_core::{EngineStatus, OutputVideo, SessionEvent, SessionSnapshot};
use stillfade_core::upload::SourceSummary;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::video::object_url;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full session state, sent once on connect.
    Snapshot { session: SessionSnapshot },
    /// Engine lifecycle changed.
    EngineStatus { status: EngineStatus },
    /// A transcode started or finished.
    Generating { active: bool },
    /// Transcode progress, 0 - 100.
    Progress { percent: u8 },
    /// A new source image was accepted.
    SourceChanged { source: SourceSummary },
    /// A clip was published.
    OutputReady { output: OutputVideo, url: String },
    /// The session error changed.
    Error { message: String },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::Snapshot { .. } => "snapshot",
            WsMessage::EngineStatus { .. } => "engine_status",
            WsMessage::Generating { .. } => "generating",
            WsMessage::Progress { .. } => "progress",
            WsMessage::SourceChanged { .. } => "source_changed",
            WsMessage::OutputReady { .. } => "output_ready",
            WsMessage::Error { .. } => "error",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl From<&SessionEvent> for WsMessage {
    fn from(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::EngineStatus { status } => WsMessage::EngineStatus {
                status: status.clone(),
            },
            SessionEvent::Generating { active } => WsMessage::Generating { active: *active },
            SessionEvent::Progress { percent } => WsMessage::Progress { percent: *percent },
            SessionEvent::SourceChanged { source } => WsMessage::SourceChanged {
                source: source.clone(),
            },
            SessionEvent::OutputReady { output } => WsMessage::OutputReady {
                url: object_url(&output.object),
                output: output.clone(),
            },
            SessionEvent::Error { message } => WsMessage::Error {
                message: message.clone(),
            },
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Send errors only mean no one is listening.
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    /// Forward a session event to all clients.
    pub fn session_event(&self, event: &SessionEvent) {
        self.broadcast(WsMessage::from(event));
    }

    /// Broadcast a heartbeat every `period` until the task is aborted.
    pub fn spawn_heartbeat(&self, period: Duration) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                broadcaster.broadcast(WsMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                });
            }
        })
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn send_message(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> bool {
    WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            true
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so no event falls in between.
    let mut rx = state.ws_broadcaster().subscribe();
    let snapshot = WsMessage::Snapshot {
        session: state.session().snapshot().await,
    };

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        if !send_message(&mut sender, &snapshot).await {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if !send_message(&mut sender, &msg).await {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Client messages are not expected; only watch for close.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
