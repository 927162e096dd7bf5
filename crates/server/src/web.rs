//! HTTP and websocket surface over the broadcast hub.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

use maskwatch_core::broadcast::broadcast_hub::BroadcastHub;
use maskwatch_core::broadcast::domain::output_channel::{
    OutboundMessage, OutputChannel, TransportError,
};
use maskwatch_core::capture::domain::capture_demand::CaptureDemand;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub demand: CaptureDemand,
    /// Alert texts that may wait per websocket. Frames never queue.
    pub client_queue: usize,
}

/// Hub-facing end of one websocket.
///
/// Alert texts go through a bounded FIFO. Frames go through a single slot
/// that the newest frame overwrites, so a slow viewer skips frames instead
/// of falling behind. Never blocks the streaming thread.
pub struct WebSocketChannel {
    texts: mpsc::Sender<Arc<str>>,
    frames: watch::Sender<Option<Arc<[u8]>>>,
}

/// Connection-side end drained by the websocket writer task.
pub struct ViewerQueue {
    texts: mpsc::Receiver<Arc<str>>,
    frames: watch::Receiver<Option<Arc<[u8]>>>,
}

impl WebSocketChannel {
    pub fn pair(text_capacity: usize) -> (Self, ViewerQueue) {
        let (text_tx, text_rx) = mpsc::channel(text_capacity);
        let (frame_tx, frame_rx) = watch::channel(None);
        (
            Self {
                texts: text_tx,
                frames: frame_tx,
            },
            ViewerQueue {
                texts: text_rx,
                frames: frame_rx,
            },
        )
    }
}

impl OutputChannel for WebSocketChannel {
    fn send_binary(&self, payload: Arc<[u8]>) -> Result<(), TransportError> {
        self.frames
            .send(Some(payload))
            .map_err(|_| TransportError::Closed)
    }

    fn send_text(&self, message: &str) -> Result<(), TransportError> {
        self.texts.try_send(Arc::from(message)).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}

impl ViewerQueue {
    /// Next message for the socket: pending alerts first, then the latest
    /// unseen frame. `None` once the hub side is gone.
    pub async fn next(&mut self) -> Option<OutboundMessage> {
        loop {
            tokio::select! {
                biased;
                text = self.texts.recv() => return text.map(OutboundMessage::Text),
                changed = self.frames.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    let latest = self.frames.borrow_and_update().clone();
                    if let Some(bytes) = latest {
                        return Some(OutboundMessage::Binary(bytes));
                    }
                }
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(websocket_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Bind, serve until Ctrl-C, then drop every viewer so upgraded
/// connections wind down.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Viewer available at http://{}", listener.local_addr()?);

    let hub = Arc::clone(&state.hub);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {e}");
            }
            log::info!("Shutting down");
            hub.disconnect_all();
        })
        .await
}

async fn index(State(state): State<AppState>) -> Html<&'static str> {
    if state.demand.request() {
        log::info!("Capture requested by first page visit");
    }
    Html(INDEX_HTML)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (channel, mut queue) = WebSocketChannel::pair(state.client_queue);
    let id = state.hub.connect(Arc::new(channel));

    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = queue.next().await {
            let message = match outbound {
                OutboundMessage::Binary(bytes) => Message::Binary(bytes.to_vec()),
                OutboundMessage::Text(text) => Message::Text(text.to_string()),
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Inbound traffic is ignored; reading only detects the close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    log::debug!("WebSocket error: {e}");
                    break;
                }
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.disconnect(id);
}
