//! InkShare WebSocket Relay Server
//!
//! Relays drawing events between the artists of a room and brokers the state
//! hand-over to late joiners. The server keeps no canvas state of its own:
//! the room owner answers state requests.
//!
//! ## Protocol
//!
//! One artist per connection at `/ws/{room}`. Messages are JSON:
//! ```json
//! { "type": "OnClientEvent", "body": { "eventType": "onMouseDown", "data": { "x": 1, "y": 2 } } }
//! { "type": "CurrentState", "body": { "requester": "...", "data": { ... } } }
//! ```
//! Relayed messages gain a `from` field with the sender id.

mod room;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use inkshare_core::{ArtistIdentity, ClientMessage, ConfigError, ServerMessage};
use room::{Envelope, RoomState};
use serde::Serialize;
use std::{io, net::SocketAddr, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_ADDR: &str = "0.0.0.0:3030";
const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_ROOM: &str = "default";

/// Server configuration, read from the environment.
#[derive(Debug, Clone, PartialEq)]
struct ServerConfig {
    addr: SocketAddr,
    /// Per-room broadcast buffer. A connection that falls further behind is
    /// closed.
    channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `INKSHARE_ADDR` and `INKSHARE_CHANNEL_CAPACITY`.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = lookup("INKSHARE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("INKSHARE_ADDR {addr:?}: {e}")))?;
        let channel_capacity = match lookup("INKSHARE_CHANNEL_CAPACITY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "INKSHARE_CHANNEL_CAPACITY must be a positive integer, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_CHANNEL_CAPACITY,
        };
        Ok(Self {
            addr,
            channel_capacity,
        })
    }
}

/// Room state plus its broadcast channel
struct Room {
    tx: broadcast::Sender<Envelope>,
    state: RoomState,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            state: RoomState::new(),
        }
    }

    fn send_all(&self, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            // no receivers left is fine
            let _ = self.tx.send(envelope);
        }
    }
}

#[derive(Debug, Serialize)]
struct RoomSummary {
    room: String,
    artists: Vec<ArtistIdentity>,
}

/// Shared application state
struct AppState {
    rooms: DashMap<String, Room>,
    config: ServerConfig,
}

impl AppState {
    fn new(config: ServerConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    /// Subscribe to the room and announce the artist. Both happen under the
    /// room entry lock, so the new receiver sees every message from the join
    /// on.
    fn join_room(
        &self,
        room_id: &str,
        peer_id: &str,
    ) -> (broadcast::Receiver<Envelope>, ArtistIdentity) {
        let capacity = self.config.channel_capacity;
        let mut entry = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(capacity));
        let room = entry.value_mut();
        let rx = room.tx.subscribe();
        let (identity, envelopes) = room.state.join(peer_id.to_string());
        room.send_all(envelopes);
        debug!("Room {} has {} artists", room_id, room.state.len());
        (rx, identity)
    }

    fn route(&self, room_id: &str, peer_id: &str, message: ClientMessage) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            let envelopes = room.state.route(peer_id, message);
            room.send_all(envelopes);
        }
    }

    /// Remove the artist and drop the room once it is empty.
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            let envelopes = room.state.leave(peer_id);
            room.send_all(envelopes);
            debug!(
                "Room {} has {} artists, {} waiting for state",
                room_id,
                room.state.len(),
                room.state.pending_requests()
            );
        }
        if self
            .rooms
            .remove_if(room_id, |_, room| room.state.is_empty())
            .is_some()
        {
            info!("Room {} closed", room_id);
        }
    }

    fn summaries(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|entry| RoomSummary {
                room: entry.key().clone(),
                artists: entry.state.members().to_vec(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));
        rooms
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkshare_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let addr = config.addr;
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("InkShare relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws/{{room}}", addr);

    axum::serve(listener, app(state)).await
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_default))
        .route("/ws/{room}", get(ws_handler))
        .route("/rooms", get(rooms))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "InkShare Relay Server - Connect via WebSocket at /ws/{room}"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Rooms and their artists
async fn rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    Json(state.summaries())
}

/// WebSocket upgrade handler for the default room
async fn ws_default(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, DEFAULT_ROOM.to_string(), state))
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, room, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, room_id: String, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (mut rx, identity) = state.join_room(&room_id, &peer_id);
    info!("{} ({}) joined room {}", identity.name, peer_id, room_id);

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ClientMessage::from_json(&text) {
                        Ok(client_msg) => state.route(&room_id, &peer_id, client_msg),
                        Err(e) => {
                            warn!("Invalid message from {}: {}", peer_id, e);
                            let err = ServerMessage::Error {
                                message: format!("Invalid message: {}", e),
                            };
                            if let Ok(json) = err.to_json() {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    },
                    Some(Ok(Message::Binary(_))) => {
                        debug!("Ignoring binary frame from {}", peer_id);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Handle messages routed in the room
            msg = rx.recv() => {
                match msg {
                    Ok(envelope) => {
                        if !envelope.audience.includes(&peer_id) {
                            continue;
                        }
                        let json = match envelope.message.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to encode message for {}: {}", peer_id, e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // its canvas would silently diverge; make it rejoin
                        warn!("{} lagged by {} messages, closing", peer_id, skipped);
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    // Cleanup on disconnect
    state.leave_room(&room_id, &peer_id);
    info!("Connection closed: {}", peer_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkshare_core::{JoinState, PointerInput, Session};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    #[test]
    fn test_config_defaults_and_overrides() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());

        let config = ServerConfig::from_lookup(|key| match key {
            "INKSHARE_ADDR" => Some("127.0.0.1:9000".into()),
            "INKSHARE_CHANNEL_CAPACITY" => Some("16".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(config.channel_capacity, 16);

        assert!(ServerConfig::from_lookup(|key| (key == "INKSHARE_ADDR").then(|| "nope".into())).is_err());
        assert!(
            ServerConfig::from_lookup(|key| (key == "INKSHARE_CHANNEL_CAPACITY").then(|| "0".into()))
                .is_err()
        );
    }

    #[test]
    fn test_join_and_leave_through_channel() {
        let state = AppState::new(ServerConfig::default());
        let (mut rx_a, a) = state.join_room("r", "a");
        assert!(a.owner);
        let (_rx_b, b) = state.join_room("r", "b");

        let mut to_a = Vec::new();
        while let Ok(envelope) = rx_a.try_recv() {
            if envelope.audience.includes("a") {
                to_a.push(envelope.message);
            }
        }
        assert!(matches!(to_a[0], ServerMessage::OnSelfConnected(_)));
        assert!(to_a.contains(&ServerMessage::OnClientConnected(b)));
        assert!(to_a.contains(&ServerMessage::RequestCurrentState {
            requester: "b".into()
        }));

        state.leave_room("r", "a");
        state.leave_room("r", "b");
        assert!(state.rooms.is_empty());
    }

    async fn start_server() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(ServerConfig::default()));
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr, session: &mut Session) -> Client {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/test"))
            .await
            .unwrap();
        session.on_transport_connected();
        ws
    }

    /// Feed incoming frames to the session until `done` holds.
    async fn pump_until(ws: &mut Client, session: &mut Session, done: impl Fn(&Session) -> bool) {
        while !done(session) {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for the server")
                .unwrap()
                .unwrap();
            if let tungstenite::Message::Text(text) = frame {
                session.handle_message(text.as_str()).unwrap();
            }
        }
    }

    async fn flush(ws: &mut Client, session: &mut Session) {
        for json in session.take_outgoing() {
            ws.send(tungstenite::Message::Text(json.into())).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_late_joiner_receives_owner_state() {
        let addr = start_server().await;

        let mut alice = Session::default();
        let mut ws_a = connect(addr, &mut alice).await;
        pump_until(&mut ws_a, &mut alice, |s| s.join_state() == JoinState::Joined).await;
        assert!(alice.is_owner());

        alice.pointer_down(PointerInput::primary(10.0, 10.0)).unwrap();
        alice.pointer_move(PointerInput::primary(20.0, 15.0)).unwrap();
        alice.pointer_up(PointerInput::primary(30.0, 20.0)).unwrap();
        flush(&mut ws_a, &mut alice).await;

        let mut bob = Session::default();
        let mut ws_b = connect(addr, &mut bob).await;
        pump_until(&mut ws_a, &mut alice, |s| s.has_outgoing()).await;
        flush(&mut ws_a, &mut alice).await;
        pump_until(&mut ws_b, &mut bob, |s| s.join_state() == JoinState::Joined).await;

        assert_eq!(bob.canvas().snapshot(), alice.canvas().snapshot());
        assert_eq!(bob.canvas().layer().len(), 1);
        assert!(bob.roster().get(alice.local_id()).is_some());

        // ownership moves to bob when alice leaves
        ws_a.close(None).await.unwrap();
        pump_until(&mut ws_b, &mut bob, |s| s.is_owner()).await;
        assert!(bob.roster().is_empty());
    }
}
