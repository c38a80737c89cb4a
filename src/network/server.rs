use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::game::session::PlayerHandle;
use crate::network::lobby::{run_dispatcher, Lobby, LobbyEvent};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::stimuli::catalog::StimulusCatalog;

/// What the session layer asks a connection's write task to do.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    Close,
}

/// Sending half of a participant's connection, handed to the session.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl PlayerHandle for ConnectionHandle {
    fn send(&self, message: &ServerMessage) {
        if self.tx.send(Outbound::Message(message.clone())).is_err() {
            warn!("Client disconnected, dropping message");
        }
    }

    fn disconnect(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

pub fn encode_message(message: &ServerMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(message)
}

pub fn decode_client_message(bytes: &[u8]) -> Result<ClientMessage, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

/// Accept WebSocket clients forever, pairing them into sessions.
///
/// All session state lives in a single dispatcher task; each connection gets a
/// read task (frames → `LobbyEvent`) and a write task (`Outbound` → frames).
pub async fn run(config: &ServerConfig, catalog: Arc<StimulusCatalog>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Game server listening on ws://{}", config.bind_addr);

    let rng = match config.seed {
        Some(seed) => {
            info!("Using fixed RNG seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };
    let lobby = Lobby::new(catalog, config.game.clone(), rng);
    let (event_tx, event_rx) = mpsc::unbounded_channel::<LobbyEvent>();
    tokio::spawn(run_dispatcher(lobby, event_rx));

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Accept error: {}", e);
                continue;
            }
        };
        info!("New connection from: {}", addr);
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr, event_tx).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<LobbyEvent>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let player_id = addr.to_string();
    let (handle, mut outbound_rx) = ConnectionHandle::channel();

    // ── Write task ──────────────────────────────────────────────
    let writer_id = player_id.clone();
    tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            match outbound {
                Outbound::Message(message) => {
                    let bytes = match encode_message(&message) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            error!("Failed to serialize ServerMessage: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_write.send(Message::Binary(bytes.into())).await {
                        error!("Failed to send WebSocket message to {}: {}", writer_id, e);
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_write.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        info!("Write task for {} shutting down", writer_id);
    });

    if events
        .send(LobbyEvent::Connected {
            id: player_id.clone(),
            handle,
        })
        .is_err()
    {
        warn!("Dispatcher gone, dropping connection {}", player_id);
        return;
    }

    // ── Read loop ───────────────────────────────────────────────
    while let Some(result) = ws_read.next().await {
        match result {
            Ok(msg) if msg.is_binary() => {
                let data = msg.into_data();
                match decode_client_message(&data) {
                    Ok(message) => {
                        let event = LobbyEvent::Message {
                            id: player_id.clone(),
                            message,
                        };
                        if events.send(event).is_err() {
                            warn!("Dispatcher gone, closing {}", player_id);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to decode ClientMessage from {}: {}", player_id, e);
                    }
                }
            }
            Ok(msg) if msg.is_close() => break,
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket read error from {}: {}", player_id, e);
                break;
            }
        }
    }

    let _ = events.send(LobbyEvent::Disconnected {
        id: player_id.clone(),
    });
    info!("Connection {} closed", player_id);
}
