//! WebSocket transport and the single-threaded game loop.
//!
//! Per-connection tasks only move frames: a reader task forwards text
//! frames to the loop as [`ServerEvent`]s and a writer task drains the
//! connection's outbound queue. All game state lives in [`Server`] and is
//! touched only from [`Server::run`], which alternates between handling
//! events and running ticks.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::GameState;
use crate::tick::TickScheduler;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::protocol::{sanitize_chat, ClientMessage, ProtocolError, ServerMessage, SERVER_ID};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

/// Ticks between two statistics lines in the debug log.
const STATS_INTERVAL: u64 = 100;

/// Events delivered from network tasks to the game loop.
#[derive(Debug)]
pub enum ServerEvent {
    /// Handshake finished. The loop answers with the assigned actor id, or
    /// `None` to refuse the connection.
    Connected {
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<Option<String>>,
    },
    Message {
        client_id: String,
        text: String,
    },
    Disconnected {
        client_id: String,
    },
    Shutdown,
}

/// Authoritative server: owns the listener, the actors and the connections.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game: GameState,
    clients: ClientManager,
    scheduler: TickScheduler,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.address).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game: GameState::new(config.colliders),
            clients: ClientManager::new(config.max_clients),
            scheduler: TickScheduler::new(config.tick_duration),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for injecting events, e.g. [`ServerEvent::Shutdown`].
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ServerEvent> {
        self.events_tx.clone()
    }

    /// Spawns the task accepting TCP connections and upgrading them
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(stream, addr, events_tx.clone()));
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main loop. Returns after a [`ServerEvent::Shutdown`].
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();
        self.scheduler.start(Instant::now());
        info!(
            "Server started, ticking every {:?}",
            self.scheduler.period()
        );

        loop {
            let deadline = tokio::time::Instant::from_std(self.scheduler.next_deadline());

            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(ServerEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                        Some(event) => self.handle_event(event),
                    }
                },

                _ = tokio::time::sleep_until(deadline) => {
                    self.run_tick();
                },
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected {
                addr,
                outbound,
                reply,
            } => {
                let id = self.accept_client(addr, outbound);
                if reply.send(id).is_err() {
                    debug!("Connection from {} went away during handshake", addr);
                }
            }
            ServerEvent::Message { client_id, text } => self.handle_message(&client_id, &text),
            ServerEvent::Disconnected { client_id } => self.disconnect_client(&client_id),
            ServerEvent::Shutdown => {}
        }
    }

    /// Registers a new connection and its actor. Returns the actor id, or
    /// `None` when the server is full.
    pub fn accept_client(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Option<String> {
        if self.clients.is_full() {
            warn!("Refusing connection from {}: server full", addr);
            return None;
        }

        let id = self.game.generate_id(&mut rand::thread_rng());
        if !self.clients.add_client(&id, addr, outbound) {
            return None;
        }
        self.game.register(&id);

        self.clients.send_to(&id, &ServerMessage::Init { id: id.clone() });
        self.clients.broadcast(&ServerMessage::Chat {
            player_id: SERVER_ID.to_string(),
            message: format!("{} has joined the game.", id),
        });
        Some(id)
    }

    /// Removes the connection and its actor before the next tick runs.
    pub fn disconnect_client(&mut self, client_id: &str) {
        let had_client = self.clients.remove_client(client_id).is_some();
        let had_actor = self.game.remove(client_id);
        if !had_client && !had_actor {
            return;
        }

        self.clients.broadcast(&ServerMessage::PlayerLeft {
            player_id: client_id.to_string(),
        });
        self.clients.broadcast(&ServerMessage::Chat {
            player_id: SERVER_ID.to_string(),
            message: format!("{} has left the game.", client_id),
        });
    }

    /// Applies one client frame. Every failure is logged and dropped.
    pub fn handle_message(&mut self, client_id: &str, text: &str) {
        let message = match ClientMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping message from {}: {}", client_id, e);
                return;
            }
        };

        if message.player_id() != client_id {
            warn!(
                "Dropping message from {} claiming to be {}",
                client_id,
                message.player_id()
            );
            return;
        }
        if !self.game.contains(client_id) {
            return;
        }

        match message {
            ClientMessage::Input { input, .. } => {
                self.game.apply_input(client_id, input);
            }
            ClientMessage::Shoot {
                position,
                direction,
                equip_id,
                ..
            } => {
                let Some(hit) = self.game.shoot(client_id, position, direction, equip_id) else {
                    return;
                };
                self.clients.broadcast(&ServerMessage::Hit {
                    player_id: hit.target_id.clone(),
                    damage: hit.damage,
                    shooter_id: hit.shooter_id.clone(),
                });
                if hit.killed {
                    self.clients.broadcast(&ServerMessage::Death {
                        player_id: hit.target_id,
                        killer_id: hit.shooter_id,
                    });
                }
            }
            ClientMessage::RespawnRequest { .. } => {
                if let Some(position) = self.game.respawn(client_id) {
                    self.clients.broadcast(&ServerMessage::RespawnConfirmed {
                        player_id: client_id.to_string(),
                        position,
                    });
                }
            }
            ClientMessage::Chat { message, .. } => {
                let message = sanitize_chat(&message);
                if message.is_empty() {
                    return;
                }
                info!("[chat] {}: {}", client_id, message);
                self.clients.broadcast(&ServerMessage::Chat {
                    player_id: client_id.to_string(),
                    message,
                });
            }
            ClientMessage::ResyncRequest { .. } => {
                self.clients.resync(client_id);
            }
        }
    }

    /// Advances the simulation one step and sends every peer its delta.
    pub fn run_tick(&mut self) {
        let info = self.scheduler.begin_tick(Instant::now());

        if !self.game.is_empty() {
            self.game.step(info.tick, info.dt);
        }
        let sent = self.clients.broadcast_state(info.tick, self.game.snapshots());

        self.scheduler.finish_tick(Instant::now());

        if info.tick % STATS_INTERVAL == 0 {
            debug!(
                "Tick {}: {} actors, {} clients, {} state messages, dt {:.1}ms, took {:?}",
                info.tick,
                self.game.len(),
                self.clients.len(),
                sent,
                info.dt * 1000.0,
                self.scheduler.last_execution()
            );
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }
}

/// Upgrades one TCP stream and shuttles frames until either side closes.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (reply_tx, reply_rx) = oneshot::channel();
    if events_tx
        .send(ServerEvent::Connected {
            addr,
            outbound: outbound_tx,
            reply: reply_tx,
        })
        .is_err()
    {
        return;
    }

    let client_id = match reply_rx.await {
        Ok(Some(id)) => id,
        _ => {
            let _ = write.send(Message::Close(None)).await;
            return;
        }
    };

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = write.send(Message::Text(text)).await {
                debug!("Write to {} failed: {}", addr, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let event = ServerEvent::Message {
                    client_id: client_id.clone(),
                    text,
                };
                if events_tx.send(event).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("{}: {}", client_id, ProtocolError::UnexpectedFrame("binary"));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read from {} failed: {}", client_id, e);
                break;
            }
        }
    }

    let _ = events_tx.send(ServerEvent::Disconnected { client_id });
    let _ = writer.await;
}
