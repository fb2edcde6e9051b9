//! Connection table and per-recipient snapshot deltas.
//!
//! Each connection keeps the JSON of every actor snapshot it was last sent.
//! A tick's `state` message for a recipient carries only the actors whose
//! JSON differs from that record, so idle actors cost nothing on the wire
//! and a recipient with nothing new receives no message at all.
//!
//! Outbound frames are queued on an unbounded channel drained by the
//! connection's writer task. Queuing never awaits, which keeps every handler
//! on the game loop synchronous.

use log::{debug, info, warn};
use shared::protocol::{ActorSnapshot, ServerMessage};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// One connected peer.
#[derive(Debug)]
pub struct Client {
    /// Actor id bound to this connection
    pub id: String,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    outbound: mpsc::UnboundedSender<String>,
    /// Actor id to the snapshot JSON last sent to this peer
    last_sent: HashMap<String, String>,
}

impl Client {
    pub fn new(id: String, addr: SocketAddr, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            outbound,
            last_sent: HashMap::new(),
        }
    }

    /// Queues `message` for this peer. Returns false if the writer is gone.
    pub fn send(&self, message: &ServerMessage) -> bool {
        match message.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!("Failed to encode message for {}: {}", self.id, e);
                false
            }
        }
    }

    fn send_text(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Picks the actors whose encoded snapshot changed since the last send
    /// and records them as sent.
    pub fn take_changes(
        &mut self,
        encoded: &BTreeMap<String, (ActorSnapshot, String)>,
    ) -> BTreeMap<String, ActorSnapshot> {
        self.last_sent.retain(|id, _| encoded.contains_key(id));

        let mut changed = BTreeMap::new();
        for (id, (snapshot, json)) in encoded {
            if self.last_sent.get(id) != Some(json) {
                self.last_sent.insert(id.clone(), json.clone());
                changed.insert(id.clone(), snapshot.clone());
            }
        }
        changed
    }

    /// Forgets everything sent so the next delta is a full snapshot.
    pub fn forget_sent(&mut self) {
        self.last_sent.clear();
    }
}

pub struct ClientManager {
    clients: HashMap<String, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Registers a connection under actor id `id`. Fails when at capacity or
    /// when the id is already bound.
    pub fn add_client(
        &mut self,
        id: &str,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
    ) -> bool {
        if self.is_full() || self.clients.contains_key(id) {
            return false;
        }
        info!("Client {} connected from {}", id, addr);
        self.clients
            .insert(id.to_string(), Client::new(id.to_string(), addr, outbound));
        true
    }

    /// Drops the connection; its outbound sender goes with it, which lets
    /// the writer task finish.
    pub fn remove_client(&mut self, id: &str) -> Option<Client> {
        let client = self.clients.remove(id)?;
        info!(
            "Client {} disconnected after {:.1}s",
            id,
            client.connected_at.elapsed().as_secs_f32()
        );
        Some(client)
    }

    pub fn send_to(&self, id: &str, message: &ServerMessage) -> bool {
        self.clients.get(id).map_or(false, |client| client.send(message))
    }

    /// Sends `message` to every peer.
    pub fn broadcast(&self, message: &ServerMessage) {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return;
            }
        };
        for client in self.clients.values() {
            if !client.send_text(text.clone()) {
                debug!("Writer for {} already closed", client.id);
            }
        }
    }

    /// Sends each peer the actors that changed for it since its last update.
    /// Returns how many `state` messages were queued.
    pub fn broadcast_state(
        &mut self,
        tick: u64,
        snapshots: BTreeMap<String, ActorSnapshot>,
    ) -> usize {
        if self.clients.is_empty() {
            return 0;
        }

        let mut encoded = BTreeMap::new();
        for (id, snapshot) in snapshots {
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    encoded.insert(id, (snapshot, json));
                }
                Err(e) => warn!("Failed to encode snapshot of {}: {}", id, e),
            }
        }

        let mut sent = 0;
        for client in self.clients.values_mut() {
            let players = client.take_changes(&encoded);
            if players.is_empty() {
                continue;
            }
            if client.send(&ServerMessage::State { tick, players }) {
                sent += 1;
            }
        }
        sent
    }

    /// Makes the next `state` sent to `id` a full snapshot.
    pub fn resync(&mut self, id: &str) -> bool {
        match self.clients.get_mut(id) {
            Some(client) => {
                debug!("Resync requested by {}", id);
                client.forget_sent();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
