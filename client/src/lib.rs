//! # Game Client Library
//!
//! Client side of the arena shooter. The client never simulates movement:
//! every actor position it shows comes from the server's state broadcasts,
//! smoothed for display.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The client's view of the world:
//! - Latest snapshot per actor, merged from delta broadcasts
//! - Health and death bookkeeping from hit, death and respawn events
//! - Render states for every actor at a given frame time
//!
//! ### Input Module (`input`)
//! Key and mouse handling:
//! - Key bindings to the shared input intent
//! - Change detection so only new intents go on the wire
//! - Respawn requests while dead
//!
//! ### Interpolation Module (`interpolation`)
//! Per-actor snapshot buffer rendered a fixed delay in the past. Applies
//! server position corrections to buffered entries.
//!
//! ### Network Module (`network`)
//! WebSocket connection with JSON messages and exponential-backoff
//! reconnect.
//!
//! ### Weapon Module (`weapon`)
//! Local magazine, fire rate and reload timers for the equipped gun.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::game::ClientGameState;
//! use client::network::{ClientEvent, NetworkClient};
//!
//! # async fn run() {
//! let (_network, mut events) = NetworkClient::spawn("ws://127.0.0.1:8080");
//! let mut game = ClientGameState::default();
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::Message(message) = event {
//!         game.apply_message(&message);
//!         for actor in game.render_states() {
//!             println!("{} at {:?}", actor.id, actor.position);
//!         }
//!     }
//! }
//! # }
//! ```

pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod weapon;
