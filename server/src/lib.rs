//! # Game Server Library
//!
//! Authoritative server for a multiplayer first-person shooter. It owns the
//! true position, velocity, health and equipment of every connected actor,
//! steps the simulation at a fixed tick rate and sends each client only what
//! changed since that client's previous update.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns all game state. It waits on two things at once: events
//! from the network tasks and the deadline of the next tick. Message
//! handlers run to completion without awaiting, so no actor state needs a
//! lock and a tick never observes another actor's half-updated state.
//!
//! ### WebSocket Transport
//! Clients speak JSON over WebSocket. Each connection gets a reader task
//! that forwards text frames to the loop and a writer task that drains an
//! unbounded outbound queue. A slow peer therefore never stalls the loop.
//!
//! ### Tick Pipeline
//! Every tick runs, in order:
//! - movement for each actor from its latest input
//! - collision push-out against static colliders and the other actors'
//!   positions from the end of the previous tick
//! - a per-recipient delta broadcast of the actors whose snapshot changed
//!
//! Shots, respawns and chat skip the tick and are answered as soon as they
//! arrive.
//!
//! ## Module Organization
//!
//! - `config`: command-line options and world file loading
//! - `tick`: drift-corrected fixed-rate clock
//! - `game`: actor registry, per-tick simulation and combat
//! - `client_manager`: connection table and per-recipient delta tracking
//! - `network`: WebSocket accept loop and the game loop itself
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 20 Hz, built-in arena, up to 32 clients
//!     let mut server = Server::bind(ServerConfig::local("127.0.0.1:8080")).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! Clients are untrusted. Every message is bound to the actor of the
//! connection it arrived on, movement is recomputed from input flags only,
//! shot origins far from the shooter are replaced by the server's own eye
//! position, and chat is stripped of control characters and length-capped.

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod tick;
