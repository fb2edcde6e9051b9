//! # Shared simulation core
//!
//! Deterministic pieces used by both the authoritative server and the
//! client: vector maths, the kinematic movement step, box collision, hit-scan
//! resolution, static item definitions and the JSON wire protocol.
//!
//! Nothing in this crate performs I/O or keeps global state. The server owns
//! every [`ActorState`] and drives [`movement::advance`] and
//! [`collision::settle`] once per tick; the client only ever reads
//! [`ActorSnapshot`]s decoded from [`ServerMessage::State`].

pub mod collision;
pub mod hitscan;
pub mod items;
pub mod math;
pub mod movement;
pub mod protocol;

pub use collision::{ActorBox, Aabb, Correction, StaticCollider};
pub use hitscan::HitResult;
pub use items::{ItemDefinition, NO_ITEM};
pub use math::Vec3;
pub use movement::{ActorState, InputIntent, SPAWN_POINT};
pub use protocol::{ActorSnapshot, ClientMessage, ProtocolError, ServerMessage};
