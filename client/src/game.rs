//! Client-side view of the world built from server messages.
//!
//! Holds the latest snapshot of every actor plus an interpolation buffer
//! per actor. Nothing here feeds back into the server; positions are only
//! ever derived from what the server sent.

use crate::interpolation::{RenderState, StateEntry, StateInterpolator, DEFAULT_RENDER_DELAY};
use log::{debug, info};
use shared::math::Vec3;
use shared::movement::MAX_HEALTH;
use shared::protocol::{ActorSnapshot, ServerMessage};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Notable things that happened, for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Joined {
        id: String,
    },
    Hit {
        target: String,
        damage: i32,
        shooter: String,
    },
    Died {
        target: String,
        killer: String,
    },
    Respawned {
        id: String,
        position: Vec3,
    },
    Chat {
        from: String,
        message: String,
    },
    Left {
        id: String,
    },
}

#[derive(Debug, Clone)]
pub struct RemoteActor {
    pub snapshot: ActorSnapshot,
    interpolator: StateInterpolator,
    last_render: Option<RenderState>,
}

impl RemoteActor {
    fn new(snapshot: ActorSnapshot) -> Self {
        Self {
            snapshot,
            interpolator: StateInterpolator::new(),
            last_render: None,
        }
    }

    pub fn interpolator(&self) -> &StateInterpolator {
        &self.interpolator
    }
}

/// What the renderer needs for one actor this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedActor {
    pub id: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation_y: f32,
    pub health: i32,
    pub is_dead: bool,
    pub equipped_item_id: i32,
    pub is_local: bool,
    /// False when the frame reuses the last known state.
    pub interpolated: bool,
}

pub struct ClientGameState {
    local_id: Option<String>,
    actors: BTreeMap<String, RemoteActor>,
    render_delay: Duration,
    last_tick: u64,
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_DELAY)
    }
}

impl ClientGameState {
    pub fn new(render_delay: Duration) -> Self {
        Self {
            local_id: None,
            actors: BTreeMap::new(),
            render_delay,
            last_tick: 0,
        }
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn local_actor(&self) -> Option<&ActorSnapshot> {
        let id = self.local_id.as_ref()?;
        self.actors.get(id).map(|actor| &actor.snapshot)
    }

    pub fn is_local_dead(&self) -> bool {
        self.local_actor().map_or(false, |actor| actor.is_dead)
    }

    pub fn actor(&self, id: &str) -> Option<&RemoteActor> {
        self.actors.get(id)
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    pub fn set_render_delay(&mut self, render_delay: Duration) {
        self.render_delay = render_delay;
    }

    pub fn apply_message(&mut self, message: &ServerMessage) -> Option<GameEvent> {
        self.apply_message_at(message, Instant::now())
    }

    pub fn apply_message_at(&mut self, message: &ServerMessage, now: Instant) -> Option<GameEvent> {
        match message {
            ServerMessage::Init { id } => {
                info!("Assigned actor id {}", id);
                self.local_id = Some(id.clone());
                self.actors.clear();
                self.last_tick = 0;
                Some(GameEvent::Joined { id: id.clone() })
            }
            ServerMessage::State { tick, players } => {
                self.last_tick = self.last_tick.max(*tick);
                for (id, snapshot) in players {
                    let entry = StateEntry::from_snapshot(*tick, snapshot);
                    let actor = self
                        .actors
                        .entry(id.clone())
                        .or_insert_with(|| RemoteActor::new(snapshot.clone()));
                    actor.snapshot = snapshot.clone();
                    actor.interpolator.add_state_at(entry, now);
                }
                None
            }
            ServerMessage::Hit {
                player_id,
                damage,
                shooter_id,
            } => {
                if let Some(actor) = self.actors.get_mut(player_id) {
                    actor.snapshot.health = (actor.snapshot.health - damage).max(0);
                }
                Some(GameEvent::Hit {
                    target: player_id.clone(),
                    damage: *damage,
                    shooter: shooter_id.clone(),
                })
            }
            ServerMessage::Death {
                player_id,
                killer_id,
            } => {
                if let Some(actor) = self.actors.get_mut(player_id) {
                    actor.snapshot.health = 0;
                    actor.snapshot.is_dead = true;
                }
                Some(GameEvent::Died {
                    target: player_id.clone(),
                    killer: killer_id.clone(),
                })
            }
            ServerMessage::RespawnConfirmed {
                player_id,
                position,
            } => {
                if let Some(actor) = self.actors.get_mut(player_id) {
                    actor.snapshot.health = MAX_HEALTH;
                    actor.snapshot.is_dead = false;
                    actor.snapshot.position = *position;
                    actor.snapshot.velocity = Vec3::ZERO;
                    // Teleport: never blend between the death spot and spawn.
                    actor.interpolator.clear();
                    actor.last_render = None;
                }
                Some(GameEvent::Respawned {
                    id: player_id.clone(),
                    position: *position,
                })
            }
            ServerMessage::Chat { player_id, message } => Some(GameEvent::Chat {
                from: player_id.clone(),
                message: message.clone(),
            }),
            ServerMessage::PlayerLeft { player_id } => {
                if self.actors.remove(player_id).is_some() {
                    debug!("Actor {} left", player_id);
                }
                Some(GameEvent::Left {
                    id: player_id.clone(),
                })
            }
        }
    }

    pub fn render_states(&mut self) -> Vec<RenderedActor> {
        self.render_states_at(Instant::now())
    }

    /// Interpolated state of every actor.
    ///
    /// Once the render time passes the newest snapshot the actor rests
    /// there with zero velocity. The last rendered state (or the latest
    /// snapshot) is used only while the buffer has nothing to offer.
    pub fn render_states_at(&mut self, now: Instant) -> Vec<RenderedActor> {
        let delay = self.render_delay;
        let local_id = self.local_id.as_deref();

        self.actors
            .iter_mut()
            .map(|(id, actor)| {
                let interpolated = actor.interpolator.interpolated_state_at(now, delay);
                let rendered = interpolated
                    .or_else(|| actor.interpolator.settled_state_at(now, delay));
                if rendered.is_some() {
                    actor.last_render = rendered;
                }
                let state = actor.last_render.unwrap_or(RenderState {
                    position: actor.snapshot.position,
                    velocity: actor.snapshot.velocity,
                    rotation_y: actor.snapshot.rotation_y,
                });

                RenderedActor {
                    id: id.clone(),
                    position: state.position,
                    velocity: state.velocity,
                    rotation_y: state.rotation_y,
                    health: actor.snapshot.health,
                    is_dead: actor.snapshot.is_dead,
                    equipped_item_id: actor.snapshot.equipped_item_id,
                    is_local: Some(id.as_str()) == local_id,
                    interpolated: interpolated.is_some(),
                }
            })
            .collect()
    }
}
