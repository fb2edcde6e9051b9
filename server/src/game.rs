//! Session registry and authoritative per-tick simulation.

use log::{debug, error, info, warn};
use rand::Rng;
use shared::collision::{settle, ActorBox, Aabb, StaticCollider};
use shared::hitscan::{resolve_shot, HitResult};
use shared::items::{self, NO_ITEM};
use shared::movement::{advance, ActorState, InputIntent, SPAWN_POINT};
use shared::protocol::ActorSnapshot;
use shared::Vec3;
use std::collections::BTreeMap;

pub const ACTOR_ID_LEN: usize = 9;
const ACTOR_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Owns every actor. Keyed by id in sorted order so iteration is stable.
#[derive(Debug, Clone)]
pub struct GameState {
    actors: BTreeMap<String, ActorState>,
    colliders: Vec<StaticCollider>,
}

impl GameState {
    pub fn new(colliders: Vec<StaticCollider>) -> Self {
        Self {
            actors: BTreeMap::new(),
            colliders,
        }
    }

    /// Random id not currently in use.
    pub fn generate_id<R: Rng>(&self, rng: &mut R) -> String {
        loop {
            let id: String = (0..ACTOR_ID_LEN)
                .map(|_| ACTOR_ID_CHARSET[rng.gen_range(0..ACTOR_ID_CHARSET.len())] as char)
                .collect();
            if !self.actors.contains_key(&id) {
                return id;
            }
        }
    }

    /// Spawns a fresh actor under `id`. An existing actor with the same id is
    /// returned untouched.
    pub fn register(&mut self, id: &str) -> &ActorState {
        self.actors.entry(id.to_string()).or_insert_with(|| {
            info!("Registered actor {} at {:?}", id, SPAWN_POINT);
            ActorState::new(SPAWN_POINT)
        })
    }

    /// Replaces the actor's input wholesale. Unknown and dead actors are
    /// ignored.
    pub fn apply_input(&mut self, id: &str, intent: InputIntent) -> bool {
        let Some(actor) = self.actors.get_mut(id) else {
            return false;
        };
        if actor.is_dead {
            return false;
        }

        let intent = intent.sanitized();
        if intent.equipped_item_id == NO_ITEM || items::item(intent.equipped_item_id).is_some() {
            actor.equipped_item_id = intent.equipped_item_id;
        } else {
            warn!(
                "Actor {} tried to equip unknown item {}",
                id, intent.equipped_item_id
            );
        }
        actor.input = intent;
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        if self.actors.remove(id).is_some() {
            info!("Removed actor {}", id);
            true
        } else {
            false
        }
    }

    /// Brings a dead actor back at the spawn point. Returns the spawn
    /// position, or `None` if the actor is unknown or still alive.
    pub fn respawn(&mut self, id: &str) -> Option<Vec3> {
        let actor = self.actors.get_mut(id)?;
        if !actor.is_dead {
            debug!("Ignoring respawn request from living actor {}", id);
            return None;
        }
        actor.reset(SPAWN_POINT);
        info!("Actor {} respawned", id);
        Some(actor.position)
    }

    /// Fires the shooter's equipped weapon. A shot naming any other item
    /// than the one the server has equipped is dropped.
    pub fn shoot(&mut self, id: &str, origin: Vec3, direction: Vec3, item_id: i32) -> Option<HitResult> {
        let equipped = self.actors.get(id)?.equipped_item_id;
        if item_id != equipped {
            warn!(
                "Actor {} fired item {} while holding {}, dropping shot",
                id, item_id, equipped
            );
            return None;
        }

        let hit = resolve_shot(id, origin, direction, equipped, &mut self.actors)?;
        if hit.killed {
            info!("Actor {} was killed by {}", hit.target_id, hit.shooter_id);
        } else {
            debug!(
                "Actor {} hit {} for {} ({} left)",
                hit.shooter_id, hit.target_id, hit.damage, hit.remaining_health
            );
        }
        Some(hit)
    }

    /// Runs movement then collision for every actor.
    ///
    /// Collision is resolved against where the other actors stood at the end
    /// of the previous tick, never against positions already moved this tick.
    pub fn step(&mut self, tick: u64, dt: f32) {
        let previous: Vec<(String, Aabb)> = self
            .actors
            .iter()
            .map(|(id, actor)| (id.clone(), Aabb::for_actor(actor.position)))
            .collect();

        for (id, actor) in self.actors.iter_mut() {
            let input = actor.input.clone();
            advance(actor, &input, dt);

            let others: Vec<ActorBox> = previous
                .iter()
                .filter(|(other, _)| other != id)
                .map(|(other, aabb)| ActorBox::new(*aabb, other < id))
                .collect();
            if let Some(correction) = settle(actor, &others, &self.colliders, tick) {
                debug!("Actor {} corrected by {:?} on tick {}", id, correction.delta, tick);
            }

            if !actor.is_finite() {
                error!("Actor {} reached a non-finite state, moving to spawn", id);
                actor.position = SPAWN_POINT;
                actor.velocity = Vec3::ZERO;
                actor.strafe_angle = 0.0;
                actor.pending_correction = None;
            }
        }
    }

    pub fn snapshots(&self) -> BTreeMap<String, ActorSnapshot> {
        self.actors
            .iter()
            .map(|(id, actor)| (id.clone(), ActorSnapshot::from(actor)))
            .collect()
    }

    pub fn actor(&self, id: &str) -> Option<&ActorState> {
        self.actors.get(id)
    }

    pub fn actor_mut(&mut self, id: &str) -> Option<&mut ActorState> {
        self.actors.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
