//! Server-side hit detection for instant-hit weapons.
//!
//! A shot is a ray tested against a fixed box around every living actor.
//! Among all boxes the ray crosses, the target is the one whose centre lies
//! nearest the shot origin, with ties going to the actor seen first in id
//! order. This is not the nearest intersection along the ray; two targets
//! lined up behind each other can resolve to the farther one's box if its
//! centre is closer.

use crate::collision::Aabb;
use crate::items;
use crate::math::Vec3;
use crate::movement::ActorState;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Upper bound on ray length. A weapon's own range shortens it further.
pub const MAX_RAY_LENGTH: f32 = 100.0;

pub const HIT_BOX_HALF_EXTENTS: Vec3 = Vec3::new(0.5, 0.9, 0.5);

/// Height of the view point above the feet.
pub const EYE_HEIGHT: f32 = 1.6;

/// Furthest a client-reported shot origin may sit from the server's eye
/// position before it is replaced.
pub const MAX_ORIGIN_DRIFT: f32 = 2.5;

#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub target_id: String,
    pub shooter_id: String,
    pub damage: i32,
    pub remaining_health: i32,
    /// Set only on the shot that took the target to zero.
    pub killed: bool,
}

/// Box a shot has to cross to hit an actor standing at `feet`.
pub fn hit_box(feet: Vec3) -> Aabb {
    Aabb::new(
        feet + Vec3::new(0.0, HIT_BOX_HALF_EXTENTS.y, 0.0),
        HIT_BOX_HALF_EXTENTS,
    )
}

pub fn eye_position(state: &ActorState) -> Vec3 {
    state.position + Vec3::new(0.0, EYE_HEIGHT, 0.0)
}

/// Slab test. Returns the entry distance along `direction` (unit length)
/// when the ray hits `aabb` within `max_distance`.
pub fn ray_intersects(origin: Vec3, direction: Vec3, max_distance: f32, aabb: &Aabb) -> Option<f32> {
    let min = aabb.min();
    let max = aabb.max();
    let mut t_min = 0.0_f32;
    let mut t_max = max_distance;

    for (o, d, lo, hi) in [
        (origin.x, direction.x, min.x, max.x),
        (origin.y, direction.y, min.y, max.y),
        (origin.z, direction.z, min.z, max.z),
    ] {
        if d.abs() < f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut t1, mut t2) = ((lo - o) * inv, (hi - o) * inv);
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}

/// Resolves a shot fired by `shooter_id` and applies its damage.
///
/// Returns `None` when the shot is rejected or misses. Rejections (unknown
/// or dead shooter, unknown item, degenerate direction) are logged and
/// leave every actor untouched.
pub fn resolve_shot(
    shooter_id: &str,
    origin: Vec3,
    direction: Vec3,
    item_id: i32,
    actors: &mut BTreeMap<String, ActorState>,
) -> Option<HitResult> {
    let shooter = match actors.get(shooter_id) {
        Some(shooter) if !shooter.is_dead => shooter,
        Some(_) => {
            debug!("Ignoring shot from dead actor {}", shooter_id);
            return None;
        }
        None => {
            debug!("Ignoring shot from unknown actor {}", shooter_id);
            return None;
        }
    };

    let Some(gun) = items::gun(item_id) else {
        warn!("Actor {} fired unknown item {}", shooter_id, item_id);
        return None;
    };

    if !direction.is_finite() || direction.length_squared() == 0.0 {
        warn!("Actor {} fired with invalid direction {:?}", shooter_id, direction);
        return None;
    }
    let direction = direction.normalize();

    let eye = eye_position(shooter);
    let origin = if origin.is_finite() && origin.distance(&eye) <= MAX_ORIGIN_DRIFT {
        origin
    } else {
        warn!(
            "Actor {} reported shot origin {:?} too far from {:?}, using server position",
            shooter_id, origin, eye
        );
        eye
    };

    let reach = gun.range.min(MAX_RAY_LENGTH);
    let mut nearest: Option<(&String, f32)> = None;
    for (id, actor) in actors.iter() {
        if id == shooter_id || actor.is_dead {
            continue;
        }
        let target_box = hit_box(actor.position);
        if ray_intersects(origin, direction, reach, &target_box).is_none() {
            continue;
        }
        let distance = target_box.center.distance(&origin);
        if nearest.map_or(true, |(_, best)| distance < best) {
            nearest = Some((id, distance));
        }
    }

    let target_id = nearest.map(|(id, _)| id.clone())?;
    let target = actors.get_mut(&target_id)?;

    target.health = (target.health - gun.damage).max(0);
    let killed = target.health == 0;
    if killed {
        target.is_dead = true;
    }

    Some(HitResult {
        target_id,
        shooter_id: shooter_id.to_string(),
        damage: gun.damage,
        remaining_health: target.health,
        killed,
    })
}
