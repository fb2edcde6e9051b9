//! Axis-aligned box collision between actors, other actors and static world
//! geometry.
//!
//! Overlaps are resolved by the minimum translation along a single axis.
//! Each actor is resolved on its own against the boxes it is given, so two
//! actors overlapping each other both move in the same tick. Actors that
//! share a centre split apart by id order.

use crate::math::Vec3;
use crate::movement::ActorState;
use serde::{Deserialize, Serialize};

/// Extra separation added to every push-out so resolved boxes end strictly
/// apart despite float rounding.
pub const SKIN: f32 = 1e-3;

/// How far above a surface an actor may hover and still count as standing
/// on it.
pub const SUPPORT_TOLERANCE: f32 = 0.05;

pub const ACTOR_SIZE: Size = Size {
    width: 1.0,
    height: 2.0,
    depth: 1.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Size {
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.width / 2.0, self.height / 2.0, self.depth / 2.0)
    }
}

/// Immovable box placed at world load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticCollider {
    /// Centre of the box.
    pub position: Vec3,
    pub size: Size,
}

impl StaticCollider {
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.position, self.size.half_extents())
    }
}

/// The built-in arena: a single long crate off to one side of spawn.
pub fn default_colliders() -> Vec<StaticCollider> {
    vec![StaticCollider {
        position: Vec3::new(5.0, -1.0, -5.0),
        size: Size {
            width: 10.0,
            height: 3.0,
            depth: 1.0,
        },
    }]
}

/// Server-issued positional fix attached to the next snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    /// Tick on which the push-out happened.
    pub tick: u64,
    pub delta: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half: Vec3,
}

impl Aabb {
    pub fn new(center: Vec3, half: Vec3) -> Self {
        Self { center, half }
    }

    /// Box of an actor standing with its feet at `feet`.
    pub fn for_actor(feet: Vec3) -> Self {
        let half = ACTOR_SIZE.half_extents();
        Self::new(feet + Vec3::new(0.0, half.y, 0.0), half)
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half
    }

    /// Strict overlap: boxes that merely touch do not overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d = self.center - other.center;
        d.x.abs() < self.half.x + other.half.x
            && d.y.abs() < self.half.y + other.half.y
            && d.z.abs() < self.half.z + other.half.z
    }

    /// Displacement that moves `self` out of `other` along the axis of least
    /// penetration, or `None` when they do not overlap.
    pub fn push_out(&self, other: &Aabb) -> Option<Vec3> {
        self.push_out_with_tie(other, 1.0)
    }

    /// Like [`Aabb::push_out`], but when both centres line up on the push
    /// axis the push goes towards the sign of `tie`.
    pub fn push_out_with_tie(&self, other: &Aabb, tie: f32) -> Option<Vec3> {
        if !self.overlaps(other) {
            return None;
        }
        let d = self.center - other.center;
        let push_x = self.half.x + other.half.x - d.x.abs();
        let push_y = self.half.y + other.half.y - d.y.abs();
        let push_z = self.half.z + other.half.z - d.z.abs();

        let push = if push_x < push_y && push_x < push_z {
            Vec3::new(direction(d.x, tie) * (push_x + SKIN), 0.0, 0.0)
        } else if push_y < push_z {
            Vec3::new(0.0, direction(d.y, tie) * (push_y + SKIN), 0.0)
        } else {
            Vec3::new(0.0, 0.0, direction(d.z, tie) * (push_z + SKIN))
        };
        Some(push)
    }

    /// True when `self` rests on top of `other`: horizontally overlapping and
    /// with its bottom within [`SUPPORT_TOLERANCE`] above the other's top.
    pub fn rests_on(&self, other: &Aabb) -> bool {
        let d = self.center - other.center;
        let horizontal =
            d.x.abs() < self.half.x + other.half.x && d.z.abs() < self.half.z + other.half.z;
        let gap = self.min().y - other.max().y;
        horizontal && (-SKIN..=SUPPORT_TOLERANCE).contains(&gap)
    }
}

fn direction(d: f32, tie: f32) -> f32 {
    if d < 0.0 {
        -1.0
    } else if d > 0.0 || tie >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Another actor's box as seen by the actor being resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorBox {
    pub aabb: Aabb,
    /// The other actor sorts before the one being resolved. Two actors
    /// sharing a centre are pushed apart in opposite directions by this.
    pub ordered_before: bool,
}

impl ActorBox {
    pub fn new(aabb: Aabb, ordered_before: bool) -> Self {
        Self {
            aabb,
            ordered_before,
        }
    }

    fn tie(&self) -> f32 {
        if self.ordered_before {
            1.0
        } else {
            -1.0
        }
    }
}

/// Corrected feet position for `state` after pushing it out of every
/// collider and every box in `others`, or `None` if nothing overlapped.
///
/// `others` must not contain the actor's own box.
pub fn resolve(
    state: &ActorState,
    others: &[ActorBox],
    colliders: &[StaticCollider],
) -> Option<Vec3> {
    let mut position = state.position;
    let mut collided = false;

    let obstacles = colliders
        .iter()
        .map(|collider| (collider.aabb(), 1.0))
        .chain(others.iter().map(|other| (other.aabb, other.tie())));
    for (obstacle, tie) in obstacles {
        if let Some(push) = Aabb::for_actor(position).push_out_with_tie(&obstacle, tie) {
            position += push;
            collided = true;
        }
    }

    collided.then_some(position)
}

/// Runs [`resolve`] and applies the result to `state`.
///
/// Velocity heading into a pushed axis is cancelled, an upward push or a
/// resting contact marks the actor as supported, and the applied delta is
/// recorded on `pending_correction` for the next broadcast.
pub fn settle(
    state: &mut ActorState,
    others: &[ActorBox],
    colliders: &[StaticCollider],
    tick: u64,
) -> Option<Correction> {
    state.pending_correction = None;

    let correction = resolve(state, others, colliders).map(|corrected| {
        let delta = corrected - state.position;
        if delta.x * state.velocity.x < 0.0 {
            state.velocity.x = 0.0;
        }
        if delta.y * state.velocity.y < 0.0 {
            state.velocity.y = 0.0;
        }
        if delta.z * state.velocity.z < 0.0 {
            state.velocity.z = 0.0;
        }
        state.position = corrected;
        Correction { tick, delta }
    });
    state.pending_correction = correction;

    let body = Aabb::for_actor(state.position);
    state.supported = state.velocity.y <= 0.0
        && colliders
            .iter()
            .map(StaticCollider::aabb)
            .chain(others.iter().map(|other| other.aabb))
            .any(|obstacle| body.rests_on(&obstacle));

    correction
}
