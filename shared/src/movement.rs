//! Kinematic actor simulation.
//!
//! [`advance`] steps one actor forward by `dt` seconds from its latest
//! [`InputIntent`]. The server runs it inside the tick loop; nothing else
//! mutates position or velocity apart from the collision and hit-scan
//! resolvers.
//!
//! Step order matters for feel: ground check, jump, wish direction,
//! friction, acceleration, air-strafe, gravity, integrate, ground clamp.

use crate::collision::Correction;
use crate::items::NO_ITEM;
use crate::math::{clamp, rotate_y, yaw_basis, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_4;

pub const WALK_SPEED: f32 = 6.6;
pub const MAX_SPEED: f32 = 15.0;
pub const GROUND_ACCELERATION: f32 = 10.0;
pub const AIR_ACCELERATION: f32 = 7.0;
pub const FRICTION_GROUND: f32 = 2.0;
pub const FRICTION_AIR: f32 = 0.5;
pub const JUMP_FORCE: f32 = 5.0;
pub const GRAVITY: f32 = 15.0;

/// Jumps allowed while airborne before touching ground again.
pub const MAX_AIR_JUMPS: u32 = 1;
/// Seconds a jump press stays queued waiting for a landing.
pub const JUMP_BUFFER: f64 = 0.2;
/// Feet height at or below which the actor counts as standing on the floor.
pub const GROUND_THRESHOLD: f32 = 0.15;

/// Radians per second the strafe angle may turn towards the wish direction.
pub const STRAFE_ANGLE_RATE: f32 = 4.0;
pub const MAX_STRAFE_ANGLE: f32 = FRAC_PI_4;
/// Forward push (units/s²) along the strafe direction while air-strafing.
pub const STRAFE_PUSH: f32 = 2.0;

pub const MAX_HEALTH: i32 = 100;
pub const SPAWN_POINT: Vec3 = Vec3::new(0.0, 1.8, 0.0);

/// Desired action for one actor, replaced wholesale on every input message.
///
/// Comes from an untrusted client: only the direction flags and yaw are
/// acted upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub rotation_y: f32,
    #[serde(alias = "equippedItemID")]
    pub equipped_item_id: i32,
}

impl Default for InputIntent {
    fn default() -> Self {
        Self {
            forward: false,
            backward: false,
            left: false,
            right: false,
            jump: false,
            rotation_y: 0.0,
            equipped_item_id: NO_ITEM,
        }
    }
}

impl InputIntent {
    pub fn is_moving(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }

    /// Replaces a non-finite yaw with zero.
    pub fn sanitized(mut self) -> Self {
        if !self.rotation_y.is_finite() {
            self.rotation_y = 0.0;
        }
        self
    }

    /// Unit horizontal direction the flags ask for, or zero.
    pub fn wish_direction(&self) -> Vec3 {
        let (forward, right) = yaw_basis(self.rotation_y);
        let mut wish = Vec3::ZERO;
        if self.forward {
            wish += forward;
        }
        if self.backward {
            wish -= forward;
        }
        if self.left {
            wish -= right;
        }
        if self.right {
            wish += right;
        }
        wish.horizontal().normalize()
    }
}

/// Authoritative state of a single actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    /// Feet position; the ground plane is y = 0.
    pub position: Vec3,
    pub velocity: Vec3,
    pub move_direction: Vec3,
    pub wish_direction: Vec3,
    pub rotation_y: f32,
    pub is_grounded: bool,
    /// Standing on top of a collider, as reported by the collision pass.
    pub supported: bool,
    pub health: i32,
    pub is_dead: bool,
    /// Actor-local simulation time in seconds.
    pub clock: f64,
    pub last_jump_time: f64,
    pub jump_queued: bool,
    pub jump_deadline: f64,
    pub consecutive_jumps: u32,
    /// Friction coefficient applied on the last step.
    pub friction: f32,
    pub strafe_angle: f32,
    pub input: InputIntent,
    pub equipped_item_id: i32,
    pub pending_correction: Option<Correction>,
}

impl ActorState {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            move_direction: Vec3::ZERO,
            wish_direction: Vec3::ZERO,
            rotation_y: 0.0,
            is_grounded: false,
            supported: false,
            health: MAX_HEALTH,
            is_dead: false,
            clock: 0.0,
            last_jump_time: 0.0,
            jump_queued: false,
            jump_deadline: 0.0,
            consecutive_jumps: 0,
            friction: 0.0,
            strafe_angle: 0.0,
            input: InputIntent::default(),
            equipped_item_id: NO_ITEM,
            pending_correction: None,
        }
    }

    /// Puts the actor back at `position` with full health and no momentum.
    pub fn reset(&mut self, position: Vec3) {
        *self = ActorState::new(position);
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.strafe_angle.is_finite()
    }
}

/// Advances `state` by `dt` seconds using `input`.
///
/// Dead actors ignore their input but keep falling.
pub fn advance(state: &mut ActorState, input: &InputIntent, dt: f32) {
    let idle = InputIntent::default();
    let input = if state.is_dead { &idle } else { input };

    state.clock += f64::from(dt);
    state.rotation_y = input.rotation_y;

    // Ground check
    let on_floor = state.position.y <= GROUND_THRESHOLD && state.velocity.y <= 0.0;
    let grounded = on_floor || state.supported;
    if grounded && !state.is_grounded {
        state.consecutive_jumps = 0;
    }
    state.is_grounded = grounded;
    if on_floor && state.position.y > 0.0 {
        state.position.y = 0.0;
    }

    // Jump buffering
    if input.jump {
        state.jump_queued = true;
        state.jump_deadline = state.clock + JUMP_BUFFER;
    } else if state.jump_queued && state.clock > state.jump_deadline {
        state.jump_queued = false;
    }
    if state.jump_queued && (state.is_grounded || state.consecutive_jumps < MAX_AIR_JUMPS) {
        state.velocity.y = JUMP_FORCE;
        state.is_grounded = false;
        state.supported = false;
        state.consecutive_jumps += 1;
        state.last_jump_time = state.clock;
        state.jump_queued = false;
    }

    let wish = input.wish_direction();
    state.wish_direction = wish;

    apply_friction(state, dt);
    accelerate(state, wish, dt);
    air_strafe(state, wish, dt);

    if !state.is_grounded {
        state.velocity.y -= GRAVITY * dt;
    }

    state.position += state.velocity * dt;

    if state.position.y <= 0.0 {
        state.position.y = 0.0;
        state.velocity.y = 0.0;
        state.is_grounded = true;
        state.consecutive_jumps = 0;
    }

    state.move_direction = state.velocity.horizontal().normalize();
}

/// Scales horizontal speed down, never below zero.
///
/// Speeds under walking pace are treated as walking pace so slow actors
/// still come to a stop in a bounded time.
fn apply_friction(state: &mut ActorState, dt: f32) {
    let friction = if state.is_grounded {
        FRICTION_GROUND
    } else {
        FRICTION_AIR
    };
    state.friction = friction;

    let speed = state.velocity.horizontal_length();
    if speed <= 0.0 {
        return;
    }
    let control = speed.max(WALK_SPEED);
    let drop = control * friction * dt;
    let new_speed = (speed - drop).max(0.0);
    let ratio = new_speed / speed;
    state.velocity.x *= ratio;
    state.velocity.z *= ratio;
}

fn accelerate(state: &mut ActorState, wish: Vec3, dt: f32) {
    if wish.length_squared() == 0.0 {
        return;
    }
    let acceleration = if state.is_grounded {
        GROUND_ACCELERATION
    } else {
        AIR_ACCELERATION
    };
    let current_speed = state.velocity.dot(&wish);
    let add_speed = (MAX_SPEED - current_speed).max(0.0);
    let accel_speed = add_speed.min(acceleration * dt * MAX_SPEED);
    state.velocity.x += wish.x * accel_speed;
    state.velocity.z += wish.z * accel_speed;
}

/// Steers the persistent strafe angle towards the wish direction and
/// pushes along it. This is where diagonal air movement gains speed.
fn air_strafe(state: &mut ActorState, wish: Vec3, dt: f32) {
    if state.is_grounded {
        state.strafe_angle = 0.0;
        return;
    }
    let horizontal = state.velocity.horizontal();
    if wish.length_squared() == 0.0 || horizontal.length_squared() < 1e-6 {
        return;
    }

    let cross = horizontal.z * wish.x - horizontal.x * wish.z;
    let target = cross.atan2(horizontal.dot(&wish));
    let max_turn = STRAFE_ANGLE_RATE * dt;
    state.strafe_angle += clamp(target - state.strafe_angle, -max_turn, max_turn);
    state.strafe_angle = clamp(state.strafe_angle, -MAX_STRAFE_ANGLE, MAX_STRAFE_ANGLE);

    let strafe_direction = rotate_y(horizontal.normalize(), state.strafe_angle);
    state.velocity += strafe_direction * (STRAFE_PUSH * dt);
}
