//! Smooths sparse server snapshots of one remote actor into per-frame
//! render states.
//!
//! Snapshots are buffered with their local arrival time and rendered a fixed
//! delay in the past, so there is almost always an older and a newer entry
//! to blend between. The delay trades responsiveness for smoothness.

use shared::collision::Correction;
use shared::math::Vec3;
use shared::protocol::ActorSnapshot;
use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};
use std::time::{Duration, Instant};

/// One second of history at 20 snapshots per second.
pub const DEFAULT_CAPACITY: usize = 20;

pub const DEFAULT_RENDER_DELAY: Duration = Duration::from_millis(100);

/// Snapshot fields the interpolator cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub tick: u64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation_y: f32,
    pub correction: Option<Correction>,
}

impl StateEntry {
    pub fn from_snapshot(tick: u64, snapshot: &ActorSnapshot) -> Self {
        Self {
            tick,
            position: snapshot.position,
            velocity: snapshot.velocity,
            rotation_y: snapshot.rotation_y,
            correction: snapshot.pending_correction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BufferedState {
    entry: StateEntry,
    received_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub position: Vec3,
    /// Velocity implied by the interpolated motion, not the raw broadcast.
    pub velocity: Vec3,
    pub rotation_y: f32,
}

#[derive(Debug, Clone)]
pub struct StateInterpolator {
    buffer: VecDeque<BufferedState>,
    capacity: usize,
}

impl Default for StateInterpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl StateInterpolator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn add_state(&mut self, entry: StateEntry) {
        self.add_state_at(entry, Instant::now());
    }

    /// Buffers `entry` as received at `received_at`.
    ///
    /// A correction on the entry shifts every already-buffered entry from
    /// the corrected tick onwards. The entry itself already holds the
    /// corrected position and is stored as is.
    ///
    /// The server stamps a correction with the tick of the snapshot carrying
    /// it, so in a live stream nothing buffered is that new and the shift
    /// is a no-op. It only bites when a correction names an earlier tick.
    pub fn add_state_at(&mut self, entry: StateEntry, received_at: Instant) {
        let received_at = match self.buffer.back() {
            Some(last) if received_at < last.received_at => last.received_at,
            _ => received_at,
        };

        if let Some(correction) = entry.correction {
            for buffered in self.buffer.iter_mut() {
                if buffered.entry.tick >= correction.tick {
                    buffered.entry.position += correction.delta;
                }
            }
        }

        self.buffer.push_back(BufferedState { entry, received_at });
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    pub fn interpolated_state(&self, render_delay: Duration) -> Option<RenderState> {
        self.interpolated_state_at(Instant::now(), render_delay)
    }

    /// State of the actor `render_delay` before `now`, or `None` unless two
    /// buffered entries straddle that moment.
    pub fn interpolated_state_at(&self, now: Instant, render_delay: Duration) -> Option<RenderState> {
        let target = now.checked_sub(render_delay)?;

        let older_index = self
            .buffer
            .iter()
            .rposition(|buffered| buffered.received_at <= target)?;
        let older = &self.buffer[older_index];
        let newer = self.buffer.get(older_index + 1)?;

        let span = newer
            .received_at
            .saturating_duration_since(older.received_at)
            .as_secs_f32();
        let elapsed = target
            .saturating_duration_since(older.received_at)
            .as_secs_f32();
        let factor = if span > 0.0 {
            (elapsed / span).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let position = older.entry.position.lerp(&newer.entry.position, factor);
        let moved_for = span * factor;
        let velocity = if moved_for > 0.0 {
            (position - older.entry.position) * (1.0 / moved_for)
        } else {
            older.entry.velocity
        };

        Some(RenderState {
            position,
            velocity,
            rotation_y: lerp_angle(older.entry.rotation_y, newer.entry.rotation_y, factor),
        })
    }

    /// The newest entry at rest, once the render time has caught up with it.
    ///
    /// Returns `None` while the render time is still before the newest
    /// entry's arrival, or when nothing is buffered.
    pub fn settled_state_at(&self, now: Instant, render_delay: Duration) -> Option<RenderState> {
        let target = now.checked_sub(render_delay)?;
        let newest = self.buffer.back()?;
        if target < newest.received_at {
            return None;
        }

        Some(RenderState {
            position: newest.entry.position,
            velocity: Vec3::ZERO,
            rotation_y: newest.entry.rotation_y,
        })
    }

    pub fn latest(&self) -> Option<&StateEntry> {
        self.buffer.back().map(|buffered| &buffered.entry)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Blends two yaw angles along the shorter arc.
fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let mut diff = (to - from) % TAU;
    if diff > PI {
        diff -= TAU;
    } else if diff < -PI {
        diff += TAU;
    }
    from + diff * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn entry(tick: u64, x: f32) -> StateEntry {
        StateEntry {
            tick,
            position: Vec3::new(x, 0.0, 0.0),
            velocity: Vec3::new(10.0, 0.0, 0.0),
            rotation_y: 0.0,
            correction: None,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_midpoint_between_two_states() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        interpolator.add_state_at(entry(1, 0.0), t0);
        interpolator.add_state_at(entry(2, 1.0), t0 + ms(100));

        let state = interpolator
            .interpolated_state_at(t0 + ms(150), ms(100))
            .unwrap();
        assert_approx_eq!(state.position.x, 0.5, 1e-4);
        assert_approx_eq!(state.position.y, 0.0, 1e-6);

        let same = interpolator
            .interpolated_state_at(t0 + ms(100), ms(50))
            .unwrap();
        assert_approx_eq!(same.position.x, 0.5, 1e-4);
    }

    #[test]
    fn test_effective_velocity_matches_displacement() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        interpolator.add_state_at(entry(1, 0.0), t0);
        interpolator.add_state_at(entry(2, 1.0), t0 + ms(100));

        let state = interpolator
            .interpolated_state_at(t0 + ms(125), ms(100))
            .unwrap();
        // One unit per 100 ms, regardless of the broadcast velocity of 10.
        assert_approx_eq!(state.velocity.x, 10.0, 1e-2);
        assert_approx_eq!(state.position.x, 0.25, 1e-4);

        let mut fast = StateInterpolator::new();
        fast.add_state_at(entry(1, 0.0), t0);
        fast.add_state_at(entry(2, 3.0), t0 + ms(100));
        let state = fast.interpolated_state_at(t0 + ms(150), ms(100)).unwrap();
        assert_approx_eq!(state.velocity.x, 30.0, 1e-2);
    }

    #[test]
    fn test_none_without_straddling_states() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        assert!(interpolator.interpolated_state_at(t0, ms(100)).is_none());

        interpolator.add_state_at(entry(1, 0.0), t0);
        assert!(interpolator
            .interpolated_state_at(t0 + ms(200), ms(100))
            .is_none());

        interpolator.add_state_at(entry(2, 1.0), t0 + ms(100));
        // Target time is newer than every entry.
        assert!(interpolator
            .interpolated_state_at(t0 + ms(300), ms(100))
            .is_none());
    }

    #[test]
    fn test_correction_shifts_buffered_entries() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        interpolator.add_state_at(entry(1, 0.0), t0);
        interpolator.add_state_at(entry(2, 1.0), t0 + ms(100));

        let before = interpolator
            .interpolated_state_at(t0 + ms(150), ms(100))
            .unwrap();
        assert_approx_eq!(before.position.z, 0.0, 1e-6);

        let corrected = StateEntry {
            tick: 3,
            position: Vec3::new(2.0, 0.0, 2.0),
            velocity: Vec3::ZERO,
            rotation_y: 0.0,
            correction: Some(Correction {
                tick: 1,
                delta: Vec3::new(0.0, 0.0, 2.0),
            }),
        };
        interpolator.add_state_at(corrected, t0 + ms(200));

        let after = interpolator
            .interpolated_state_at(t0 + ms(150), ms(100))
            .unwrap();
        assert_approx_eq!(after.position.x, 0.5, 1e-4);
        assert_approx_eq!(after.position.z, 2.0, 1e-4);
        assert_eq!(interpolator.latest().unwrap().position, Vec3::new(2.0, 0.0, 2.0));
    }

    #[test]
    fn test_correction_skips_older_ticks() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        interpolator.add_state_at(entry(1, 0.0), t0);
        interpolator.add_state_at(entry(2, 1.0), t0 + ms(100));

        let mut corrected = entry(3, 2.0);
        corrected.correction = Some(Correction {
            tick: 2,
            delta: Vec3::new(0.0, 1.0, 0.0),
        });
        interpolator.add_state_at(corrected, t0 + ms(200));

        let at_first = interpolator.interpolated_state_at(t0, Duration::ZERO).unwrap();
        assert_approx_eq!(at_first.position.y, 0.0, 1e-6);
        let at_second = interpolator
            .interpolated_state_at(t0 + ms(100), Duration::ZERO)
            .unwrap();
        assert_approx_eq!(at_second.position.y, 1.0, 1e-6);
    }

    #[test]
    fn test_live_correction_leaves_history_alone() {
        use shared::collision::{settle, ActorBox, Aabb};
        use shared::movement::ActorState;

        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        interpolator.add_state_at(entry(1, 0.0), t0);
        interpolator.add_state_at(entry(2, 0.3), t0 + ms(50));

        // Tick 3 walks into a neighbour and gets pushed back out.
        let mut actor = ActorState::new(Vec3::new(0.6, 0.0, 0.0));
        let neighbour = ActorBox::new(Aabb::for_actor(Vec3::new(1.0, 0.0, 0.0)), false);
        let correction = settle(&mut actor, &[neighbour], &[], 3).unwrap();
        assert_eq!(correction.tick, 3);

        let incoming = StateEntry {
            tick: 3,
            position: actor.position,
            velocity: actor.velocity,
            rotation_y: 0.0,
            correction: actor.pending_correction,
        };
        interpolator.add_state_at(incoming, t0 + ms(100));

        let first = interpolator.interpolated_state_at(t0, Duration::ZERO).unwrap();
        assert_eq!(first.position, Vec3::ZERO);
        let second = interpolator
            .interpolated_state_at(t0 + ms(50), Duration::ZERO)
            .unwrap();
        assert_approx_eq!(second.position.x, 0.3, 1e-6);
        assert_eq!(interpolator.latest().unwrap().position, actor.position);
    }

    #[test]
    fn test_settles_on_newest_entry_when_data_runs_out() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        assert!(interpolator.settled_state_at(t0, ms(100)).is_none());

        interpolator.add_state_at(entry(1, 0.0), t0);
        interpolator.add_state_at(entry(2, 1.0), t0 + ms(50));
        interpolator.add_state_at(entry(3, 1.5), t0 + ms(100));

        // Still blending, so not settled yet.
        assert!(interpolator.settled_state_at(t0 + ms(180), ms(100)).is_none());

        let settled = interpolator.settled_state_at(t0 + ms(200), ms(100)).unwrap();
        assert_eq!(settled.position, Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(settled.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::with_capacity(5);
        for i in 0..12u64 {
            interpolator.add_state_at(entry(i, i as f32), t0 + ms(i * 50));
        }
        assert_eq!(interpolator.len(), 5);
        assert_eq!(interpolator.latest().unwrap().tick, 11);
        // The evicted range can no longer be rendered.
        assert!(interpolator
            .interpolated_state_at(t0 + ms(100), Duration::ZERO)
            .is_none());
    }

    #[test]
    fn test_out_of_order_arrival_is_clamped() {
        let t0 = Instant::now() + ms(1000);
        let mut interpolator = StateInterpolator::new();
        interpolator.add_state_at(entry(1, 0.0), t0);
        interpolator.add_state_at(entry(2, 1.0), t0 - ms(500));
        interpolator.add_state_at(entry(3, 2.0), t0 + ms(100));
        assert_eq!(interpolator.len(), 3);
        let state = interpolator
            .interpolated_state_at(t0 + ms(50), Duration::ZERO)
            .unwrap();
        assert_approx_eq!(state.position.x, 1.5, 1e-4);
    }

    #[test]
    fn test_rotation_takes_short_way_round() {
        let t0 = Instant::now();
        let mut interpolator = StateInterpolator::new();
        let mut a = entry(1, 0.0);
        a.rotation_y = PI - 0.1;
        let mut b = entry(2, 0.0);
        b.rotation_y = -PI + 0.1;
        interpolator.add_state_at(a, t0);
        interpolator.add_state_at(b, t0 + ms(100));

        let state = interpolator
            .interpolated_state_at(t0 + ms(50), Duration::ZERO)
            .unwrap();
        assert_approx_eq!(state.rotation_y.abs(), PI, 1e-4);
    }
}
