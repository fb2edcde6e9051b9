//! Fixed-rate tick clock with drift correction.
//!
//! The scheduler does not sleep itself; the event loop asks it for the next
//! deadline and brackets every tick with [`TickScheduler::begin_tick`] and
//! [`TickScheduler::finish_tick`]. `dt` handed to the simulation is the real
//! time elapsed since the previous tick, so scheduling jitter shows up in the
//! simulation instead of accumulating as lag.

use log::warn;
use std::time::{Duration, Instant};

/// Longest step handed to the simulation after a stall.
pub const MAX_DT: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Ticking,
}

/// Numbers for the tick that just started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInfo {
    pub tick: u64,
    pub dt: f32,
}

#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    phase: TickPhase,
    tick: u64,
    last_tick: Option<Instant>,
    tick_started: Option<Instant>,
    next_deadline: Instant,
    last_execution: Duration,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            phase: TickPhase::Idle,
            tick: 0,
            last_tick: None,
            tick_started: None,
            next_deadline: Instant::now(),
            last_execution: Duration::ZERO,
        }
    }

    /// Arms the first tick one period after `now`.
    pub fn start(&mut self, now: Instant) {
        self.phase = TickPhase::Ticking;
        self.next_deadline = now + self.period;
    }

    pub fn begin_tick(&mut self, now: Instant) -> TickInfo {
        self.phase = TickPhase::Ticking;
        let mut dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => self.period.as_secs_f32(),
        };
        if dt > MAX_DT {
            warn!("Tick stalled for {:.3}s, capping step to {:.3}s", dt, MAX_DT);
            dt = MAX_DT;
        }

        self.tick += 1;
        self.last_tick = Some(now);
        self.tick_started = Some(now);

        TickInfo {
            tick: self.tick,
            dt,
        }
    }

    /// Records the end of the current tick and returns the next deadline:
    /// one period after the tick started, or immediately if the tick overran.
    pub fn finish_tick(&mut self, now: Instant) -> Instant {
        let started = self.tick_started.take().unwrap_or(now);
        let execution = now.saturating_duration_since(started);
        self.last_execution = execution;
        self.next_deadline = now + self.period.saturating_sub(execution);
        self.next_deadline
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn last_execution(&self) -> Duration {
        self.last_execution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const PERIOD: Duration = Duration::from_millis(50);

    #[test]
    fn test_starts_idle() {
        let scheduler = TickScheduler::new(PERIOD);
        assert_eq!(scheduler.phase(), TickPhase::Idle);
        assert_eq!(scheduler.tick(), 0);
    }

    #[test]
    fn test_first_tick_uses_nominal_period() {
        let mut scheduler = TickScheduler::new(PERIOD);
        let t0 = Instant::now();
        scheduler.start(t0);
        assert_eq!(scheduler.phase(), TickPhase::Ticking);
        assert_eq!(scheduler.next_deadline(), t0 + PERIOD);

        let info = scheduler.begin_tick(t0 + PERIOD);
        assert_eq!(info.tick, 1);
        assert_approx_eq!(info.dt, 0.05, 1e-6);
    }

    #[test]
    fn test_dt_follows_wall_clock() {
        let mut scheduler = TickScheduler::new(PERIOD);
        let t0 = Instant::now();
        scheduler.begin_tick(t0);
        scheduler.finish_tick(t0 + Duration::from_millis(5));

        let info = scheduler.begin_tick(t0 + Duration::from_millis(63));
        assert_eq!(info.tick, 2);
        assert_approx_eq!(info.dt, 0.063, 1e-6);
    }

    #[test]
    fn test_next_deadline_subtracts_execution_time() {
        let mut scheduler = TickScheduler::new(PERIOD);
        let t0 = Instant::now();
        scheduler.begin_tick(t0);
        let next = scheduler.finish_tick(t0 + Duration::from_millis(12));
        assert_eq!(next, t0 + PERIOD);
        assert_eq!(scheduler.last_execution(), Duration::from_millis(12));
    }

    #[test]
    fn test_overrun_schedules_immediately() {
        let mut scheduler = TickScheduler::new(PERIOD);
        let t0 = Instant::now();
        scheduler.begin_tick(t0);
        let finished = t0 + Duration::from_millis(80);
        assert_eq!(scheduler.finish_tick(finished), finished);
    }

    #[test]
    fn test_long_stall_caps_dt() {
        let mut scheduler = TickScheduler::new(PERIOD);
        let t0 = Instant::now();
        scheduler.begin_tick(t0);
        scheduler.finish_tick(t0);
        let info = scheduler.begin_tick(t0 + Duration::from_secs(3));
        assert_eq!(info.dt, MAX_DT);
    }
}
