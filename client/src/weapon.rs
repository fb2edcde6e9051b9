//! Local magazine, fire-rate and reload bookkeeping for the equipped gun.
//!
//! Purely cosmetic and advisory: the server decides hits. Timers are
//! deadline fields compared against the caller's clock on every use.

use log::debug;
use shared::items::{self, GunStats, NO_ITEM};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Fired,
    /// Fire-rate cooldown still running
    Cooldown,
    Reloading,
    /// Magazine empty; a reload was started
    Empty,
    NoWeapon,
}

#[derive(Debug, Clone)]
pub struct WeaponState {
    item_id: i32,
    /// Rounds left per gun, kept across weapon switches
    ammo: HashMap<i32, u32>,
    next_shot_at: Option<Instant>,
    reload_deadline: Option<Instant>,
}

impl Default for WeaponState {
    fn default() -> Self {
        Self::new()
    }
}

impl WeaponState {
    pub fn new() -> Self {
        Self {
            item_id: NO_ITEM,
            ammo: HashMap::new(),
            next_shot_at: None,
            reload_deadline: None,
        }
    }

    pub fn item_id(&self) -> i32 {
        self.item_id
    }

    fn gun(&self) -> Option<&'static GunStats> {
        items::gun(self.item_id)
    }

    /// Switches to `item_id`, cancelling any reload in progress.
    pub fn equip(&mut self, item_id: i32) {
        if item_id == self.item_id {
            return;
        }
        if self.reload_deadline.take().is_some() {
            debug!("Equipped item changed during reload, cancelling reload");
        }
        self.item_id = item_id;
        self.next_shot_at = None;
        if let Some(gun) = items::gun(item_id) {
            self.ammo.entry(item_id).or_insert(gun.magazine_size);
        }
    }

    pub fn ammo(&self) -> u32 {
        self.ammo.get(&self.item_id).copied().unwrap_or(0)
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_deadline.is_some()
    }

    /// Finishes a reload whose deadline has passed.
    pub fn update(&mut self, now: Instant) {
        if let Some(deadline) = self.reload_deadline {
            if now >= deadline {
                self.reload_deadline = None;
                if let Some(gun) = self.gun() {
                    self.ammo.insert(self.item_id, gun.magazine_size);
                }
            }
        }
    }

    /// Starts a reload unless one is running or the magazine is full.
    pub fn start_reload(&mut self, now: Instant) -> bool {
        self.update(now);
        let Some(gun) = self.gun() else {
            return false;
        };
        if self.is_reloading() || self.ammo() >= gun.magazine_size {
            return false;
        }
        self.reload_deadline = Some(now + Duration::from_secs_f32(gun.reload_time));
        true
    }

    pub fn try_fire(&mut self, now: Instant) -> FireOutcome {
        self.update(now);
        let Some(gun) = self.gun() else {
            return FireOutcome::NoWeapon;
        };
        if self.is_reloading() {
            return FireOutcome::Reloading;
        }
        if self.next_shot_at.map_or(false, |at| now < at) {
            return FireOutcome::Cooldown;
        }
        let ammo = self.ammo();
        if ammo == 0 {
            self.start_reload(now);
            return FireOutcome::Empty;
        }

        self.ammo.insert(self.item_id, ammo - 1);
        self.next_shot_at = Some(now + Duration::from_secs_f32(gun.fire_interval()));
        FireOutcome::Fired
    }

    /// Forgets all magazines, e.g. after respawning.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
