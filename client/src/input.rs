//! Client input management with change detection

use shared::items::{NO_ITEM, PRIMARY_ITEM, SECONDARY_ITEM};
use shared::math::Vec3;
use shared::movement::InputIntent;

/// Unit view direction for a yaw and pitch in radians. Positive pitch looks
/// down.
pub fn look_direction(yaw: f32, pitch: f32) -> Vec3 {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    Vec3::new(sin_yaw * cos_pitch, -sin_pitch, cos_yaw * cos_pitch)
}

/// Keys the client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Backward,
    Left,
    Right,
    Jump,
    Primary,
    Secondary,
    Holster,
    Reload,
}

impl Key {
    /// Default layout: WASD, space, 1/2/3 and R.
    pub fn from_char(c: char) -> Option<Key> {
        match c.to_ascii_lowercase() {
            'w' => Some(Key::Forward),
            's' => Some(Key::Backward),
            'a' => Some(Key::Left),
            'd' => Some(Key::Right),
            ' ' => Some(Key::Jump),
            '1' => Some(Key::Primary),
            '2' => Some(Key::Secondary),
            '3' => Some(Key::Holster),
            'r' => Some(Key::Reload),
            _ => None,
        }
    }
}

/// One-shot requests produced by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Reload,
    RespawnRequest,
}

/// Builds the local [`InputIntent`] from key and mouse events
pub struct InputManager {
    current: InputIntent,
    last_sent: Option<InputIntent>,
    dead: bool,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            current: InputIntent::default(),
            last_sent: None,
            dead: false,
        }
    }

    pub fn current(&self) -> &InputIntent {
        &self.current
    }

    pub fn key_down(&mut self, key: Key) -> Option<InputAction> {
        if self.dead {
            return (key == Key::Jump).then_some(InputAction::RespawnRequest);
        }

        match key {
            Key::Forward => self.current.forward = true,
            Key::Backward => self.current.backward = true,
            Key::Left => self.current.left = true,
            Key::Right => self.current.right = true,
            Key::Jump => self.current.jump = true,
            Key::Primary => self.current.equipped_item_id = PRIMARY_ITEM,
            Key::Secondary => self.current.equipped_item_id = SECONDARY_ITEM,
            Key::Holster => self.current.equipped_item_id = NO_ITEM,
            Key::Reload => return Some(InputAction::Reload),
        }
        None
    }

    pub fn key_up(&mut self, key: Key) {
        match key {
            Key::Forward => self.current.forward = false,
            Key::Backward => self.current.backward = false,
            Key::Left => self.current.left = false,
            Key::Right => self.current.right = false,
            Key::Jump => self.current.jump = false,
            Key::Primary | Key::Secondary | Key::Holster | Key::Reload => {}
        }
    }

    /// Mouse-look yaw in radians.
    pub fn set_rotation(&mut self, rotation_y: f32) {
        if rotation_y.is_finite() {
            self.current.rotation_y = rotation_y;
        }
    }

    /// Dying releases every held movement key.
    pub fn set_dead(&mut self, dead: bool) {
        if dead && !self.dead {
            let equipped = self.current.equipped_item_id;
            let rotation = self.current.rotation_y;
            self.current = InputIntent {
                equipped_item_id: equipped,
                rotation_y: rotation,
                ..InputIntent::default()
            };
        }
        self.dead = dead;
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Returns the intent to send if it changed since the last one sent.
    pub fn take_changed(&mut self) -> Option<InputIntent> {
        if self.last_sent.as_ref() == Some(&self.current) {
            return None;
        }
        self.last_sent = Some(self.current.clone());
        Some(self.current.clone())
    }

    /// Forces the next [`InputManager::take_changed`] to send, e.g. after a
    /// reconnect.
    pub fn invalidate(&mut self) {
        self.last_sent = None;
    }
}
