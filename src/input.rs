use std::collections::HashSet;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    pub const FORWARD: Self = Self::Character('W');
    pub const BACK: Self = Self::Character('S');
    pub const LEFT: Self = Self::Character('A');
    pub const RIGHT: Self = Self::Character('D');
    pub const UP: Self = Self::Named(NamedKey::Space);
    pub const DOWN: Self = Self::Named(NamedKey::LeftShift);
    pub const DOWN_ALT: Self = Self::Named(NamedKey::RightShift);
    pub const QUIT: Self = Self::Named(NamedKey::Escape);
}

/// Non-printable keys the viewer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Escape,
    LeftShift,
    RightShift,
}

/// Keys currently held down.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    keys: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    /// Forgets every held key, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Movement flags for [`crate::Camera::move_by`].
    ///
    /// x is D minus A, y is Space minus either Shift, z is W minus S.
    pub fn movement_direction(&self) -> Vec3 {
        let axis = |positive: bool, negative: bool| f32::from(u8::from(positive)) - f32::from(u8::from(negative));
        let down = self.is_key_down(KeyCode::DOWN) || self.is_key_down(KeyCode::DOWN_ALT);
        Vec3::new(
            axis(self.is_key_down(KeyCode::RIGHT), self.is_key_down(KeyCode::LEFT)),
            axis(self.is_key_down(KeyCode::UP), down),
            axis(self.is_key_down(KeyCode::FORWARD), self.is_key_down(KeyCode::BACK)),
        )
    }
}

/// Turns raw mouse motion into look offsets.
///
/// The first delta after a reset is dropped, since grabbing the cursor can
/// report one large jump. Offsets are returned as `(dx, -dy)` so moving the
/// mouse up looks up.
#[derive(Debug, Default, Clone, Copy)]
pub struct MouseTracker {
    primed: bool,
}

impl MouseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn motion(&mut self, delta: Vec2) -> Option<Vec2> {
        if !std::mem::replace(&mut self.primed, true) {
            return None;
        }
        Some(Vec2::new(delta.x, -delta.y))
    }

    /// Drops the baseline so the next event cannot produce a jump.
    pub fn reset(&mut self) {
        self.primed = false;
    }
}
