#[cfg(target_arch = "wasm32")]
pub mod wasm;

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(Self::Named(key));
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphabetic() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            (Some(ch), None) if ch.is_ascii_digit() => Some(Self::Digit(ch as u8 - b'0')),
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<NamedKey> {
    use NamedKey::*;
    let key = match name {
        "Space" | " " => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" | "ArrowLeft" => Left,
        "Right" | "ArrowRight" => Right,
        "Up" | "ArrowUp" => Up,
        "Down" | "ArrowDown" => Down,
        "Escape" | "Esc" => Escape,
        "Backspace" => Backspace,
        "Shift" => Shift,
        "Control" | "Ctrl" => Control,
        "Alt" => Alt,
        _ => return None,
    };
    Some(key)
}

/// Friendly names for the non-printable keys games usually bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    Shift,
    Control,
    Alt,
}

/// Keyboard state fed by host events and sampled once per logical tick.
///
/// Key-down state is live. Presses are buffered and only become visible
/// through [`InputState::was_key_pressed`] after the next [`InputState::poll`],
/// so every press is seen by exactly one update even if several frames pass
/// between ticks.
#[derive(Debug, Default)]
pub struct InputState {
    down: RwLock<HashSet<KeyCode>>,
    pressed_since_poll: RwLock<HashSet<KeyCode>>,
    pressed: RwLock<HashSet<KeyCode>>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        if self.down.write().insert(key) {
            self.pressed_since_poll.write().insert(key);
        }
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.down.write().remove(&key);
    }

    /// Publishes the presses buffered since the previous poll.
    pub fn poll(&self) {
        let fresh = std::mem::take(&mut *self.pressed_since_poll.write());
        *self.pressed.write() = fresh;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.down.read().contains(&key)
    }

    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed.read().contains(&key)
    }

    pub fn is_key_down_by_name(&self, name: &str) -> bool {
        KeyCode::from_name(name).is_some_and(|key| self.is_key_down(key))
    }

    /// Releases every key, e.g. when the surface loses focus.
    pub fn clear(&self) {
        self.down.write().clear();
        self.pressed_since_poll.write().clear();
        self.pressed.write().clear();
    }
}
