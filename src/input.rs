//! Abstract input actions and the play-state machine.
//!
//! The core never reads devices. An embedding shell feeds raw
//! (device, key, modifiers) triples through the [`InputActionMap`], which
//! resolves them to [`InputAction`]s; the simulation consumes the resulting
//! [`InputEvent`]s as commands. Play-state changes go through a transition
//! table; forbidden transitions are logged and rejected.

use bevy_ecs::prelude::Resource;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::components::{PlayState, TowerKind};
use crate::config::tower_palette;
use crate::error::{SimError, SimResult};

/// Input device classes the map can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputDevice {
    Keyboard,
    MouseButton,
    MouseWheel,
}

/// Abstract game actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputAction {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Select,
    Confirm,
    Cancel,
    Pause,
    SpeedUp,
    SpeedDown,
    SpeedNormal,
    ToggleMenu,
    ShowStats,
    ToggleDebug,
    BuildMode,
    UpgradeTower,
    SellTower,
    ZoomIn,
    ZoomOut,
    CameraReset,
    /// Pick a tower kind for placement.
    SelectTower(TowerKind),
}

/// Key and button codes used by the default binding table. The values are
/// arbitrary but stable; shells translate their own device codes into these.
pub mod keys {
    pub const A: u32 = 97;
    pub const B: u32 = 98;
    pub const D: u32 = 100;
    pub const P: u32 = 112;
    pub const S: u32 = 115;
    pub const U: u32 = 117;
    pub const W: u32 = 119;
    pub const X: u32 = 120;
    pub const KEY_1: u32 = 49;
    pub const KEY_9: u32 = 57;
    pub const ENTER: u32 = 65293;
    pub const SPACE: u32 = 32;
    pub const ESCAPE: u32 = 65307;
    pub const TAB: u32 = 65289;
    pub const LEFT: u32 = 65361;
    pub const UP: u32 = 65362;
    pub const RIGHT: u32 = 65363;
    pub const DOWN: u32 = 65364;
    pub const PLUS: u32 = 43;
    pub const MINUS: u32 = 45;
    pub const HOME: u32 = 65360;
    pub const F1: u32 = 65470;
    pub const F3: u32 = 65472;
    pub const MOD_CTRL: u32 = 1 << 1;
    pub const MOUSE_LEFT: u32 = 1;
    pub const MOUSE_RIGHT: u32 = 4;
}

/// One physical-input-to-action binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    pub action: InputAction,
    pub device: InputDevice,
    pub key_or_button: u32,
    pub modifiers: u32,
}

impl InputBinding {
    pub fn key(action: InputAction, key: u32) -> Self {
        Self {
            action,
            device: InputDevice::Keyboard,
            key_or_button: key,
            modifiers: 0,
        }
    }

    pub fn matches(&self, device: InputDevice, key_or_button: u32, modifiers: u32) -> bool {
        self.device == device && self.key_or_button == key_or_button && self.modifiers == modifiers
    }
}

/// A resolved input, ready for the simulation to consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub action: InputAction,
    pub pressed: bool,
    /// Game time of resolution.
    pub timestamp: f64,
    /// World-space pointer position, when the device has one.
    pub position: Option<(f32, f32)>,
}

/// Maps raw device inputs to abstract actions.
#[derive(Resource, Debug, Clone)]
pub struct InputActionMap {
    bindings: Vec<InputBinding>,
}

impl Default for InputActionMap {
    fn default() -> Self {
        let mut map = Self {
            bindings: Vec::new(),
        };
        map.install_default_bindings();
        map
    }
}

impl InputActionMap {
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    fn install_default_bindings(&mut self) {
        use keys::*;
        let defaults = [
            // Navigation: arrows and WASD.
            InputBinding::key(InputAction::MoveLeft, LEFT),
            InputBinding::key(InputAction::MoveLeft, A),
            InputBinding::key(InputAction::MoveRight, RIGHT),
            InputBinding::key(InputAction::MoveRight, D),
            InputBinding::key(InputAction::MoveUp, UP),
            InputBinding::key(InputAction::MoveUp, W),
            InputBinding::key(InputAction::MoveDown, DOWN),
            InputBinding::key(InputAction::MoveDown, S),
            // Interaction.
            InputBinding::key(InputAction::Select, ENTER),
            InputBinding::key(InputAction::Select, SPACE),
            InputBinding::key(InputAction::Confirm, ENTER),
            InputBinding::key(InputAction::Cancel, ESCAPE),
            // Game flow.
            InputBinding::key(InputAction::Pause, P),
            InputBinding::key(InputAction::SpeedUp, PLUS),
            InputBinding::key(InputAction::SpeedDown, MINUS),
            InputBinding::key(InputAction::SpeedNormal, KEY_1),
            // Interface.
            InputBinding::key(InputAction::ToggleMenu, TAB),
            InputBinding::key(InputAction::ShowStats, F1),
            InputBinding::key(InputAction::ToggleDebug, F3),
            // Construction.
            InputBinding::key(InputAction::BuildMode, B),
            InputBinding::key(InputAction::UpgradeTower, U),
            InputBinding::key(InputAction::SellTower, X),
            // Camera.
            InputBinding {
                action: InputAction::ZoomIn,
                device: InputDevice::Keyboard,
                key_or_button: PLUS,
                modifiers: MOD_CTRL,
            },
            InputBinding {
                action: InputAction::ZoomOut,
                device: InputDevice::Keyboard,
                key_or_button: MINUS,
                modifiers: MOD_CTRL,
            },
            InputBinding::key(InputAction::CameraReset, HOME),
            // Mouse.
            InputBinding {
                action: InputAction::Select,
                device: InputDevice::MouseButton,
                key_or_button: MOUSE_LEFT,
                modifiers: 0,
            },
            InputBinding {
                action: InputAction::Cancel,
                device: InputDevice::MouseButton,
                key_or_button: MOUSE_RIGHT,
                modifiers: 0,
            },
        ];
        self.bindings.extend(defaults);

        // Number row 2..9 selects tower kinds (1 is speed-normal).
        for (i, kind) in tower_palette().into_iter().enumerate().take(8) {
            self.bindings.push(InputBinding::key(
                InputAction::SelectTower(kind),
                keys::KEY_1 + 1 + i as u32,
            ));
        }
    }

    pub fn add_binding(&mut self, binding: InputBinding) {
        self.bindings.push(binding);
    }

    pub fn remove_binding(&mut self, binding: InputBinding) {
        self.bindings.retain(|b| *b != binding);
    }

    pub fn clear_bindings_for(&mut self, action: InputAction) {
        self.bindings.retain(|b| b.action != action);
    }

    pub fn bindings_for(&self, action: InputAction) -> Vec<InputBinding> {
        self.bindings
            .iter()
            .filter(|b| b.action == action)
            .copied()
            .collect()
    }

    /// Resolve a raw input into events, one per matching binding.
    pub fn resolve(
        &self,
        device: InputDevice,
        key_or_button: u32,
        modifiers: u32,
        pressed: bool,
        timestamp: f64,
        position: Option<(f32, f32)>,
    ) -> Vec<InputEvent> {
        self.bindings
            .iter()
            .filter(|b| b.matches(device, key_or_button, modifiers))
            .map(|b| InputEvent {
                action: b.action,
                pressed,
                timestamp,
                position,
            })
            .collect()
    }
}

// ============================================================================
// PLAY-STATE MACHINE
// ============================================================================

/// Play-state machine with a fixed transition table.
#[derive(Resource, Debug, Clone)]
pub struct StateMachine {
    current: PlayState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            current: PlayState::MainMenu,
        }
    }
}

impl StateMachine {
    pub fn current(&self) -> PlayState {
        self.current
    }

    /// Whether the transition is present in the table.
    pub fn can_transition(from: PlayState, to: PlayState) -> bool {
        use PlayState::*;
        matches!(
            (from, to),
            (MainMenu, Gameplay)
                | (Gameplay, Pause)
                | (Pause, Gameplay)
                | (Gameplay, GameOver)
                | (Gameplay, Victory)
                | (GameOver, MainMenu)
                | (Victory, MainMenu)
                | (Pause, MainMenu)
        )
    }

    /// Request a transition. Forbidden transitions are logged and rejected;
    /// the current state is unchanged.
    pub fn transition(&mut self, to: PlayState) -> SimResult<()> {
        if !Self::can_transition(self.current, to) {
            warn!(
                "rejected state transition {} -> {}",
                self.current.name(),
                to.name()
            );
            return Err(SimError::State {
                from: self.current.name(),
                to: to.name(),
            });
        }
        debug!("state transition {} -> {}", self.current.name(), to.name());
        self.current = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings_resolve() {
        let map = InputActionMap::default();
        let events = map.resolve(InputDevice::Keyboard, keys::W, 0, true, 0.0, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, InputAction::MoveUp);
        assert!(events[0].pressed);
    }

    #[test]
    fn test_shared_key_resolves_to_all_actions() {
        let map = InputActionMap::default();
        // Enter is bound to both Select and Confirm.
        let events = map.resolve(InputDevice::Keyboard, keys::ENTER, 0, true, 0.0, None);
        let actions: Vec<_> = events.iter().map(|e| e.action).collect();
        assert!(actions.contains(&InputAction::Select));
        assert!(actions.contains(&InputAction::Confirm));
    }

    #[test]
    fn test_modifiers_distinguish_bindings() {
        let map = InputActionMap::default();
        let plain = map.resolve(InputDevice::Keyboard, keys::PLUS, 0, true, 0.0, None);
        assert_eq!(plain[0].action, InputAction::SpeedUp);

        let ctrl = map.resolve(
            InputDevice::Keyboard,
            keys::PLUS,
            keys::MOD_CTRL,
            true,
            0.0,
            None,
        );
        assert_eq!(ctrl[0].action, InputAction::ZoomIn);
    }

    #[test]
    fn test_tower_selection_row() {
        let map = InputActionMap::default();
        let events = map.resolve(InputDevice::Keyboard, keys::KEY_1 + 1, 0, true, 0.0, None);
        assert_eq!(
            events[0].action,
            InputAction::SelectTower(TowerKind::SteamCannon)
        );
    }

    #[test]
    fn test_mouse_bindings_carry_position() {
        let map = InputActionMap::default();
        let events = map.resolve(
            InputDevice::MouseButton,
            keys::MOUSE_LEFT,
            0,
            true,
            1.5,
            Some((160.0, 272.0)),
        );
        assert_eq!(events[0].action, InputAction::Select);
        assert_eq!(events[0].position, Some((160.0, 272.0)));
    }

    #[test]
    fn test_rebinding() {
        let mut map = InputActionMap::empty();
        map.add_binding(InputBinding::key(InputAction::Pause, keys::SPACE));
        let events = map.resolve(InputDevice::Keyboard, keys::SPACE, 0, true, 0.0, None);
        assert_eq!(events[0].action, InputAction::Pause);

        map.clear_bindings_for(InputAction::Pause);
        assert!(map
            .resolve(InputDevice::Keyboard, keys::SPACE, 0, true, 0.0, None)
            .is_empty());
    }

    #[test]
    fn test_legal_transitions() {
        let mut machine = StateMachine::default();
        assert!(machine.transition(PlayState::Gameplay).is_ok());
        assert!(machine.transition(PlayState::Pause).is_ok());
        assert!(machine.transition(PlayState::Gameplay).is_ok());
        assert!(machine.transition(PlayState::Victory).is_ok());
        assert!(machine.transition(PlayState::MainMenu).is_ok());
    }

    #[test]
    fn test_forbidden_transition_rejected() {
        let mut machine = StateMachine::default();
        let result = machine.transition(PlayState::GameOver);
        assert!(matches!(result, Err(SimError::State { .. })));
        assert_eq!(machine.current(), PlayState::MainMenu);

        machine.transition(PlayState::Gameplay).unwrap();
        assert!(machine.transition(PlayState::MainMenu).is_err());
    }
}
