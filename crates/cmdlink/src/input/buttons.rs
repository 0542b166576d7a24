use glam::Vec3;

use super::button::{LogicalButton, PressSource};
use crate::command::short_to_angle;
use crate::settings::InputSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Back,
    Left,
    Right,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    LookUp,
    LookDown,
    Strafe,
    Speed,
    Attack,
    Use,
    KeyLook,
}

impl Action {
    pub const COUNT: usize = 15;

    pub const ALL: [Action; Self::COUNT] = [
        Action::Forward,
        Action::Back,
        Action::Left,
        Action::Right,
        Action::MoveLeft,
        Action::MoveRight,
        Action::MoveUp,
        Action::MoveDown,
        Action::LookUp,
        Action::LookDown,
        Action::Strafe,
        Action::Speed,
        Action::Attack,
        Action::Use,
        Action::KeyLook,
    ];

    /// Command name as bound to keys, without the `+`/`-` prefix.
    pub fn name(self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Back => "back",
            Action::Left => "left",
            Action::Right => "right",
            Action::MoveLeft => "moveleft",
            Action::MoveRight => "moveright",
            Action::MoveUp => "moveup",
            Action::MoveDown => "movedown",
            Action::LookUp => "lookup",
            Action::LookDown => "lookdown",
            Action::Strafe => "strafe",
            Action::Speed => "speed",
            Action::Attack => "attack",
            Action::Use => "use",
            Action::KeyLook => "klook",
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }

    /// Actions whose press should go out without waiting for the rate limit.
    pub fn is_instant(self) -> bool {
        matches!(self, Action::Attack | Action::Use)
    }
}

/// Every logical button plus the non-button input toggles.
#[derive(Debug, Clone, Default)]
pub struct ButtonSet {
    buttons: [LogicalButton; Action::COUNT],
    mouse_looking: bool,
    impulse: u8,
}

impl ButtonSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the caller should send a packet immediately.
    pub fn press(
        &mut self,
        action: Action,
        source: PressSource,
        timestamp: Option<u32>,
        event_time: u32,
        instant_packet: bool,
    ) -> bool {
        self.button_mut(action).press(source, timestamp, event_time);
        instant_packet && action.is_instant()
    }

    pub fn release(&mut self, action: Action, source: PressSource, timestamp: Option<u32>) {
        self.button_mut(action).release(source, timestamp);
    }

    #[inline]
    pub fn button(&self, action: Action) -> &LogicalButton {
        &self.buttons[action as usize]
    }

    #[inline]
    pub fn button_mut(&mut self, action: Action) -> &mut LogicalButton {
        &mut self.buttons[action as usize]
    }

    #[inline]
    pub fn is_down(&self, action: Action) -> bool {
        self.button(action).is_down()
    }

    pub fn fraction(&self, action: Action, cmd_msec: u32, event_time: u32) -> f32 {
        self.button(action).active_fraction(cmd_msec, event_time)
    }

    pub fn set_impulse(&mut self, impulse: u8) {
        self.impulse = impulse;
    }

    pub fn take_impulse(&mut self) -> u8 {
        std::mem::take(&mut self.impulse)
    }

    pub fn is_mouse_looking(&self) -> bool {
        self.mouse_looking
    }

    pub fn mouse_look_down(&mut self) {
        self.mouse_looking = true;
    }

    pub fn mouse_look_up(&mut self, settings: &InputSettings, delta_pitch: i16, view_angles: &mut Vec3) {
        self.mouse_looking = false;

        if !settings.freelook && settings.lookspring {
            center_view(delta_pitch, view_angles);
        }
    }

    pub fn clear_all(&mut self, event_time: u32) {
        for button in &mut self.buttons {
            button.clear(event_time);
        }
    }
}

/// Levels the view against the server's pitch baseline.
pub fn center_view(delta_pitch: i16, view_angles: &mut Vec3) {
    view_angles.x = -short_to_angle(delta_pitch);
}
