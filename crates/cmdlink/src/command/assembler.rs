use super::ServerState;
use super::history::CommandRing;
use super::usercmd::{ButtonBits, MoveCommand};
use crate::input::{Action, ButtonSet, InputSampler, base_move, clamp_speed};
use crate::settings::InputSettings;

#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub settings: &'a InputSettings,
    pub server: &'a ServerState,
    pub event_time: u32,
    /// Some key is held while the game has input focus.
    pub any_key_down: bool,
    pub paused: bool,
}

/// Turns the pending per-frame state into numbered commands, once per tick.
#[derive(Debug, Clone, Default)]
pub struct CommandAssembler {
    pending: MoveCommand,
    ring: CommandRing,
}

impl CommandAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &MoveCommand {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut MoveCommand {
        &mut self.pending
    }

    pub fn ring(&self) -> &CommandRing {
        &self.ring
    }

    pub fn command_number(&self) -> u32 {
        self.ring.command_number()
    }

    /// Finalizes the pending command and returns its number, or `None` while
    /// paused, in which case nothing is consumed.
    pub fn finalize(
        &mut self,
        buttons: &mut ButtonSet,
        sampler: &mut InputSampler,
        ctx: &TickContext<'_>,
    ) -> Option<u32> {
        if ctx.paused {
            return None;
        }

        let cmd = &mut self.pending;

        if buttons.button(Action::Attack).is_active() {
            cmd.buttons |= ButtonBits::ATTACK;
        }
        if buttons.button(Action::Use).is_active() {
            cmd.buttons |= ButtonBits::USE;
        }
        buttons.button_mut(Action::Attack).clear_pressed();
        buttons.button_mut(Action::Use).clear_pressed();

        if ctx.any_key_down {
            cmd.buttons |= ButtonBits::ANY;
        }

        cmd.clamp_duration();

        let mut movement = base_move(buttons, ctx.settings, cmd.msec as u32, ctx.event_time);
        let mouse_move = sampler.take_mouse_move();
        movement.x += mouse_move.x;
        movement.y += mouse_move.y;
        let movement = clamp_speed(movement, ctx.server.max_speed);

        cmd.forward_move = movement.x as i16;
        cmd.side_move = movement.y as i16;
        cmd.up_move = movement.z as i16;

        buttons.clear_all(ctx.event_time);
        cmd.impulse = buttons.take_impulse();

        let command = std::mem::take(&mut self.pending);
        let number = self.ring.push(command);
        log::trace!("Finalized command {}: {:?}", number, command);
        Some(number)
    }

    pub fn reset(&mut self) {
        self.pending = MoveCommand::default();
        self.ring.clear();
    }
}
