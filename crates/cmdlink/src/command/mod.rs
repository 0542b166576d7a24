mod assembler;
mod history;
mod usercmd;

pub use assembler::{CommandAssembler, TickContext};
pub use history::{
    COMMAND_BACKUP, COMMAND_MASK, CommandRing, HistoryEntry, PACKET_BACKUP, PACKET_MASK,
    PacketHistory,
};
pub use usercmd::{
    ButtonBits, MAX_COMMAND_MSEC, MoveCommand, STALLED_COMMAND_MSEC, angle_to_short,
    short_to_angle,
};

/// Movement default for servers that do not declare a limit.
pub const DEFAULT_MAX_SPEED: f32 = 300.0;

/// Server-declared values the client must respect when building commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerState {
    pub max_speed: f32,
    /// Pitch part of the server's view angle offset, in 16-bit angle units.
    pub delta_pitch: i16,
    /// Last valid world frame received, the delta reference for the server.
    pub frame: Option<i32>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            delta_pitch: 0,
            frame: None,
        }
    }
}
