use bitflags::bitflags;

/// Longest span a single command may claim.
pub const MAX_COMMAND_MSEC: u32 = 250;
/// Duration substituted when a tick took longer than [`MAX_COMMAND_MSEC`].
pub const STALLED_COMMAND_MSEC: u8 = 100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct ButtonBits: u8 {
        const ATTACK = 1 << 0;
        const USE = 1 << 1;
        const ANY = 1 << 7;
    }
}

#[inline]
pub fn angle_to_short(angle: f32) -> i16 {
    ((angle * 65536.0 / 360.0) as i32 & 0xFFFF) as u16 as i16
}

#[inline]
pub fn short_to_angle(value: i16) -> f32 {
    value as f32 * (360.0 / 65536.0)
}

/// One quantized movement command covering `msec` of player time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MoveCommand {
    pub msec: u8,
    pub buttons: ButtonBits,
    pub angles: [i16; 3],
    pub forward_move: i16,
    pub side_move: i16,
    pub up_move: i16,
    pub impulse: u8,
}

impl MoveCommand {
    /// Baseline for the first command of a delta chain.
    pub const NULL: MoveCommand = MoveCommand {
        msec: 0,
        buttons: ButtonBits::empty(),
        angles: [0; 3],
        forward_move: 0,
        side_move: 0,
        up_move: 0,
        impulse: 0,
    };

    pub fn set_view_angles(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.angles = [angle_to_short(pitch), angle_to_short(yaw), angle_to_short(roll)];
    }

    pub fn view_angles(&self) -> [f32; 3] {
        self.angles.map(short_to_angle)
    }

    /// Adds frame time, saturating at the wire field width.
    pub fn add_msec(&mut self, msec: u32) {
        self.msec = (self.msec as u32 + msec).min(u8::MAX as u32) as u8;
    }

    pub fn clamp_duration(&mut self) {
        if self.msec as u32 > MAX_COMMAND_MSEC {
            self.msec = STALLED_COMMAND_MSEC;
        }
    }

    pub fn move_vector(&self) -> [i16; 3] {
        [self.forward_move, self.side_move, self.up_move]
    }
}
