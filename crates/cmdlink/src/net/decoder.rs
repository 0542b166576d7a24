//! Server side parsing of move packets.
//!
//! Used to check what a receiver can rebuild from the datagrams that arrive;
//! decoded commands are returned as-is and never executed.

use thiserror::Error;

use super::checksum::block_sequence_crc_byte;
use super::delta::{read_delta_enhanced, read_delta_legacy};
use super::encoder::LEGACY_COMMANDS_PER_PACKET;
use super::msg::{MessageError, MessageReader};
use super::protocol::{
    MOVE_BATCHED, MOVE_LEGACY, MOVE_NODELTA, NO_FRAME, USERCMD_COUNT_BITS, unpack_tag,
};
use crate::command::MoveCommand;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("checksum mismatch: expected {expected:#04x}, found {found:#04x}")]
    ChecksumMismatch { expected: u8, found: u8 },
}

/// One parsed move packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMove {
    pub batched: bool,
    pub frame: Option<i32>,
    pub light_level: u8,
    /// Commands grouped per sequence slot, oldest slot first. Legacy packets
    /// have a single slot of three commands.
    pub slots: Vec<Vec<MoveCommand>>,
}

impl DecodedMove {
    pub fn dups(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    pub fn command_count(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    pub fn commands(&self) -> impl Iterator<Item = &MoveCommand> {
        self.slots.iter().flatten()
    }
}

fn frame_from_wire(frame: i32) -> Option<i32> {
    (frame != NO_FRAME).then_some(frame)
}

/// Parses a move packet sent under `sequence`. `checksum` says whether the
/// negotiated protocol carries the legacy checksum byte.
pub fn decode_move(data: &[u8], sequence: u32, checksum: bool) -> Result<DecodedMove, DecodeError> {
    let mut msg = MessageReader::new(data);
    let (id, dups) = unpack_tag(msg.read_u8()?);

    match id {
        MOVE_LEGACY => decode_legacy(&mut msg, data, sequence, checksum),
        MOVE_NODELTA | MOVE_BATCHED => decode_batched(&mut msg, id == MOVE_BATCHED, dups),
        other => Err(MessageError::BadTag(other).into()),
    }
}

fn decode_legacy(
    msg: &mut MessageReader<'_>,
    data: &[u8],
    sequence: u32,
    checksum: bool,
) -> Result<DecodedMove, DecodeError> {
    let found = if checksum { Some(msg.read_u8()?) } else { None };
    let block_start = msg.byte_position();

    let frame = frame_from_wire(msg.read_i32()?);

    let mut commands = Vec::with_capacity(LEGACY_COMMANDS_PER_PACKET as usize);
    let mut light_level = 0;
    for _ in 0..LEGACY_COMMANDS_PER_PACKET {
        let cmd = read_delta_legacy(msg, commands.last())?;
        light_level = msg.read_u8()?;
        commands.push(cmd);
    }

    if let Some(found) = found {
        let block = &data[block_start..msg.byte_position()];
        let expected = block_sequence_crc_byte(block, sequence);
        if expected != found {
            return Err(DecodeError::ChecksumMismatch { expected, found });
        }
    }

    Ok(DecodedMove {
        batched: false,
        frame,
        light_level,
        slots: vec![commands],
    })
}

fn decode_batched(
    msg: &mut MessageReader<'_>,
    with_frame: bool,
    dups: u32,
) -> Result<DecodedMove, DecodeError> {
    let frame = if with_frame {
        frame_from_wire(msg.read_i32()?)
    } else {
        None
    };
    let light_level = msg.read_u8()?;

    let mut slots = Vec::with_capacity(dups as usize + 1);
    let mut previous: Option<MoveCommand> = None;
    for _ in 0..=dups {
        let count = msg.read_bits(USERCMD_COUNT_BITS)?;
        let mut slot = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let cmd = read_delta_enhanced(msg, previous.as_ref())?;
            previous = Some(cmd);
            slot.push(cmd);
        }
        slots.push(slot);
    }

    Ok(DecodedMove {
        batched: true,
        frame,
        light_level,
        slots,
    })
}
