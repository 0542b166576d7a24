use log::{trace, warn};
use thiserror::Error;

use super::checksum::block_sequence_crc_byte;
use super::delta::{write_delta_enhanced, write_delta_legacy};
use super::msg::MessageWriter;
use super::protocol::{
    Capabilities, MAX_PACKET_FRAMES, MAX_PACKET_SIZE, MAX_PACKET_USERCMDS, MOVE_BATCHED,
    MOVE_LEGACY, MOVE_NODELTA, NO_FRAME, USERCMD_COUNT_BITS, pack_tag,
};
use crate::command::{CommandRing, MoveCommand, PacketHistory};

/// Commands every legacy packet carries, newest last.
pub const LEGACY_COMMANDS_PER_PACKET: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{count} commands in one packet slot, limit is {max}")]
    TooManyCommands { count: u32, max: u32 },
    #[error("command {0} is no longer in the ring")]
    MissingCommand(u32),
}

/// Everything one packet is built from.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub ring: &'a CommandRing,
    /// Must already hold the entry for `sequence`.
    pub history: &'a PacketHistory,
    pub sequence: u32,
    /// Last valid world frame, `None` to ask for an uncompressed one.
    pub frame: Option<i32>,
    pub no_delta: bool,
    pub light_level: u8,
    /// Earlier sequence slots repeated in a batched packet.
    pub dups: u32,
}

impl EncodeContext<'_> {
    fn delta_frame(&self) -> Option<i32> {
        if self.no_delta { None } else { self.frame }
    }
}

/// Move packet layout, fixed for the life of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEncoder {
    /// Last three commands every packet, optionally checksummed.
    Legacy { checksum: bool },
    /// Every command since the packet `dups` sequences back, delta chained.
    Batched,
}

impl CommandEncoder {
    pub fn for_capabilities(caps: Capabilities, batch_cmds: bool) -> Self {
        if caps.batched_moves && batch_cmds {
            CommandEncoder::Batched
        } else {
            CommandEncoder::Legacy {
                checksum: caps.move_checksum,
            }
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, CommandEncoder::Batched)
    }

    pub fn encode(&self, ctx: &EncodeContext<'_>) -> Result<Vec<u8>, EncodeError> {
        match *self {
            CommandEncoder::Legacy { checksum } => encode_legacy(ctx, checksum),
            CommandEncoder::Batched => encode_batched(ctx),
        }
    }
}

fn fetch(ring: &CommandRing, number: u32) -> Result<&MoveCommand, EncodeError> {
    ring.get(number).ok_or(EncodeError::MissingCommand(number))
}

fn encode_legacy(ctx: &EncodeContext<'_>, checksum: bool) -> Result<Vec<u8>, EncodeError> {
    let newest = ctx.history.entry(ctx.sequence).command_number;
    let mut msg = MessageWriter::with_capacity(64);

    msg.write_u8(MOVE_LEGACY);

    let checksum_index = msg.len();
    if checksum {
        msg.write_u8(0);
    }

    msg.write_i32(ctx.delta_frame().unwrap_or(NO_FRAME));

    let mut previous: Option<&MoveCommand> = None;
    for back in (0..LEGACY_COMMANDS_PER_PACKET).rev() {
        let cmd = fetch(ctx.ring, newest.wrapping_sub(back))?;
        write_delta_legacy(&mut msg, previous, cmd);
        msg.write_u8(ctx.light_level);
        previous = Some(cmd);
    }

    if checksum {
        let byte = block_sequence_crc_byte(&msg.as_bytes()[checksum_index + 1..], ctx.sequence);
        msg.patch_u8(checksum_index, byte);
    }

    let data = msg.finish();
    trace!(
        "legacy move: seq {} cmd {} ({} bytes)",
        ctx.sequence,
        newest,
        data.len()
    );
    Ok(data)
}

fn encode_batched(ctx: &EncodeContext<'_>) -> Result<Vec<u8>, EncodeError> {
    let dups = ctx.dups.min(MAX_PACKET_FRAMES - 1);
    let mut msg = MessageWriter::with_capacity(MAX_PACKET_SIZE / 8);

    match ctx.delta_frame() {
        Some(frame) => {
            msg.write_u8(pack_tag(MOVE_BATCHED, dups));
            msg.write_i32(frame);
        }
        None => msg.write_u8(pack_tag(MOVE_NODELTA, dups)),
    }
    msg.write_u8(ctx.light_level);

    let mut previous: Option<&MoveCommand> = None;
    let mut total = 0;
    for slot in (0..=dups).rev() {
        let sequence = ctx.sequence.wrapping_sub(slot);
        let first = ctx.history.entry(sequence.wrapping_sub(1)).command_number;
        let last = ctx.history.entry(sequence).command_number;

        let count = last.wrapping_sub(first);
        if count >= MAX_PACKET_USERCMDS {
            warn!(
                "batched move: {} commands in slot {}, dropping packet",
                count, sequence
            );
            return Err(EncodeError::TooManyCommands {
                count,
                max: MAX_PACKET_USERCMDS - 1,
            });
        }

        msg.write_bits(count, USERCMD_COUNT_BITS);
        for number in (1..=count).map(|n| first.wrapping_add(n)) {
            let cmd = fetch(ctx.ring, number)?;
            write_delta_enhanced(&mut msg, previous, cmd);
            previous = Some(cmd);
        }
        total += count;
    }

    let data = msg.finish();
    trace!(
        "batched move: seq {} dups {} cmds {} ({} bytes)",
        ctx.sequence,
        dups,
        total,
        data.len()
    );
    Ok(data)
}
