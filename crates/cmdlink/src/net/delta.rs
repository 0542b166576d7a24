use bitflags::bitflags;

use super::msg::{MessageError, MessageReader, MessageWriter};
use crate::command::{ButtonBits, MoveCommand};

bitflags! {
    /// Fields of a [`MoveCommand`] that differ from the baseline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeltaBits: u16 {
        const ANGLE1 = 1 << 0;
        const ANGLE2 = 1 << 1;
        const ANGLE3 = 1 << 2;
        const FORWARD = 1 << 3;
        const SIDE = 1 << 4;
        const UP = 1 << 5;
        const BUTTONS = 1 << 6;
        const IMPULSE = 1 << 7;
        const MSEC = 1 << 8;
    }
}

const ENHANCED_MASK_BITS: u8 = 9;

impl DeltaBits {
    pub fn between(from: &MoveCommand, to: &MoveCommand) -> Self {
        let mut bits = DeltaBits::empty();
        bits.set(DeltaBits::ANGLE1, to.angles[0] != from.angles[0]);
        bits.set(DeltaBits::ANGLE2, to.angles[1] != from.angles[1]);
        bits.set(DeltaBits::ANGLE3, to.angles[2] != from.angles[2]);
        bits.set(DeltaBits::FORWARD, to.forward_move != from.forward_move);
        bits.set(DeltaBits::SIDE, to.side_move != from.side_move);
        bits.set(DeltaBits::UP, to.up_move != from.up_move);
        bits.set(DeltaBits::BUTTONS, to.buttons != from.buttons);
        bits.set(DeltaBits::IMPULSE, to.impulse != from.impulse);
        bits.set(DeltaBits::MSEC, to.msec != from.msec);
        bits
    }
}

/// Byte-oriented delta: a presence byte, the changed fields, then the
/// duration, which this layout always carries.
pub fn write_delta_legacy(msg: &mut MessageWriter, from: Option<&MoveCommand>, cmd: &MoveCommand) {
    let from = from.unwrap_or(&MoveCommand::NULL);
    let bits = DeltaBits::between(from, cmd);

    msg.write_u8(bits.bits() as u8);

    if bits.contains(DeltaBits::ANGLE1) {
        msg.write_i16(cmd.angles[0]);
    }
    if bits.contains(DeltaBits::ANGLE2) {
        msg.write_i16(cmd.angles[1]);
    }
    if bits.contains(DeltaBits::ANGLE3) {
        msg.write_i16(cmd.angles[2]);
    }
    if bits.contains(DeltaBits::FORWARD) {
        msg.write_i16(cmd.forward_move);
    }
    if bits.contains(DeltaBits::SIDE) {
        msg.write_i16(cmd.side_move);
    }
    if bits.contains(DeltaBits::UP) {
        msg.write_i16(cmd.up_move);
    }
    if bits.contains(DeltaBits::BUTTONS) {
        msg.write_u8(cmd.buttons.bits());
    }
    if bits.contains(DeltaBits::IMPULSE) {
        msg.write_u8(cmd.impulse);
    }

    msg.write_u8(cmd.msec);
}

pub fn read_delta_legacy(
    msg: &mut MessageReader<'_>,
    from: Option<&MoveCommand>,
) -> Result<MoveCommand, MessageError> {
    let mut cmd = *from.unwrap_or(&MoveCommand::NULL);
    let bits = DeltaBits::from_bits_truncate(msg.read_u8()? as u16);

    if bits.contains(DeltaBits::ANGLE1) {
        cmd.angles[0] = msg.read_i16()?;
    }
    if bits.contains(DeltaBits::ANGLE2) {
        cmd.angles[1] = msg.read_i16()?;
    }
    if bits.contains(DeltaBits::ANGLE3) {
        cmd.angles[2] = msg.read_i16()?;
    }
    if bits.contains(DeltaBits::FORWARD) {
        cmd.forward_move = msg.read_i16()?;
    }
    if bits.contains(DeltaBits::SIDE) {
        cmd.side_move = msg.read_i16()?;
    }
    if bits.contains(DeltaBits::UP) {
        cmd.up_move = msg.read_i16()?;
    }
    if bits.contains(DeltaBits::BUTTONS) {
        cmd.buttons = ButtonBits::from_bits_retain(msg.read_u8()?);
    }
    if bits.contains(DeltaBits::IMPULSE) {
        cmd.impulse = msg.read_u8()?;
    }

    cmd.msec = msg.read_u8()?;
    Ok(cmd)
}

/// Bit-oriented delta used by batched packets. An unchanged command costs a
/// single bit; small view turns are sent as 8-bit differences.
pub fn write_delta_enhanced(
    msg: &mut MessageWriter,
    from: Option<&MoveCommand>,
    cmd: &MoveCommand,
) -> DeltaBits {
    let from = from.unwrap_or(&MoveCommand::NULL);
    let bits = DeltaBits::between(from, cmd);

    if bits.is_empty() {
        msg.write_bits(0, 1);
        return bits;
    }
    msg.write_bits(1, 1);
    msg.write_bits(bits.bits() as u32, ENHANCED_MASK_BITS);

    if bits.contains(DeltaBits::ANGLE1) {
        write_angle_delta(msg, from.angles[0], cmd.angles[0]);
    }
    if bits.contains(DeltaBits::ANGLE2) {
        write_angle_delta(msg, from.angles[1], cmd.angles[1]);
    }
    if bits.contains(DeltaBits::ANGLE3) {
        msg.write_signed_bits(cmd.angles[2] as i32, 16);
    }
    if bits.contains(DeltaBits::FORWARD) {
        msg.write_signed_bits(cmd.forward_move as i32, 16);
    }
    if bits.contains(DeltaBits::SIDE) {
        msg.write_signed_bits(cmd.side_move as i32, 16);
    }
    if bits.contains(DeltaBits::UP) {
        msg.write_signed_bits(cmd.up_move as i32, 16);
    }
    if bits.contains(DeltaBits::BUTTONS) {
        msg.write_bits(cmd.buttons.bits() as u32, 8);
    }
    if bits.contains(DeltaBits::IMPULSE) {
        msg.write_bits(cmd.impulse as u32, 8);
    }
    if bits.contains(DeltaBits::MSEC) {
        msg.write_bits(cmd.msec as u32, 8);
    }

    bits
}

pub fn read_delta_enhanced(
    msg: &mut MessageReader<'_>,
    from: Option<&MoveCommand>,
) -> Result<MoveCommand, MessageError> {
    let mut cmd = *from.unwrap_or(&MoveCommand::NULL);

    if msg.read_bits(1)? == 0 {
        return Ok(cmd);
    }
    let bits = DeltaBits::from_bits_truncate(msg.read_bits(ENHANCED_MASK_BITS)? as u16);

    if bits.contains(DeltaBits::ANGLE1) {
        cmd.angles[0] = read_angle_delta(msg, cmd.angles[0])?;
    }
    if bits.contains(DeltaBits::ANGLE2) {
        cmd.angles[1] = read_angle_delta(msg, cmd.angles[1])?;
    }
    if bits.contains(DeltaBits::ANGLE3) {
        cmd.angles[2] = msg.read_signed_bits(16)? as i16;
    }
    if bits.contains(DeltaBits::FORWARD) {
        cmd.forward_move = msg.read_signed_bits(16)? as i16;
    }
    if bits.contains(DeltaBits::SIDE) {
        cmd.side_move = msg.read_signed_bits(16)? as i16;
    }
    if bits.contains(DeltaBits::UP) {
        cmd.up_move = msg.read_signed_bits(16)? as i16;
    }
    if bits.contains(DeltaBits::BUTTONS) {
        cmd.buttons = ButtonBits::from_bits_retain(msg.read_bits(8)? as u8);
    }
    if bits.contains(DeltaBits::IMPULSE) {
        cmd.impulse = msg.read_bits(8)? as u8;
    }
    if bits.contains(DeltaBits::MSEC) {
        cmd.msec = msg.read_bits(8)? as u8;
    }

    Ok(cmd)
}

fn write_angle_delta(msg: &mut MessageWriter, from: i16, to: i16) {
    let delta = to as i32 - from as i32;
    if (-128..=127).contains(&delta) {
        msg.write_bits(1, 1);
        msg.write_signed_bits(delta, 8);
    } else {
        msg.write_bits(0, 1);
        msg.write_signed_bits(to as i32, 16);
    }
}

fn read_angle_delta(msg: &mut MessageReader<'_>, from: i16) -> Result<i16, MessageError> {
    if msg.read_bits(1)? == 1 {
        let delta = msg.read_signed_bits(8)?;
        Ok((from as i32 + delta) as i16)
    } else {
        Ok(msg.read_signed_bits(16)? as i16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MoveCommand {
        MoveCommand {
            msec: 16,
            buttons: ButtonBits::ATTACK | ButtonBits::ANY,
            angles: [120, -32000, 5],
            forward_move: 400,
            side_move: -200,
            up_move: 0,
            impulse: 9,
        }
    }

    #[test]
    fn test_legacy_unchanged_is_two_bytes() {
        let cmd = sample();
        let mut msg = MessageWriter::new();
        write_delta_legacy(&mut msg, Some(&cmd), &cmd);
        assert_eq!(msg.as_bytes(), &[0, 16]);
    }

    #[test]
    fn test_legacy_roundtrip_against_null() {
        let cmd = sample();
        let mut msg = MessageWriter::new();
        write_delta_legacy(&mut msg, None, &cmd);
        let data = msg.finish();

        let mut reader = MessageReader::new(&data);
        assert_eq!(read_delta_legacy(&mut reader, None), Ok(cmd));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_enhanced_unchanged_is_one_bit() {
        let cmd = sample();
        let mut msg = MessageWriter::new();
        let bits = write_delta_enhanced(&mut msg, Some(&cmd), &cmd);
        assert!(bits.is_empty());
        assert_eq!(msg.finish(), vec![0]);
    }

    #[test]
    fn test_enhanced_small_and_large_turns() {
        let from = sample();
        let mut to = from;
        to.angles[0] = from.angles[0] + 100;
        to.angles[1] = i16::MAX;
        to.msec = 17;

        let mut msg = MessageWriter::new();
        write_delta_enhanced(&mut msg, Some(&from), &to);
        let data = msg.finish();

        let mut reader = MessageReader::new(&data);
        assert_eq!(read_delta_enhanced(&mut reader, Some(&from)), Ok(to));
    }

    #[test]
    fn test_enhanced_chain_keeps_unchanged_fields() {
        let first = sample();
        let mut second = first;
        second.forward_move = -1;

        let mut msg = MessageWriter::new();
        write_delta_enhanced(&mut msg, None, &first);
        write_delta_enhanced(&mut msg, Some(&first), &second);
        let data = msg.finish();

        let mut reader = MessageReader::new(&data);
        let decoded_first = read_delta_enhanced(&mut reader, None).unwrap();
        let decoded_second = read_delta_enhanced(&mut reader, Some(&decoded_first)).unwrap();
        assert_eq!(decoded_first, first);
        assert_eq!(decoded_second, second);
    }
}
