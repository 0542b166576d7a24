use log::{debug, trace};

use super::decoder::{DecodeError, DecodedMove, decode_move};
use super::encoder::LEGACY_COMMANDS_PER_PACKET;
use super::transport::Datagram;
use crate::command::MoveCommand;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    (s1 > s2 && s1 - s2 <= u32::MAX / 2) || (s1 < s2 && s2 - s1 > u32::MAX / 2)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub packets: u64,
    /// Sequences that never arrived.
    pub gaps: u64,
    pub commands: u64,
    /// Commands taken from the redundant part of a later packet.
    pub recovered: u64,
    pub stale: u64,
}

/// Server side view of the move stream: rebuilds the command sequence from
/// the datagrams that arrive, using each packet's redundancy to fill gaps.
#[derive(Debug, Default)]
pub struct MoveReceiver {
    last_sequence: Option<u32>,
    checksum: bool,
    stats: ReceiverStats,
}

impl MoveReceiver {
    pub fn new(checksum: bool) -> Self {
        Self {
            checksum,
            ..Default::default()
        }
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    /// Returns the commands this datagram makes newly available, oldest first.
    /// Out of order and duplicate datagrams yield nothing.
    pub fn receive(&mut self, datagram: &Datagram) -> Result<Vec<MoveCommand>, DecodeError> {
        let sequence = datagram.sequence;
        if let Some(last) = self.last_sequence {
            if !sequence_greater_than(sequence, last) {
                self.stats.stale += 1;
                trace!("receiver: stale seq {} (last {})", sequence, last);
                return Ok(Vec::new());
            }
        }

        let missed = self
            .last_sequence
            .map_or(0, |last| sequence.wrapping_sub(last) - 1);

        let commands = if datagram.payload.is_empty() {
            Vec::new()
        } else {
            let decoded = decode_move(&datagram.payload, sequence, self.checksum)?;
            self.collect(&decoded, sequence, missed)
        };

        self.last_sequence = Some(sequence);
        self.stats.packets += 1;
        self.stats.gaps += missed as u64;
        self.stats.commands += commands.len() as u64;
        Ok(commands)
    }

    fn collect(&mut self, decoded: &DecodedMove, sequence: u32, missed: u32) -> Vec<MoveCommand> {
        if !decoded.batched {
            let extra = missed.min(LEGACY_COMMANDS_PER_PACKET - 1) as usize;
            if missed > extra as u32 {
                debug!("receiver: {} packets lost before seq {}", missed, sequence);
            }
            self.stats.recovered += extra as u64;
            let commands = &decoded.slots[0];
            return commands[commands.len() - 1 - extra..].to_vec();
        }

        let dups = decoded.dups() as u32;
        let mut commands = Vec::new();
        for (index, slot) in decoded.slots.iter().enumerate() {
            let slot_sequence = sequence.wrapping_sub(dups - index as u32);
            let fresh = match self.last_sequence {
                None => true,
                Some(last) => sequence_greater_than(slot_sequence, last),
            };
            if !fresh {
                continue;
            }
            if slot_sequence != sequence {
                self.stats.recovered += slot.len() as u64;
            }
            commands.extend_from_slice(slot);
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandRing, PacketHistory};
    use crate::net::encoder::{CommandEncoder, EncodeContext};

    fn command(number: u32) -> MoveCommand {
        MoveCommand {
            msec: number as u8,
            forward_move: number as i16,
            ..Default::default()
        }
    }

    /// Builds one packet per entry of `newest`, the newest command number
    /// covered by each sequence.
    fn packets(encoder: CommandEncoder, newest: &[u32], dups: u32) -> Vec<Datagram> {
        let mut ring = CommandRing::new();
        let mut history = PacketHistory::new();
        let mut datagrams = Vec::new();

        for &number in newest {
            while ring.command_number() < number {
                let next = ring.command_number() + 1;
                ring.push(command(next));
            }
            let sequence = history.archive(number, 0);
            let ctx = EncodeContext {
                ring: &ring,
                history: &history,
                sequence,
                frame: None,
                no_delta: false,
                light_level: 0,
                dups,
            };
            datagrams.push(Datagram {
                sequence,
                reliable: Vec::new(),
                payload: encoder.encode(&ctx).unwrap(),
            });
            history.advance();
        }
        datagrams
    }

    fn numbers(commands: &[MoveCommand]) -> Vec<u32> {
        commands.iter().map(|c| c.msec as u32).collect()
    }

    #[test]
    fn test_sequence_greater_than_wraps() {
        assert!(sequence_greater_than(1, 0));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(5, 5));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn test_legacy_fills_gaps_up_to_two() {
        let encoder = CommandEncoder::Legacy { checksum: false };
        let datagrams = packets(encoder, &[1, 2, 3, 4, 5, 6, 7, 8], 0);
        let mut receiver = MoveReceiver::new(false);

        assert_eq!(numbers(&receiver.receive(&datagrams[0]).unwrap()), vec![1]);
        assert_eq!(numbers(&receiver.receive(&datagrams[2]).unwrap()), vec![2, 3]);
        assert_eq!(numbers(&receiver.receive(&datagrams[5]).unwrap()), vec![4, 5, 6]);
        assert_eq!(numbers(&receiver.receive(&datagrams[7]).unwrap()), vec![7, 8]);
        assert_eq!(receiver.stats().recovered, 4);
    }

    #[test]
    fn test_legacy_three_losses_lose_one_command() {
        let encoder = CommandEncoder::Legacy { checksum: false };
        let datagrams = packets(encoder, &[1, 2, 3, 4, 5], 0);
        let mut receiver = MoveReceiver::new(false);

        receiver.receive(&datagrams[0]).unwrap();
        assert_eq!(numbers(&receiver.receive(&datagrams[4]).unwrap()), vec![3, 4, 5]);
        assert_eq!(receiver.stats().gaps, 3);
    }

    #[test]
    fn test_batched_fills_gaps_within_dups() {
        let datagrams = packets(CommandEncoder::Batched, &[2, 3, 6, 8, 9], 2);
        let mut receiver = MoveReceiver::new(false);

        assert_eq!(numbers(&receiver.receive(&datagrams[0]).unwrap()), vec![1, 2]);
        assert_eq!(
            numbers(&receiver.receive(&datagrams[3]).unwrap()),
            vec![3, 4, 5, 6, 7, 8]
        );
        assert_eq!(numbers(&receiver.receive(&datagrams[4]).unwrap()), vec![9]);
    }

    #[test]
    fn test_stale_datagrams_ignored() {
        let datagrams = packets(CommandEncoder::Batched, &[1, 2], 1);
        let mut receiver = MoveReceiver::new(false);

        receiver.receive(&datagrams[1]).unwrap();
        assert!(receiver.receive(&datagrams[0]).unwrap().is_empty());
        assert!(receiver.receive(&datagrams[1]).unwrap().is_empty());
        assert_eq!(receiver.stats().stale, 2);
    }
}
