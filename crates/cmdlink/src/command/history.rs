use super::usercmd::MoveCommand;

pub const COMMAND_BACKUP: usize = 128;
pub const COMMAND_MASK: u32 = COMMAND_BACKUP as u32 - 1;

pub const PACKET_BACKUP: usize = 128;
pub const PACKET_MASK: u32 = PACKET_BACKUP as u32 - 1;

const _: () = assert!(COMMAND_BACKUP.is_power_of_two());
const _: () = assert!(PACKET_BACKUP.is_power_of_two());

/// Finalized commands indexed by command number.
#[derive(Debug, Clone)]
pub struct CommandRing {
    commands: [MoveCommand; COMMAND_BACKUP],
    command_number: u32,
}

impl Default for CommandRing {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRing {
    pub fn new() -> Self {
        Self {
            commands: [MoveCommand::NULL; COMMAND_BACKUP],
            command_number: 0,
        }
    }

    /// Stores `command` under the next command number and returns that number.
    pub fn push(&mut self, command: MoveCommand) -> u32 {
        self.command_number = self.command_number.wrapping_add(1);
        self.commands[(self.command_number & COMMAND_MASK) as usize] = command;
        self.command_number
    }

    /// Returns the command if `number` has not been overwritten yet.
    pub fn get(&self, number: u32) -> Option<&MoveCommand> {
        let age = self.command_number.wrapping_sub(number);
        if age as usize >= COMMAND_BACKUP {
            return None;
        }
        Some(&self.commands[(number & COMMAND_MASK) as usize])
    }

    pub fn latest(&self) -> &MoveCommand {
        &self.commands[(self.command_number & COMMAND_MASK) as usize]
    }

    pub fn command_number(&self) -> u32 {
        self.command_number
    }

    pub fn clear(&mut self) {
        self.commands = [MoveCommand::NULL; COMMAND_BACKUP];
        self.command_number = 0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Newest command number at the time the packet was built.
    pub command_number: u32,
    pub sent: u32,
    /// Zero until the server acknowledges the packet.
    pub received: u32,
}

/// Per outgoing sequence bookkeeping for redundancy spans and latency.
#[derive(Debug, Clone)]
pub struct PacketHistory {
    entries: [HistoryEntry; PACKET_BACKUP],
    outgoing_sequence: u32,
}

impl Default for PacketHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketHistory {
    pub fn new() -> Self {
        Self {
            entries: [HistoryEntry::default(); PACKET_BACKUP],
            outgoing_sequence: 0,
        }
    }

    pub fn outgoing_sequence(&self) -> u32 {
        self.outgoing_sequence
    }

    /// Records the packet about to go out under the current sequence.
    pub fn archive(&mut self, command_number: u32, now: u32) -> u32 {
        let sequence = self.outgoing_sequence;
        self.entries[(sequence & PACKET_MASK) as usize] = HistoryEntry {
            command_number,
            sent: now,
            received: 0,
        };
        sequence
    }

    pub fn advance(&mut self) {
        self.outgoing_sequence = self.outgoing_sequence.wrapping_add(1);
    }

    pub fn entry(&self, sequence: u32) -> &HistoryEntry {
        &self.entries[(sequence & PACKET_MASK) as usize]
    }

    /// Marks `sequence` as received and returns its round trip in milliseconds.
    pub fn acknowledge(&mut self, sequence: u32, now: u32) -> Option<u32> {
        let age = self.outgoing_sequence.wrapping_sub(sequence);
        if age == 0 || age as usize > PACKET_BACKUP {
            return None;
        }

        let entry = &mut self.entries[(sequence & PACKET_MASK) as usize];
        if entry.received != 0 {
            return None;
        }
        entry.received = now.max(1);
        Some(now.wrapping_sub(entry.sent))
    }

    pub fn clear(&mut self) {
        self.entries = [HistoryEntry::default(); PACKET_BACKUP];
        self.outgoing_sequence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(msec: u8) -> MoveCommand {
        MoveCommand {
            msec,
            ..Default::default()
        }
    }

    #[test]
    fn test_ring_numbers_monotonic() {
        let mut ring = CommandRing::new();
        assert_eq!(ring.push(command(1)), 1);
        assert_eq!(ring.push(command(2)), 2);
        assert_eq!(ring.latest().msec, 2);
        assert_eq!(ring.get(1).map(|c| c.msec), Some(1));
    }

    #[test]
    fn test_ring_refuses_overwritten() {
        let mut ring = CommandRing::new();
        for i in 0..(COMMAND_BACKUP as u32 + 5) {
            ring.push(command(i as u8));
        }

        let newest = ring.command_number();
        assert!(ring.get(newest).is_some());
        assert!(ring.get(newest - COMMAND_BACKUP as u32 + 1).is_some());
        assert!(ring.get(newest - COMMAND_BACKUP as u32).is_none());
        assert!(ring.get(newest + 1).is_none());
    }

    #[test]
    fn test_history_archive_and_ack() {
        let mut history = PacketHistory::new();
        let sequence = history.archive(12, 1000);
        history.advance();

        assert_eq!(history.entry(sequence).command_number, 12);
        assert_eq!(history.acknowledge(sequence, 1080), Some(80));
        assert_eq!(history.entry(sequence).received, 1080);
        assert_eq!(history.acknowledge(sequence, 1100), None);
    }

    #[test]
    fn test_history_rejects_unsent_ack() {
        let mut history = PacketHistory::new();
        history.archive(1, 10);
        assert_eq!(history.acknowledge(0, 20), None);
    }
}
