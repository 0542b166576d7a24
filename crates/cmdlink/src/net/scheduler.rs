/// Lowest packet rate the limiter honours; smaller settings are raised to it.
pub const MIN_PACKET_RATE: u32 = 10;

/// Most finalized commands the loss injection gate may hold back.
const MAX_WITHHELD_COMMANDS: u32 = 2;

/// Polled gate deciding whether a move packet may go out this tick.
#[derive(Debug, Clone, Default)]
pub struct TransmissionScheduler {
    send_now: bool,
    last_transmit_time: u32,
    /// Newest command covered by the last packet, sent or deliberately dropped.
    last_transmit_command: u32,
    /// Newest command covered by the last packet that actually went out.
    last_transmit_command_real: u32,
}

impl TransmissionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_immediate(&mut self) {
        self.send_now = true;
    }

    pub fn clear_immediate(&mut self) {
        self.send_now = false;
    }

    pub fn immediate_requested(&self) -> bool {
        self.send_now
    }

    /// Minimum spacing between packets for `max_packets`, or `None` when
    /// unlimited.
    pub fn min_interval(max_packets: u32) -> Option<u32> {
        if max_packets == 0 {
            return None;
        }

        let rate = max_packets.max(MIN_PACKET_RATE);
        let mut msec = 1000 / rate;
        if msec != 0 {
            // snap to a divisor of 100 so the spacing stays steady at common frame rates
            msec = 100 / (100 / msec);
        }
        Some(msec)
    }

    pub fn ready_to_send(&self, now: u32, reliable_pending: bool, max_packets: u32) -> bool {
        if self.send_now || reliable_pending {
            return true;
        }

        match Self::min_interval(max_packets) {
            None => true,
            Some(interval) => now.wrapping_sub(self.last_transmit_time) >= interval,
        }
    }

    /// Rate gate that only applies while loss injection is on, and never holds
    /// back more than two commands.
    pub fn ready_to_send_lossy(
        &self,
        now: u32,
        reliable_pending: bool,
        max_packets: u32,
        loss_injection: bool,
        command_number: u32,
    ) -> bool {
        if !loss_injection {
            return true;
        }
        if command_number.wrapping_sub(self.last_transmit_command_real) > MAX_WITHHELD_COMMANDS {
            return true;
        }
        self.ready_to_send(now, reliable_pending, max_packets)
    }

    pub fn has_new_commands(&self, command_number: u32) -> bool {
        self.last_transmit_command != command_number
    }

    /// Records that `command_number` was handed to a packet, even one that is
    /// then withheld.
    pub fn mark_attempted(&mut self, command_number: u32) {
        self.last_transmit_command = command_number;
    }

    pub fn mark_transmitted(&mut self, now: u32, command_number: u32) {
        self.last_transmit_time = now;
        self.last_transmit_command = command_number;
        self.last_transmit_command_real = command_number;
    }

    pub fn last_transmit_time(&self) -> u32 {
        self.last_transmit_time
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_scenario() {
        let mut scheduler = TransmissionScheduler::new();
        let start = 10_000;

        assert!(scheduler.ready_to_send(start, false, 20));
        scheduler.mark_transmitted(start, 1);

        assert!(!scheduler.ready_to_send(start + 10, false, 20));
        assert!(!scheduler.ready_to_send(start + 49, false, 20));
        assert!(scheduler.ready_to_send(start + 50, false, 20));
    }

    #[test]
    fn test_unlimited_and_immediate() {
        let mut scheduler = TransmissionScheduler::new();
        scheduler.mark_transmitted(500, 1);

        assert!(scheduler.ready_to_send(500, false, 0));
        assert!(!scheduler.ready_to_send(501, false, 30));
        assert!(scheduler.ready_to_send(501, true, 30));

        scheduler.request_immediate();
        assert!(scheduler.ready_to_send(501, false, 30));
        scheduler.clear_immediate();
        assert!(!scheduler.ready_to_send(501, false, 30));
    }

    #[test]
    fn test_rate_floor() {
        assert_eq!(TransmissionScheduler::min_interval(1), Some(100));
        assert_eq!(TransmissionScheduler::min_interval(30), Some(33));
        assert_eq!(TransmissionScheduler::min_interval(60), Some(16));
        assert_eq!(TransmissionScheduler::min_interval(0), None);
    }

    #[test]
    fn test_loss_injection_bounds_withheld_commands() {
        let mut scheduler = TransmissionScheduler::new();
        scheduler.mark_transmitted(1000, 5);

        assert!(scheduler.ready_to_send_lossy(1001, false, 10, false, 6));
        assert!(!scheduler.ready_to_send_lossy(1001, false, 10, true, 6));
        assert!(!scheduler.ready_to_send_lossy(1001, false, 10, true, 7));
        assert!(scheduler.ready_to_send_lossy(1001, false, 10, true, 8));
    }

    #[test]
    fn test_new_commands_tracking() {
        let mut scheduler = TransmissionScheduler::new();
        assert!(!scheduler.has_new_commands(0));
        assert!(scheduler.has_new_commands(1));

        scheduler.mark_attempted(1);
        assert!(!scheduler.has_new_commands(1));
    }
}
