use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use log::trace;
use thiserror::Error;

use super::protocol::MAX_PACKET_SIZE;

/// Idle time after which a connected client sends an empty datagram.
pub const KEEPALIVE_INTERVAL_MS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("datagram of {size} bytes exceeds the {max} byte limit")]
    Oversize { size: usize, max: usize },
    #[error("transport is closed")]
    Closed,
}

/// Datagram channel the session transmits on. Loss is expected; only the
/// reliable sub-stream is retried, and that is the implementor's job.
pub trait Transport {
    /// Sends `data` as the datagram for `sequence`. When `reliable` is set,
    /// pending reliable data may ride along. Returns the bytes put on the wire.
    fn transmit(&mut self, sequence: u32, data: &[u8], reliable: bool)
    -> Result<usize, TransportError>;

    fn has_reliable_pending(&self) -> bool;

    fn queue_reliable(&mut self, data: &[u8]);

    /// Whether an idle connection needs a datagram to keep the link alive
    /// or flush reliable data.
    fn should_keepalive(&self, now: u32) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    /// Chance of losing a datagram, 0 to 100.
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub seed: u64,
    state: u64,
}

impl PacketLossSimulation {
    pub fn new(loss_percent: f32, seed: u64) -> Self {
        Self {
            enabled: loss_percent > 0.0,
            loss_percent,
            seed,
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, min_ms: u32, max_ms: u32) -> Self {
        self.enabled = true;
        self.min_latency_ms = min_ms;
        self.max_latency_ms = max_ms.max(min_ms);
        self
    }

    pub fn should_drop(&mut self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        self.rand_percent() * 100.0 < self.loss_percent
    }

    pub fn delay_ms(&mut self) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let range = self.max_latency_ms - self.min_latency_ms;
        self.min_latency_ms + (self.rand_percent() * range as f32) as u32
    }

    fn rand_percent(&mut self) -> f32 {
        if self.state == 0 {
            self.state = self.seed | 1;
        }
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x % 10000) as f32 / 10000.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub bytes_sent: u64,
    pub reliable_bytes_sent: u64,
}

/// A datagram as the far end receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub sequence: u32,
    pub reliable: Vec<u8>,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct DelayedDatagram {
    release_time: u32,
    datagram: Datagram,
}

impl PartialEq for DelayedDatagram {
    fn eq(&self, other: &Self) -> bool {
        self.release_time == other.release_time && self.datagram.sequence == other.datagram.sequence
    }
}

impl Eq for DelayedDatagram {}

impl PartialOrd for DelayedDatagram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedDatagram {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on release time, then sequence
        other
            .release_time
            .cmp(&self.release_time)
            .then_with(|| other.datagram.sequence.cmp(&self.datagram.sequence))
    }
}

/// In-process transport feeding a simulated receiver.
///
/// Reliable data rides on every outgoing datagram until one of them gets
/// through, which stands in for an acknowledgement.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    simulation: PacketLossSimulation,
    forced_drops: HashSet<u32>,
    in_flight: BinaryHeap<DelayedDatagram>,
    reliable: Vec<u8>,
    clock: u32,
    last_sent: Option<u32>,
    closed: bool,
    stats: LinkStats,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_simulation(simulation: PacketLossSimulation) -> Self {
        Self {
            simulation,
            ..Default::default()
        }
    }

    /// Loses the datagram sent under `sequence` regardless of the simulation.
    pub fn force_drop(&mut self, sequence: u32) {
        self.forced_drops.insert(sequence);
    }

    /// Sets the local time used to stamp outgoing datagrams.
    pub fn set_clock(&mut self, now: u32) {
        self.clock = now;
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Datagrams that have arrived by `now`, in arrival order.
    pub fn take_delivered(&mut self, now: u32) -> Vec<Datagram> {
        let mut delivered = Vec::new();
        while let Some(delayed) = self.in_flight.peek() {
            if delayed.release_time > now {
                break;
            }
            if let Some(delayed) = self.in_flight.pop() {
                delivered.push(delayed.datagram);
            }
        }
        delivered
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Transport for LoopbackTransport {
    fn transmit(
        &mut self,
        sequence: u32,
        data: &[u8],
        reliable: bool,
    ) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let carried = if reliable { self.reliable.len() } else { 0 };
        let size = data.len() + carried;
        if size > MAX_PACKET_SIZE {
            return Err(TransportError::Oversize {
                size,
                max: MAX_PACKET_SIZE,
            });
        }

        self.last_sent = Some(self.clock);
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += size as u64;
        self.stats.reliable_bytes_sent += carried as u64;

        let forced = self.forced_drops.remove(&sequence);
        if forced || self.simulation.should_drop() {
            self.stats.packets_lost += 1;
            trace!("loopback: lost seq {} ({} bytes)", sequence, size);
            return Ok(size);
        }

        let datagram = Datagram {
            sequence,
            reliable: if reliable {
                std::mem::take(&mut self.reliable)
            } else {
                Vec::new()
            },
            payload: data.to_vec(),
        };
        let release_time = self.clock.wrapping_add(self.simulation.delay_ms());
        self.in_flight.push(DelayedDatagram {
            release_time,
            datagram,
        });
        Ok(size)
    }

    fn has_reliable_pending(&self) -> bool {
        !self.reliable.is_empty()
    }

    fn queue_reliable(&mut self, data: &[u8]) {
        self.reliable.extend_from_slice(data);
    }

    fn should_keepalive(&self, now: u32) -> bool {
        if self.has_reliable_pending() {
            return true;
        }
        match self.last_sent {
            None => true,
            Some(last) => now.wrapping_sub(last) >= KEEPALIVE_INTERVAL_MS,
        }
    }
}
