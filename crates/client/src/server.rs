use std::collections::{BTreeMap, VecDeque};

use cmdlink::net::{Datagram, MoveReceiver, UserinfoMessage, decode_userinfo};
use cmdlink::MoveCommand;

/// Receiving end of the loopback: rebuilds the command stream, applies
/// userinfo and queues acknowledgements for the client.
#[derive(Debug)]
pub struct SimServer {
    receiver: MoveReceiver,
    userinfo: BTreeMap<String, String>,
    pending_acks: VecDeque<(u32, u32)>,
    ack_delay_ms: u32,
    executed: Vec<MoveCommand>,
    rejected: u64,
}

impl SimServer {
    pub fn new(checksum: bool, ack_delay_ms: u32) -> Self {
        Self {
            receiver: MoveReceiver::new(checksum),
            userinfo: BTreeMap::new(),
            pending_acks: VecDeque::new(),
            ack_delay_ms,
            executed: Vec::new(),
            rejected: 0,
        }
    }

    pub fn process(&mut self, datagram: &Datagram, now: u32) {
        if !datagram.reliable.is_empty() {
            match decode_userinfo(&datagram.reliable) {
                Ok(messages) => self.apply_userinfo(messages),
                Err(e) => log::warn!("Bad reliable block in seq {}: {}", datagram.sequence, e),
            }
        }

        match self.receiver.receive(datagram) {
            Ok(commands) => {
                self.executed.extend(commands);
                self.pending_acks
                    .push_back((datagram.sequence, now + self.ack_delay_ms));
            }
            Err(e) => {
                self.rejected += 1;
                log::warn!("Rejected seq {}: {}", datagram.sequence, e);
            }
        }
    }

    fn apply_userinfo(&mut self, messages: Vec<UserinfoMessage>) {
        for message in messages {
            match message {
                UserinfoMessage::Full(fields) => {
                    log::debug!("Userinfo replaced ({} fields)", fields.len());
                    self.userinfo = fields;
                }
                UserinfoMessage::Delta { name, value } if value.is_empty() => {
                    self.userinfo.remove(&name);
                }
                UserinfoMessage::Delta { name, value } => {
                    self.userinfo.insert(name, value);
                }
            }
        }
    }

    /// Acknowledgements that reach the client by `now`.
    pub fn take_acks(&mut self, now: u32) -> Vec<u32> {
        let mut acks = Vec::new();
        while let Some(&(sequence, arrival)) = self.pending_acks.front() {
            if arrival > now {
                break;
            }
            self.pending_acks.pop_front();
            acks.push(sequence);
        }
        acks
    }

    pub fn executed(&self) -> &[MoveCommand] {
        &self.executed
    }

    pub fn receiver(&self) -> &MoveReceiver {
        &self.receiver
    }

    pub fn userinfo(&self) -> &BTreeMap<String, String> {
        &self.userinfo
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
