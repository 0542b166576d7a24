use std::collections::BTreeMap;

use log::{debug, warn};

use super::msg::{MessageError, MessageReader, MessageWriter};
use super::protocol::{Capabilities, MAX_PACKET_USERINFOS, USERINFO_DELTA, USERINFO_FULL};
use super::transport::Transport;

/// Upper bound on the encoded `\key\value` string.
pub const MAX_INFO_STRING: usize = 512;

/// What a push put on the reliable stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserinfoPush {
    Nothing,
    Full,
    Delta(usize),
    /// Partial changes the server cannot take; they were discarded.
    Skipped(usize),
}

/// Player variables mirrored to the server, plus the names changed since the
/// last push.
#[derive(Debug, Clone, Default)]
pub struct Userinfo {
    values: BTreeMap<String, String>,
    modified: Vec<String>,
    full: bool,
    delta_supported: bool,
}

fn valid_info_text(text: &str) -> bool {
    !text.contains(['\\', '"', ';'])
}

impl Userinfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the server cannot apply deltas, every change forces a full block.
    pub fn set_delta_supported(&mut self, supported: bool) {
        self.delta_supported = supported;
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns `false` if the key or value cannot be carried in an info string.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        if key.is_empty() || !valid_info_text(key) || !valid_info_text(value) {
            warn!("userinfo: rejecting invalid field {:?}", key);
            return false;
        }
        if self.get(key) == Some(value) {
            return true;
        }
        self.values.insert(key.to_owned(), value.to_owned());
        self.mark_modified(key);
        true
    }

    pub fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.mark_modified(key);
        }
    }

    /// Queues everything on the next push.
    pub fn mark_all_modified(&mut self) {
        self.full = true;
        self.modified.clear();
    }

    fn mark_modified(&mut self, key: &str) {
        if self.full {
            return;
        }
        if !self.delta_supported {
            self.mark_all_modified();
            return;
        }
        if self.modified.iter().any(|name| name == key) {
            return;
        }
        if self.modified.len() + 1 >= MAX_PACKET_USERINFOS {
            self.mark_all_modified();
        } else {
            self.modified.push(key.to_owned());
        }
    }

    pub fn pending(&self) -> usize {
        if self.full {
            MAX_PACKET_USERINFOS
        } else {
            self.modified.len()
        }
    }

    /// Encodes all fields as `\key\value` pairs.
    pub fn info_string(&self) -> String {
        let mut info = String::new();
        for (key, value) in &self.values {
            let pair_len = key.len() + value.len() + 2;
            if info.len() + pair_len > MAX_INFO_STRING {
                warn!("userinfo: info string full, dropping {:?}", key);
                continue;
            }
            info.push('\\');
            info.push_str(key);
            info.push('\\');
            info.push_str(value);
        }
        info
    }

    /// Puts pending changes on the reliable stream and clears them.
    pub fn push(&mut self, caps: &Capabilities, transport: &mut dyn Transport) -> UserinfoPush {
        let outcome = if self.full {
            let mut msg = MessageWriter::new();
            msg.write_u8(USERINFO_FULL);
            msg.write_string(&self.info_string());
            transport.queue_reliable(&msg.finish());
            debug!("userinfo: full update");
            UserinfoPush::Full
        } else if self.modified.is_empty() {
            return UserinfoPush::Nothing;
        } else if caps.userinfo_delta {
            let mut msg = MessageWriter::new();
            for name in &self.modified {
                msg.write_u8(USERINFO_DELTA);
                msg.write_string(name);
                msg.write_string(self.get(name).unwrap_or_default());
            }
            transport.queue_reliable(&msg.finish());
            debug!("userinfo: {} updates", self.modified.len());
            UserinfoPush::Delta(self.modified.len())
        } else {
            warn!(
                "userinfo: {} partial updates but server takes no deltas",
                self.modified.len()
            );
            UserinfoPush::Skipped(self.modified.len())
        };

        self.full = false;
        self.modified.clear();
        outcome
    }
}

/// Parses an info string back into its fields.
pub fn parse_info_string(info: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut parts = info.strip_prefix('\\').unwrap_or(info).split('\\');
    while let (Some(key), Some(value)) = (parts.next(), parts.next()) {
        fields.insert(key.to_owned(), value.to_owned());
    }
    fields
}

/// A userinfo message as the server applies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserinfoMessage {
    Full(BTreeMap<String, String>),
    /// An empty value removes the field.
    Delta { name: String, value: String },
}

/// Reads every userinfo message in a reliable block.
pub fn decode_userinfo(data: &[u8]) -> Result<Vec<UserinfoMessage>, MessageError> {
    let mut msg = MessageReader::new(data);
    let mut messages = Vec::new();
    while !msg.is_empty() {
        match msg.read_u8()? {
            USERINFO_FULL => messages.push(UserinfoMessage::Full(parse_info_string(
                &msg.read_string()?,
            ))),
            USERINFO_DELTA => {
                let name = msg.read_string()?;
                let value = msg.read_string()?;
                messages.push(UserinfoMessage::Delta { name, value });
            }
            other => return Err(MessageError::BadTag(other)),
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::ProtocolVersion;
    use crate::net::transport::LoopbackTransport;

    fn batched_caps() -> Capabilities {
        Capabilities::for_protocol(ProtocolVersion::Batched)
    }

    fn reliable_payload(transport: &mut LoopbackTransport) -> Vec<u8> {
        transport.transmit(0, &[], true).unwrap();
        transport.take_delivered(0).remove(0).reliable
    }

    #[test]
    fn test_delta_push() {
        let mut info = Userinfo::new();
        info.set_delta_supported(true);
        info.set("name", "player");
        info.set("rate", "25000");
        info.remove("rate");

        let mut transport = LoopbackTransport::new();
        assert_eq!(
            info.push(&batched_caps(), &mut transport),
            UserinfoPush::Delta(2)
        );
        assert_eq!(info.pending(), 0);

        let messages = decode_userinfo(&reliable_payload(&mut transport)).unwrap();
        assert_eq!(
            messages,
            vec![
                UserinfoMessage::Delta {
                    name: "name".into(),
                    value: "player".into()
                },
                UserinfoMessage::Delta {
                    name: "rate".into(),
                    value: String::new()
                },
            ]
        );
    }

    #[test]
    fn test_many_changes_become_full_update() {
        let mut info = Userinfo::new();
        info.set_delta_supported(true);
        for i in 0..MAX_PACKET_USERINFOS {
            info.set(&format!("key{i}"), "1");
        }
        assert_eq!(info.pending(), MAX_PACKET_USERINFOS);

        let mut transport = LoopbackTransport::new();
        assert_eq!(
            info.push(&batched_caps(), &mut transport),
            UserinfoPush::Full
        );

        let messages = decode_userinfo(&reliable_payload(&mut transport)).unwrap();
        match &messages[..] {
            [UserinfoMessage::Full(fields)] => {
                assert_eq!(fields.len(), MAX_PACKET_USERINFOS);
                assert_eq!(fields.get("key3").map(String::as_str), Some("1"));
            }
            other => panic!("unexpected messages {other:?}"),
        }
    }

    #[test]
    fn test_partial_changes_skipped_without_delta_support() {
        let mut info = Userinfo::new();
        info.set_delta_supported(true);
        info.set("name", "player");

        let caps = Capabilities::for_protocol(ProtocolVersion::Default);
        let mut transport = LoopbackTransport::new();
        assert_eq!(info.push(&caps, &mut transport), UserinfoPush::Skipped(1));
        assert!(!transport.has_reliable_pending());
    }

    #[test]
    fn test_changes_without_delta_support_send_full() {
        let mut info = Userinfo::new();
        info.set("skin", "male/grunt");

        let caps = Capabilities::for_protocol(ProtocolVersion::Default);
        let mut transport = LoopbackTransport::new();
        assert_eq!(info.push(&caps, &mut transport), UserinfoPush::Full);
    }

    #[test]
    fn test_invalid_text_rejected() {
        let mut info = Userinfo::new();
        assert!(!info.set("na\\me", "x"));
        assert!(!info.set("name", "a;b"));
        assert_eq!(info.pending(), 0);
    }

    #[test]
    fn test_info_string_roundtrip() {
        let mut info = Userinfo::new();
        info.set("name", "player");
        info.set("hand", "2");
        assert_eq!(info.info_string(), "\\hand\\2\\name\\player");
        assert_eq!(parse_info_string(&info.info_string()).len(), 2);
    }
}
