pub const MAX_PACKET_SIZE: usize = 1400;

/// Client to server message ids. The id occupies the low [`TAG_BITS`] bits of
/// the leading byte.
pub const MOVE_LEGACY: u8 = 2;
pub const USERINFO_FULL: u8 = 3;
pub const MOVE_NODELTA: u8 = 10;
pub const MOVE_BATCHED: u8 = 11;
pub const USERINFO_DELTA: u8 = 12;

pub const TAG_BITS: u8 = 5;
pub const TAG_MASK: u8 = (1 << TAG_BITS) - 1;

/// Outgoing sequence slots one batched packet may cover.
pub const MAX_PACKET_FRAMES: u32 = 4;
/// Exclusive bound on commands per slot, fixed by the 5-bit count field.
pub const MAX_PACKET_USERCMDS: u32 = 32;
pub const USERCMD_COUNT_BITS: u8 = 5;
/// Changed userinfo fields tracked before a full block is sent instead.
pub const MAX_PACKET_USERINFOS: usize = 8;

/// World frame reference meaning "no baseline, send a full frame".
pub const NO_FRAME: i32 = -1;

const _: () = assert!(MAX_PACKET_USERCMDS == 1 << USERCMD_COUNT_BITS);
const _: () = assert!(MAX_PACKET_FRAMES - 1 <= (u8::MAX >> TAG_BITS) as u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// Baseline protocol: legacy moves with a checksum byte.
    Default = 34,
    /// Legacy moves without the checksum byte.
    Extended = 35,
    /// Adds batched moves and userinfo deltas.
    Batched = 36,
}

impl ProtocolVersion {
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            34 => Some(Self::Default),
            35 => Some(Self::Extended),
            36 => Some(Self::Batched),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        self as u32
    }
}

/// What the negotiated protocol lets the client send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub batched_moves: bool,
    pub move_checksum: bool,
    pub userinfo_delta: bool,
}

impl Capabilities {
    pub fn for_protocol(version: ProtocolVersion) -> Self {
        Self {
            batched_moves: version >= ProtocolVersion::Batched,
            move_checksum: version <= ProtocolVersion::Default,
            userinfo_delta: version >= ProtocolVersion::Batched,
        }
    }
}

/// Packs a message id with the redundancy count carried in the high bits.
#[inline]
pub fn pack_tag(id: u8, dups: u32) -> u8 {
    (id & TAG_MASK) | ((dups as u8) << TAG_BITS)
}

#[inline]
pub fn unpack_tag(byte: u8) -> (u8, u32) {
    (byte & TAG_MASK, (byte >> TAG_BITS) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_per_protocol() {
        let default = Capabilities::for_protocol(ProtocolVersion::Default);
        assert!(default.move_checksum);
        assert!(!default.batched_moves);

        let extended = Capabilities::for_protocol(ProtocolVersion::Extended);
        assert!(!extended.move_checksum);
        assert!(!extended.userinfo_delta);

        let batched = Capabilities::for_protocol(ProtocolVersion::Batched);
        assert!(batched.batched_moves);
        assert!(batched.userinfo_delta);
        assert!(!batched.move_checksum);
    }

    #[test]
    fn test_tag_packing() {
        let byte = pack_tag(MOVE_BATCHED, 3);
        assert_eq!(unpack_tag(byte), (MOVE_BATCHED, 3));
        assert_eq!(pack_tag(MOVE_NODELTA, 0), MOVE_NODELTA);
    }

    #[test]
    fn test_protocol_numbers() {
        assert_eq!(ProtocolVersion::from_number(36), Some(ProtocolVersion::Batched));
        assert_eq!(ProtocolVersion::Default.number(), 34);
        assert_eq!(ProtocolVersion::from_number(99), None);
    }
}
