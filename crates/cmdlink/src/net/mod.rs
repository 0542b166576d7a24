mod checksum;
mod connection;
mod decoder;
mod delta;
mod encoder;
mod msg;
mod protocol;
mod receiver;
mod scheduler;
mod transport;
mod userinfo;

pub use checksum::{block_sequence_crc_byte, crc_block};
pub use connection::{Connection, ConnectionState};
pub use decoder::{DecodeError, DecodedMove, decode_move};
pub use delta::{
    DeltaBits, read_delta_enhanced, read_delta_legacy, write_delta_enhanced, write_delta_legacy,
};
pub use encoder::{CommandEncoder, EncodeContext, EncodeError, LEGACY_COMMANDS_PER_PACKET};
pub use msg::{MessageError, MessageReader, MessageWriter};
pub use protocol::{
    Capabilities, MAX_PACKET_FRAMES, MAX_PACKET_SIZE, MAX_PACKET_USERCMDS, MAX_PACKET_USERINFOS,
    MOVE_BATCHED, MOVE_LEGACY, MOVE_NODELTA, NO_FRAME, ProtocolVersion, USERINFO_DELTA,
    USERINFO_FULL, pack_tag, unpack_tag,
};
pub use receiver::{MoveReceiver, ReceiverStats, sequence_greater_than};
pub use scheduler::{MIN_PACKET_RATE, TransmissionScheduler};
pub use transport::{
    Datagram, KEEPALIVE_INTERVAL_MS, LinkStats, LoopbackTransport, PacketLossSimulation,
    Transport, TransportError,
};
pub use userinfo::{
    MAX_INFO_STRING, Userinfo, UserinfoMessage, UserinfoPush, decode_userinfo, parse_info_string,
};
