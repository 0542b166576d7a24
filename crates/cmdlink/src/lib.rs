pub mod command;
pub mod input;
pub mod net;
pub mod session;
pub mod settings;

pub use command::{
    ButtonBits, CommandAssembler, CommandRing, HistoryEntry, MoveCommand, PacketHistory,
    ServerState,
};
pub use input::{Action, ButtonSet, InputSampler, LogicalButton, MouseDelta, PressSource};
pub use net::{
    Capabilities, CommandEncoder, ConnectionState, DecodeError, DecodedMove, EncodeError,
    LoopbackTransport, PacketLossSimulation, ProtocolVersion, TransmissionScheduler, Transport,
    TransportError, Userinfo, decode_move,
};
pub use session::{CommandSession, SendOutcome};
pub use settings::{InputSettings, NetSettings, Settings};
