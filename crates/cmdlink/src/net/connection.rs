use super::encoder::CommandEncoder;
use super::protocol::{Capabilities, ProtocolVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Handshake done, world not loaded yet. Only keepalives and userinfo go out.
    Connected,
    Active,
}

/// Negotiated link parameters. The encoder is fixed once the connection
/// goes active and stays fixed until it drops.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    state: ConnectionState,
    protocol: Option<ProtocolVersion>,
    encoder: Option<CommandEncoder>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != ConnectionState::Disconnected
    }

    pub fn is_active(&self) -> bool {
        self.state == ConnectionState::Active
    }

    pub fn protocol(&self) -> Option<ProtocolVersion> {
        self.protocol
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.protocol.map(Capabilities::for_protocol)
    }

    pub fn encoder(&self) -> Option<CommandEncoder> {
        self.encoder
    }

    pub fn connect(&mut self, protocol: ProtocolVersion) {
        self.state = ConnectionState::Connected;
        self.protocol = Some(protocol);
        self.encoder = None;
    }

    /// Goes active and picks the encoder. Returns `None` if not connected.
    pub fn activate(&mut self, batch_cmds: bool) -> Option<CommandEncoder> {
        let caps = self.capabilities()?;
        let encoder = *self
            .encoder
            .get_or_insert_with(|| CommandEncoder::for_capabilities(caps, batch_cmds));
        self.state = ConnectionState::Active;
        Some(encoder)
    }

    pub fn disconnect(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut connection = Connection::new();
        assert_eq!(connection.activate(true), None);
        assert!(!connection.is_connected());

        connection.connect(ProtocolVersion::Batched);
        assert_eq!(connection.state(), ConnectionState::Connected);

        assert_eq!(connection.activate(true), Some(CommandEncoder::Batched));
        assert!(connection.is_active());

        connection.disconnect();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(connection.encoder(), None);
    }

    #[test]
    fn test_encoder_fixed_while_active() {
        let mut connection = Connection::new();
        connection.connect(ProtocolVersion::Batched);
        connection.activate(true);

        assert_eq!(connection.activate(false), Some(CommandEncoder::Batched));
    }

    #[test]
    fn test_reconnect_renegotiates() {
        let mut connection = Connection::new();
        connection.connect(ProtocolVersion::Batched);
        connection.activate(true);

        connection.connect(ProtocolVersion::Default);
        assert_eq!(
            connection.activate(true),
            Some(CommandEncoder::Legacy { checksum: true })
        );
    }
}
