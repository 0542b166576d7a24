use cmdlink::net::PacketLossSimulation;
use cmdlink::{ProtocolVersion, Settings};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub protocol: ProtocolVersion,
    pub settings: Settings,
    /// Render frames to simulate.
    pub frames: u32,
    pub frame_msec: u32,
    /// Render frames per network tick.
    pub frames_per_tick: u32,
    pub link: PacketLossSimulation,
    /// Simulated server to client delay for acknowledgements.
    pub ack_delay_ms: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolVersion::Batched,
            settings: Settings::default(),
            frames: 600,
            frame_msec: 8,
            frames_per_tick: 2,
            link: PacketLossSimulation::default(),
            ack_delay_ms: 20,
        }
    }
}
