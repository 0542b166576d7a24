#[derive(Debug, Clone)]
pub struct InputSettings {
    pub forward_speed: f32,
    pub side_speed: f32,
    pub up_speed: f32,
    pub yaw_speed: f32,
    pub pitch_speed: f32,
    pub angle_speed_key: f32,
    pub always_run: bool,

    pub freelook: bool,
    pub lookspring: bool,
    pub lookstrafe: bool,

    pub sensitivity: f32,
    pub mouse_pitch: f32,
    pub mouse_yaw: f32,
    pub mouse_forward: f32,
    pub mouse_side: f32,
    pub mouse_filter: bool,
    pub mouse_accel: f32,
    pub mouse_autosens: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            forward_speed: 200.0,
            side_speed: 200.0,
            up_speed: 200.0,
            yaw_speed: 140.0,
            pitch_speed: 150.0,
            angle_speed_key: 1.5,
            always_run: true,

            freelook: true,
            lookspring: false,
            lookstrafe: false,

            sensitivity: 3.0,
            mouse_pitch: 0.022,
            mouse_yaw: 0.022,
            mouse_forward: 1.0,
            mouse_side: 1.0,
            mouse_filter: false,
            mouse_accel: 0.0,
            mouse_autosens: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetSettings {
    /// Ask the server for uncompressed world frames.
    pub no_delta: bool,
    /// Packet rate cap per second, 0 for unlimited.
    pub max_packets: u32,
    /// Previous packets' worth of commands repeated in batched mode.
    pub packet_dup: u32,
    /// Test mode that withholds legacy packets to exercise redundancy.
    pub loss_injection: bool,
    pub instant_packet: bool,
    pub batch_cmds: bool,
}

impl Default for NetSettings {
    fn default() -> Self {
        Self {
            no_delta: false,
            max_packets: 30,
            packet_dup: 1,
            loss_injection: false,
            instant_packet: true,
            batch_cmds: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub input: InputSettings,
    pub net: NetSettings,
}
