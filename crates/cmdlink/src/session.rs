use glam::Vec3;
use log::{debug, trace, warn};

use crate::command::{CommandAssembler, CommandRing, PacketHistory, ServerState, TickContext};
use crate::input::{Action, ButtonSet, InputSampler, MouseDelta, PressSource, SampleContext};
use crate::net::{
    CommandEncoder, Connection, ConnectionState, EncodeContext, EncodeError, ProtocolVersion,
    TransmissionScheduler, Transport, Userinfo,
};
use crate::settings::Settings;

const DEFAULT_FOV: f32 = 90.0;

/// Result of one call to [`CommandSession::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to do this tick.
    Idle,
    /// An empty datagram went out to keep the link alive.
    KeepAlive { sequence: u32 },
    /// Loss injection consumed the sequence without sending.
    Dropped { sequence: u32 },
    /// The rate limit held the packet back; it goes out on a later tick.
    Throttled,
    Sent { sequence: u32, size: usize },
    /// The packet could not be built; the sequence went out empty.
    Aborted { sequence: u32 },
}

/// Owns all input and transmission state for one client.
///
/// Device handlers call the press/release entry points between ticks; the
/// main loop calls [`frame`](Self::frame) every render frame and
/// [`finalize`](Self::finalize) plus [`send`](Self::send) every network tick.
#[derive(Debug)]
pub struct CommandSession {
    settings: Settings,
    connection: Connection,
    buttons: ButtonSet,
    sampler: InputSampler,
    assembler: CommandAssembler,
    history: PacketHistory,
    scheduler: TransmissionScheduler,
    server: ServerState,
    paused: bool,
    light_level: u8,
    fov_x: f32,
}

impl Default for CommandSession {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl CommandSession {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            connection: Connection::new(),
            buttons: ButtonSet::new(),
            sampler: InputSampler::new(),
            assembler: CommandAssembler::new(),
            history: PacketHistory::new(),
            scheduler: TransmissionScheduler::new(),
            server: ServerState::default(),
            paused: false,
            light_level: 0,
            fov_x: DEFAULT_FOV,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn connect(&mut self, protocol: ProtocolVersion) {
        debug!("Connected with protocol {}", protocol.number());
        self.connection.connect(protocol);
        self.clear_link_state();
    }

    /// Goes active and fixes the move encoding for this connection.
    pub fn activate(&mut self) -> Option<CommandEncoder> {
        let encoder = self.connection.activate(self.settings.net.batch_cmds);
        match encoder {
            Some(encoder) => debug!("Connection active, sending moves as {:?}", encoder),
            None => warn!("Cannot activate without a connection"),
        }
        encoder
    }

    pub fn disconnect(&mut self) {
        if self.connection.is_connected() {
            debug!("Disconnected");
        }
        self.connection.disconnect();
        self.clear_link_state();
    }

    pub fn shutdown(&mut self) {
        self.disconnect();
        self.buttons = ButtonSet::new();
        self.sampler = InputSampler::new();
    }

    fn clear_link_state(&mut self) {
        self.assembler.reset();
        self.history.clear();
        self.scheduler.reset();
        self.server = ServerState::default();
        self.paused = false;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn encoder(&self) -> Option<CommandEncoder> {
        self.connection.encoder()
    }

    pub fn press(
        &mut self,
        action: Action,
        source: PressSource,
        timestamp: Option<u32>,
        event_time: u32,
    ) {
        let instant = self.settings.net.instant_packet;
        if self
            .buttons
            .press(action, source, timestamp, event_time, instant)
        {
            self.scheduler.request_immediate();
        }
    }

    pub fn release(&mut self, action: Action, source: PressSource, timestamp: Option<u32>) {
        self.buttons.release(action, source, timestamp);
    }

    pub fn impulse(&mut self, impulse: u8) {
        self.buttons.set_impulse(impulse);
    }

    pub fn mouse_look_down(&mut self) {
        self.buttons.mouse_look_down();
    }

    pub fn mouse_look_up(&mut self) {
        self.buttons.mouse_look_up(
            &self.settings.input,
            self.server.delta_pitch,
            &mut self.sampler.view_angles,
        );
    }

    pub fn center_view(&mut self) {
        crate::input::center_view(self.server.delta_pitch, &mut self.sampler.view_angles);
    }

    /// Forgets held buttons, as on focus loss.
    pub fn clear_buttons(&mut self) {
        self.buttons = ButtonSet::new();
    }

    pub fn buttons(&self) -> &ButtonSet {
        &self.buttons
    }

    pub fn view_angles(&self) -> Vec3 {
        self.sampler.view_angles
    }

    pub fn set_view_angles(&mut self, angles: Vec3) {
        self.sampler.view_angles = angles;
    }

    pub fn server_state(&self) -> &ServerState {
        &self.server
    }

    pub fn set_server_state(&mut self, server: ServerState) {
        self.server = server;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_light_level(&mut self, light_level: u8) {
        self.light_level = light_level;
    }

    pub fn set_fov(&mut self, fov_x: f32) {
        self.fov_x = fov_x;
    }

    /// Samples input for one render frame. `mouse` is `None` while the
    /// pointer belongs to a menu or the console.
    pub fn frame(&mut self, msec: u32, event_time: u32, mouse: Option<MouseDelta>) {
        if self.paused {
            self.sampler.pause_frame();
            return;
        }

        let ctx = SampleContext {
            settings: &self.settings.input,
            server: &self.server,
            event_time,
            fov_x: self.fov_x,
        };
        self.sampler.update(
            msec,
            mouse,
            self.assembler.pending_mut(),
            &self.buttons,
            &ctx,
        );
    }

    /// Closes the pending command. Returns its number, or `None` when the
    /// connection is not active or the game is paused.
    pub fn finalize(&mut self, event_time: u32, any_key_down: bool) -> Option<u32> {
        if !self.connection.is_active() {
            return None;
        }

        let ctx = TickContext {
            settings: &self.settings.input,
            server: &self.server,
            event_time,
            any_key_down,
            paused: self.paused,
        };
        self.assembler
            .finalize(&mut self.buttons, &mut self.sampler, &ctx)
    }

    pub fn command_number(&self) -> u32 {
        self.assembler.command_number()
    }

    pub fn commands(&self) -> &CommandRing {
        self.assembler.ring()
    }

    pub fn history(&self) -> &PacketHistory {
        &self.history
    }

    pub fn outgoing_sequence(&self) -> u32 {
        self.history.outgoing_sequence()
    }

    /// Records the server's acknowledgement and returns the round trip.
    pub fn acknowledge(&mut self, sequence: u32, now: u32) -> Option<u32> {
        self.history.acknowledge(sequence, now)
    }

    /// Runs the per-tick send decision.
    pub fn send(
        &mut self,
        now: u32,
        transport: &mut dyn Transport,
        userinfo: &mut Userinfo,
    ) -> SendOutcome {
        let Some(caps) = self.connection.capabilities() else {
            return SendOutcome::Idle;
        };
        userinfo.set_delta_supported(caps.userinfo_delta);

        if !self.connection.is_active() || self.paused {
            userinfo.push(&caps, transport);
            if transport.should_keepalive(now) {
                return self.send_keepalive(now, transport);
            }
            return SendOutcome::Idle;
        }

        let command_number = self.assembler.command_number();
        if !self.scheduler.has_new_commands(command_number) {
            return SendOutcome::Idle;
        }

        userinfo.push(&caps, transport);

        let Some(encoder) = self.connection.encoder() else {
            return SendOutcome::Idle;
        };
        let outcome = if encoder.is_batched() {
            self.send_batched(now, encoder, transport)
        } else {
            self.send_legacy(now, encoder, transport)
        };

        self.scheduler.clear_immediate();
        outcome
    }

    fn send_keepalive(&mut self, now: u32, transport: &mut dyn Transport) -> SendOutcome {
        let command_number = self.assembler.command_number();
        let sequence = self.history.archive(command_number, now);
        self.scheduler.mark_transmitted(now, command_number);

        transmit(transport, sequence, &[]);
        self.history.advance();
        SendOutcome::KeepAlive { sequence }
    }

    fn send_legacy(
        &mut self,
        now: u32,
        encoder: CommandEncoder,
        transport: &mut dyn Transport,
    ) -> SendOutcome {
        let command_number = self.assembler.command_number();
        let sequence = self.history.archive(command_number, now);
        self.scheduler.mark_attempted(command_number);

        let net = &self.settings.net;
        if !self.scheduler.ready_to_send_lossy(
            now,
            transport.has_reliable_pending(),
            net.max_packets,
            net.loss_injection,
            command_number,
        ) {
            self.history.advance();
            return SendOutcome::Dropped { sequence };
        }
        self.scheduler.mark_transmitted(now, command_number);

        self.encode_and_transmit(encoder, sequence, transport)
    }

    fn send_batched(
        &mut self,
        now: u32,
        encoder: CommandEncoder,
        transport: &mut dyn Transport,
    ) -> SendOutcome {
        if !self.scheduler.ready_to_send(
            now,
            transport.has_reliable_pending(),
            self.settings.net.max_packets,
        ) {
            return SendOutcome::Throttled;
        }

        let command_number = self.assembler.command_number();
        let sequence = self.history.archive(command_number, now);
        self.scheduler.mark_transmitted(now, command_number);

        self.encode_and_transmit(encoder, sequence, transport)
    }

    fn encode_and_transmit(
        &mut self,
        encoder: CommandEncoder,
        sequence: u32,
        transport: &mut dyn Transport,
    ) -> SendOutcome {
        let ctx = EncodeContext {
            ring: self.assembler.ring(),
            history: &self.history,
            sequence,
            frame: self.server.frame,
            no_delta: self.settings.net.no_delta,
            light_level: self.light_level,
            dups: self.settings.net.packet_dup,
        };

        let outcome = match encoder.encode(&ctx) {
            Ok(data) => {
                let size = transmit(transport, sequence, &data);
                SendOutcome::Sent { sequence, size }
            }
            Err(err) => {
                if let EncodeError::MissingCommand(_) = err {
                    warn!("Move packet {} not built: {}", sequence, err);
                }
                transmit(transport, sequence, &[]);
                SendOutcome::Aborted { sequence }
            }
        };

        self.history.advance();
        outcome
    }
}

fn transmit(transport: &mut dyn Transport, sequence: u32, data: &[u8]) -> usize {
    match transport.transmit(sequence, data, true) {
        Ok(size) => {
            trace!("seq {}: {} bytes", sequence, size);
            size
        }
        Err(err) => {
            debug!("seq {}: transmit failed: {}", sequence, err);
            0
        }
    }
}
