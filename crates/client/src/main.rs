mod config;
mod script;
mod server;

use anyhow::{Context, bail};
use clap::Parser;

use cmdlink::net::{LoopbackTransport, PacketLossSimulation};
use cmdlink::{CommandEncoder, CommandSession, ProtocolVersion, SendOutcome, Userinfo};

use config::DriverConfig;
use script::InputScript;
use server::SimServer;

#[derive(Parser)]
#[command(name = "cmdlink-client")]
#[command(about = "Drives a scripted player through the movement command stream")]
struct Args {
    #[arg(short, long, default_value = "36", help = "Protocol version (34, 35 or 36)")]
    protocol: u32,

    #[arg(long, default_value = "30", help = "Packets per second, 0 for unlimited")]
    max_packets: u32,

    #[arg(long, default_value = "1", help = "Previous packets repeated in each batched move")]
    packet_dup: u32,

    #[arg(long, default_value = "0", help = "Simulated packet loss percent")]
    loss: f32,

    #[arg(long, default_value = "0")]
    min_latency: u32,

    #[arg(long, default_value = "0")]
    max_latency: u32,

    #[arg(long, default_value = "1")]
    seed: u64,

    #[arg(long, default_value = "600", help = "Render frames to run")]
    frames: u32,

    #[arg(long, default_value = "8")]
    frame_msec: u32,

    #[arg(long, default_value = "2", help = "Render frames per network tick")]
    frames_per_tick: u32,

    #[arg(long, help = "Use legacy moves even when batching is available")]
    no_batch: bool,

    #[arg(long, help = "Withhold packets to mimic outgoing loss")]
    loss_injection: bool,

    #[arg(long, help = "Ask the server for uncompressed frames")]
    no_delta: bool,

    #[arg(long, default_value = "Player")]
    name: String,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(DriverConfig, String)> {
        let Some(protocol) = ProtocolVersion::from_number(self.protocol) else {
            bail!("unsupported protocol version {}", self.protocol);
        };
        if self.frame_msec == 0 || self.frame_msec > 250 {
            bail!("frame_msec must be between 1 and 250");
        }

        let mut config = DriverConfig {
            protocol,
            frames: self.frames,
            frame_msec: self.frame_msec,
            frames_per_tick: self.frames_per_tick.max(1),
            link: PacketLossSimulation::new(self.loss, self.seed),
            ..Default::default()
        };
        if self.max_latency > 0 {
            config.link = config.link.with_latency(self.min_latency, self.max_latency);
        }

        let net = &mut config.settings.net;
        net.max_packets = self.max_packets;
        net.packet_dup = self.packet_dup;
        net.batch_cmds = !self.no_batch;
        net.loss_injection = self.loss_injection;
        net.no_delta = self.no_delta;

        Ok((config, self.name))
    }
}

#[derive(Debug, Default)]
struct Report {
    sent: u64,
    keepalives: u64,
    throttled: u64,
    withheld: u64,
    aborted: u64,
    rtt_total: u64,
    rtt_samples: u64,
}

impl Report {
    fn record(&mut self, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Sent { .. } => self.sent += 1,
            SendOutcome::KeepAlive { .. } => self.keepalives += 1,
            SendOutcome::Throttled => self.throttled += 1,
            SendOutcome::Dropped { .. } => self.withheld += 1,
            SendOutcome::Aborted { .. } => self.aborted += 1,
            SendOutcome::Idle => {}
        }
    }

    fn average_rtt(&self) -> Option<u64> {
        (self.rtt_samples > 0).then(|| self.rtt_total / self.rtt_samples)
    }
}

fn run(config: DriverConfig, name: &str) -> anyhow::Result<()> {
    let mut session = CommandSession::new(config.settings.clone());
    session.connect(config.protocol);
    let encoder = session
        .activate()
        .context("session did not become active")?;
    log::info!(
        "Protocol {} using {:?}",
        config.protocol.number(),
        encoder
    );

    let checksum = matches!(encoder, CommandEncoder::Legacy { checksum: true });
    let mut server = SimServer::new(checksum, config.ack_delay_ms);
    let mut transport = LoopbackTransport::with_simulation(config.link.clone());
    let mut userinfo = Userinfo::new();
    if !userinfo.set("name", name) {
        bail!("invalid player name {:?}", name);
    }
    userinfo.set("rate", "25000");
    userinfo.set("hand", "2");

    let mut script = InputScript::new();
    let mut report = Report::default();
    let mut now = 1000u32;

    for frame in 0..config.frames {
        now += config.frame_msec;
        script.apply_keys(&mut session, now);
        session.frame(config.frame_msec, now, Some(script.mouse(now)));

        if frame % config.frames_per_tick != 0 {
            continue;
        }

        session.finalize(now, script.any_key_down());
        transport.set_clock(now);
        report.record(session.send(now, &mut transport, &mut userinfo));

        for datagram in transport.take_delivered(now) {
            server.process(&datagram, now);
        }
        for sequence in server.take_acks(now) {
            if let Some(rtt) = session.acknowledge(sequence, now) {
                report.rtt_total += u64::from(rtt);
                report.rtt_samples += 1;
            }
        }
    }

    // Let the link drain so late datagrams count.
    now += config.link.max_latency_ms + 1;
    for datagram in transport.take_delivered(now) {
        server.process(&datagram, now);
    }

    let link = transport.stats();
    let received = server.receiver().stats();
    log::info!(
        "Commands: {} built, {} executed ({} recovered from redundancy)",
        session.command_number(),
        server.executed().len(),
        received.recovered
    );
    log::info!(
        "Packets: {} sent, {} lost on the link, {} withheld, {} throttled, {} keepalive, {} aborted",
        report.sent,
        link.packets_lost,
        report.withheld,
        report.throttled,
        report.keepalives,
        report.aborted
    );
    log::info!(
        "Server: {} packets, {} gaps, {} stale, {} rejected, {} bytes",
        received.packets,
        received.gaps,
        received.stale,
        server.rejected(),
        link.bytes_sent
    );
    match report.average_rtt() {
        Some(rtt) => log::info!("Average round trip: {} ms", rtt),
        None => log::info!("No acknowledgements received"),
    }
    log::debug!("Server userinfo: {:?}", server.userinfo());

    session.shutdown();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, name) = Args::parse().into_config()?;
    run(config, &name)
}
