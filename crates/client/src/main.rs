mod script;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

use netsync::net::DEFAULT_PORT;
use netsync::{ClientConfig, ClientEvent, ConnectionState, Credentials, NetError, NetworkClient};
use script::ScriptedInput;

#[derive(Parser)]
#[command(name = "netsync-client")]
#[command(about = "Headless session client")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    server: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "dev")]
    token: String,

    #[arg(long, help = "Character id (random when omitted)")]
    character_id: Option<Uuid>,

    #[arg(long, help = "Season id (random when omitted)")]
    season_id: Option<Uuid>,

    #[arg(short, long, default_value = "default")]
    map_id: String,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(long, default_value_t = 100.0)]
    interpolation_delay_ms: f64,

    #[arg(long, default_value_t = 30, help = "Seconds to run, 0 runs until disconnected")]
    duration_secs: u64,

    #[arg(long, default_value_t = 10, help = "Seconds to wait for the session to become active")]
    connect_timeout_secs: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let credentials = Credentials {
        token: args.token.clone(),
        character_id: args.character_id.unwrap_or_else(Uuid::new_v4),
        season_id: args.season_id.unwrap_or_else(Uuid::new_v4),
    };

    let config = ClientConfig {
        interpolation_delay_ms: args.interpolation_delay_ms,
        ..Default::default()
    };

    let mut client = NetworkClient::new(config);
    client
        .connect_with(&credentials, &args.map_id, (args.server.as_str(), args.port))
        .with_context(|| format!("failed to connect to {}:{}", args.server, args.port))?;

    client.on_snapshot(|snapshot| {
        log::trace!(
            "Snapshot {} ack {} with {} entities",
            snapshot.server_time_ms,
            snapshot.ack_seq,
            snapshot.entity_count()
        );
    });

    run(&mut client, &args)?;

    let stats = client.stats();
    log::info!(
        "Sent {} packets ({} retransmitted), received {}, rtt {:.1} ms",
        stats.packets_sent,
        stats.retransmissions,
        stats.packets_received,
        stats.rtt_ms
    );
    client.disconnect();
    Ok(())
}

fn run(client: &mut NetworkClient, args: &Args) -> Result<()> {
    let frame = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);
    let connect_deadline = Instant::now() + Duration::from_secs(args.connect_timeout_secs);
    let run_for = (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs));

    let mut script = ScriptedInput::new();
    let mut active_since: Option<Instant> = None;
    let mut last_report = Instant::now();
    let mut last_frame = Instant::now();

    loop {
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        for event in client.poll() {
            match event {
                ClientEvent::Hello {
                    session_id,
                    tick_rate,
                } => log::info!("Session {} (server tick rate {})", session_id, tick_rate),
                ClientEvent::ConnectOk { player_name, .. } => {
                    log::info!("Signed in as {}", player_name)
                }
                ClientEvent::ServerError { code, message } => {
                    log::warn!("Server rejected a request ({}): {}", code, message)
                }
                ClientEvent::Disconnected { reason } => {
                    log::info!("Session ended: {}", reason);
                    return Ok(());
                }
                _ => {}
            }
        }

        match client.state() {
            ConnectionState::Active => {
                let started = *active_since.get_or_insert(now);
                if run_for.is_some_and(|limit| now.duration_since(started) >= limit) {
                    return Ok(());
                }

                script.advance(dt);
                match client.drain_input(&mut script) {
                    Ok(_) | Err(NetError::NotActive(_)) => {}
                    Err(e) => return Err(e.into()),
                }

                let registry = client.render_frame(dt);
                let visible = registry.entity_count();

                if last_report.elapsed() >= Duration::from_secs(1) {
                    last_report = now;
                    let stats = client.stats();
                    log::info!(
                        "{} entities, predicted {:?}, {} pending inputs, rtt {:.1} ms, {} unacked",
                        visible,
                        client.predicted_position(),
                        client.pending_inputs(),
                        stats.rtt_ms,
                        stats.pending_reliable
                    );
                }
            }
            ConnectionState::Disconnected if active_since.is_some() => return Ok(()),
            ConnectionState::Disconnected => {
                anyhow::bail!("connection closed before the session became active");
            }
            state => {
                if now >= connect_deadline {
                    anyhow::bail!("timed out while {}", state);
                }
            }
        }

        thread::sleep(frame.saturating_sub(now.elapsed()));
    }
}
