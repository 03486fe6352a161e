//! realm-sync binary
//!
//! Feeds server → client frames through a [`MirrorService`], either from a
//! capture file or from a plaintext TCP frame source.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                                  | Default | Description                        |
//! |--------------------------------------|---------|------------------------------------|
//! | `REALM_SYNC_APPLY_MODE`              | `inline`| `inline` or `deferred`             |
//! | `REALM_SYNC_CAST_GRACE_MS`           | `2000`  | Slack before a stuck cast clears   |
//! | `REALM_SYNC_INSTANT_CAST_TIMEOUT_MS` | `10000` | Stuck timeout for zero-time casts  |
//! | `REALM_SYNC_TICK_RATE_HZ`            | `10`    | Deferred apply / expiry tick rate  |
//! | `REALM_SYNC_NOTIFICATION_BUFFER`     | `1024`  | Per-channel subscription capacity  |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use realm_sync::{
    connection::{CancelToken, ConnectionAgent, ConnectionConfig, FrameReader},
    guid::Guid,
    notifier::Notification,
    service::MirrorService,
    types::MirrorConfig,
    workflow::Workflow,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "realm-sync", about = "Realm Sync world mirror", version)]
struct Args {
    /// Optional TOML file layered under REALM_SYNC_* env vars
    #[arg(long, env = "REALM_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log every published event at info level
    #[arg(long)]
    print_events: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Replay a capture of server frames and print the resulting stats
    Replay {
        /// File holding back-to-back `[u16 BE size][u16 LE opcode][payload]` frames
        file: PathBuf,
    },
    /// Mirror a live plaintext frame source until it closes or ctrl-c
    Connect {
        /// `host:port` of the frame source
        #[arg(long, env = "REALM_SYNC_ENDPOINT", default_value = "127.0.0.1:8085")]
        endpoint: String,

        /// Seconds between stats log lines
        #[arg(long, env = "REALM_SYNC_STATS_SECS", default_value_t = 30)]
        stats_secs: u64,

        /// Use then loot this game object (hex or decimal guid) once connected
        #[arg(long, value_parser = parse_guid)]
        loot_object: Option<Guid>,

        /// Delay between use and loot, in milliseconds
        #[arg(long, default_value_t = 1500)]
        loot_delay_ms: u64,
    },
}

fn parse_guid(s: &str) -> Result<Guid, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u64>(),
    };
    parsed.map(Guid::new).map_err(|e| format!("invalid guid '{}': {}", s, e))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("realm_sync=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = MirrorConfig::load(args.config.as_deref()).context("Failed to load config")?;
    tracing::info!(
        "Starting realm-sync (apply_mode={:?}, tick_rate_hz={})",
        config.apply_mode,
        config.tick_rate_hz
    );

    let service = Arc::new(MirrorService::with_config(config));
    if args.print_events {
        service.notifier().subscribe(|n: &Notification| {
            if let Notification::Event(event) = n {
                match serde_json::to_string(event) {
                    Ok(json) => tracing::info!("event {}", json),
                    Err(e) => tracing::warn!("Failed to serialise {}: {}", event.name(), e),
                }
            }
        });
    }

    match args.command {
        Mode::Replay { file } => replay(&service, file).await,
        Mode::Connect {
            endpoint,
            stats_secs,
            loot_object,
            loot_delay_ms,
        } => {
            let agent = ConnectionAgent::new(
                ConnectionConfig {
                    endpoint,
                    stats_interval: Duration::from_secs(stats_secs.max(1)),
                    ..Default::default()
                },
                service,
            );
            connect(agent, loot_object, Duration::from_millis(loot_delay_ms)).await
        }
    }
}

async fn replay(service: &MirrorService, file: PathBuf) -> Result<()> {
    let handle = tokio::fs::File::open(&file)
        .await
        .with_context(|| format!("Failed to open capture {}", file.display()))?;
    let mut reader = FrameReader::new(tokio::io::BufReader::new(handle));

    while let Some(frame) = reader
        .next_frame()
        .await
        .with_context(|| format!("Failed to read frame from {}", file.display()))?
    {
        service.handle_frame(frame.opcode, &frame.payload);
    }
    service.tick(Instant::now());

    println!("{}", serde_json::to_string_pretty(&service.stats())?);
    Ok(())
}

async fn connect(agent: ConnectionAgent, loot_object: Option<Guid>, delay: Duration) -> Result<()> {
    let (reader, sender, writer) = agent.connect().await?;
    let cancel = CancelToken::new();

    let workflow = loot_object.map(|guid| {
        let wf = Workflow::interact_then_loot(guid, delay);
        let (sender, cancel) = (sender.clone(), cancel.clone());
        tokio::spawn(async move {
            match wf.run(&sender, &cancel).await {
                Ok(steps) => tracing::info!("{} finished ({} steps)", wf.name(), steps),
                Err(e) => tracing::warn!("{}", e),
            }
        })
    });

    let result = agent.run(reader).await;

    cancel.cancel();
    if let Some(task) = workflow {
        let _ = task.await;
    }
    drop(sender);
    match writer.await {
        Ok(Err(e)) => tracing::warn!("writer task ended with error: {}", e),
        Err(e) => tracing::warn!("writer task panicked: {}", e),
        Ok(Ok(())) => {}
    }

    tracing::info!("final stats {}", serde_json::to_string(&agent.service().stats())?);
    result
}
