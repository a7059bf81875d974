//! # VisitWatch CLI
//!
//! Drives the digest scheduler and administrative operations over the
//! detection-and-dispatch engine.
//!
//! Usage:
//!   visitwatch run              # start the digest tick loop
//!   visitwatch tick             # one scheduler pass now
//!   visitwatch detect <user>    # diff stored snapshots and route the result
//!   visitwatch flush <user>     # force-flush a digest queue
//!   visitwatch status           # per-user queue/settings overview

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use visitwatch_channels::Gateway;
use visitwatch_core::WatchConfig;
use visitwatch_engine::{WatchEngine, spawn_digest_loop};

#[derive(Parser)]
#[command(
    name = "visitwatch",
    version,
    about = "👁 VisitWatch — schedule-change watchdog"
)]
struct Cli {
    /// Config file path (defaults to ~/.visitwatch/config.toml)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the digest scheduler loop
    Run,
    /// Run a single scheduler pass now
    Tick,
    /// Detect changes for a user and route them
    Detect { user_id: String },
    /// Flush a user's digest queue immediately, bypassing the window
    Flush { user_id: String },
    /// Show per-user queue depth and delivery settings
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "visitwatch=debug"
    } else {
        "visitwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => WatchConfig::load_from(path)?,
        None => WatchConfig::load()?,
    };
    let gateway = Gateway::from_config(&config);
    let engine = Arc::new(WatchEngine::new(&config, gateway));
    tracing::info!(
        "🚀 VisitWatch starting (data root: {})",
        config.data_root.display()
    );

    match cli.command {
        Command::Run => {
            spawn_digest_loop(engine, config.tick_interval_secs).await;
        }
        Command::Tick => {
            let outcomes = engine.run_digest_tick(chrono::Local::now()).await;
            if outcomes.is_empty() {
                println!("No daily-digest users considered this tick");
            }
            for outcome in outcomes {
                println!("{}: {:?}", outcome.user_id, outcome.status);
            }
        }
        Command::Detect { user_id } => {
            let set = engine.detect_changes(&user_id).await?;
            if set.is_empty() {
                println!("No changes for {user_id}");
            } else {
                println!("{} change(s): {}", set.summary.total(), set.summary);
                let outcome = engine.route_change_set(&user_id, set).await?;
                println!("Routed: {outcome:?}");
            }
        }
        Command::Flush { user_id } => match engine.force_flush(&user_id).await? {
            Some(combined) => println!(
                "Flushed {} change(s): {}",
                combined.summary.total(),
                combined.summary
            ),
            None => println!("Nothing queued for {user_id}"),
        },
        Command::Status => {
            for user_id in engine.store().list_users() {
                match engine.store().load_user(&user_id) {
                    Ok(user) => {
                        let email = &user.notification_settings.email;
                        println!(
                            "{user_id}: frequency={}, deliveryTime={}, queued={}",
                            email.frequency,
                            email.delivery_time,
                            engine.digest().depth(&user_id)
                        );
                    }
                    Err(e) => println!("{user_id}: unreadable record ({e})"),
                }
            }
        }
    }
    Ok(())
}
