//! relay-sync - Relay a Mastodon account's posts to Telegram channels
//!
//! Polls the account timeline, sends every post not yet relayed to each
//! configured channel, and records it in a local SQLite ledger.

use clap::Parser;
use librelaycast::logging::{LogFormat, LoggingConfig};
use librelaycast::platforms::mastodon::MastodonSource;
use librelaycast::platforms::telegram::TelegramBot;
use librelaycast::{Config, Ledger, RelaycastError, SyncEngine, TimeCursor};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "relay-sync")]
#[command(version)]
#[command(about = "Relay a Mastodon account's posts to Telegram channels")]
#[command(long_about = "\
relay-sync - Relay a Mastodon account's posts to Telegram channels

DESCRIPTION:
    relay-sync polls a Mastodon account at a fixed interval and forwards every
    post it has not relayed yet to one or more Telegram channels, converting
    the post body to Telegram HTML. Relayed post ids are kept in a SQLite
    ledger so restarts never send a post twice.

USAGE:
    # Run as a long-lived daemon (logs to stdout)
    relay-sync

    # Run a single pass, e.g. from a scheduled CI job
    relay-sync --run-once --last-synced-post-time \"2025-03-01 12:00:00\"

    With --run-once the last line of output is
        LAST_SYNCED_POST_TIME=YYYY-MM-DD HH:MM:SS
    which the scheduler should pass back on its next run.

CONFIGURATION:
    Environment variables (a .env file in the working directory is loaded):
        MASTODON_USER_ID        numeric account id (required)
        MASTODON_ACCESS_TOKEN   access token (required)
        MASTODON_INSTANCE_URL   default https://mastodon.social
        TELEGRAM_BOT_TOKEN      bot token (required)
        TELEGRAM_CHANNEL_IDS    comma-separated channel ids (required)
        POLLING_INTERVAL        seconds between polls, default 300
        DATABASE_NAME           ledger path, default synced_posts.db next to the binary
        TELEGRAM_API_BASE       Bot API server, default https://api.telegram.org

    The same settings can be given in a TOML file via --config or
    RELAYCAST_CONFIG; environment variables take precedence.

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current poll)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
    3 - Invalid input
")]
struct Cli {
    /// Only relay posts created after this UTC time
    #[arg(long, value_name = "YYYY-MM-DD HH:MM:SS")]
    last_synced_post_time: Option<String>,

    /// Poll once, print LAST_SYNCED_POST_TIME and exit
    #[arg(long)]
    run_once: bool,

    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A missing .env is fine; settings may come from the real environment
    let _ = dotenvy::dotenv();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<RelaycastError>()
            .map_or(1, RelaycastError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Everything fatal is checked before touching the network or the ledger
    let baseline = cli
        .last_synced_post_time
        .as_deref()
        .map(TimeCursor::parse)
        .transpose()?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(seconds) = cli.poll_interval {
        if seconds == 0 {
            return Err(RelaycastError::InvalidInput(
                "--poll-interval must be greater than zero".to_string(),
            )
            .into());
        }
        config.sync.poll_interval = seconds;
    }

    info!("Starting Mastodon-to-Telegram relay...");

    let ledger = Ledger::new(&config.sync.database_path).await?;
    let source = MastodonSource::from_config(&config.mastodon)?;
    let destination = TelegramBot::from_config(&config.telegram)?;

    match baseline {
        Some(ref time) => info!(
            "Will only sync posts created after: {}",
            TimeCursor::format(time)
        ),
        None => info!("Will check for new posts and filter out already synced ones."),
    }
    info!(
        "Relaying account {} on {} to {} channel(s)",
        config.mastodon.user_id,
        source.instance_url(),
        config.telegram.channel_ids.len()
    );

    let mut engine = SyncEngine::new(
        Box::new(source),
        Box::new(destination),
        ledger.clone(),
        config.telegram.channel_ids.clone(),
        Duration::from_secs(config.sync.poll_interval),
        TimeCursor::new(baseline),
    );

    if cli.run_once {
        let cursor = engine.run_once().await;
        println!("{}", cursor.output_line());
    } else {
        info!("Poll interval: {}s", config.sync.poll_interval);
        let shutdown = spawn_shutdown_listener()?;
        engine.run_continuous(shutdown).await;
    }

    ledger.close().await;
    info!("relay-sync stopped");
    Ok(())
}

/// Flip the returned watch channel on SIGINT/SIGTERM
#[cfg(unix)]
fn spawn_shutdown_listener() -> anyhow::Result<watch::Receiver<bool>> {
    use anyhow::Context;
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Some(signal) = signals.next().await {
            info!("Received signal {}, stopping gracefully...", signal);
            let _ = tx.send(true);
        }
    });

    Ok(rx)
}

/// Flip the returned watch channel on Ctrl-C
#[cfg(not(unix))]
fn spawn_shutdown_listener() -> anyhow::Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, stopping gracefully...");
                let _ = tx.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                // Keep the sender alive so the loop keeps running
                std::future::pending::<()>().await;
            }
        }
    });

    Ok(rx)
}
