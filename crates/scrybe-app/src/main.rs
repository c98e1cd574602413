//! Scrybe capture daemon.
//!
//! Boots the three capture daemons (C5 screen, C6 clipboard, C7
//! filesystem), the ingestion pipeline (C8), and the shared storage/privacy/
//! entity-extraction/embedding components they all write through. Installs a
//! `tracing` subscriber, then runs until SIGINT/SIGTERM, draining in-flight
//! writes before exiting (spec §4's capture-daemon lifecycle:
//! `idle -> running -> (stop requested) -> draining -> idle`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use scrybe_capture::{observation_channel, ClipboardDaemon, EventBus, FilesystemDaemon, IngestionPipeline, LossySender, ScreenDaemon};
use scrybe_core::entities::{EntityExtractor, HeuristicExtractor};
use scrybe_core::privacy::{PiiKind, PrivacyConfig, PrivacyFilter};
use scrybe_core::{Config, Storage};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "embeddings")]
use scrybe_core::embeddings::Embedder;

/// Default ingestion channel capacity (spec §5 backpressure: "default 1024").
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "scrybe-daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs the scrybe screen/clipboard/filesystem capture daemons")]
struct Cli {
    /// Override the data directory (defaults to `<home>/.unified-ai`).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the screen-capture interval in seconds for all daemons that
    /// honor one (spec §6 CLI surface: `--interval <sec>`).
    #[arg(long)]
    interval: Option<f64>,

    /// Override the screen-capture mode (spec §6: `--mode
    /// primary|all|specific|combined`).
    #[arg(long, value_enum)]
    mode: Option<ScreenModeArg>,

    /// Override the watched directories (spec §6: `--dirs <paths...>`).
    #[arg(long, num_args = 1..)]
    dirs: Vec<PathBuf>,

    /// List detected monitors and exit (supplements the mode surface per
    /// SPEC_FULL.md §12).
    #[arg(long)]
    list_monitors: bool,

    /// Increase log verbosity (debug-level) instead of the daemon default
    /// (info-level).
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ScreenModeArg {
    Primary,
    All,
    Specific,
    Combined,
}

impl From<ScreenModeArg> for scrybe_core::config::ScreenMode {
    fn from(value: ScreenModeArg) -> Self {
        match value {
            ScreenModeArg::Primary => scrybe_core::config::ScreenMode::Primary,
            ScreenModeArg::All => scrybe_core::config::ScreenMode::All,
            ScreenModeArg::Specific => scrybe_core::config::ScreenMode::Specific,
            ScreenModeArg::Combined => scrybe_core::config::ScreenMode::Combined,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(run(cli)) {
        Ok(Shutdown::Sigint) => std::process::exit(130),
        Ok(Shutdown::Other) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "daemon exited with error");
            std::process::exit(1);
        }
    }
}

/// Why `run` returned, so `main` can pick the exit code spec §6 requires
/// (130 for SIGINT, 0 for any other clean stop).
enum Shutdown {
    Sigint,
    Other,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> anyhow::Result<Shutdown> {
    if cli.list_monitors {
        for monitor in scrybe_capture::list_monitors() {
            println!(
                "{}: {}x{}{}",
                monitor.index,
                monitor.width,
                monitor.height,
                if monitor.is_primary { " (primary)" } else { "" }
            );
        }
        return Ok(Shutdown::Other);
    }

    let data_dir = cli.data_dir.unwrap_or_else(Config::default_data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let mut config = Config::load(&data_dir)?;
    if let Some(interval) = cli.interval {
        config.capture.screen_interval = interval;
    }
    if let Some(mode) = cli.mode {
        config.capture.screen_mode = mode.into();
    }
    if !cli.dirs.is_empty() {
        config.capture.watch_directories = cli.dirs.clone();
    }

    let storage = Arc::new(Storage::new(Some(data_dir.join("capture.db")))?);

    let privacy = Arc::new(PrivacyFilter::new(privacy_config_from(&config)));

    let extractor: Arc<dyn EntityExtractor> = Arc::new(HeuristicExtractor::new());

    #[cfg(feature = "embeddings")]
    let embedder: Option<Arc<Embedder>> = match Embedder::load() {
        Ok(e) => Some(Arc::new(e)),
        Err(e) => {
            tracing::warn!(error = %e, "embedder unavailable at startup, embeddings will be skipped");
            None
        }
    };

    let events = EventBus::default();

    let pipeline = IngestionPipeline::new(
        Arc::clone(&storage),
        Arc::clone(&privacy),
        Arc::clone(&extractor),
        #[cfg(feature = "embeddings")]
        embedder,
    )
    .with_event_bus(events)
    .with_retention(&config.storage);

    // Backfill any source rows that never got mirrored into content_records
    // (e.g. a crash between the source-table write and the mirror write).
    match pipeline.sync_missing() {
        Ok(0) => {}
        Ok(n) => tracing::info!(count = n, "backfilled missing content records"),
        Err(e) => tracing::warn!(error = %e, "sync_missing_content failed"),
    }

    let (sender, receiver) = observation_channel(CHANNEL_CAPACITY);
    let screen_sender = LossySender::new(sender.clone());

    let shutdown = CancellationToken::new();

    let screen = ScreenDaemon::new(screen_sender, &config.capture);
    let clipboard = ClipboardDaemon::new(sender.clone(), &config.capture);
    let filesystem = FilesystemDaemon::new(sender, &config.capture);

    let screen_task = tokio::spawn(screen.run(shutdown.child_token()));
    let clipboard_task = tokio::spawn(clipboard.run(shutdown.child_token()));
    let filesystem_task = tokio::spawn(filesystem.run(shutdown.child_token()));
    let pipeline_task = tokio::spawn(pipeline.run(receiver));

    tracing::info!(data_dir = %data_dir.display(), "scrybe daemon running, press Ctrl+C to stop");
    let signal = wait_for_shutdown_signal().await;
    tracing::info!("shutdown requested, draining capture daemons");

    shutdown.cancel();
    let _ = tokio::join!(screen_task, clipboard_task, filesystem_task);

    // The ingestion pipeline drains on its own once every producer daemon's
    // sender has dropped; joining it here is the "draining" state in the
    // capture-daemon lifecycle, not an abrupt cut-off.
    let _ = pipeline_task.await;

    tracing::info!("scrybe daemon stopped");
    Ok(match signal {
        ShutdownSignal::Sigint => Shutdown::Sigint,
        ShutdownSignal::Other => Shutdown::Other,
    })
}

fn privacy_config_from(config: &Config) -> PrivacyConfig {
    let enabled_kinds = if config.privacy.enable_pii_detection {
        PrivacyConfig::default().enabled_kinds
    } else {
        Vec::<PiiKind>::new()
    };
    PrivacyConfig {
        enabled_kinds,
        excluded_apps: config.privacy.excluded_apps.clone(),
        excluded_windows: config.privacy.excluded_windows.clone(),
    }
}

/// Which signal triggered shutdown, so the caller can map SIGINT to exit
/// code 130 per spec §6 ("130 SIGINT") while any other clean stop exits 0.
enum ShutdownSignal {
    Sigint,
    Other,
}

/// Waits for SIGINT or SIGTERM (spec §4 state machine: "Stop must be
/// signal-driven"). On platforms without Unix signals, only Ctrl+C is
/// available.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => { tracing::info!("received SIGTERM"); ShutdownSignal::Other }
        _ = sigint.recv() => { tracing::info!("received SIGINT"); ShutdownSignal::Sigint }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> ShutdownSignal {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received Ctrl+C");
    ShutdownSignal::Sigint
}
