//! mbridge - editor media bridge demonstration tool
//!
//! Subcommands:
//! - `simulate`: drive the in-memory upload coordinator through full upload
//!   lifecycles and print every message the editor surface receives
//! - `search`: feed keystrokes through the search throttle and print the
//!   suggestions for the settled query

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mbridge::search::{CannedAddressLookup, HttpAddressLookup};
use mbridge::{
    AddressLookup, ChannelSurface, InMemoryCoordinator, ProgressRelay, ScriptMessage,
    SearchOutcome, SearchThrottle, ThrottleConfig, UploadObserverBridge,
};
use mbridge_common::config::TomlConfig;
use mbridge_common::events::EventBus;
use mbridge_common::{DocumentScope, LocalAsset, MediaKind, StorageHandle, UploadState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to pump tasks to drain between scripted steps
const STEP_DELAY: Duration = Duration::from_millis(20);

#[derive(Parser, Debug)]
#[command(name = "mbridge", version, about = "Editor media bridge and address search")]
struct Cli {
    /// Config file (overrides MBRIDGE_CONFIG and the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate device media uploads into one document
    Simulate {
        /// Number of device assets to upload
        #[arg(long, default_value_t = 2)]
        assets: usize,

        /// Make the last upload fail
        #[arg(long)]
        fail_last: bool,

        /// Reload the editor surface halfway through
        #[arg(long)]
        reload: bool,
    },

    /// Type a sequence of queries into the address search
    Search {
        /// Successive contents of the search field, e.g. `t tr tra trail`
        #[arg(required = true)]
        keystrokes: Vec<String>,

        /// Delay between keystrokes in milliseconds
        #[arg(long, default_value_t = 100)]
        typing_interval_ms: u64,

        /// Start with the network marked unreachable
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_source) = TomlConfig::load(cli.config.as_deref());

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting {}", build_banner());
    config_source.log();

    let event_bus = EventBus::new(config.relay.event_bus_capacity);
    tokio::spawn(log_diagnostics(event_bus.subscribe()));

    match cli.command {
        Commands::Simulate {
            assets,
            fail_last,
            reload,
        } => simulate(event_bus, assets, fail_last, reload).await,
        Commands::Search {
            keystrokes,
            typing_interval_ms,
            offline,
        } => {
            search(
                &config,
                event_bus,
                keystrokes,
                Duration::from_millis(typing_interval_ms),
                offline,
            )
            .await
        }
    }
}

/// Name, version and build identification
fn build_banner() -> String {
    format!(
        "mbridge v{} ({}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("MBRIDGE_GIT_REVISION"),
        env!("MBRIDGE_BUILD_PROFILE"),
        env!("MBRIDGE_BUILD_TIME")
    )
}

/// Query whose outcome ends a scripted search
///
/// None when the field ends up blank, which clears the search instead of
/// looking anything up.
fn settled_query(keystrokes: &[String]) -> Option<String> {
    keystrokes
        .last()
        .filter(|keystroke| !keystroke.trim().is_empty())
        .cloned()
}

/// Log every diagnostics event at debug level
async fn log_diagnostics(mut rx: broadcast::Receiver<mbridge_common::RelayEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => debug!("Diagnostics: {}", event.event_type()),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Diagnostics: lagged {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Print editor messages as they arrive
fn spawn_editor(mut rx: mpsc::UnboundedReceiver<ScriptMessage>, label: &'static str) {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            println!("[{}] {} {}", label, message.name, message.body);
        }
    });
}

async fn simulate(event_bus: EventBus, assets: usize, fail_last: bool, reload: bool) -> Result<()> {
    let coordinator = Arc::new(InMemoryCoordinator::new());
    let (surface, editor_rx) = ChannelSurface::new();
    spawn_editor(editor_rx, "editor");

    let relay = Arc::new(ProgressRelay::with_surface(Arc::new(surface), event_bus.clone()));
    let mut bridge = UploadObserverBridge::new(
        DocumentScope::new(),
        coordinator.clone(),
        relay.clone(),
        event_bus,
    );
    bridge.attach();

    let mut handles: Vec<StorageHandle> = Vec::with_capacity(assets);
    for index in 0..assets {
        let kind = if index % 2 == 0 { MediaKind::Image } else { MediaKind::Video };
        let inserted = bridge
            .insert_from_device(LocalAsset::new(format!("device-asset-{}", index), kind))
            .context("Failed to queue device asset")?;
        info!("Queued {} as correlation ID {}", kind, inserted.correlation_id);
        let handle = inserted
            .asset
            .handle
            .context("Coordinator returned an unpersisted asset")?;
        handles.push(handle);
    }

    let steps = [
        UploadState::Processing,
        UploadState::Uploading { progress: 0.25 },
        UploadState::Uploading { progress: 0.5 },
        UploadState::Uploading { progress: 1.0 },
    ];

    for (index, handle) in handles.iter().enumerate() {
        coordinator.update_state(
            handle,
            UploadState::ThumbnailReady {
                url: format!("file:///tmp/mbridge-thumb-{}.jpg", handle.key),
            },
        )?;
        tokio::time::sleep(STEP_DELAY).await;

        for (step, state) in steps.iter().enumerate() {
            if reload && index == 0 && step == 2 {
                info!("Reloading editor surface");
                relay.detach_surface();
                let (surface, editor_rx) = ChannelSurface::new();
                spawn_editor(editor_rx, "editor-reloaded");
                relay.attach_surface(Arc::new(surface));
                bridge.reattach_if_active();
            }
            coordinator.update_state(handle, state.clone())?;
            tokio::time::sleep(STEP_DELAY).await;
        }

        let last = index + 1 == handles.len();
        let outcome = if fail_last && last {
            UploadState::Failed
        } else {
            UploadState::Succeeded {
                url: Some(format!("https://media.example/uploads/{}.jpg", handle.key)),
                remote_id: Some(1000 + handle.key),
            }
        };
        coordinator.update_state(handle, outcome)?;
        tokio::time::sleep(STEP_DELAY).await;
    }

    if let Some(token) = bridge.token() {
        bridge.detach(token);
    }
    tokio::time::sleep(STEP_DELAY).await;
    Ok(())
}

async fn search(
    config: &TomlConfig,
    event_bus: EventBus,
    keystrokes: Vec<String>,
    typing_interval: Duration,
    offline: bool,
) -> Result<()> {
    let lookup: Arc<dyn AddressLookup> = match &config.search.lookup_url {
        Some(url) => Arc::new(
            HttpAddressLookup::new(url, config.search.request_timeout())
                .context("Failed to create suggestion client")?,
        ),
        None => Arc::new(CannedAddressLookup::default()),
    };

    let (throttle, mut outcomes) =
        SearchThrottle::spawn(lookup, ThrottleConfig::from(&config.search), event_bus);
    if offline {
        throttle.set_network_active(false)?;
    }

    let settled = settled_query(&keystrokes);
    for keystroke in keystrokes {
        throttle.submit(keystroke)?;
        tokio::time::sleep(typing_interval).await;
    }

    let Some(settled) = settled else {
        println!("Search field cleared, nothing looked up");
        throttle.shutdown().await;
        return Ok(());
    };

    let wait = config.search.debounce() + config.search.request_timeout() + Duration::from_secs(1);
    loop {
        let outcome = tokio::time::timeout(wait, outcomes.recv())
            .await
            .context("Timed out waiting for suggestions")?
            .context("Search throttle stopped")?;

        let done = outcome.query() == settled;
        match outcome {
            SearchOutcome::Suggestions { query, suggestions } => {
                println!("{} suggestion(s) for {:?}", suggestions.len(), query);
                for suggestion in suggestions {
                    println!("  {}", suggestion.domain_name);
                }
            }
            SearchOutcome::Failed { query, error } => {
                println!("Lookup for {:?} failed: {}", query, error);
            }
            SearchOutcome::Offline { query } => {
                println!("No connection, {:?} not looked up", query);
            }
        }
        if done {
            break;
        }
    }

    throttle.shutdown().await;
    Ok(())
}
