pub mod db;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod settings;
pub mod survey;
pub mod tabs;
pub mod telemetry;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use db::Database;
use lifecycle::{EventBus, EventListener, TabTelemetryController, TelemetryDeps};
use models::BrowserEvent;
use settings::SettingsStore;
use survey::LogPrompt;
use telemetry::JsonLinesSink;

const DATA_DIR_ENV: &str = "TAB_TELEMETRY_DATA_DIR";
const VARIATION_ENV: &str = "TAB_TELEMETRY_VARIATION";

/// Replays newline-delimited JSON browser events from stdin and writes every
/// flushed record to stdout as a JSON line.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    utils::init_logging();

    info!("tab-telemetry starting up...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(replay_stdin())
}

async fn replay_stdin() -> Result<()> {
    let data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let database = Database::new(data_dir.join("tab_telemetry.sqlite3"))?;
    let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);

    if let Ok(variation) = std::env::var(VARIATION_ENV) {
        settings.configure_variation(&variation)?;
    }

    let controller = TabTelemetryController::configure(TelemetryDeps {
        store: Arc::new(database),
        prefs: settings,
        sink: Arc::new(JsonLinesSink::stdout()),
        prompt: Arc::new(LogPrompt),
    })
    .await?;

    let bus = EventBus::new();
    let mut listener = EventListener::new();
    listener.start(controller, &bus)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<BrowserEvent>(line) {
            Ok(event) => {
                bus.emit(event);
            }
            Err(err) => warn!("Skipping malformed event line: {err}"),
        }
    }

    listener.stop().await?;
    info!("Event stream closed");
    Ok(())
}
