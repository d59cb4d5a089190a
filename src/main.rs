// pointdeck entry point.
//
// Startup sequence:
// 1. Load config
// 2. Initialize tracing (log to file, the terminal belongs to the TUI)
// 3. Bootstrap the API client (CSRF pair from page metadata)
// 4. Load the ambient context: identity, card sets, enabled extensions
// 5. Create mpsc channels
// 6. Spawn the orchestrator task
// 7. Run the TUI event loop (blocking until the user quits)
// 8. Cleanup on exit

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use pointdeck::api::ApiClient;
use pointdeck::app::{self, AppContext, AppState};
use pointdeck::config;
use pointdeck::extensions::ExtensionRegistry;
use pointdeck::tui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = config::load_config().context("failed to load configuration")?;

    // 2. Initialize tracing
    init_tracing(&config.log_dir)?;
    info!("pointdeck starting up (server: {})", config.server_url);

    // 3. Bootstrap the API client
    let api = Arc::new(
        ApiClient::bootstrap(config.server_url.clone())
            .await
            .context("failed to reach the server")?,
    );

    // 4. Load the ambient context
    let ctx = AppContext::load(&api)
        .await
        .context("failed to load identity and reference data")?;
    info!(
        "signed in as '{}' ({} card sets, {} extensions enabled)",
        ctx.user.username,
        ctx.card_sets.len(),
        ctx.enabled_extension_keys.len()
    );

    let registry = ExtensionRegistry::builtin();

    // 5. Create mpsc channels
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);
    let (ext_tx, ext_rx) = mpsc::channel(64);

    let state = AppState::new(
        Arc::clone(&api),
        ctx,
        registry,
        config.room_poll,
        config.lobby_poll,
        ext_tx,
    );

    // 6. Spawn the orchestrator task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(state, cmd_rx, ext_rx, ui_tx).await {
            error!("orchestrator error: {e}");
        }
    });

    // 7. Run the TUI event loop
    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {e}");
    }

    // 8. Cleanup: give the orchestrator a moment to leave the room cleanly.
    let _ = tokio::time::timeout(Duration::from_secs(5), app_handle).await;

    info!("pointdeck shut down cleanly");
    Ok(())
}

/// Initialize tracing to a log file (never the terminal, which is used by
/// the TUI).
fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_file = std::fs::File::create(log_dir.join("pointdeck.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pointdeck=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
