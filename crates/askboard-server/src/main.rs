// askboard entry point.
//
// Startup sequence:
// 1. Load config
// 2. Initialize tracing (stdout, or the configured log file)
// 3. Create the question store
// 4. Start the HTTP API and WebSocket hub
// 5. Wait for Ctrl+C, then shut down gracefully

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use askboard_core::QuestionStore;
use askboard_server::app;
use askboard_server::config::{self, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = config::load_config().context("failed to load configuration")?;

    // 2. Initialize tracing
    init_tracing(&config)?;
    info!("askboard starting up");
    info!(
        "Config loaded: http={}, ws={}, reject_blank_text={}",
        config.http_addr(),
        config.ws_addr(),
        config.api.reject_blank_text
    );

    // 3. Create the store (lives for the whole process, lost on restart)
    let store = Arc::new(QuestionStore::new());

    // 4. Start serving
    let board = app::start(&config, store)
        .await
        .context("failed to start board")?;
    info!(
        "Ready: REST API at http://{}/api/questions, events at ws://{}",
        board.http_addr(),
        board.ws_addr()
    );

    // 5. Wait for Ctrl+C
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown requested");

    board.shutdown().await;

    info!("askboard shut down cleanly");
    Ok(())
}

/// Initialize tracing to stdout, or to the configured log file without ANSI
/// colors.
fn init_tracing(config: &ServerConfig) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::EnvFilter;

    let (writer, ansi) = match &config.log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("askboard=info,askboard_server=info,askboard_core=info,tower_http=info,warn")
        }))
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
