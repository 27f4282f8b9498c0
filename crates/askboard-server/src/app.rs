// Wires the store, the event channel, and both listeners into a running board.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use askboard_core::QuestionStore;

use crate::api::{self, AppState};
use crate::config::ServerConfig;
use crate::ws_server;

/// A board that is serving HTTP and WebSocket traffic.
pub struct Board {
    http_addr: SocketAddr,
    ws_addr: SocketAddr,
    state: AppState,
    shutdown_tx: oneshot::Sender<()>,
    http_handle: JoinHandle<()>,
    ws_handle: JoinHandle<()>,
}

/// Bind both listeners and spawn their server tasks.
///
/// The store is created by the caller and shared with every handler; it is
/// never reachable as a global. Ports of 0 bind ephemeral ports, reported by
/// [`Board::http_addr`] and [`Board::ws_addr`].
pub async fn start(config: &ServerConfig, store: Arc<QuestionStore>) -> anyhow::Result<Board> {
    // A hand-built config may skip validation; a zero-capacity channel panics.
    let (events_tx, _) = broadcast::channel(config.api.event_capacity.max(1));
    let state = AppState::new(store, events_tx.clone(), config.api.clone());

    // WebSocket hub
    let ws_listener = ws_server::EventListener::bind(config.ws_addr()).await?;
    let ws_addr = ws_listener.local_addr()?;
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(ws_listener, events_tx).await {
            error!("WebSocket hub error: {e:#}");
        }
    });

    // HTTP API
    let http_listener = TcpListener::bind(config.http_addr())
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", config.http_addr()))?;
    let http_addr = http_listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let router = api::router(state.clone());
    let http_handle = tokio::spawn(async move {
        let server = axum::serve(http_listener, router).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            error!("HTTP server error: {e}");
        }
    });

    info!("HTTP API listening on {http_addr}, WebSocket hub on {ws_addr}");

    Ok(Board {
        http_addr,
        ws_addr,
        state,
        shutdown_tx,
        http_handle,
        ws_handle,
    })
}

impl Board {
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn ws_addr(&self) -> SocketAddr {
        self.ws_addr
    }

    pub fn store(&self) -> &Arc<QuestionStore> {
        &self.state.store
    }

    /// Stop accepting HTTP requests, let in-flight ones finish, then stop the
    /// WebSocket hub (which loops forever on its own).
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.http_handle.await {
            error!("HTTP server task failed: {e}");
        }
        self.ws_handle.abort();
        let _ = self.ws_handle.await;
        info!("Board stopped");
    }
}
