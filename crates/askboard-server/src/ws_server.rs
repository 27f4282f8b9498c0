// WebSocket hub pushing board events to realtime clients.

use std::net::SocketAddr;

use anyhow::Context;
use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use askboard_core::BoardEvent;

/// Why a client session ended from the client's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The client sent a close frame.
    Closed,
    /// Reading from the client failed.
    Error,
    /// The stream ended without a close frame.
    Ended,
}

/// TCP listener that upgrades every connection to a WebSocket.
pub struct EventListener {
    listener: TcpListener,
}

impl EventListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;
        Ok(EventListener { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Accept WebSocket clients forever, giving each one its own task and its
/// own subscription to `events`.
///
/// A failed accept or handshake only affects that connection; the hub keeps
/// listening until the task is aborted.
pub async fn run(
    listener: EventListener,
    events: broadcast::Sender<BoardEvent>,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket hub listening on {local_addr}");

    loop {
        let (stream, addr) = match listener.listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept WebSocket connection: {e}");
                continue;
            }
        };
        let addr_str = addr.to_string();
        debug!("Accepted TCP connection from {addr_str}");

        // Subscribe before the handshake so nothing published after the
        // welcome frame is missed.
        let subscription = events.subscribe();

        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr_str}: {e}");
                    return;
                }
            };

            info!("Realtime client {addr_str} connected");
            if let Err(e) = serve_client(ws_stream, subscription, &addr_str).await {
                warn!("Realtime client {addr_str} dropped: {e:#}");
            }
            info!("Realtime client {addr_str} disconnected");
        });
    }
}

/// Drive one client session: send the welcome frame, then forward every
/// event from `events` until the client leaves or the channel closes.
///
/// Generic over the stream type so it can be tested with in-memory streams
/// without opening TCP ports.
pub async fn serve_client<S>(
    ws_stream: WebSocketStream<S>,
    mut events: broadcast::Receiver<BoardEvent>,
    addr: &str,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, read) = ws_stream.split();
    write
        .send(encode(&BoardEvent::welcome())?)
        .await
        .context("failed to send welcome frame")?;

    let client_gone = watch_client(read, addr);
    tokio::pin!(client_gone);

    loop {
        tokio::select! {
            exit = &mut client_gone => {
                debug!("Client {addr} finished: {exit:?}");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => {
                    write
                        .send(encode(&event)?)
                        .await
                        .with_context(|| format!("failed to send {} event", event.kind()))?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client {addr} fell behind, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // The peer may already be gone.
    let _ = write.close().await;
    Ok(())
}

/// Consume frames sent by the client until it closes, errors, or the stream
/// ends. Clients have nothing to say to the hub, so text and binary frames
/// are ignored.
pub async fn watch_client<St>(mut stream: St, addr: &str) -> ClientExit
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                return ClientExit::Closed;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                return ClientExit::Error;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring {} byte text frame from {addr}", text.len());
            }
            _ => {
                // Binary, Ping, Pong and raw frames carry nothing for us.
            }
        }
    }
    ClientExit::Ended
}

fn encode(event: &BoardEvent) -> anyhow::Result<Message> {
    let json = event
        .to_json()
        .with_context(|| format!("failed to serialize {} event", event.kind()))?;
    Ok(Message::text(json))
}
