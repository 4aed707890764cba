//! Transport: one long-lived WebSocket event channel to the current server.
//!
//! The reactor owns a [`TransportHandle`]; the connection itself lives in a
//! dedicated task that pumps outbound envelopes onto the socket and inbound
//! frames back to the reactor. When the socket drops unexpectedly the task
//! runs the reconnect schedule itself, so at most one reconnect worker can
//! exist per connection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use hps_core::{
    HpsError, RECONNECT_ATTEMPTS, RECONNECT_DELAY_MAX_SECS, RECONNECT_DELAY_MIN_SECS,
};

use crate::event::Envelope;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Notifications from the transport task to the reactor.
#[derive(Debug)]
pub enum TransportEvent {
    /// Socket (re)established. The handshake starts from scratch.
    Connected,
    /// A decoded inbound frame.
    Inbound(Envelope),
    /// Socket dropped; reconnection in progress when enabled.
    ConnectionLost,
    /// Transport gave up (reconnect disabled or attempts exhausted).
    Closed,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Disable TLS certificate chain and hostname verification. Kept behind
    /// an explicit opt-in flag; verification stays on unless asked.
    pub tls_no_verify: bool,
    pub auto_reconnect: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { tls_no_verify: false, auto_reconnect: true }
    }
}

/// Reactor-side handle to the running transport task.
pub struct TransportHandle {
    outbound_tx: mpsc::Sender<Envelope>,
    connected: watch::Receiver<bool>,
    shutdown: watch::Sender<bool>,
}

impl TransportHandle {
    /// Queue an event for the server. Fails fast while the socket is down.
    pub fn emit(&self, envelope: Envelope) -> Result<(), HpsError> {
        if !self.is_connected() {
            return Err(HpsError::NotConnected);
        }
        self.outbound_tx
            .try_send(envelope)
            .map_err(|_| HpsError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Ask the transport task to close the socket and exit. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Map a server address to its WebSocket URL. `http://` and bare host:port
/// become `ws://`; `https://` becomes `wss://`.
pub fn websocket_url(server_address: &str) -> String {
    if let Some(rest) = server_address.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server_address.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{server_address}")
    }
}

async fn open_socket(url: &str, config: &TransportConfig) -> Result<WsStream, HpsError> {
    let connector = if url.starts_with("wss://") {
        let mut builder = native_tls::TlsConnector::builder();
        if config.tls_no_verify {
            warn!("TLS certificate verification disabled; connection is not authenticated");
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let tls = builder
            .build()
            .map_err(|e| HpsError::Connection(format!("building TLS connector: {e}")))?;
        Some(tokio_tungstenite::Connector::NativeTls(tls))
    } else {
        None
    };

    let (ws, _response) =
        tokio_tungstenite::connect_async_tls_with_config(url, None, false, connector)
            .await
            .map_err(|e| HpsError::Connection(format!("connecting to {url}: {e}")))?;
    Ok(ws)
}

/// Establish the first connection and spawn the pump task.
pub async fn connect(
    server_address: &str,
    config: TransportConfig,
    events: mpsc::Sender<TransportEvent>,
) -> Result<TransportHandle, HpsError> {
    let url = websocket_url(server_address);
    let ws = open_socket(&url, &config).await?;
    info!(server = server_address, "connected");

    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let (connected_tx, connected_rx) = watch::channel(true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = TransportTask {
        url,
        config,
        events,
        outbound_rx,
        connected: connected_tx,
        shutdown: shutdown_rx,
    };
    tokio::spawn(task.run(ws));

    Ok(TransportHandle {
        outbound_tx,
        connected: connected_rx,
        shutdown: shutdown_tx,
    })
}

struct TransportTask {
    url: String,
    config: TransportConfig,
    events: mpsc::Sender<TransportEvent>,
    outbound_rx: mpsc::Receiver<Envelope>,
    connected: watch::Sender<bool>,
    shutdown: watch::Receiver<bool>,
}

enum PumpExit {
    SocketClosed,
    Shutdown,
}

impl TransportTask {
    async fn run(mut self, first: WsStream) {
        if self.events.send(TransportEvent::Connected).await.is_err() {
            return;
        }

        let mut ws = first;
        loop {
            match self.pump(&mut ws).await {
                PumpExit::Shutdown => {
                    let _ = ws.close(None).await;
                    let _ = self.connected.send(false);
                    return;
                }
                PumpExit::SocketClosed => {
                    let _ = self.connected.send(false);
                    let _ = self.events.send(TransportEvent::ConnectionLost).await;
                }
            }

            if !self.config.auto_reconnect {
                let _ = self.events.send(TransportEvent::Closed).await;
                return;
            }

            match self.reconnect().await {
                Some(new_ws) => {
                    ws = new_ws;
                    let _ = self.connected.send(true);
                    if self.events.send(TransportEvent::Connected).await.is_err() {
                        return;
                    }
                }
                None => {
                    let _ = self.events.send(TransportEvent::Closed).await;
                    return;
                }
            }
        }
    }

    /// Pump frames both ways until the socket dies or shutdown is requested.
    async fn pump(&mut self, ws: &mut WsStream) -> PumpExit {
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        return PumpExit::Shutdown;
                    }
                }

                maybe = self.outbound_rx.recv() => {
                    match maybe {
                        Some(envelope) => {
                            let text = match envelope.to_text() {
                                Ok(t) => t,
                                Err(e) => {
                                    warn!(error = %e, "dropping unserializable envelope");
                                    continue;
                                }
                            };
                            if let Err(e) = ws.send(Message::Text(text)).await {
                                warn!(error = %e, "send failed, socket closed");
                                return PumpExit::SocketClosed;
                            }
                        }
                        None => return PumpExit::Shutdown,
                    }
                }

                frame = ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match Envelope::from_text(&text) {
                                Ok(envelope) => {
                                    if self.events.send(TransportEvent::Inbound(envelope)).await.is_err() {
                                        return PumpExit::Shutdown;
                                    }
                                }
                                Err(e) => debug!(error = %e, "undecodable frame ignored"),
                            }
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => return PumpExit::SocketClosed,
                        Some(Ok(_)) => debug!("non-text frame ignored"),
                        Some(Err(e)) => {
                            warn!(error = %e, "socket error");
                            return PumpExit::SocketClosed;
                        }
                    }
                }
            }
        }
    }

    /// Up to 5 attempts, 1 s → 5 s delay. Returns None when all fail or a
    /// shutdown arrives mid-wait.
    async fn reconnect(&mut self) -> Option<WsStream> {
        for attempt in 1..=RECONNECT_ATTEMPTS {
            let delay = (RECONNECT_DELAY_MIN_SECS * attempt as u64)
                .min(RECONNECT_DELAY_MAX_SECS);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(delay)) => {}
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        return None;
                    }
                }
            }

            info!(attempt, url = %self.url, "reconnecting");
            match open_socket(&self.url, &self.config).await {
                Ok(ws) => return Some(ws),
                Err(e) => warn!(attempt, error = %e, "reconnect attempt failed"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_mapping() {
        assert_eq!(websocket_url("http://srv:8080"), "ws://srv:8080");
        assert_eq!(websocket_url("https://srv"), "wss://srv");
        assert_eq!(websocket_url("localhost:9000"), "ws://localhost:9000");
    }
}
