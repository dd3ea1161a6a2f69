//! Per-connection transport lifecycle.
//!
//! Each socket gets a writer task (drains the outbox, sends pings) and a
//! reader task (handles inbound frames inline, so one connection's events
//! are applied in arrival order). Whichever finishes first ends the
//! connection, and the registry entry is removed exactly once afterwards.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use relay_core::{FrameError, UserId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::ServerConfig;
use crate::handler;
use crate::outbox::Outbox;
use crate::relay::Relay;

/// Transport timing for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    /// Reader gives up after this long without any inbound frame.
    pub idle_timeout: Duration,
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_send_queue: config.max_send_queue,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            idle_timeout: Duration::from_secs(config.heartbeat_timeout_secs),
        }
    }
}

/// Why the connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    TransportError,
    IdleTimeout,
    WriteFailed,
    Shutdown,
}

/// Run a connection to completion: register, serve frames, unregister.
pub async fn run_connection(
    socket: WebSocket,
    relay: Arc<Relay>,
    user: Option<UserId>,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
) -> CloseReason {
    let (outbox, mut rx) = Outbox::channel(settings.max_send_queue);
    let conn_id = relay.connect(user, outbox.clone());
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = conn_id.clone();
    let writer_cancel = shutdown.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(settings.heartbeat_interval);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        return CloseReason::WriteFailed;
                    };
                    if ws_tx.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                        return CloseReason::WriteFailed;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        return CloseReason::WriteFailed;
                    }
                    trace!(conn_id = %writer_cid, "sent ping");
                }
                () = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    return CloseReason::Shutdown;
                }
            }
        }
    });

    let reader_cid = conn_id.clone();
    let reader_relay = Arc::clone(&relay);
    let mut reader = tokio::spawn(async move {
        loop {
            let next = tokio::time::timeout(settings.idle_timeout, ws_rx.next()).await;
            let msg = match next {
                Err(_) => return CloseReason::IdleTimeout,
                Ok(None) => return CloseReason::ClientClosed,
                Ok(Some(Err(e))) => {
                    debug!(conn_id = %reader_cid, error = %e, "websocket receive error");
                    return CloseReason::TransportError;
                }
                Ok(Some(Ok(msg))) => msg,
            };

            match msg {
                WsMessage::Text(text) => {
                    if let Err(reply) = handler::handle_text(&reader_relay, &reader_cid, text.as_str()) {
                        let _ = outbox.push(Arc::from(reply));
                    }
                }
                WsMessage::Binary(_) => {
                    let reply = handler::reject(&reader_relay, &reader_cid, &FrameError::Binary);
                    let _ = outbox.push(Arc::from(reply));
                }
                WsMessage::Close(_) => return CloseReason::ClientClosed,
                // Any frame counts as liveness; axum answers pings itself.
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            }
        }
    });

    let reason = tokio::select! {
        r = &mut writer => {
            reader.abort();
            r.unwrap_or(CloseReason::TransportError)
        }
        r = &mut reader => {
            writer.abort();
            r.unwrap_or(CloseReason::TransportError)
        }
    };

    relay.disconnect(&conn_id);
    info!(conn_id = %conn_id, reason = ?reason, "connection closed");
    reason
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_from_config() {
        let config = ServerConfig {
            max_send_queue: 8,
            heartbeat_interval_secs: 5,
            heartbeat_timeout_secs: 15,
            ..ServerConfig::default()
        };
        let settings = ConnectionSettings::from(&config);
        assert_eq!(settings.max_send_queue, 8);
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(settings.idle_timeout, Duration::from_secs(15));
    }
}
