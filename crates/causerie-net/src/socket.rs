//! Realtime socket task with tokio mpsc command/notification pattern.
//!
//! The WebSocket runs in a dedicated tokio task. External code communicates
//! with it through a typed command channel and receives connection state
//! changes and decoded server events on a notification channel supplied by
//! the caller. The caller's channel outlives any individual connection, so
//! a rebuilt socket keeps feeding the same consumers.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use causerie_shared::constants::{COMMAND_BUFFER, RECONNECT_DELAY, RECONNECT_MAX_ATTEMPTS};
use causerie_shared::{ClientEvent, ProtocolError, ServerEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the socket task.
#[derive(Debug)]
pub enum SocketCommand {
    /// Emit an event frame to the server.
    Emit(ClientEvent),
    /// Gracefully close the connection and end the task.
    Close,
}

/// Notifications sent *from* the socket task to the application.
#[derive(Debug, Clone)]
pub enum SocketNotification {
    /// The connection is established.
    Up,
    /// The connection was lost (the task may still be retrying).
    Down,
    /// The server rejected the handshake credential. The task has ended;
    /// a new socket must be spawned with a fresh token.
    AuthFailure,
    /// A decoded server event.
    Event(ServerEvent),
}

/// Configuration for spawning the socket task.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// WebSocket endpoint, e.g. `wss://chat.example.com/ws`.
    pub url: String,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_reconnect_attempts: u32,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_attempts: RECONNECT_MAX_ATTEMPTS,
        }
    }
}

enum ConnectError {
    /// The server answered the handshake with 401.
    Unauthorized,
    Other(String),
}

/// Spawn the socket task in the background.
///
/// Decoded server events and connection state changes are delivered on
/// `notif_tx`. Returns the sender half of the command channel; dropping it
/// ends the task.
pub fn spawn_socket(
    config: SocketConfig,
    token: Option<String>,
    notif_tx: mpsc::Sender<SocketNotification>,
) -> mpsc::Sender<SocketCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<SocketCommand>(COMMAND_BUFFER);

    tokio::spawn(async move {
        run_socket(config, token, cmd_rx, notif_tx).await;
        info!("Socket task terminated");
    });

    cmd_tx
}

async fn run_socket(
    config: SocketConfig,
    token: Option<String>,
    mut cmd_rx: mpsc::Receiver<SocketCommand>,
    notif_tx: mpsc::Sender<SocketNotification>,
) {
    let mut attempts: u32 = 0;

    loop {
        match open_stream(&config, token.as_deref()).await {
            Ok(stream) => {
                attempts = 0;
                info!(url = %config.url, "Socket connected");
                let _ = notif_tx.send(SocketNotification::Up).await;

                let closed = drive_stream(stream, &mut cmd_rx, &notif_tx).await;

                let _ = notif_tx.send(SocketNotification::Down).await;
                if closed {
                    // Deliberate close, not a transport loss.
                    return;
                }
                warn!("Socket connection lost");
            }
            Err(ConnectError::Unauthorized) => {
                warn!("Socket handshake rejected: authentication failure");
                let _ = notif_tx.send(SocketNotification::AuthFailure).await;
                return;
            }
            Err(ConnectError::Other(e)) => {
                warn!(error = %e, attempt = attempts + 1, "Socket connect failed");
            }
        }

        attempts += 1;
        if attempts >= config.max_reconnect_attempts {
            error!(
                attempts,
                "Giving up on socket reconnection"
            );
            let _ = notif_tx.send(SocketNotification::Down).await;
            return;
        }

        if !backoff(config.reconnect_delay, &mut cmd_rx).await {
            return;
        }
    }
}

/// Wait out the reconnect delay, staying responsive to a Close command.
/// Other commands arriving meanwhile are consumed without shortening the
/// delay. Returns `false` when the task should end.
async fn backoff(delay: Duration, cmd_rx: &mut mpsc::Receiver<SocketCommand>) -> bool {
    let deadline = tokio::time::Instant::now() + delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return true,
            cmd = cmd_rx.recv() => {
                if matches!(cmd, Some(SocketCommand::Close) | None) {
                    return false;
                }
                // Emits while disconnected are dropped.
            }
        }
    }
}

/// Pump one established connection. Returns `true` when the task should
/// end (explicit close or command channel dropped), `false` on transport
/// loss.
async fn drive_stream(
    stream: WsStream,
    cmd_rx: &mut mpsc::Receiver<SocketCommand>,
    notif_tx: &mpsc::Sender<SocketNotification>,
) -> bool {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            // --- Outgoing commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SocketCommand::Emit(event)) => {
                        let frame = match event.to_json() {
                            Ok(frame) => frame,
                            Err(e) => {
                                error!(error = %e, "Failed to encode client event");
                                continue;
                            }
                        };
                        debug!(frame = %frame, "Emitting event");
                        if let Err(e) = write.send(WsMessage::Text(frame)).await {
                            warn!(error = %e, "Socket write failed");
                            return false;
                        }
                    }
                    Some(SocketCommand::Close) => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return true;
                    }
                    None => {
                        // All senders dropped
                        let _ = write.send(WsMessage::Close(None)).await;
                        return true;
                    }
                }
            }

            // --- Incoming frames ---
            frame = read.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        dispatch_frame(&text, notif_tx).await;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return false;
                    }
                    Some(Ok(_)) => {
                        // Binary/pong frames are not part of the protocol.
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Socket read failed");
                        return false;
                    }
                }
            }
        }
    }
}

/// Decode one text frame and forward it. A bad frame never takes down the
/// task; an event outside the known set is skipped quietly.
async fn dispatch_frame(text: &str, notif_tx: &mpsc::Sender<SocketNotification>) {
    match ServerEvent::from_json(text) {
        Ok(event) => {
            debug!(event = ?event, "Server event received");
            let _ = notif_tx.send(SocketNotification::Event(event)).await;
        }
        Err(ProtocolError::UnknownEvent(name)) => {
            debug!(event = %name, "Ignoring unknown server event");
        }
        Err(e) => {
            warn!(error = %e, frame = %text, "Malformed server frame");
        }
    }
}

async fn open_stream(config: &SocketConfig, token: Option<&str>) -> Result<WsStream, ConnectError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ConnectError::Other(e.to_string()))?;

    if let Some(token) = token {
        let value = format!("Bearer {token}")
            .parse()
            .map_err(|_| ConnectError::Other("invalid token header".into()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    match connect_async(request).await {
        Ok((stream, _response)) => Ok(stream),
        Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
            Err(ConnectError::Unauthorized)
        }
        Err(e) => Err(ConnectError::Other(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::ConversationId;

    #[tokio::test(start_paused = true)]
    async fn test_backoff_not_shortened_by_emits() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let delay = Duration::from_secs(1);
        cmd_tx
            .try_send(SocketCommand::Emit(ClientEvent::Join {
                conversation_id: ConversationId(1),
            }))
            .unwrap();

        let start = tokio::time::Instant::now();
        assert!(backoff(delay, &mut cmd_rx).await);
        // The queued emit was consumed without aborting the delay.
        assert!(start.elapsed() >= delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_aborted_by_close() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        cmd_tx.try_send(SocketCommand::Close).unwrap();

        let start = tokio::time::Instant::now();
        assert!(!backoff(Duration::from_secs(1), &mut cmd_rx).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
