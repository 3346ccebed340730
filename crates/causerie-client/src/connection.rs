//! Ownership of the single realtime connection.
//!
//! The manager is the only component allowed to open or close the socket;
//! everyone else emits through it. It keeps the notification channel that
//! was handed to it at construction, so rebuilding the socket after a
//! token change or an auth failure transparently keeps all consumers wired.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use causerie_net::{
    spawn_socket, NetError, SessionProvider, SocketCommand, SocketConfig, SocketNotification,
};
use causerie_shared::{ClientEvent, ConnectionStatus};

pub struct ConnectionManager {
    config: SocketConfig,
    session: Arc<dyn SessionProvider>,
    /// Stable notification sink shared by every socket incarnation.
    notif_tx: mpsc::Sender<SocketNotification>,
    cmd_tx: Option<mpsc::Sender<SocketCommand>>,
    /// Token the current socket was opened with.
    token: Option<String>,
    status: ConnectionStatus,
}

impl ConnectionManager {
    pub fn new(
        config: SocketConfig,
        session: Arc<dyn SessionProvider>,
        notif_tx: mpsc::Sender<SocketNotification>,
    ) -> Self {
        Self {
            config,
            session,
            notif_tx,
            cmd_tx: None,
            token: None,
            status: ConnectionStatus::Disconnected,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    fn is_live(&self) -> bool {
        self.cmd_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub(crate) fn socket_sender(&self) -> Option<&mpsc::Sender<SocketCommand>> {
        self.cmd_tx.as_ref()
    }

    /// Open the connection with the session's current token.
    pub async fn connect(&mut self) -> Result<(), NetError> {
        let token = self.session.access_token().await?;
        self.open(token);
        Ok(())
    }

    /// Establish or rebind the connection. A live socket bound to the same
    /// token is reused; otherwise the old socket is closed and exactly one
    /// new physical connection is opened.
    pub fn open(&mut self, token: Option<String>) {
        if self.is_live() && self.token == token {
            return;
        }

        self.shutdown_socket();
        info!(url = %self.config.url, "Opening realtime connection");
        self.cmd_tx = Some(spawn_socket(
            self.config.clone(),
            token.clone(),
            self.notif_tx.clone(),
        ));
        self.token = token;
        self.status = ConnectionStatus::Connecting;
    }

    /// Deterministic teardown.
    pub fn close(&mut self) {
        self.shutdown_socket();
        self.status = ConnectionStatus::Disconnected;
    }

    fn shutdown_socket(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.try_send(SocketCommand::Close);
        }
    }

    /// Emit an event on the live connection; dropped with a warning when
    /// there is none.
    pub fn emit(&self, event: ClientEvent) {
        match &self.cmd_tx {
            Some(tx) => {
                if let Err(e) = tx.try_send(SocketCommand::Emit(event)) {
                    warn!(error = %e, "Failed to queue event on socket");
                }
            }
            None => warn!("Dropping event: no connection"),
        }
    }

    pub fn on_up(&mut self) {
        self.status = ConnectionStatus::Connected;
    }

    pub fn on_down(&mut self) {
        if self.status != ConnectionStatus::Error {
            self.status = ConnectionStatus::Disconnected;
        }
    }

    /// The transport rejected our credential: ask the session provider for
    /// a fresh token once, and rebuild the connection with it. Returns
    /// `false` when no token could be obtained; the session is expired
    /// and the connection stays closed.
    pub async fn handle_auth_failure(&mut self) -> Result<bool, NetError> {
        match self.session.refresh_token().await {
            Ok(Some(token)) => {
                info!("Token refreshed, rebuilding connection");
                // Force a rebind even if the socket task is still draining.
                self.shutdown_socket();
                self.open(Some(token));
                Ok(true)
            }
            Ok(None) => {
                warn!("Token refresh yielded no session");
                self.shutdown_socket();
                self.status = ConnectionStatus::Error;
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.shutdown_socket();
                self.status = ConnectionStatus::Error;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_net::StaticSession;

    fn manager() -> (ConnectionManager, mpsc::Receiver<SocketNotification>) {
        let (notif_tx, notif_rx) = mpsc::channel(16);
        let session = Arc::new(StaticSession::new(Some("tok".into()), None));
        (
            ConnectionManager::new(SocketConfig::new("ws://127.0.0.1:9"), session, notif_tx),
            notif_rx,
        )
    }

    #[tokio::test]
    async fn test_same_token_reuses_socket() {
        let (mut manager, _rx) = manager();
        manager.open(Some("tok".into()));
        let first = manager.socket_sender().unwrap().clone();

        manager.open(Some("tok".into()));
        assert!(first.same_channel(manager.socket_sender().unwrap()));
    }

    #[tokio::test]
    async fn test_token_change_rebuilds_socket() {
        let (mut manager, _rx) = manager();
        manager.open(Some("tok".into()));
        let first = manager.socket_sender().unwrap().clone();

        manager.open(Some("other".into()));
        assert!(!first.same_channel(manager.socket_sender().unwrap()));
        assert_eq!(manager.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_closed() {
        let (mut manager, _rx) = manager();
        manager.open(Some("tok".into()));

        // StaticSession has no refresh path.
        let rebuilt = manager.handle_auth_failure().await.unwrap();
        assert!(!rebuilt);
        assert_eq!(manager.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn test_close_is_deterministic() {
        let (mut manager, _rx) = manager();
        manager.open(Some("tok".into()));
        manager.close();
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert!(manager.socket_sender().is_none());
    }
}
