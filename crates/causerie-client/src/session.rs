//! The chat session actor.
//!
//! One tokio task owns every piece of mutable session state (connection
//! manager, room membership, presence, typing, timeline) and is driven by
//! four inputs: caller commands, socket notifications, completed REST
//! calls, and typing deadlines. All state transitions are synchronous
//! methods on [`SessionCore`] returning a [`Step`] (updates to publish,
//! events to emit, fetches to start), so the loop stays a thin dispatcher
//! and the transitions stay unit-testable.
//!
//! REST calls never block the loop: they run as tasks tagged with the
//! conversation id they were issued for, and an outcome whose conversation
//! is no longer current is dropped on arrival.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use causerie_net::{
    MessageApi, MessagePage, NetError, SessionProvider, SocketConfig, SocketNotification,
};
use causerie_shared::constants::{COMMAND_BUFFER, DEFAULT_PAGE_SIZE, NOTIFICATION_BUFFER};
use causerie_shared::{
    ClientEvent, ConnectionStatus, ConversationId, Message, ServerEvent, UserId,
};

use crate::connection::ConnectionManager;
use crate::error::SessionError;
use crate::presence::PresenceTracker;
use crate::read_receipts::{self, ReadUpdate};
use crate::room::{classify_error, RoomController, RoomErrorKind};
use crate::timeline::{MessageInsert, Timeline, TimelineSnapshot};
use crate::typing::{TypingCoordinator, TypingSignal};

// ---------------------------------------------------------------------------
// Command / update types
// ---------------------------------------------------------------------------

/// Commands sent *into* the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Switch the active conversation (or deselect with `None`).
    SelectConversation(Option<ConversationId>),
    /// Fetch the next older history page.
    LoadMore,
    /// Re-fetch the newest page wholesale.
    Refresh,
    /// Post a message; the timeline entry arrives via push or refresh.
    SendMessage {
        content: String,
        reply: oneshot::Sender<Result<(), NetError>>,
    },
    /// Local composing state changed (text non-empty / empty).
    SetTyping(bool),
    /// Emit a read signal for the joined conversation.
    MarkAsRead,
    GetTimeline(oneshot::Sender<Option<TimelineSnapshot>>),
    GetTypingUsers(oneshot::Sender<Vec<UserId>>),
    IsOnline(UserId, oneshot::Sender<bool>),
    GetOnlineUsers(oneshot::Sender<Vec<UserId>>),
    GetStatus(oneshot::Sender<ConnectionStatus>),
    Shutdown,
}

/// Notifications pushed *from* the session task to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionUpdate {
    ConnectionChanged(ConnectionStatus),
    /// The timeline for a conversation changed; `should_scroll` is true
    /// only when the visible tail grew.
    TimelineChanged {
        conversation_id: ConversationId,
        should_scroll: bool,
    },
    /// No conversation is selected any more; drop the rendered timeline.
    TimelineCleared,
    TypingChanged {
        conversation_id: ConversationId,
        users: Vec<UserId>,
    },
    PresenceChanged {
        user_id: UserId,
        online: bool,
    },
    RoomError {
        kind: RoomErrorKind,
        message: String,
    },
    ServerError {
        code: String,
        message: String,
    },
    /// Credential refresh failed; the user must re-authenticate.
    SessionExpired,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub socket: SocketConfig,
    pub page_size: u32,
}

impl SessionConfig {
    pub fn new(socket_url: impl Into<String>) -> Self {
        Self {
            socket: SocketConfig::new(socket_url),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Core state machine
// ---------------------------------------------------------------------------

/// Which fetch a REST outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Initial,
    Older,
}

/// A fetch the loop should start.
#[derive(Debug)]
struct FetchRequest {
    conversation_id: ConversationId,
    kind: FetchKind,
    cursor: Option<i64>,
}

/// Result of one background REST call, delivered back into the loop.
#[derive(Debug)]
enum IoOutcome {
    Fetch {
        conversation_id: ConversationId,
        kind: FetchKind,
        result: Result<MessagePage, NetError>,
    },
    /// A send was acknowledged; refresh to pick up the stored message.
    Sent { conversation_id: ConversationId },
}

/// Everything one transition wants done.
#[derive(Debug, Default)]
struct Step {
    updates: Vec<SessionUpdate>,
    emits: Vec<ClientEvent>,
    fetches: Vec<FetchRequest>,
}

struct SessionCore {
    room: RoomController,
    presence: PresenceTracker,
    typing: TypingCoordinator,
    timeline: Option<Timeline>,
    current_user: Option<UserId>,
}

impl SessionCore {
    fn new(current_user: Option<UserId>) -> Self {
        Self {
            room: RoomController::new(),
            presence: PresenceTracker::new(),
            typing: TypingCoordinator::new(),
            timeline: None,
            current_user,
        }
    }

    fn current_conversation(&self) -> Option<ConversationId> {
        self.timeline.as_ref().map(|t| t.conversation_id())
    }

    /// Switch conversations: stop typing in the old room, leave it, join
    /// the new one, and start the initial history fetch. Re-selecting the
    /// current conversation is a no-op (the duplicate-initial-load guard).
    fn select_conversation(&mut self, conversation_id: Option<ConversationId>) -> Step {
        let mut step = Step::default();
        if conversation_id == self.room.desired() {
            return step;
        }

        if let Some(old) = self.room.desired() {
            let had_remote = !self.typing.typing_users().is_empty();
            if self.typing.reset() == Some(TypingSignal::Stop) {
                step.emits.push(ClientEvent::Typing {
                    conversation_id: old,
                    is_typing: false,
                });
            }
            if had_remote {
                step.updates.push(SessionUpdate::TypingChanged {
                    conversation_id: old,
                    users: Vec::new(),
                });
            }
        }

        step.emits.extend(self.room.set_desired(conversation_id));

        let had_timeline = self.timeline.is_some();
        self.timeline = conversation_id.map(Timeline::new);
        match conversation_id {
            Some(id) => {
                step.fetches.push(FetchRequest {
                    conversation_id: id,
                    kind: FetchKind::Initial,
                    cursor: None,
                });
                step.updates.push(SessionUpdate::TimelineChanged {
                    conversation_id: id,
                    should_scroll: false,
                });
            }
            None => {
                if had_timeline {
                    step.updates.push(SessionUpdate::TimelineCleared);
                }
            }
        }
        step
    }

    fn load_more(&mut self) -> Step {
        let mut step = Step::default();
        if let Some(timeline) = &mut self.timeline {
            if timeline.can_load_more() {
                let cursor = timeline.next_cursor();
                timeline.begin_load_more();
                step.fetches.push(FetchRequest {
                    conversation_id: timeline.conversation_id(),
                    kind: FetchKind::Older,
                    cursor,
                });
            }
        }
        step
    }

    fn refresh(&mut self) -> Step {
        let mut step = Step::default();
        if let Some(timeline) = &mut self.timeline {
            if !timeline.is_loading() {
                timeline.begin_refresh();
                step.fetches.push(FetchRequest {
                    conversation_id: timeline.conversation_id(),
                    kind: FetchKind::Initial,
                    cursor: None,
                });
            }
        }
        step
    }

    /// Apply a completed fetch, unless the conversation has been switched
    /// away in the meantime.
    fn apply_fetch(
        &mut self,
        conversation_id: ConversationId,
        kind: FetchKind,
        result: Result<MessagePage, NetError>,
    ) -> Step {
        let mut step = Step::default();
        let Some(timeline) = &mut self.timeline else {
            debug!(conversation = %conversation_id, "Dropping fetch outcome: no timeline");
            return step;
        };
        if timeline.conversation_id() != conversation_id {
            debug!(
                conversation = %conversation_id,
                current = %timeline.conversation_id(),
                "Dropping fetch outcome for deselected conversation"
            );
            return step;
        }

        let should_scroll = match (kind, result) {
            (FetchKind::Initial, Ok(page)) => {
                timeline.apply_initial_page(page, self.current_user);
                true
            }
            (FetchKind::Older, Ok(page)) => {
                timeline.apply_older_page(page, self.current_user);
                false
            }
            (FetchKind::Initial, Err(e)) => {
                warn!(conversation = %conversation_id, error = %e, "Initial fetch failed");
                timeline.fail_initial(e.to_string());
                false
            }
            (FetchKind::Older, Err(e)) => {
                warn!(conversation = %conversation_id, error = %e, "Pagination fetch failed");
                timeline.fail_load_more(e.to_string());
                false
            }
        };

        step.updates.push(SessionUpdate::TimelineChanged {
            conversation_id,
            should_scroll,
        });
        step
    }

    fn set_typing(&mut self, now: Instant, composing: bool) -> Step {
        let mut step = Step::default();
        let Some(conversation_id) = self.room.desired() else {
            return step;
        };
        match self.typing.set_local(now, composing) {
            Some(TypingSignal::Start) => step.emits.push(ClientEvent::Typing {
                conversation_id,
                is_typing: true,
            }),
            Some(TypingSignal::Stop) => step.emits.push(ClientEvent::Typing {
                conversation_id,
                is_typing: false,
            }),
            None => {}
        }
        step
    }

    /// Fire due typing deadlines (debounced local stop, remote expiry).
    fn poll_timers(&mut self, now: Instant) -> Step {
        let mut step = Step::default();
        let (signal, expired) = self.typing.poll(now);
        if let Some(conversation_id) = self.room.desired() {
            if signal == Some(TypingSignal::Stop) {
                step.emits.push(ClientEvent::Typing {
                    conversation_id,
                    is_typing: false,
                });
            }
            if expired {
                step.updates.push(SessionUpdate::TypingChanged {
                    conversation_id,
                    users: self.typing.typing_users(),
                });
            }
        }
        step
    }

    /// Rebind the local identity after a credential refresh. The derived
    /// sent-by-me flags and the self-echo gates all key off this id, so a
    /// held timeline is recomputed rather than kept stale.
    fn set_current_user(&mut self, user: Option<UserId>) -> Step {
        let mut step = Step::default();
        if user == self.current_user {
            return step;
        }
        debug!(user = ?user, "Rebinding local user identity");
        self.current_user = user;
        if let Some(timeline) = &mut self.timeline {
            timeline.set_current_user(user);
            step.updates.push(SessionUpdate::TimelineChanged {
                conversation_id: timeline.conversation_id(),
                should_scroll: false,
            });
        }
        step
    }

    fn mark_as_read(&self, status: ConnectionStatus) -> Step {
        let mut step = Step::default();
        if let Some(event) = read_receipts::mark_read_event(&self.room, status) {
            step.emits.push(event);
        }
        step
    }

    /// The connection came (back) up: stale presence is gone, and the
    /// desired room must be rejoined.
    fn on_connection_up(&mut self) -> Step {
        let mut step = Step::default();
        self.presence.clear();
        self.room.on_connection_reset();
        if let Some(event) = self.room.rejoin_event() {
            step.emits.push(event);
        }
        step.updates
            .push(SessionUpdate::ConnectionChanged(ConnectionStatus::Connected));
        step
    }

    fn handle_server_event(&mut self, now: Instant, event: ServerEvent) -> Step {
        let mut step = Step::default();
        match event {
            ServerEvent::ConnectionSuccess { user_id } => {
                debug!(user = %user_id, "Realtime handshake confirmed");
            }

            ServerEvent::NewMessage {
                conversation_id,
                message,
            } => {
                step = self.apply_new_message(conversation_id, message);
            }

            ServerEvent::JoinOk { conversation_id } => {
                self.room.on_join_ok(conversation_id);
            }

            ServerEvent::LeaveOk { conversation_id } => {
                self.room.on_leave_ok(conversation_id);
            }

            ServerEvent::ReadUpdate {
                conversation_id,
                user_id,
                last_read_message_id,
                last_read_at,
            } => {
                let update = ReadUpdate {
                    conversation_id,
                    user_id,
                    last_read_message_id,
                    last_read_at,
                };
                if read_receipts::accept_update(
                    self.current_conversation(),
                    self.current_user,
                    &update,
                ) {
                    if let Some(timeline) = &mut self.timeline {
                        timeline.update_read_status(user_id, last_read_message_id, last_read_at);
                        step.updates.push(SessionUpdate::TimelineChanged {
                            conversation_id,
                            should_scroll: false,
                        });
                    }
                }
            }

            ServerEvent::TypingUpdate {
                conversation_id,
                user_id,
                is_typing,
            } => {
                if self.room.desired() == Some(conversation_id)
                    && self.current_user != Some(user_id)
                    && self.typing.on_remote(now, user_id, is_typing)
                {
                    step.updates.push(SessionUpdate::TypingChanged {
                        conversation_id,
                        users: self.typing.typing_users(),
                    });
                }
            }

            ServerEvent::UserOnline { user_id } => {
                if self.presence.on_online(user_id) {
                    step.updates.push(SessionUpdate::PresenceChanged {
                        user_id,
                        online: true,
                    });
                }
            }

            ServerEvent::UserOffline { user_id } => {
                if self.presence.on_offline(user_id) {
                    step.updates.push(SessionUpdate::PresenceChanged {
                        user_id,
                        online: false,
                    });
                }
            }

            ServerEvent::Error { code, message } => {
                warn!(code = %code, message = %message, "Server error event");
                match classify_error(&code) {
                    Some(kind) => step.updates.push(SessionUpdate::RoomError { kind, message }),
                    None => step
                        .updates
                        .push(SessionUpdate::ServerError { code, message }),
                }
            }
        }
        step
    }

    fn apply_new_message(&mut self, conversation_id: ConversationId, message: Message) -> Step {
        let mut step = Step::default();
        let Some(timeline) = &mut self.timeline else {
            return step;
        };
        if timeline.conversation_id() != conversation_id {
            debug!(
                conversation = %conversation_id,
                "Ignoring pushed message for other conversation"
            );
            return step;
        }

        match timeline.add_message(message, self.current_user) {
            MessageInsert::Duplicate => {}
            MessageInsert::Tail => step.updates.push(SessionUpdate::TimelineChanged {
                conversation_id,
                should_scroll: true,
            }),
            MessageInsert::OutOfOrder => step.updates.push(SessionUpdate::TimelineChanged {
                conversation_id,
                should_scroll: false,
            }),
        }
        step
    }

    /// Final emissions on shutdown: stop typing, leave the room.
    fn teardown(&mut self) -> Step {
        let mut step = Step::default();
        if let Some(conversation_id) = self.room.desired() {
            if self.typing.reset() == Some(TypingSignal::Stop) {
                step.emits.push(ClientEvent::Typing {
                    conversation_id,
                    is_typing: false,
                });
            }
        }
        if let Some(event) = self.room.teardown() {
            step.emits.push(event);
        }
        step
    }
}

// ---------------------------------------------------------------------------
// Task plumbing
// ---------------------------------------------------------------------------

/// Handle to a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn select_conversation(
        &self,
        conversation_id: Option<ConversationId>,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::SelectConversation(conversation_id))
            .await
    }

    pub async fn load_more(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::LoadMore).await
    }

    pub async fn refresh(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Refresh).await
    }

    pub async fn send_message(&self, content: impl Into<String>) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::SendMessage {
            content: content.into(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    pub async fn set_typing(&self, composing: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::SetTyping(composing)).await
    }

    pub async fn mark_as_read(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::MarkAsRead).await
    }

    pub async fn timeline(&self) -> Result<Option<TimelineSnapshot>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetTimeline(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn typing_users(&self) -> Result<Vec<UserId>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetTypingUsers(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn is_online(&self, user_id: UserId) -> Result<bool, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::IsOnline(user_id, tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn online_users(&self) -> Result<Vec<UserId>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetOnlineUsers(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn status(&self) -> Result<ConnectionStatus, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetStatus(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await
    }
}

/// Spawn the session task.
///
/// Returns the command handle and the update stream for the presentation
/// layer. Dropping the handle (all clones) tears the session down.
pub fn spawn_session(
    config: SessionConfig,
    api: Arc<dyn MessageApi>,
    session: Arc<dyn SessionProvider>,
) -> (SessionHandle, mpsc::Receiver<SessionUpdate>) {
    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(COMMAND_BUFFER);
    let (update_tx, update_rx) = mpsc::channel::<SessionUpdate>(NOTIFICATION_BUFFER);

    tokio::spawn(async move {
        run_session(config, api, session, cmd_rx, update_tx).await;
        info!("Session task terminated");
    });

    (SessionHandle { cmd_tx }, update_rx)
}

async fn run_session(
    config: SessionConfig,
    api: Arc<dyn MessageApi>,
    session: Arc<dyn SessionProvider>,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    update_tx: mpsc::Sender<SessionUpdate>,
) {
    let (notif_tx, mut notif_rx) = mpsc::channel::<SocketNotification>(NOTIFICATION_BUFFER);
    let (io_tx, mut io_rx) = mpsc::channel::<IoOutcome>(NOTIFICATION_BUFFER);

    let mut manager = ConnectionManager::new(config.socket.clone(), session.clone(), notif_tx);
    if let Err(e) = manager.connect().await {
        warn!(error = %e, "Initial connect failed");
    }

    let mut core = SessionCore::new(session.current_user().map(|u| u.id));

    info!("Session started");

    loop {
        let deadline = core.typing.next_deadline();

        let step = tokio::select! {
            // --- Caller commands ---
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    SessionCommand::SelectConversation(id) => core.select_conversation(id),
                    SessionCommand::LoadMore => core.load_more(),
                    SessionCommand::Refresh => core.refresh(),
                    SessionCommand::SendMessage { content, reply } => {
                        spawn_send(&api, &io_tx, core.current_conversation(), content, reply);
                        Step::default()
                    }
                    SessionCommand::SetTyping(composing) => {
                        core.set_typing(Instant::now(), composing)
                    }
                    SessionCommand::MarkAsRead => core.mark_as_read(manager.status()),
                    SessionCommand::GetTimeline(tx) => {
                        let _ = tx.send(core.timeline.as_ref().map(|t| t.snapshot()));
                        Step::default()
                    }
                    SessionCommand::GetTypingUsers(tx) => {
                        let _ = tx.send(core.typing.typing_users());
                        Step::default()
                    }
                    SessionCommand::IsOnline(user_id, tx) => {
                        let _ = tx.send(core.presence.is_online(user_id));
                        Step::default()
                    }
                    SessionCommand::GetOnlineUsers(tx) => {
                        let _ = tx.send(core.presence.online_users());
                        Step::default()
                    }
                    SessionCommand::GetStatus(tx) => {
                        let _ = tx.send(manager.status());
                        Step::default()
                    }
                    SessionCommand::Shutdown => break,
                }
            }

            // --- Socket notifications ---
            notif = notif_rx.recv() => {
                let Some(notif) = notif else { break };
                match notif {
                    SocketNotification::Up => {
                        manager.on_up();
                        core.on_connection_up()
                    }
                    SocketNotification::Down => {
                        manager.on_down();
                        let mut step = Step::default();
                        step.updates.push(SessionUpdate::ConnectionChanged(manager.status()));
                        step
                    }
                    SocketNotification::AuthFailure => {
                        handle_auth_failure(&mut manager, &mut core, &session).await
                    }
                    SocketNotification::Event(event) => {
                        core.handle_server_event(Instant::now(), event)
                    }
                }
            }

            // --- Completed REST calls ---
            outcome = io_rx.recv() => {
                let Some(outcome) = outcome else { break };
                match outcome {
                    IoOutcome::Fetch { conversation_id, kind, result } => {
                        core.apply_fetch(conversation_id, kind, result)
                    }
                    IoOutcome::Sent { conversation_id } => {
                        if core.current_conversation() == Some(conversation_id) {
                            core.refresh()
                        } else {
                            Step::default()
                        }
                    }
                }
            }

            // --- Typing deadlines ---
            _ = sleep_until_opt(deadline) => core.poll_timers(Instant::now()),
        };

        perform_step(step, config.page_size, &mut manager, &api, &io_tx, &update_tx).await;
    }

    // Teardown: best-effort final typing stop and room leave.
    let step = core.teardown();
    for event in step.emits {
        manager.emit(event);
    }
    manager.close();
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn perform_step(
    step: Step,
    page_size: u32,
    manager: &mut ConnectionManager,
    api: &Arc<dyn MessageApi>,
    io_tx: &mpsc::Sender<IoOutcome>,
    update_tx: &mpsc::Sender<SessionUpdate>,
) {
    for event in step.emits {
        manager.emit(event);
    }
    for update in step.updates {
        let _ = update_tx.send(update).await;
    }
    for fetch in step.fetches {
        let api = api.clone();
        let io_tx = io_tx.clone();
        tokio::spawn(async move {
            let result = api
                .fetch_messages(fetch.conversation_id, page_size, fetch.cursor)
                .await;
            let _ = io_tx
                .send(IoOutcome::Fetch {
                    conversation_id: fetch.conversation_id,
                    kind: fetch.kind,
                    result,
                })
                .await;
        });
    }
}

fn spawn_send(
    api: &Arc<dyn MessageApi>,
    io_tx: &mpsc::Sender<IoOutcome>,
    conversation_id: Option<ConversationId>,
    content: String,
    reply: oneshot::Sender<Result<(), NetError>>,
) {
    let Some(conversation_id) = conversation_id else {
        let _ = reply.send(Err(NetError::Api {
            status: 0,
            message: "no conversation selected".to_string(),
        }));
        return;
    };

    let api = api.clone();
    let io_tx = io_tx.clone();
    tokio::spawn(async move {
        let result = api.send_message(conversation_id, &content).await;
        let ok = result.is_ok();
        let _ = reply.send(result);
        if ok {
            let _ = io_tx.send(IoOutcome::Sent { conversation_id }).await;
        }
    });
}

async fn handle_auth_failure(
    manager: &mut ConnectionManager,
    core: &mut SessionCore,
    session: &Arc<dyn SessionProvider>,
) -> Step {
    match manager.handle_auth_failure().await {
        Ok(true) => {
            // The refreshed credential may belong to a different identity.
            let mut step = core.set_current_user(session.current_user().map(|u| u.id));
            step.updates
                .push(SessionUpdate::ConnectionChanged(manager.status()));
            step
        }
        Ok(false) | Err(_) => {
            let mut step = Step::default();
            step.updates
                .push(SessionUpdate::ConnectionChanged(manager.status()));
            step.updates.push(SessionUpdate::SessionExpired);
            step
        }
    }
}
