//! Conversation room membership.
//!
//! At most one room is active at a time. Switching from A to B emits
//! leave(A) fire-and-forget followed by join(B); acknowledgements carry the
//! conversation id they pertain to, and an ack for a conversation that is
//! no longer desired is ignored. The controller only decides *what* to
//! emit; the session loop owns the channel.

use serde::Serialize;
use tracing::{debug, warn};

use causerie_shared::constants::{JOIN_ERROR_CODE, LEAVE_ERROR_CODE};
use causerie_shared::{ClientEvent, ConversationId};

/// Which side of the membership exchange a server error pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomErrorKind {
    Join,
    Leave,
}

/// Map a server error code to a room error, if it is one.
pub fn classify_error(code: &str) -> Option<RoomErrorKind> {
    match code {
        JOIN_ERROR_CODE => Some(RoomErrorKind::Join),
        LEAVE_ERROR_CODE => Some(RoomErrorKind::Leave),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct RoomController {
    /// The conversation the caller wants to be in.
    desired: Option<ConversationId>,
    /// The conversation the server has acknowledged us into.
    joined: Option<ConversationId>,
}

impl RoomController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired(&self) -> Option<ConversationId> {
        self.desired
    }

    /// Whether the desired conversation has an acknowledged membership.
    pub fn is_joined(&self) -> bool {
        self.desired.is_some() && self.joined == self.desired
    }

    /// Change the desired conversation. Returns the events to emit, in
    /// order: the leave for the previous room (if any), then the join for
    /// the new one. Re-selecting the current conversation emits nothing.
    pub fn set_desired(&mut self, conversation_id: Option<ConversationId>) -> Vec<ClientEvent> {
        if conversation_id == self.desired {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(old) = self.desired {
            debug!(conversation = %old, "Leaving conversation room");
            events.push(ClientEvent::Leave {
                conversation_id: old,
            });
        }

        self.desired = conversation_id;
        self.joined = None;

        if let Some(new) = conversation_id {
            debug!(conversation = %new, "Joining conversation room");
            events.push(ClientEvent::Join {
                conversation_id: new,
            });
        }
        events
    }

    /// Apply a join acknowledgement. Stale acks (for a conversation no
    /// longer desired) are no-ops; returns whether the ack was accepted.
    pub fn on_join_ok(&mut self, conversation_id: ConversationId) -> bool {
        if self.desired == Some(conversation_id) {
            debug!(conversation = %conversation_id, "Join acknowledged");
            self.joined = Some(conversation_id);
            true
        } else {
            warn!(conversation = %conversation_id, "Ignoring stale join ack");
            false
        }
    }

    /// Apply a leave acknowledgement.
    pub fn on_leave_ok(&mut self, conversation_id: ConversationId) -> bool {
        if self.joined == Some(conversation_id) {
            debug!(conversation = %conversation_id, "Leave acknowledged");
            self.joined = None;
            true
        } else {
            false
        }
    }

    /// The transport dropped: any acknowledged membership is gone. The
    /// desired conversation is kept so the session can rejoin.
    pub fn on_connection_reset(&mut self) {
        self.joined = None;
    }

    /// The join to re-emit after a reconnect, if a conversation is still
    /// desired and not already acknowledged.
    pub fn rejoin_event(&self) -> Option<ClientEvent> {
        match self.desired {
            Some(id) if self.joined != Some(id) => Some(ClientEvent::Join {
                conversation_id: id,
            }),
            _ => None,
        }
    }

    /// Final leave on teardown, best-effort.
    pub fn teardown(&mut self) -> Option<ClientEvent> {
        let current = self.desired.take();
        self.joined = None;
        current.map(|id| ClientEvent::Leave {
            conversation_id: id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_emits_leave_then_join() {
        let mut room = RoomController::new();

        let events = room.set_desired(Some(ConversationId(1)));
        assert_eq!(
            events,
            vec![ClientEvent::Join {
                conversation_id: ConversationId(1)
            }]
        );

        let events = room.set_desired(Some(ConversationId(2)));
        assert_eq!(
            events,
            vec![
                ClientEvent::Leave {
                    conversation_id: ConversationId(1)
                },
                ClientEvent::Join {
                    conversation_id: ConversationId(2)
                },
            ]
        );
    }

    #[test]
    fn test_reselect_is_noop() {
        let mut room = RoomController::new();
        room.set_desired(Some(ConversationId(1)));
        assert!(room.set_desired(Some(ConversationId(1))).is_empty());
    }

    #[test]
    fn test_deselect_emits_leave() {
        let mut room = RoomController::new();
        room.set_desired(Some(ConversationId(1)));

        let events = room.set_desired(None);
        assert_eq!(
            events,
            vec![ClientEvent::Leave {
                conversation_id: ConversationId(1)
            }]
        );
        assert!(room.desired().is_none());
    }

    #[test]
    fn test_stale_ack_ignored() {
        let mut room = RoomController::new();
        room.set_desired(Some(ConversationId(1)));
        room.set_desired(Some(ConversationId(2)));

        // Ack for the abandoned conversation arrives late.
        assert!(!room.on_join_ok(ConversationId(1)));
        assert!(!room.is_joined());

        assert!(room.on_join_ok(ConversationId(2)));
        assert!(room.is_joined());
    }

    #[test]
    fn test_rejoin_after_reset() {
        let mut room = RoomController::new();
        room.set_desired(Some(ConversationId(1)));
        room.on_join_ok(ConversationId(1));
        assert!(room.rejoin_event().is_none());

        room.on_connection_reset();
        assert!(!room.is_joined());
        assert_eq!(
            room.rejoin_event(),
            Some(ClientEvent::Join {
                conversation_id: ConversationId(1)
            })
        );
    }

    #[test]
    fn test_teardown_leaves_current() {
        let mut room = RoomController::new();
        room.set_desired(Some(ConversationId(3)));
        room.on_join_ok(ConversationId(3));

        assert_eq!(
            room.teardown(),
            Some(ClientEvent::Leave {
                conversation_id: ConversationId(3)
            })
        );
        assert!(room.teardown().is_none());
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            classify_error("JOIN_CONVERSATION_ERROR"),
            Some(RoomErrorKind::Join)
        );
        assert_eq!(
            classify_error("LEAVE_CONVERSATION_ERROR"),
            Some(RoomErrorKind::Leave)
        );
        assert_eq!(classify_error("RATE_LIMITED"), None);
    }
}
