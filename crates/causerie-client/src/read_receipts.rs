//! Read-receipt gating.
//!
//! The mark-as-read signal only goes out for the selected conversation on
//! a live connection, and incoming read updates only apply when they
//! pertain to that conversation and to someone other than the local user.
//! The actual fold lives in
//! [`Timeline::update_read_status`](crate::timeline::Timeline).

use chrono::{DateTime, Utc};

use causerie_shared::{ClientEvent, ConnectionStatus, ConversationId, MessageId, UserId};

use crate::room::RoomController;

/// A `conversation:read:update` payload, regrouped for the session loop.
#[derive(Debug, Clone, Copy)]
pub struct ReadUpdate {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub last_read_message_id: MessageId,
    pub last_read_at: DateTime<Utc>,
}

/// The mark-as-read event for the selected conversation, or `None` when
/// there is nothing valid to emit.
///
/// The join acknowledgement is deliberately not required: a read issued
/// while the join round-trip is still in flight must not be dropped, and
/// the server resolves membership on its own side anyway.
pub fn mark_read_event(room: &RoomController, status: ConnectionStatus) -> Option<ClientEvent> {
    if status != ConnectionStatus::Connected {
        return None;
    }
    room.desired().map(|conversation_id| ClientEvent::MarkRead { conversation_id })
}

/// Whether an incoming read update should be folded into the timeline.
pub fn accept_update(
    current_conversation: Option<ConversationId>,
    current_user: Option<UserId>,
    update: &ReadUpdate,
) -> bool {
    current_conversation == Some(update.conversation_id)
        && current_user != Some(update.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn update(conversation: i64, user: i64) -> ReadUpdate {
        ReadUpdate {
            conversation_id: ConversationId(conversation),
            user_id: UserId(user),
            last_read_message_id: MessageId(10),
            last_read_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_mark_read_requires_selection_and_connection() {
        let mut room = RoomController::new();
        assert!(mark_read_event(&room, ConnectionStatus::Connected).is_none());

        // Join ack still in flight; the read signal goes out regardless.
        room.set_desired(Some(ConversationId(5)));
        assert_eq!(
            mark_read_event(&room, ConnectionStatus::Connected),
            Some(ClientEvent::MarkRead {
                conversation_id: ConversationId(5)
            })
        );

        assert!(mark_read_event(&room, ConnectionStatus::Disconnected).is_none());
        assert!(mark_read_event(&room, ConnectionStatus::Connecting).is_none());
    }

    #[test]
    fn test_update_gating() {
        let current = Some(ConversationId(5));
        let me = Some(UserId(1));

        assert!(accept_update(current, me, &update(5, 2)));
        // Own echo.
        assert!(!accept_update(current, me, &update(5, 1)));
        // Different conversation.
        assert!(!accept_update(current, me, &update(6, 2)));
        // No conversation selected.
        assert!(!accept_update(None, me, &update(5, 2)));
    }
}
