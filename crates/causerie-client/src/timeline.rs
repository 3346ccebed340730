//! Per-conversation message timeline.
//!
//! Merges two independently-arriving sources, cursor-paginated REST pages
//! and live push events, into one ordered, deduplicated sequence. The API
//! returns pages newest-first; the timeline holds oldest-to-newest for
//! display. All mutation happens on the session task; this type is a pure
//! data structure.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use causerie_net::MessagePage;
use causerie_shared::{ConversationId, Message, MessageId, ReadMarker, UserId};

/// Point-in-time view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    pub conversation_id: ConversationId,
    pub messages: Vec<Message>,
    pub has_next_page: bool,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub error: Option<String>,
}

/// Where a live-pushed message landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageInsert {
    /// Already held; dropped.
    Duplicate,
    /// Appended at the newest end; the visible tail grew.
    Tail,
    /// A late push, inserted mid-sequence to keep creation order.
    OutOfOrder,
}

#[derive(Debug)]
pub struct Timeline {
    conversation_id: ConversationId,
    /// Oldest-to-newest, unique ids, ordered by (created_at, id).
    messages: Vec<Message>,
    /// Cursor for the next older page; `None` once the oldest message
    /// has been fetched.
    next_cursor: Option<i64>,
    /// Initial (or refresh) fetch in flight.
    loading: bool,
    /// Backward pagination in flight.
    loading_more: bool,
    error: Option<String>,
}

impl Timeline {
    /// Create an empty timeline with the initial fetch pending.
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            messages: Vec::new(),
            next_cursor: None,
            loading: true,
            loading_more: false,
            error: None,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn next_cursor(&self) -> Option<i64> {
        self.next_cursor
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    /// Whether a backward pagination may be started right now.
    pub fn can_load_more(&self) -> bool {
        self.next_cursor.is_some() && !self.loading && !self.loading_more
    }

    pub fn begin_refresh(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn begin_load_more(&mut self) {
        self.loading_more = true;
        self.error = None;
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            conversation_id: self.conversation_id,
            messages: self.messages.clone(),
            has_next_page: self.next_cursor.is_some(),
            is_loading: self.loading,
            is_loading_more: self.loading_more,
            error: self.error.clone(),
        }
    }

    /// Apply the first (newest) page: reverse to oldest-first and replace
    /// the held messages wholesale.
    pub fn apply_initial_page(&mut self, page: MessagePage, current_user: Option<UserId>) {
        let mut messages = page.items;
        messages.reverse();
        for msg in &mut messages {
            msg.is_sent = current_user == Some(msg.sender.id);
        }
        debug!(
            conversation = %self.conversation_id,
            count = messages.len(),
            cursor = ?page.next_cursor,
            "Applied initial message page"
        );
        self.messages = messages;
        self.next_cursor = page.next_cursor;
        self.loading = false;
        self.error = None;
    }

    /// Apply an older page: everything in it predates the held messages,
    /// so it is prepended (after the same newest-first reversal). Ids
    /// already present are dropped.
    pub fn apply_older_page(&mut self, page: MessagePage, current_user: Option<UserId>) {
        let held: HashSet<MessageId> = self.messages.iter().map(|m| m.id).collect();

        let mut older: Vec<Message> = page
            .items
            .into_iter()
            .filter(|m| !held.contains(&m.id))
            .collect();
        older.reverse();
        for msg in &mut older {
            msg.is_sent = current_user == Some(msg.sender.id);
        }

        debug!(
            conversation = %self.conversation_id,
            count = older.len(),
            cursor = ?page.next_cursor,
            "Prepended older message page"
        );
        older.append(&mut self.messages);
        self.messages = older;
        self.next_cursor = page.next_cursor;
        self.loading_more = false;
        self.error = None;
    }

    /// A failed initial fetch clears the timeline; a failed pagination
    /// keeps the partial history.
    pub fn fail_initial(&mut self, error: String) {
        self.messages.clear();
        self.next_cursor = None;
        self.loading = false;
        self.error = Some(error);
    }

    pub fn fail_load_more(&mut self, error: String) {
        self.loading_more = false;
        self.error = Some(error);
    }

    /// Insert a live-pushed message, keeping the (created_at, id) order
    /// even when the push arrives late. Only a [`MessageInsert::Tail`]
    /// result should trigger auto-scroll.
    pub fn add_message(&mut self, mut message: Message, current_user: Option<UserId>) -> MessageInsert {
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!(id = %message.id, "Dropping duplicate pushed message");
            return MessageInsert::Duplicate;
        }

        message.is_sent = current_user == Some(message.sender.id);

        let key = message.ordering_key();
        let at_tail = self
            .messages
            .last()
            .map_or(true, |last| last.ordering_key() < key);

        if at_tail {
            self.messages.push(message);
            return MessageInsert::Tail;
        }

        let pos = self
            .messages
            .partition_point(|m| m.ordering_key() < key);
        self.messages.insert(pos, message);
        MessageInsert::OutOfOrder
    }

    /// Fold a read-state update: mark every message with id at or below
    /// the threshold as read by `user_id`. Monotonic: a repeated or lower
    /// threshold never removes markers, and `read_at` only moves forward.
    pub fn update_read_status(
        &mut self,
        user_id: UserId,
        last_read_message_id: MessageId,
        last_read_at: DateTime<Utc>,
    ) {
        for msg in &mut self.messages {
            if msg.id > last_read_message_id {
                continue;
            }
            match msg.read_by.iter_mut().find(|m| m.user_id == user_id) {
                Some(marker) => {
                    if last_read_at > marker.read_at {
                        marker.read_at = last_read_at;
                    }
                }
                None => msg.read_by.push(ReadMarker {
                    user_id,
                    read_at: last_read_at,
                }),
            }
        }
    }

    /// Recompute the derived sent-by-me flag after a session swap.
    pub fn set_current_user(&mut self, current_user: Option<UserId>) {
        for msg in &mut self.messages {
            msg.is_sent = current_user == Some(msg.sender.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use causerie_shared::UserProfile;

    fn msg(id: i64, minute: u32) -> Message {
        Message {
            id: MessageId(id),
            content: format!("message {id}"),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap(),
            sender: UserProfile {
                id: UserId(1),
                email: "a@b.c".into(),
                name: "Ada".into(),
            },
            read_by: vec![],
            is_sent: false,
        }
    }

    fn page(items: Vec<Message>, next_cursor: Option<i64>) -> MessagePage {
        MessagePage { items, next_cursor }
    }

    #[test]
    fn test_initial_page_reversed_to_oldest_first() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(10, 10), msg(9, 9)], Some(9)), None);

        let ids: Vec<i64> = timeline.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![9, 10]);
        assert!(timeline.can_load_more());
    }

    #[test]
    fn test_older_page_prepended() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(10, 10), msg(9, 9)], Some(9)), None);
        timeline.begin_load_more();
        timeline.apply_older_page(page(vec![msg(8, 8), msg(7, 7)], None), None);

        let ids: Vec<i64> = timeline.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![7, 8, 9, 10]);
        assert!(!timeline.can_load_more());
    }

    #[test]
    fn test_load_more_guard_without_cursor() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(2, 2), msg(1, 1)], None), None);
        assert!(!timeline.can_load_more());
    }

    #[test]
    fn test_push_deduplicated_against_fetch() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(10, 10), msg(9, 9)], None), None);

        assert_eq!(timeline.add_message(msg(10, 10), None), MessageInsert::Duplicate);
        assert_eq!(timeline.messages().len(), 2);

        assert_eq!(timeline.add_message(msg(11, 11), None), MessageInsert::Tail);
        let ids: Vec<i64> = timeline.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![9, 10, 11]);
    }

    #[test]
    fn test_out_of_order_push_keeps_ordering() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(10, 10), msg(8, 8)], None), None);

        // Late push with an older timestamp lands in the middle and must
        // not signal auto-scroll.
        assert_eq!(timeline.add_message(msg(9, 9), None), MessageInsert::OutOfOrder);
        let ids: Vec<i64> = timeline.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![8, 9, 10]);
    }

    #[test]
    fn test_read_fold_is_monotonic() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(
            page(vec![msg(5, 5), msg(4, 4), msg(3, 3)], None),
            None,
        );

        let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 3, 1, 13, 5, 0).unwrap();
        let reader = UserId(9);

        timeline.update_read_status(reader, MessageId(5), t1);
        assert!(timeline.messages().iter().all(|m| m
            .read_by
            .iter()
            .any(|r| r.user_id == reader)));

        // A lower threshold must not remove markers on 4 and 5, and must
        // not duplicate the marker on 3.
        timeline.update_read_status(reader, MessageId(3), t2);
        for msg in timeline.messages() {
            let markers: Vec<_> = msg.read_by.iter().filter(|r| r.user_id == reader).collect();
            assert_eq!(markers.len(), 1, "message {} marker count", msg.id);
        }
        // read_at moved forward only where the new update applied.
        assert_eq!(timeline.messages()[0].read_by[0].read_at, t2);
        assert_eq!(timeline.messages()[2].read_by[0].read_at, t1);
    }

    #[test]
    fn test_is_sent_recomputed_on_user_change() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(1, 1)], None), Some(UserId(1)));
        assert!(timeline.messages()[0].is_sent);

        timeline.set_current_user(Some(UserId(2)));
        assert!(!timeline.messages()[0].is_sent);

        timeline.set_current_user(None);
        assert!(!timeline.messages()[0].is_sent);
    }

    #[test]
    fn test_failed_pagination_preserves_history() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(10, 10), msg(9, 9)], Some(9)), None);
        timeline.begin_load_more();
        timeline.fail_load_more("boom".into());

        assert_eq!(timeline.messages().len(), 2);
        assert!(timeline.can_load_more());
        assert!(timeline.snapshot().error.is_some());
    }

    #[test]
    fn test_failed_initial_clears_messages() {
        let mut timeline = Timeline::new(ConversationId(1));
        timeline.apply_initial_page(page(vec![msg(10, 10)], Some(10)), None);
        timeline.begin_refresh();
        timeline.fail_initial("boom".into());

        assert!(timeline.messages().is_empty());
        assert!(!timeline.can_load_more());
    }
}
