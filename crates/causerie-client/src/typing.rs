//! Typing state for the joined conversation.
//!
//! Local side: a "started typing" signal goes out immediately and only
//! once; "stopped typing" is debounced so rapid backspace-and-resume does
//! not flood the channel. Remote side: each typing user carries an expiry
//! deadline refreshed by repeated typing-true events.
//!
//! The coordinator never arms timers itself. Deadlines are plain instants;
//! the session loop asks for [`next_deadline`](TypingCoordinator::next_deadline)
//! and calls [`poll`](TypingCoordinator::poll) when it fires, which keeps
//! every transition synchronous and testable. A conversation switch or
//! teardown resets the whole state in one call.

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::debug;

use causerie_shared::constants::{TYPING_EXPIRY, TYPING_STOP_DEBOUNCE};
use causerie_shared::UserId;

/// Signal to emit for the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

#[derive(Debug, Default)]
pub struct TypingCoordinator {
    /// Whether a start signal has been emitted without a matching stop.
    local_typing: bool,
    /// When the debounced stop signal becomes due.
    pending_stop: Option<Instant>,
    /// Remote typing users and their display expiry deadlines.
    remote: HashMap<UserId, Instant>,
}

impl TypingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the local composing state (text non-empty / empty).
    ///
    /// Returns the signal to emit now, if any. Entering "typing" emits
    /// [`TypingSignal::Start`] exactly once; leaving it only schedules the
    /// debounced stop.
    pub fn set_local(&mut self, now: Instant, composing: bool) -> Option<TypingSignal> {
        if composing {
            self.pending_stop = None;
            if !self.local_typing {
                self.local_typing = true;
                return Some(TypingSignal::Start);
            }
            return None;
        }

        if self.local_typing {
            self.pending_stop = Some(now + TYPING_STOP_DEBOUNCE);
        }
        None
    }

    /// Apply a remote typing update. Returns whether the visible typing
    /// set changed (a refreshed deadline is not a visible change).
    pub fn on_remote(&mut self, now: Instant, user_id: UserId, is_typing: bool) -> bool {
        if is_typing {
            let newly = self
                .remote
                .insert(user_id, now + TYPING_EXPIRY)
                .is_none();
            if newly {
                debug!(user = %user_id, "Remote user started typing");
            }
            newly
        } else {
            let removed = self.remote.remove(&user_id).is_some();
            if removed {
                debug!(user = %user_id, "Remote user stopped typing");
            }
            removed
        }
    }

    /// Fire due deadlines. Returns the local signal to emit (the debounced
    /// stop) and whether the remote set changed through expiry.
    pub fn poll(&mut self, now: Instant) -> (Option<TypingSignal>, bool) {
        let mut signal = None;
        if self.pending_stop.is_some_and(|due| due <= now) {
            self.pending_stop = None;
            self.local_typing = false;
            signal = Some(TypingSignal::Stop);
        }

        let before = self.remote.len();
        self.remote.retain(|_, due| *due > now);
        let expired = self.remote.len() != before;
        if expired {
            debug!(remaining = self.remote.len(), "Expired remote typing entries");
        }

        (signal, expired)
    }

    /// The earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.remote
            .values()
            .copied()
            .chain(self.pending_stop)
            .min()
    }

    /// Clear everything on conversation switch or teardown. If the local
    /// user was typing, the final stop must go out immediately.
    pub fn reset(&mut self) -> Option<TypingSignal> {
        self.remote.clear();
        self.pending_stop = None;
        if self.local_typing {
            self.local_typing = false;
            return Some(TypingSignal::Stop);
        }
        None
    }

    /// Ids of remote users currently shown as typing.
    pub fn typing_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.remote.keys().copied().collect();
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_start_emitted_once() {
        let mut typing = TypingCoordinator::new();
        let now = Instant::now();

        assert_eq!(typing.set_local(now, true), Some(TypingSignal::Start));
        assert_eq!(typing.set_local(now, true), None);
        assert_eq!(typing.set_local(now + Duration::from_millis(200), true), None);
    }

    #[test]
    fn test_stop_debounced() {
        let mut typing = TypingCoordinator::new();
        let now = Instant::now();

        typing.set_local(now, true);
        assert_eq!(typing.set_local(now, false), None);

        // Not yet due.
        let (signal, _) = typing.poll(now + Duration::from_millis(500));
        assert_eq!(signal, None);

        let (signal, _) = typing.poll(now + Duration::from_millis(1100));
        assert_eq!(signal, Some(TypingSignal::Stop));

        // Stop already emitted; nothing further pending.
        assert_eq!(typing.next_deadline(), None);
    }

    #[test]
    fn test_resume_within_debounce_emits_nothing() {
        let mut typing = TypingCoordinator::new();
        let now = Instant::now();

        typing.set_local(now, true);
        typing.set_local(now + Duration::from_millis(100), false);
        // Typing resumed before the stop became due.
        assert_eq!(typing.set_local(now + Duration::from_millis(400), true), None);

        let (signal, _) = typing.poll(now + Duration::from_secs(5));
        assert_eq!(signal, None);
    }

    #[test]
    fn test_remote_expiry() {
        let mut typing = TypingCoordinator::new();
        let now = Instant::now();

        assert!(typing.on_remote(now, UserId(3), true));
        assert_eq!(typing.typing_users(), vec![UserId(3)]);

        // A refresh extends the deadline without a visible change.
        assert!(!typing.on_remote(now + Duration::from_secs(2), UserId(3), true));

        let (_, changed) = typing.poll(now + Duration::from_secs(4));
        assert!(!changed, "deadline was refreshed");

        let (_, changed) = typing.poll(now + Duration::from_secs(6));
        assert!(changed);
        assert!(typing.typing_users().is_empty());
    }

    #[test]
    fn test_remote_stop_removes_immediately() {
        let mut typing = TypingCoordinator::new();
        let now = Instant::now();

        typing.on_remote(now, UserId(3), true);
        assert!(typing.on_remote(now, UserId(3), false));
        assert!(typing.typing_users().is_empty());
    }

    #[test]
    fn test_reset_emits_final_stop() {
        let mut typing = TypingCoordinator::new();
        let now = Instant::now();

        typing.set_local(now, true);
        typing.on_remote(now, UserId(3), true);

        assert_eq!(typing.reset(), Some(TypingSignal::Stop));
        assert!(typing.typing_users().is_empty());
        assert_eq!(typing.next_deadline(), None);

        // Idle coordinator resets silently.
        assert_eq!(typing.reset(), None);
    }
}
