//! Online-presence tracking.
//!
//! A pure fold over `user:online` / `user:offline` push events. There is
//! no expiry: stale presence is worse than no presence, so the set is
//! cleared whenever the connection comes back up and repopulated by fresh
//! events.

use std::collections::HashSet;

use tracing::debug;

use causerie_shared::UserId;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: HashSet<UserId>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            online: HashSet::new(),
        }
    }

    /// Record a user coming online. Returns whether the set changed.
    pub fn on_online(&mut self, user_id: UserId) -> bool {
        let changed = self.online.insert(user_id);
        if changed {
            debug!(user = %user_id, "User online");
        }
        changed
    }

    /// Record a user going offline. Returns whether the set changed.
    pub fn on_offline(&mut self, user_id: UserId) -> bool {
        let changed = self.online.remove(&user_id);
        if changed {
            debug!(user = %user_id, "User offline");
        }
        changed
    }

    /// Drop all presence state (on reconnect).
    pub fn clear(&mut self) {
        if !self.online.is_empty() {
            debug!(count = self.online.len(), "Clearing presence set");
            self.online.clear();
        }
    }

    /// Whether a user is known to be online. Unknown ids are offline.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.online.contains(&user_id)
    }

    /// Snapshot of all online user ids.
    pub fn online_users(&self) -> Vec<UserId> {
        self.online.iter().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.online.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_offline_fold() {
        let mut tracker = PresenceTracker::new();
        assert!(!tracker.is_online(UserId(7)));

        assert!(tracker.on_online(UserId(7)));
        assert!(tracker.is_online(UserId(7)));
        assert_eq!(tracker.count(), 1);

        assert!(tracker.on_offline(UserId(7)));
        assert!(!tracker.is_online(UserId(7)));
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_duplicate_events_are_noops() {
        let mut tracker = PresenceTracker::new();
        assert!(tracker.on_online(UserId(1)));
        assert!(!tracker.on_online(UserId(1)));
        assert_eq!(tracker.count(), 1);

        assert!(!tracker.on_offline(UserId(2)));
    }

    #[test]
    fn test_clear_on_reconnect() {
        let mut tracker = PresenceTracker::new();
        tracker.on_online(UserId(1));
        tracker.on_online(UserId(2));

        tracker.clear();
        assert_eq!(tracker.count(), 0);
        assert!(!tracker.is_online(UserId(1)));
    }
}
