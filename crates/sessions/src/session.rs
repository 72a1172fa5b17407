use std::sync::atomic::{AtomicI64, Ordering};

use gatehouse_core::UserId;

/// One live session.
///
/// The last-action timestamp (unix seconds) is atomic so lookups can refresh
/// it while holding only the shared lock on the session table.
#[derive(Debug)]
pub struct Session {
    subject_id: UserId,
    last_action_at: AtomicI64,
}

impl Session {
    pub fn new(subject_id: UserId, last_action_at: i64) -> Self {
        Self {
            subject_id,
            last_action_at: AtomicI64::new(last_action_at),
        }
    }

    pub fn subject_id(&self) -> &UserId {
        &self.subject_id
    }

    pub fn last_action_at(&self) -> i64 {
        self.last_action_at.load(Ordering::Acquire)
    }

    /// Never moves the timestamp backwards.
    pub(crate) fn touch(&self, now: i64) {
        self.last_action_at.fetch_max(now, Ordering::AcqRel);
    }

    pub fn is_expired(&self, now: i64, ttl_secs: i64) -> bool {
        now.saturating_sub(self.last_action_at()) > ttl_secs
    }
}
