//! The session manager.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gatehouse_core::{SessionSettings, SharedClock, SystemClock, UserId};

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::snapshot;
use crate::worker::PurgeWorker;

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "sessions.db";

/// Shortest purge interval the worker will run with.
pub const MIN_PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

fn purge_interval(settings: &SessionSettings) -> std::time::Duration {
    settings.purge_interval().max(MIN_PURGE_INTERVAL)
}

/// Credentials handed to a client for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeys {
    pub token: String,
    pub key: String,
}

fn table_key(token: &str, key: &str) -> String {
    format!("{token}::{key}")
}

#[derive(Debug)]
struct Shared {
    sessions: RwLock<HashMap<String, Session>>,
    clock: SharedClock,
    ttl_secs: i64,
}

impl Shared {
    fn now(&self) -> i64 {
        self.clock.now().timestamp()
    }

    fn purge_before(&self, cutoff: i64) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.last_action_at() >= cutoff);
        before - sessions.len()
    }

    fn purge_expired(&self) -> usize {
        self.purge_before(self.now().saturating_sub(self.ttl_secs))
    }
}

/// In-memory session table with sliding expiry.
///
/// - A session is valid while `now - last_action_at <= ttl`; each successful
///   [`get`](Self::get) refreshes `last_action_at`.
/// - A background worker removes expired sessions every purge interval.
/// - A durable manager loads `<dir>/sessions.db` on open and writes it back on
///   [`close`](Self::close). Dropping without closing stops the worker and
///   writes nothing.
#[derive(Debug)]
pub struct SessionManager {
    shared: Arc<Shared>,
    worker: Mutex<Option<PurgeWorker>>,
    snapshot_path: Option<PathBuf>,
    closed: AtomicBool,
}

impl SessionManager {
    pub fn in_memory(settings: &SessionSettings) -> SessionResult<Self> {
        Self::start(None, settings, SystemClock::shared())
    }

    /// Durable manager backed by `<dir>/sessions.db`.
    pub fn open(dir: impl AsRef<Path>, settings: &SessionSettings) -> SessionResult<Self> {
        Self::start(Some(dir.as_ref()), settings, SystemClock::shared())
    }

    /// Load the snapshot (if `dir` is given), then start the purge worker.
    pub fn start(
        dir: Option<&Path>,
        settings: &SessionSettings,
        clock: SharedClock,
    ) -> SessionResult<Self> {
        let snapshot_path = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Some(dir.join(SNAPSHOT_FILE))
            }
            None => None,
        };
        let sessions = match &snapshot_path {
            Some(path) => snapshot::load(path)?,
            None => HashMap::new(),
        };
        if let Some(path) = &snapshot_path {
            info!(path = %path.display(), sessions = sessions.len(), "session snapshot loaded");
        }

        let shared = Arc::new(Shared {
            sessions: RwLock::new(sessions),
            clock,
            ttl_secs: i64::try_from(settings.ttl_secs).unwrap_or(i64::MAX),
        });

        let sweeper = Arc::clone(&shared);
        let worker = PurgeWorker::spawn("session-purge", purge_interval(settings), move || {
            let removed = sweeper.purge_expired();
            if removed > 0 {
                debug!(removed, "expired sessions purged");
            }
        })?;

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            snapshot_path,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Start a session for `subject`.
    pub fn create(&self, subject: &UserId) -> SessionResult<SessionKeys> {
        let keys = SessionKeys {
            token: Uuid::new_v4().simple().to_string(),
            key: Uuid::new_v4().simple().to_string(),
        };
        let session = Session::new(subject.clone(), self.shared.now());

        let mut sessions = self.shared.sessions.write();
        self.ensure_open()?;
        sessions.insert(table_key(&keys.token, &keys.key), session);
        drop(sessions);

        debug!(subject = %subject, "session created");
        Ok(keys)
    }

    /// Resolve a session to its subject and refresh its last action time.
    ///
    /// A session past its TTL is reported as absent even before the purge
    /// worker removes it.
    pub fn get(&self, token: &str, key: &str) -> SessionResult<UserId> {
        self.ensure_open()?;
        let now = self.shared.now();
        let sessions = self.shared.sessions.read();
        let session = sessions
            .get(&table_key(token, key))
            .filter(|s| !s.is_expired(now, self.shared.ttl_secs))
            .ok_or(SessionError::SessionDoesNotExist)?;
        session.touch(now);
        Ok(session.subject_id().clone())
    }

    /// End a session.
    pub fn revoke(&self, token: &str, key: &str) -> SessionResult<()> {
        self.ensure_open()?;
        let removed = self.shared.sessions.write().remove(&table_key(token, key));
        match removed {
            Some(session) => {
                debug!(subject = %session.subject_id(), "session revoked");
                Ok(())
            }
            None => Err(SessionError::SessionDoesNotExist),
        }
    }

    /// Remove every session whose last action is before `cutoff`.
    pub fn purge(&self, cutoff: DateTime<Utc>) -> usize {
        self.shared.purge_before(cutoff.timestamp())
    }

    /// Remove every session idle for longer than the TTL.
    pub fn purge_expired(&self) -> usize {
        self.shared.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.shared.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Stop the purge worker and, for a durable manager, write the snapshot.
    ///
    /// Once a close succeeds, later calls fail with
    /// [`SessionError::AlreadyClosed`]. If the snapshot cannot be written the
    /// error is returned and the manager stays open, with its worker stopped,
    /// so `close` can be retried without losing sessions.
    pub fn close(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyClosed);
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.shutdown();
        }

        if let Some(path) = &self.snapshot_path {
            let sessions = self.shared.sessions.read();
            if let Err(e) = snapshot::write(path, &sessions) {
                warn!(path = %path.display(), error = %e, "session snapshot failed; manager left open");
                self.closed.store(false, Ordering::Release);
                return Err(e);
            }
            info!(path = %path.display(), sessions = sessions.len(), "session snapshot written");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration as StdDuration, Instant};

    use chrono::{Duration, TimeZone};
    use gatehouse_core::ManualClock;

    use super::*;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn manual(dir: Option<&Path>) -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let manager = SessionManager::start(dir, &SessionSettings::default(), clock.clone()).unwrap();
        (manager, clock)
    }

    #[test]
    fn create_then_get() {
        let (sessions, _) = manual(None);
        let subject = UserId::new("1");

        let keys = sessions.create(&subject).unwrap();
        assert_eq!(keys.token.len(), 32);
        assert_eq!(keys.key.len(), 32);
        assert_ne!(keys.token, keys.key);

        assert_eq!(sessions.get(&keys.token, &keys.key).unwrap(), subject);
        assert!(matches!(
            sessions.get(&keys.token, "wrong"),
            Err(SessionError::SessionDoesNotExist)
        ));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn regular_access_keeps_a_session_alive() {
        let (sessions, clock) = manual(None);
        let keys = sessions.create(&UserId::new("1")).unwrap();

        for _ in 0..48 {
            clock.advance(Duration::minutes(30));
            assert_eq!(sessions.purge_expired(), 0);
            assert!(sessions.get(&keys.token, &keys.key).is_ok());
        }
    }

    #[test]
    fn idle_session_is_purged() {
        let (sessions, clock) = manual(None);
        let idle = sessions.create(&UserId::new("1")).unwrap();

        clock.advance(Duration::hours(13));
        assert!(matches!(
            sessions.get(&idle.token, &idle.key),
            Err(SessionError::SessionDoesNotExist)
        ));

        let fresh = sessions.create(&UserId::new("2")).unwrap();
        assert_eq!(sessions.purge_expired(), 1);
        assert_eq!(sessions.len(), 1);
        assert!(sessions.get(&fresh.token, &fresh.key).is_ok());
        assert!(matches!(
            sessions.get(&idle.token, &idle.key),
            Err(SessionError::SessionDoesNotExist)
        ));
    }

    #[test]
    fn purge_uses_the_given_cutoff() {
        let (sessions, clock) = manual(None);
        sessions.create(&UserId::new("1")).unwrap();
        clock.advance(Duration::minutes(10));
        sessions.create(&UserId::new("2")).unwrap();

        assert_eq!(sessions.purge(start_time()), 0);
        assert_eq!(sessions.purge(start_time() + Duration::minutes(5)), 1);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn revoke_ends_a_session() {
        let (sessions, _) = manual(None);
        let keys = sessions.create(&UserId::new("1")).unwrap();

        sessions.revoke(&keys.token, &keys.key).unwrap();
        assert!(sessions.is_empty());
        assert!(matches!(
            sessions.revoke(&keys.token, &keys.key),
            Err(SessionError::SessionDoesNotExist)
        ));
    }

    #[test]
    fn sessions_survive_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let subject = UserId::new("42");

        let (first, _) = manual(Some(dir.path()));
        let keys = first.create(&subject).unwrap();
        first.close().unwrap();
        assert!(dir.path().join(SNAPSHOT_FILE).exists());

        let (second, _) = manual(Some(dir.path()));
        assert_eq!(second.len(), 1);
        assert_eq!(second.get(&keys.token, &keys.key).unwrap(), subject);
        second.close().unwrap();
    }

    #[test]
    fn drop_without_close_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (sessions, _) = manual(Some(dir.path()));
            sessions.create(&UserId::new("1")).unwrap();
        }
        assert!(!dir.path().join(SNAPSHOT_FILE).exists());
    }

    #[test]
    fn close_is_once_only() {
        let (sessions, _) = manual(None);
        let keys = sessions.create(&UserId::new("1")).unwrap();

        let started = Instant::now();
        sessions.close().unwrap();
        assert!(started.elapsed() < StdDuration::from_secs(5));

        assert!(matches!(sessions.close(), Err(SessionError::AlreadyClosed)));
        assert!(matches!(
            sessions.create(&UserId::new("2")),
            Err(SessionError::Closed)
        ));
        assert!(matches!(
            sessions.get(&keys.token, &keys.key),
            Err(SessionError::Closed)
        ));
    }

    #[test]
    fn background_worker_purges_idle_sessions() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let settings = SessionSettings {
            purge_interval_secs: 1,
            ..SessionSettings::default()
        };
        let sessions = SessionManager::start(None, &settings, clock.clone()).unwrap();
        sessions.create(&UserId::new("1")).unwrap();

        clock.advance(Duration::hours(13));
        let deadline = Instant::now() + StdDuration::from_secs(10);
        while !sessions.is_empty() && Instant::now() < deadline {
            std::thread::sleep(StdDuration::from_millis(50));
        }
        assert!(sessions.is_empty());
        sessions.close().unwrap();
    }

    #[test]
    fn failed_snapshot_leaves_close_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let subject = UserId::new("9");
        let (sessions, _) = manual(Some(dir.path()));
        let keys = sessions.create(&subject).unwrap();

        let blocker = dir.path().join(format!(".{SNAPSHOT_FILE}.tmp"));
        std::fs::create_dir(&blocker).unwrap();
        assert!(matches!(sessions.close(), Err(SessionError::Io(_))));
        assert_eq!(sessions.get(&keys.token, &keys.key).unwrap(), subject);

        std::fs::remove_dir(&blocker).unwrap();
        sessions.close().unwrap();
        assert!(dir.path().join(SNAPSHOT_FILE).exists());
        assert!(matches!(sessions.close(), Err(SessionError::AlreadyClosed)));
    }

    #[test]
    fn zero_purge_interval_is_clamped() {
        let settings = SessionSettings {
            purge_interval_secs: 0,
            ..SessionSettings::default()
        };
        assert_eq!(purge_interval(&settings), MIN_PURGE_INTERVAL);
        assert_eq!(
            purge_interval(&SessionSettings::default()),
            StdDuration::from_secs(SessionSettings::DEFAULT_PURGE_INTERVAL_SECS)
        );

        let sessions = SessionManager::start(None, &settings, SystemClock::shared()).unwrap();
        sessions.close().unwrap();
    }

    #[test]
    fn lookups_run_alongside_purges() {
        let (sessions, clock) = manual(None);
        let sessions = Arc::new(sessions);
        for i in 0..8 {
            sessions.create(&UserId::new(format!("idle-{i}"))).unwrap();
        }
        clock.advance(Duration::hours(13));
        let fresh: Vec<SessionKeys> = (0..8)
            .map(|i| sessions.create(&UserId::new(format!("fresh-{i}"))).unwrap())
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let sessions = Arc::clone(&sessions);
                let fresh = fresh.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        for keys in &fresh {
                            sessions.get(&keys.token, &keys.key).unwrap();
                        }
                    }
                })
            })
            .collect();
        let purger = {
            let sessions = Arc::clone(&sessions);
            std::thread::spawn(move || (0..200).map(|_| sessions.purge_expired()).sum::<usize>())
        };

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(purger.join().unwrap(), 8);
        assert_eq!(sessions.len(), 8);
    }
}
