//! Registry of in-flight sessions keyed by source id.
//!
//! At most one session per source id. Mutations take the write lock, reads the
//! read lock; neither is held across I/O (process termination happens after the
//! session has been taken out of the map).

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::CancelError;
use crate::session::{Session, SessionView};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `session` unless its source id is already registered.
    pub fn try_add(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.write();
        if sessions.contains_key(session.source_id()) {
            return false;
        }
        sessions.insert(session.source_id().to_owned(), session);
        true
    }

    /// Remove whatever session is registered for `source_id`. No-op if absent.
    pub fn remove(&self, source_id: &str) {
        self.write().remove(source_id);
    }

    /// Remove `session` only if it is still the one registered under its id.
    /// Returns true if it was removed.
    pub fn remove_session(&self, session: &Arc<Session>) -> bool {
        let mut sessions = self.write();
        match sessions.get(session.source_id()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(session.source_id());
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, source_id: &str) -> Option<Arc<Session>> {
        self.read().get(source_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copies of every session, ordered by source id.
    pub fn snapshot(&self) -> BTreeMap<String, SessionView> {
        let sessions: Vec<Arc<Session>> = self.read().values().cloned().collect();
        sessions
            .into_iter()
            .map(|s| (s.source_id().to_owned(), s.view()))
            .collect()
    }

    /// Terminate the session's process and drop it from the registry. The
    /// session is removed even when termination fails.
    pub fn cancel(&self, source_id: &str) -> Result<(), CancelError> {
        let session = self
            .write()
            .remove(source_id)
            .ok_or_else(|| CancelError::NotFound(source_id.to_owned()))?;
        session
            .terminate()
            .map_err(|source| CancelError::Termination {
                source_id: source_id.to_owned(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::OutputSink;
    use crate::session::tests::FakeHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn running(source_id: &str, fail: bool) -> (Arc<Session>, Arc<AtomicUsize>) {
        let session = Arc::new(Session::new(source_id));
        let kills = Arc::new(AtomicUsize::new(0));
        assert!(session.attach(Box::new(FakeHandle {
            kills: Arc::clone(&kills),
            fail,
        })));
        (session, kills)
    }

    #[test]
    fn try_add_rejects_duplicate() {
        let reg = SessionRegistry::new();
        assert!(reg.try_add(Arc::new(Session::new("http://x"))));
        assert!(!reg.try_add(Arc::new(Session::new("http://x"))));
        assert_eq!(reg.len(), 1);
        assert!(reg.try_add(Arc::new(Session::new("http://y"))));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let reg = SessionRegistry::new();
        reg.try_add(Arc::new(Session::new("http://x")));
        reg.remove("http://x");
        reg.remove("http://x");
        assert!(reg.lookup("http://x").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_session_ignores_replacement() {
        let reg = SessionRegistry::new();
        let old = Arc::new(Session::new("http://x"));
        reg.try_add(Arc::clone(&old));
        reg.remove("http://x");
        let new = Arc::new(Session::new("http://x"));
        reg.try_add(Arc::clone(&new));

        assert!(!reg.remove_session(&old));
        assert!(Arc::ptr_eq(&reg.lookup("http://x").unwrap(), &new));
        assert!(reg.remove_session(&new));
        assert!(reg.is_empty());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let reg = SessionRegistry::new();
        let session = Arc::new(Session::new("http://x"));
        reg.try_add(Arc::clone(&session));
        session.sink().write(b"[download] Destination: x.mp4\n");

        let mut snap = reg.snapshot();
        let view = snap.get_mut("http://x").unwrap();
        assert_eq!(view.filename.as_deref(), Some("x.mp4"));
        view.filename = Some("tampered".into());
        view.progress = "tampered".into();

        let again = reg.snapshot();
        assert_eq!(again["http://x"].filename.as_deref(), Some("x.mp4"));
        assert_eq!(again["http://x"].progress, "");
    }

    #[test]
    fn cancel_unknown_is_not_found() {
        let reg = SessionRegistry::new();
        reg.try_add(Arc::new(Session::new("http://x")));
        match reg.cancel("http://y") {
            Err(CancelError::NotFound(id)) => assert_eq!(id, "http://y"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn cancel_terminates_and_removes() {
        let reg = SessionRegistry::new();
        let (session, kills) = running("http://x", false);
        reg.try_add(session);
        reg.cancel("http://x").unwrap();
        assert_eq!(kills.load(Ordering::SeqCst), 1);
        assert!(reg.lookup("http://x").is_none());
    }

    #[test]
    fn cancel_removes_even_when_termination_fails() {
        let reg = SessionRegistry::new();
        let (session, kills) = running("http://x", true);
        reg.try_add(session);
        assert!(matches!(
            reg.cancel("http://x"),
            Err(CancelError::Termination { .. })
        ));
        assert_eq!(kills.load(Ordering::SeqCst), 1);
        assert!(reg.lookup("http://x").is_none());
    }

    #[test]
    fn concurrent_adds_admit_exactly_one() {
        let reg = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.try_add(Arc::new(Session::new("http://x"))))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(reg.len(), 1);
    }
}
