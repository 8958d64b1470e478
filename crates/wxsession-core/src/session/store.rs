use std::sync::{PoisonError, RwLock};

use tracing::{debug, warn};

use super::{MemoryStorage, Session, SessionStorage, StoredSession};

/// Holds at most one session, mirrored to a persistent backend.
///
/// The in-process copy is authoritative: persistence failures are logged and
/// never surface to callers, so `get` always reflects the last `set`/`clear`.
pub struct SessionStore {
    cached: RwLock<Option<StoredSession>>,
    storage: Box<dyn SessionStorage>,
}

impl SessionStore {
    /// Open a store, priming the cache from `storage`
    pub fn open(storage: impl SessionStorage + 'static) -> Self {
        let cached = match storage.load() {
            Ok(record) => {
                debug!(found = record.is_some(), "Session storage loaded");
                record
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable persisted session");
                None
            }
        };

        Self {
            cached: RwLock::new(cached),
            storage: Box::new(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new())
    }

    pub fn get(&self) -> Option<Session> {
        self.read().as_ref().map(|record| record.session.clone())
    }

    /// The cached session together with when it was saved
    pub fn stored(&self) -> Option<StoredSession> {
        self.read().clone()
    }

    pub fn set(&self, session: Session) {
        let record = StoredSession::new(session);
        if let Err(e) = self.storage.save(&record) {
            warn!(error = %e, "Failed to persist session");
        }
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(record);
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "Failed to remove persisted session");
        }
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<StoredSession>> {
        self.cached.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FileStorage;
    use anyhow::{anyhow, Result};

    struct BrokenStorage;

    impl SessionStorage for BrokenStorage {
        fn load(&self) -> Result<Option<StoredSession>> {
            Err(anyhow!("disk on fire"))
        }

        fn save(&self, _record: &StoredSession) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }

        fn remove(&self) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn test_set_then_get_returns_equivalent_session() {
        let store = SessionStore::in_memory();
        assert!(store.get().is_none());

        let session = Session::new("abc", "k1").expect("valid").with_extra("role", "admin".into());
        store.set(session.clone());
        assert_eq!(store.get(), Some(session));
    }

    #[test]
    fn test_set_overwrites_previous_session() {
        let store = SessionStore::in_memory();
        store.set(Session::new("first", "k1").expect("valid"));
        store.set(Session::new("second", "k2").expect("valid"));
        assert_eq!(store.get().map(|s| s.id().to_string()).as_deref(), Some("second"));
    }

    #[test]
    fn test_clear_then_get_returns_none() {
        let store = SessionStore::in_memory();
        store.set(Session::new("abc", "k1").expect("valid"));
        store.clear();
        assert!(store.get().is_none());
        assert!(store.stored().is_none());
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");

        let store = SessionStore::open(FileStorage::new(dir.path()));
        store.set(Session::new("abc", "k1").expect("valid"));
        drop(store);

        let reopened = SessionStore::open(FileStorage::new(dir.path()));
        assert_eq!(reopened.get().map(|s| s.id().to_string()).as_deref(), Some("abc"));

        reopened.clear();
        let reopened = SessionStore::open(FileStorage::new(dir.path()));
        assert!(reopened.get().is_none());
    }

    #[test]
    fn test_storage_failures_do_not_affect_cache() {
        let store = SessionStore::open(BrokenStorage);
        assert!(store.get().is_none());

        store.set(Session::new("abc", "k1").expect("valid"));
        assert_eq!(store.get().map(|s| s.id().to_string()).as_deref(), Some("abc"));

        store.clear();
        assert!(store.get().is_none());
    }
}
