//! Session records and the store that caches them.
//!
//! This module provides:
//! - `Session`: the `{ id, skey, ... }` record issued by the login server
//! - `SessionStore`: the single cached session, mirrored to persistent storage
//! - `SessionStorage` backends: memory, JSON file, OS keychain

pub mod storage;
pub mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage};
pub use store::SessionStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid session: {0}")]
pub struct InvalidSession(&'static str);

/// Login session issued by the server.
///
/// Both `id` and `skey` are guaranteed non-empty. Any additional fields the
/// server sends are kept in `extra` and written back out unchanged.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSession")]
pub struct Session {
    id: String,
    skey: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawSession {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    skey: Value,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Servers are not consistent about numeric vs string ids.
fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TryFrom<RawSession> for Session {
    type Error = InvalidSession;

    fn try_from(raw: RawSession) -> Result<Self, Self::Error> {
        let id = scalar_to_string(raw.id).ok_or(InvalidSession("missing id"))?;
        let skey = scalar_to_string(raw.skey).ok_or(InvalidSession("missing skey"))?;
        let mut session = Session::new(id, skey)?;
        session.extra = raw.extra;
        Ok(session)
    }
}

impl Session {
    pub fn new(id: impl Into<String>, skey: impl Into<String>) -> Result<Self, InvalidSession> {
        let id = id.into();
        let skey = skey.into();
        if id.is_empty() {
            return Err(InvalidSession("empty id"));
        }
        if skey.is_empty() {
            return Err(InvalidSession("empty skey"));
        }
        Ok(Self {
            id,
            skey,
            extra: Map::new(),
        })
    }

    /// Parse a session out of a JSON value from a server response
    pub fn from_value(value: &Value) -> Result<Self, InvalidSession> {
        Self::deserialize(value).map_err(|_| InvalidSession("malformed session object"))
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn skey(&self) -> &str {
        &self.skey
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

// skey is a credential; keep it out of logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("skey", &"<redacted>")
            .field("extra", &self.extra)
            .finish()
    }
}

/// A session as written to persistent storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: Session,
    pub saved_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            saved_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.saved_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_session_requires_id_and_skey() {
        assert!(Session::new("id-1", "skey-1").is_ok());
        assert_eq!(Session::new("", "skey-1"), Err(InvalidSession("empty id")));
        assert_eq!(Session::new("id-1", ""), Err(InvalidSession("empty skey")));
    }

    #[test]
    fn test_session_from_server_value_keeps_extra_fields() {
        let value = json!({
            "id": "abc",
            "skey": "secret",
            "userInfo": { "nickName": "tester" },
            "expires": 7200
        });

        let session = Session::from_value(&value).expect("valid session");
        assert_eq!(session.id(), "abc");
        assert_eq!(session.skey(), "secret");
        assert_eq!(session.extra()["userInfo"]["nickName"], "tester");

        // Extra fields are flattened back out on serialization
        let round = serde_json::to_value(&session).expect("serialize");
        assert_eq!(round, value);
    }

    #[test]
    fn test_session_accepts_numeric_id() {
        let session = Session::from_value(&json!({ "id": 42, "skey": "k" })).expect("valid");
        assert_eq!(session.id(), "42");
    }

    #[test]
    fn test_session_rejects_incomplete_values() {
        assert!(Session::from_value(&json!({ "id": "abc" })).is_err());
        assert!(Session::from_value(&json!({ "id": "", "skey": "k" })).is_err());
        assert!(Session::from_value(&json!({ "id": null, "skey": "k" })).is_err());
        assert!(Session::from_value(&json!("abc")).is_err());
        assert!(Session::from_value(&Value::Null).is_err());
    }

    #[test]
    fn test_session_debug_redacts_skey() {
        let session = Session::new("abc", "very-secret").expect("valid");
        let debug = format!("{:?}", session);
        assert!(debug.contains("abc"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_stored_session_age_display() {
        let session = Session::new("abc", "k").expect("valid");
        let mut stored = StoredSession::new(session);
        assert_eq!(stored.age_display(), "just now");

        stored.saved_at = Utc::now() - Duration::minutes(5);
        assert_eq!(stored.age_display(), "5m ago");

        stored.saved_at = Utc::now() - Duration::minutes(130);
        assert_eq!(stored.age_display(), "2h ago");

        stored.saved_at = Utc::now() - Duration::days(3);
        assert_eq!(stored.age_display(), "3d ago");
    }
}
