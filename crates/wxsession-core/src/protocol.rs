//! Wire contract shared with the session server.
//!
//! Login requests carry the platform ticket in `X-WX-*` headers, and
//! authenticated requests carry the session id/skey. Any response body the
//! server's session middleware produced is tagged with `SESSION_MAGIC_ID`.

use serde_json::Value;

use crate::session::Session;

pub const HEADER_CODE: &str = "X-WX-Code";
pub const HEADER_ENCRYPTED_DATA: &str = "X-WX-Encrypted-Data";
pub const HEADER_IV: &str = "X-WX-IV";
pub const HEADER_ID: &str = "X-WX-Id";
pub const HEADER_SKEY: &str = "X-WX-Skey";

/// Marker key the server sets on session-protocol responses
pub const SESSION_MAGIC_ID: &str = "F2C224D4-2BCE-4C64-AF9F-A6D872000D1A";

pub const DEFAULT_SUCCESS_CODE: i64 = 0;
pub const DEFAULT_SKEY_EXPIRED_CODE: i64 = 60012;

/// Read-only view over a response body.
pub struct ProtocolBody<'a> {
    data: &'a Value,
}

impl<'a> ProtocolBody<'a> {
    pub fn new(data: &'a Value) -> Self {
        Self { data }
    }

    /// Whether the session middleware produced this body
    pub fn has_marker(&self) -> bool {
        self.data.get(SESSION_MAGIC_ID).is_some_and(is_truthy)
    }

    /// Numeric `code`; numeric strings are accepted too
    pub fn code(&self) -> Option<i64> {
        match self.data.get("code")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn msg(&self) -> Option<&'a str> {
        self.data
            .get("msg")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    pub fn session_value(&self) -> Option<&'a Value> {
        self.data.get("session").filter(|v| !v.is_null())
    }

    /// The `session` payload, if present and well formed
    pub fn session(&self) -> Option<Session> {
        self.session_value()
            .and_then(|value| Session::from_value(value).ok())
    }
}

/// Truthiness as a loosely typed client would judge it
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Human-readable rendering of an optional server code
pub(crate) fn code_display(code: Option<i64>, fallback: &str) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| fallback.to_string())
}
