//! Client-side session handling for mini-program backends.
//!
//! The crate turns a host platform login ticket into a server session,
//! caches that session, attaches it to requests, and logs in again when the
//! server reports the session expired.
//!
//! - `SessionStore`: the single cached session, persisted across restarts
//! - `LoginFlow`: platform ticket -> server session exchange
//! - `AuthClient`: request wrapper with one re-login retry on expiry

pub mod config;
pub mod error;
pub mod login;
pub mod platform;
pub mod protocol;
pub mod request;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::{Config, SessionBackend};
pub use error::{ErrorKind, LoginError, PlatformError, RequestError};
pub use login::{LoginFlow, LoginOptions};
pub use platform::{HttpRequest, Platform, ReqwestTransport, Response, Transport, UserInfoResult};
pub use request::{AuthClient, RequestOptions};
pub use session::{Session, SessionStore, StoredSession};

pub use reqwest::Method;
