//! Seams for the host platform primitives.
//!
//! The core never talks to the host directly: the login ticket, the session
//! check and the network call all go through these traits so the flows can
//! be driven by a real host binding, the `reqwest` transport, or test fakes.

pub mod http;

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::PlatformError;

pub use http::ReqwestTransport;

/// Encrypted user profile returned alongside a login ticket.
#[derive(Debug, Clone, Default)]
pub struct UserInfoResult {
    pub encrypted_data: String,
    pub iv: String,
    pub user_info: Value,
}

/// Host login and session-check primitives.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Obtain a one-time login ticket (`code`)
    async fn login(&self) -> Result<String, PlatformError>;

    /// Obtain the encrypted user profile for the current login
    async fn user_info(&self) -> Result<UserInfoResult, PlatformError>;

    /// Ask the host whether the session it holds is still valid
    async fn check_session(&self) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

/// Raw result of a network call that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub data: Value,
}

/// Host network-request primitive.
///
/// Any response that arrives counts as transport success, whatever its HTTP
/// status; only failures to get a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<Response, PlatformError>;
}
