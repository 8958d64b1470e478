//! Login flow: platform ticket in, server session out.
//!
//! A cached session is reused as long as the host says it is still valid.
//! Otherwise a fresh ticket and encrypted profile are obtained from the
//! host, sent to the configured login URL as `X-WX-*` headers, and the
//! session in the server's reply is stored.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ErrorKind, LoginError};
use crate::platform::{HttpRequest, Platform, Transport};
use crate::protocol::{
    code_display, ProtocolBody, HEADER_CODE, HEADER_ENCRYPTED_DATA, HEADER_IV,
};
use crate::session::{Session, SessionStore};

/// Per-call overrides for the login exchange.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Overrides the configured login method
    pub method: Option<Method>,
    /// Extra data sent with the login request
    pub data: Option<Value>,
}

/// Ticket and encrypted profile collected from the host.
struct WxLoginResult {
    code: String,
    encrypted_data: String,
    iv: String,
    user_info: Value,
}

pub struct LoginFlow {
    config: Config,
    platform: Arc<dyn Platform>,
    transport: Arc<dyn Transport>,
    store: Arc<SessionStore>,
}

impl LoginFlow {
    pub fn new(
        config: Config,
        platform: Arc<dyn Platform>,
        transport: Arc<dyn Transport>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            platform,
            transport,
            store,
        }
    }

    pub fn login_url(&self) -> Option<&str> {
        self.config.login_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn set_login_url(&mut self, login_url: impl Into<String>) {
        self.config.login_url = Some(login_url.into());
    }

    /// Return a valid session, logging in through the server if needed
    pub async fn login(&self, options: &LoginOptions) -> Result<Session, LoginError> {
        let login_url = self.login_url().ok_or_else(|| {
            LoginError::new(
                ErrorKind::InvalidParams,
                "Login error: missing login URL, set one with set_login_url() first",
            )
        })?;

        if let Some(session) = self.store.get() {
            match self.platform.check_session().await {
                Ok(()) => {
                    debug!(session_id = %session.id(), "Reusing cached session");
                    return Ok(session);
                }
                Err(e) => {
                    debug!(error = %e, "Cached session rejected by platform, logging in again");
                    self.store.clear();
                }
            }
        }

        // Tickets are single-use: settle the method before asking for one
        let method = match options.method {
            Some(ref method) => method.clone(),
            None => self.config.login_method().map_err(|e| {
                LoginError::new(ErrorKind::InvalidParams, format!("Login error: {:#}", e))
            })?,
        };

        let wx = self.wx_login_result().await?;
        debug!(has_user_info = !wx.user_info.is_null(), "Platform login ticket obtained");

        let mut headers = BTreeMap::new();
        headers.insert(HEADER_CODE.to_string(), wx.code);
        headers.insert(HEADER_ENCRYPTED_DATA.to_string(), wx.encrypted_data);
        headers.insert(HEADER_IV.to_string(), wx.iv);

        let request = HttpRequest {
            url: login_url.to_string(),
            method,
            headers,
            body: options.data.clone(),
        };

        let response = self.transport.send(request).await.map_err(|e| {
            LoginError::new(
                ErrorKind::LoginFailed,
                "Login failed, possibly a network error or a server fault",
            )
            .with_detail(e)
        })?;

        let session = self.session_from_response(login_url, &response.data)?;
        self.store.set(session.clone());
        info!(session_id = %session.id(), "Logged in");
        Ok(session)
    }

    /// Callback-style login: exactly one of the callbacks fires
    pub async fn login_with_callbacks<S, F>(&self, options: &LoginOptions, on_success: S, on_failure: F)
    where
        S: FnOnce(&Session),
        F: FnOnce(&LoginError),
    {
        match self.login(options).await {
            Ok(session) => on_success(&session),
            Err(e) => on_failure(&e),
        }
    }

    async fn wx_login_result(&self) -> Result<WxLoginResult, LoginError> {
        let code = self.platform.login().await.map_err(|e| {
            LoginError::new(
                ErrorKind::WxLoginFailed,
                "Platform login failed, please check the network",
            )
            .with_detail(e)
        })?;

        let user = self.platform.user_info().await.map_err(|e| {
            LoginError::new(
                ErrorKind::WxGetUserInfoFailed,
                "Failed to get platform user info, please check the network",
            )
            .with_detail(e)
        })?;

        Ok(WxLoginResult {
            code,
            encrypted_data: user.encrypted_data,
            iv: user.iv,
            user_info: user.user_info,
        })
    }

    fn session_from_response(&self, login_url: &str, data: &Value) -> Result<Session, LoginError> {
        let body = ProtocolBody::new(data);
        if !body.has_marker() {
            return Err(LoginError::new(
                ErrorKind::LoginSessionNotReceived,
                format!(
                    "Login response carried no session, make sure the server handles `{}` with the session SDK",
                    login_url
                ),
            ));
        }

        let code = body.code();
        let session = if code == Some(self.config.success_code) {
            body.session()
        } else {
            None
        };

        session.ok_or_else(|| {
            LoginError::new(
                ErrorKind::LoginSessionNotReceived,
                format!(
                    "Login failed ({}): {}",
                    code_display(code, "unknown"),
                    body.msg().unwrap_or("unknown error")
                ),
            )
        })
    }
}
