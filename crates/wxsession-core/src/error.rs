use std::fmt;

use thiserror::Error;

/// Reason a login or request failed.
///
/// Every kind except `SessionExpired` maps to a stable `ERR_*` tag; an
/// expired session carries the server's own code instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParams,
    WxLoginFailed,
    WxGetUserInfoFailed,
    LoginFailed,
    LoginSessionNotReceived,
    CheckLoginFailed,
    SessionExpired(i64),
    RequestFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidParams => f.write_str("ERR_INVALID_PARAMS"),
            ErrorKind::WxLoginFailed => f.write_str("ERR_WX_LOGIN_FAILED"),
            ErrorKind::WxGetUserInfoFailed => f.write_str("ERR_WX_GET_USER_INFO"),
            ErrorKind::LoginFailed => f.write_str("ERR_LOGIN_FAILED"),
            ErrorKind::LoginSessionNotReceived => f.write_str("ERR_LOGIN_SESSION_NOT_RECEIVED"),
            ErrorKind::CheckLoginFailed => f.write_str("ERR_CHECK_LOGIN_FAILED"),
            ErrorKind::SessionExpired(code) => write!(f, "{}", code),
            ErrorKind::RequestFailed => f.write_str("ERR_REQUEST_FAILED"),
        }
    }
}

/// Failure reported by one of the host primitives (login, session check, network).
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{0}")]
    Failed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl PlatformError {
    pub fn failed(message: impl Into<String>) -> Self {
        PlatformError::Failed(message.into())
    }
}

/// Error produced by the login flow.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct LoginError {
    kind: ErrorKind,
    message: String,
    #[source]
    detail: Option<PlatformError>,
}

impl LoginError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: PlatformError) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying platform failure, if any
    pub fn detail(&self) -> Option<&PlatformError> {
        self.detail.as_ref()
    }
}

/// Error produced by the authenticated request wrapper.
///
/// Login failures surfaced through a request keep their original kind,
/// message and detail.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct RequestError {
    kind: ErrorKind,
    message: String,
    #[source]
    detail: Option<PlatformError>,
}

impl RequestError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: PlatformError) -> Self {
        self.detail = Some(detail);
        self
    }

    pub(crate) fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&PlatformError> {
        self.detail.as_ref()
    }
}

impl From<LoginError> for RequestError {
    fn from(err: LoginError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
            detail: err.detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_kind_tags() {
        assert_eq!(ErrorKind::InvalidParams.to_string(), "ERR_INVALID_PARAMS");
        assert_eq!(ErrorKind::WxGetUserInfoFailed.to_string(), "ERR_WX_GET_USER_INFO");
        assert_eq!(
            ErrorKind::LoginSessionNotReceived.to_string(),
            "ERR_LOGIN_SESSION_NOT_RECEIVED"
        );
        // Expired sessions are tagged with the server code verbatim
        assert_eq!(ErrorKind::SessionExpired(60012).to_string(), "60012");
    }

    #[test]
    fn test_login_error_converts_to_request_error() {
        let login = LoginError::new(ErrorKind::WxLoginFailed, "platform login failed")
            .with_detail(PlatformError::failed("user cancelled"));

        let request: RequestError = login.into();
        assert_eq!(request.kind(), ErrorKind::WxLoginFailed);
        assert_eq!(request.message(), "platform login failed");
        assert_eq!(request.to_string(), "platform login failed");
        assert_eq!(
            request.source().map(|s| s.to_string()).as_deref(),
            Some("user cancelled")
        );
    }
}
