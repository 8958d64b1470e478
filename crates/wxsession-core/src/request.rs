//! Authenticated request wrapper.
//!
//! Sends a request with the cached session attached, and on a
//! session-expired reply logs in again and resends exactly once. Every call
//! ends in a single terminal outcome, which is both returned and handed to
//! the optional callbacks.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ErrorKind, LoginError, RequestError};
use crate::login::{LoginFlow, LoginOptions};
use crate::platform::{HttpRequest, Platform, Response, Transport};
use crate::protocol::{code_display, is_truthy, ProtocolBody, HEADER_ID, HEADER_SKEY};
use crate::session::{Session, SessionStore};

pub type SuccessCallback = Box<dyn FnOnce(&Response) + Send>;
pub type FailureCallback = Box<dyn FnOnce(&RequestError) + Send>;
pub type CompleteCallback = Box<dyn FnOnce(&Result<Response, RequestError>) + Send>;

/// One request, built fluently.
pub struct RequestOptions {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Interpret session-protocol replies (expiry, refresh)
    pub requires_auth: bool,
    /// Run the login flow before sending
    pub requires_login: bool,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
    on_complete: Option<CompleteCallback>,
}

impl RequestOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: BTreeMap::new(),
            body: None,
            requires_auth: false,
            requires_login: false,
            on_success: None,
            on_failure: None,
            on_complete: None,
        }
    }

    /// Build options from an untyped JSON object.
    ///
    /// Recognised keys: `url`, `method`, `header`, `data`, `auth`, `login`.
    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let object = value.as_object().ok_or_else(|| {
            RequestError::invalid_params(format!(
                "Request options must be an object, got {}",
                json_type_name(value)
            ))
        })?;

        let url = object
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| RequestError::invalid_params("Request options need a string `url`"))?;
        let mut options = Self::new(url);

        if let Some(method) = object.get("method").and_then(Value::as_str) {
            options.method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| {
                    RequestError::invalid_params(format!("Invalid request method: {}", method))
                })?;
        }

        if let Some(header) = object.get("header") {
            let header = header.as_object().ok_or_else(|| {
                RequestError::invalid_params("Request `header` must be an object")
            })?;
            for (name, value) in header {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                options.headers.insert(name.clone(), value);
            }
        }

        options.body = object.get("data").cloned();
        options.requires_auth = object.get("auth").is_some_and(is_truthy);
        options.requires_login = object.get("login").is_some_and(is_truthy);
        Ok(options)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn login(mut self, requires_login: bool) -> Self {
        self.requires_login = requires_login;
        self
    }

    pub fn on_success(mut self, callback: impl FnOnce(&Response) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_failure(mut self, callback: impl FnOnce(&RequestError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    pub fn on_complete(
        mut self,
        callback: impl FnOnce(&Result<Response, RequestError>) + Send + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Client that owns the login flow and wraps requests with session handling.
pub struct AuthClient {
    config: Config,
    login: LoginFlow,
    transport: Arc<dyn Transport>,
    store: Arc<SessionStore>,
}

impl AuthClient {
    pub fn new(
        config: Config,
        platform: Arc<dyn Platform>,
        transport: Arc<dyn Transport>,
        store: Arc<SessionStore>,
    ) -> Self {
        let login = LoginFlow::new(config.clone(), platform, transport.clone(), store.clone());
        Self {
            config,
            login,
            transport,
            store,
        }
    }

    pub fn set_login_url(&mut self, login_url: impl Into<String>) {
        let login_url = login_url.into();
        self.config.login_url = Some(login_url.clone());
        self.login.set_login_url(login_url);
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn login(&self, options: &LoginOptions) -> Result<Session, LoginError> {
        self.login.login(options).await
    }

    /// Session headers that would be attached to a request right now
    pub fn build_session_header(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some(session) = self.store.get() {
            headers.insert(HEADER_ID.to_string(), session.id().to_string());
            headers.insert(HEADER_SKEY.to_string(), session.skey().to_string());
        }
        headers
    }

    /// Send a request, delivering the terminal outcome to the callbacks
    /// (success or failure, then complete) and returning it.
    pub async fn request(&self, mut options: RequestOptions) -> Result<Response, RequestError> {
        let on_success = options.on_success.take();
        let on_failure = options.on_failure.take();
        let on_complete = options.on_complete.take();

        let outcome = self.run(&options).await;

        match &outcome {
            Ok(response) => {
                if let Some(callback) = on_success {
                    callback(response);
                }
            }
            Err(err) => {
                debug!(url = %options.url, kind = %err.kind(), error = %err, "Request failed");
                if let Some(callback) = on_failure {
                    callback(err);
                }
            }
        }
        if let Some(callback) = on_complete {
            callback(&outcome);
        }
        outcome
    }

    async fn run(&self, options: &RequestOptions) -> Result<Response, RequestError> {
        if options.url.is_empty() {
            return Err(RequestError::invalid_params("Request options need a non-empty `url`"));
        }

        let mut needs_login = options.requires_login;
        let mut retried = false;

        loop {
            if needs_login {
                self.login.login(&LoginOptions::default()).await?;
            }

            let response = self.send(options).await?;
            if !options.requires_auth {
                return Ok(response);
            }

            let body = ProtocolBody::new(&response.data);
            if !body.has_marker() {
                // Not a session-protocol reply: success whatever data.code says
                if let Some(value) = body.session_value() {
                    match Session::from_value(value) {
                        Ok(session) => self.store.set(session),
                        Err(e) => warn!(error = %e, "Ignoring malformed session in response"),
                    }
                }
                return Ok(response);
            }

            self.store.clear();
            let code = body.code();

            if code == Some(self.config.skey_expired_code) {
                if !retried {
                    debug!(url = %options.url, "Session expired, logging in and retrying once");
                    retried = true;
                    needs_login = true;
                    continue;
                }
                return Err(RequestError::new(
                    ErrorKind::SessionExpired(self.config.skey_expired_code),
                    "session expired",
                ));
            }

            return Err(RequestError::new(
                ErrorKind::CheckLoginFailed,
                format!(
                    "Auth server failed to check login state ({}): {}",
                    code_display(code.filter(|c| *c != 0), "OTHER"),
                    body.msg().unwrap_or("unknown error")
                ),
            ));
        }
    }

    async fn send(&self, options: &RequestOptions) -> Result<Response, RequestError> {
        let session_headers = self.build_session_header();
        let mut headers = options.headers.clone();
        // Header names are case-insensitive; session headers replace any spelling
        headers.retain(|name, _| !session_headers.keys().any(|k| k.eq_ignore_ascii_case(name)));
        headers.extend(session_headers);

        let request = HttpRequest {
            url: options.url.clone(),
            method: options.method.clone(),
            headers,
            body: options.body.clone(),
        };

        self.transport.send(request).await.map_err(|e| {
            RequestError::new(ErrorKind::RequestFailed, format!("Request failed: {}", e))
                .with_detail(e)
        })
    }
}
