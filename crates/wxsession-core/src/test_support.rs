use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::PlatformError;
use crate::platform::{HttpRequest, Platform, Response, Transport, UserInfoResult};

// Host stand-in with switchable failures and call counters.
pub(crate) struct FakePlatform {
    session_valid: bool,
    login_fails: bool,
    user_info_fails: bool,
    login_calls: AtomicUsize,
    check_session_calls: AtomicUsize,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self {
            session_valid: true,
            login_fails: false,
            user_info_fails: false,
            login_calls: AtomicUsize::new(0),
            check_session_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_session_valid(mut self, valid: bool) -> Self {
        self.session_valid = valid;
        self
    }

    pub(crate) fn with_login_failure(mut self) -> Self {
        self.login_fails = true;
        self
    }

    pub(crate) fn with_user_info_failure(mut self) -> Self {
        self.user_info_fails = true;
        self
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn check_session_calls(&self) -> usize {
        self.check_session_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn login(&self) -> Result<String, PlatformError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.login_fails {
            return Err(PlatformError::failed("login:fail auth deny"));
        }
        Ok("ticket-code".to_string())
    }

    async fn user_info(&self) -> Result<UserInfoResult, PlatformError> {
        if self.user_info_fails {
            return Err(PlatformError::failed("getUserInfo:fail auth deny"));
        }
        Ok(UserInfoResult {
            encrypted_data: "encrypted-blob".to_string(),
            iv: "iv-value".to_string(),
            user_info: json!({ "nickName": "tester" }),
        })
    }

    async fn check_session(&self) -> Result<(), PlatformError> {
        self.check_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.session_valid {
            Ok(())
        } else {
            Err(PlatformError::failed("checkSession:fail session expired"))
        }
    }
}

enum Scripted {
    Reply(Value),
    Failure(String),
}

// Replays queued outcomes in order and records every request it sees.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_reply(&self, data: Value) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(Scripted::Reply(data));
    }

    pub(crate) fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(Scripted::Failure(message.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<Response, PlatformError> {
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .push(request);
        let next = self.script.lock().expect("script mutex poisoned").pop_front();
        match next {
            Some(Scripted::Reply(data)) => Ok(Response { status: 200, data }),
            Some(Scripted::Failure(message)) => Err(PlatformError::failed(message)),
            None => Err(PlatformError::failed("no scripted response left")),
        }
    }
}
