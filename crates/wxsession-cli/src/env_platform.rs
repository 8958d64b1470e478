//! Host primitives read from the environment.
//!
//! Outside the mini-program host there is no `wx.login`; a developer grabs a
//! ticket from the devtools console and exports it before running the CLI.

use async_trait::async_trait;
use serde_json::Value;
use wxsession_core::{Platform, PlatformError, UserInfoResult};

const ENV_CODE: &str = "WX_CODE";
const ENV_ENCRYPTED_DATA: &str = "WX_ENCRYPTED_DATA";
const ENV_IV: &str = "WX_IV";
const ENV_USER_INFO: &str = "WX_USER_INFO";
const ENV_SESSION_VALID: &str = "WX_SESSION_VALID";

pub struct EnvPlatform;

fn required(name: &str) -> Result<String, PlatformError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PlatformError::failed(format!("{} is not set", name)))
}

#[async_trait]
impl Platform for EnvPlatform {
    async fn login(&self) -> Result<String, PlatformError> {
        required(ENV_CODE)
    }

    async fn user_info(&self) -> Result<UserInfoResult, PlatformError> {
        let user_info = match std::env::var(ENV_USER_INFO) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                PlatformError::failed(format!("{} is not valid JSON: {}", ENV_USER_INFO, e))
            })?,
            Err(_) => Value::Null,
        };

        Ok(UserInfoResult {
            encrypted_data: required(ENV_ENCRYPTED_DATA)?,
            iv: required(ENV_IV)?,
            user_info,
        })
    }

    /// Cached sessions are trusted unless WX_SESSION_VALID says otherwise
    async fn check_session(&self) -> Result<(), PlatformError> {
        match std::env::var(ENV_SESSION_VALID).as_deref() {
            Ok("0") | Ok("false") => Err(PlatformError::failed("checkSession:fail")),
            _ => Ok(()),
        }
    }
}
