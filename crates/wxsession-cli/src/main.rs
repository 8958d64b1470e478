//! wxsession - drive a mini-program session backend from the terminal.
//!
//! Logs in with a platform ticket taken from the environment, keeps the
//! resulting session cached between runs, and sends authenticated requests
//! through the same retry logic the client library uses.

mod env_platform;

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wxsession_core::{AuthClient, Config, LoginOptions, Method, ReqwestTransport, RequestOptions};

use env_platform::EnvPlatform;

/// Overrides the login URL from the config file
const LOGIN_URL_ENV: &str = "WXSESSION_LOGIN_URL";

const USAGE: &str = "\
Usage: wxsession <command>

Commands:
  login                         Log in and print the session id
  request [options] URL...      Send one request per URL, concurrently
      --auth                    Interpret session-protocol replies
      --login                   Log in before sending
      --method METHOD           HTTP method (default GET)
      --data JSON               Request data
      --header NAME:VALUE       Extra header, repeatable
  session [show|clear]          Inspect or drop the cached session
  set-login-url URL             Save the login URL to the config file

Platform ticket: WX_CODE, WX_ENCRYPTED_DATA, WX_IV, [WX_USER_INFO], [WX_SESSION_VALID]";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    if command == Some("set-login-url") {
        return set_login_url(args.get(1));
    }

    let mut config = Config::load()?;
    if let Ok(url) = std::env::var(LOGIN_URL_ENV) {
        if !url.is_empty() {
            config.login_url = Some(url);
        }
    }

    match command {
        Some("login") => login(&config).await,
        Some("request") => request(&config, &args[1..]).await,
        Some("session") => session(&config, args.get(1).map(String::as_str)),
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    }
}

fn build_client(config: &Config) -> Result<AuthClient> {
    let store = Arc::new(config.open_session_store()?);
    let transport = Arc::new(
        ReqwestTransport::new(config.request_timeout_secs)
            .context("Failed to build HTTP client")?,
    );
    Ok(AuthClient::new(
        config.clone(),
        Arc::new(EnvPlatform),
        transport,
        store,
    ))
}

async fn login(config: &Config) -> Result<()> {
    let client = build_client(config)?;
    let session = client
        .login(&LoginOptions::default())
        .await
        .context("Login failed")?;
    info!(session_id = %session.id(), "Login complete");
    println!("{}", session.id());
    Ok(())
}

struct RequestArgs {
    auth: bool,
    login: bool,
    method: Method,
    data: Option<serde_json::Value>,
    headers: Vec<(String, String)>,
    urls: Vec<String>,
}

fn parse_request_args(args: &[String]) -> Result<RequestArgs> {
    let mut parsed = RequestArgs {
        auth: false,
        login: false,
        method: Method::GET,
        data: None,
        headers: Vec::new(),
        urls: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--auth" => parsed.auth = true,
            "--login" => parsed.login = true,
            "--method" => {
                let value = iter.next().context("--method needs a value")?;
                parsed.method = Method::from_bytes(value.to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("Invalid method: {}", value))?;
            }
            "--data" => {
                let value = iter.next().context("--data needs a value")?;
                parsed.data =
                    Some(serde_json::from_str(value).context("--data must be valid JSON")?);
            }
            "--header" => {
                let value = iter.next().context("--header needs a value")?;
                let (name, header_value) = value
                    .split_once(':')
                    .with_context(|| format!("Header must be NAME:VALUE, got {}", value))?;
                parsed
                    .headers
                    .push((name.trim().to_string(), header_value.trim().to_string()));
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            url => parsed.urls.push(url.to_string()),
        }
    }

    if parsed.urls.is_empty() {
        bail!("request needs at least one URL");
    }
    Ok(parsed)
}

/// Options for one URL; any login has already happened up front
fn options_for(parsed: &RequestArgs, url: &str) -> RequestOptions {
    let mut options = RequestOptions::new(url)
        .method(parsed.method.clone())
        .auth(parsed.auth);
    if let Some(ref data) = parsed.data {
        options = options.body(data.clone());
    }
    for (name, value) in &parsed.headers {
        options = options.header(name.clone(), value.clone());
    }
    options
}

async fn request(config: &Config, args: &[String]) -> Result<()> {
    let parsed = parse_request_args(args)?;
    let client = build_client(config)?;

    // One ticket, one login: concurrent requests share the resulting session
    if parsed.login {
        client
            .login(&LoginOptions::default())
            .await
            .context("Login failed")?;
    }

    let futures: Vec<_> = parsed
        .urls
        .iter()
        .map(|url| client.request(options_for(&parsed, url)))
        .collect();

    let results = futures::future::join_all(futures).await;

    let mut failures = 0;
    for (url, result) in parsed.urls.iter().zip(results) {
        match result {
            Ok(response) => println!("{} {} {}", response.status, url, response.data),
            Err(e) => {
                failures += 1;
                let kind = e.kind();
                eprintln!("{} failed [{}]: {:#}", url, kind, anyhow::Error::new(e));
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} requests failed", failures, parsed.urls.len());
    }
    Ok(())
}

fn session(config: &Config, action: Option<&str>) -> Result<()> {
    let store = config.open_session_store()?;
    match action.unwrap_or("show") {
        "show" => match store.stored() {
            Some(record) => {
                println!("id:    {}", record.session.id());
                println!("saved: {}", record.age_display());
                for key in record.session.extra().keys() {
                    println!("extra: {}", key);
                }
            }
            None => println!("No cached session"),
        },
        "clear" => {
            store.clear();
            println!("Session cleared");
        }
        other => bail!("Unknown session action: {}", other),
    }
    Ok(())
}

fn set_login_url(url: Option<&String>) -> Result<()> {
    let url = url.context("set-login-url needs a URL")?;
    let mut config = Config::load()?;
    config.login_url = Some(url.clone());
    config.save()?;
    println!("Login URL saved to {}", Config::config_path()?.display());
    Ok(())
}
