use reqwest::Url;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::schedule::DispatchError;

pub const COMPUTE_ENDPOINT_URL: &str = "COMPUTE_ENDPOINT_URL";
pub const COMPUTE_TOKEN: &str = "COMPUTE_TOKEN";
pub const RUNNER_API_KEY: &str = "RUNNER_API_KEY";
pub const RUNNER_BASE_URL: &str = "RUNNER_BASE_URL";
pub const APP_URL: &str = "APP_URL";
pub const BIND_ADDR: &str = "BIND_ADDR";
pub const LOG_DIR: &str = "LOG_DIR";
pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

const DEFAULT_RUNNER_BASE_URL: &str = "https://api.trigger.dev";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7200";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const WEBHOOK_PATH: &str = "webhooks/transcription";

/// Bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(***)")
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: Url,
    pub api_key: Option<Credential>,
    // per-request timeout for calls to the runner API
    pub timeout: Duration,
}

/// Process-wide settings, read once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub compute_endpoint: Url,
    pub compute_credential: Option<Credential>,
    pub runner: RunnerConfig,
    pub app_url: Option<Url>,
    pub bind_addr: SocketAddr,
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self, DispatchError> {
        Self::from_lookup(|key| env::var(key).ok().or_else(|| dotenv::var(key).ok()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, DispatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let compute_endpoint = get(COMPUTE_ENDPOINT_URL).ok_or_else(|| {
            DispatchError::Configuration(format!("{} is not set", COMPUTE_ENDPOINT_URL))
        })?;
        let compute_endpoint = parse_http_url(COMPUTE_ENDPOINT_URL, &compute_endpoint)?;

        let runner_base = get(RUNNER_BASE_URL).unwrap_or_else(|| DEFAULT_RUNNER_BASE_URL.to_string());
        let timeout = match get(HTTP_TIMEOUT_SECS) {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                DispatchError::Configuration(format!("{} is not a number: {}", HTTP_TIMEOUT_SECS, e))
            })?,
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let app_url = get(APP_URL)
            .map(|raw| parse_http_url(APP_URL, &raw))
            .transpose()?;

        let bind_addr = get(BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| DispatchError::Configuration(format!("{} is invalid: {}", BIND_ADDR, e)))?;

        Ok(Self {
            compute_endpoint,
            compute_credential: get(COMPUTE_TOKEN).map(Credential::new),
            runner: RunnerConfig {
                base_url: parse_http_url(RUNNER_BASE_URL, &runner_base)?,
                api_key: get(RUNNER_API_KEY).map(Credential::new),
                timeout,
            },
            app_url,
            bind_addr,
        })
    }

    /// Webhook used for jobs submitted without one: `<APP_URL>/webhooks/transcription`.
    pub fn default_webhook_url(&self) -> Option<String> {
        self.app_url.as_ref().map(|url| {
            format!("{}/{}", url.as_str().trim_end_matches('/'), WEBHOOK_PATH)
        })
    }
}

/// The log directory is needed before the rest of the configuration is parsed.
pub fn log_dir_from_env() -> PathBuf {
    env::var(LOG_DIR)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())
        .into()
}

/// Copy of `url` without userinfo, safe to log.
pub fn redact_url(url: &Url) -> Url {
    let mut url = url.clone();
    // only fails for cannot-be-a-base URLs, which carry no userinfo
    let _ = url.set_password(None);
    let _ = url.set_username("");
    url
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, DispatchError> {
    let url = Url::parse(raw)
        .map_err(|e| DispatchError::Configuration(format!("{} is not a valid URL: {}", key, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(DispatchError::Configuration(format!(
            "{} must use http or https, got {}",
            key, scheme
        ))),
    }
}
