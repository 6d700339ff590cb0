//! Service configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables:
//!
//! ```toml
//! base_url = "https://a2p.example.com"
//! api_key = "local-dev-key"
//! rate_limit = 120
//! activity_capacity = 100
//! data_file = "registrations.json"
//!
//! [twilio]
//! account_sid = "AC..."
//! auth_token = "..."
//! trusthub_url = "https://trusthub.twilio.com/v1"
//! ```
//!
//! The Twilio credentials and the base URL are required. A missing or
//! malformed required value is fatal: the service never binds a socket
//! without them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use a2p_provider::{TwilioCredentials, TwilioEndpoints};
use a2p_workflow::DEFAULT_ACTIVITY_CAPACITY;

/// Default rate limit: 60 requests per minute per IP.
pub const DEFAULT_RATE_LIMIT: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

// ── File format ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    rate_limit: Option<u64>,
    activity_capacity: Option<usize>,
    data_file: Option<PathBuf>,
    #[serde(default)]
    twilio: TwilioSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TwilioSection {
    account_sid: Option<String>,
    auth_token: Option<String>,
    trusthub_url: Option<String>,
    messaging_url: Option<String>,
    api_url: Option<String>,
}

// ── Resolved configuration ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct A2pConfig {
    pub credentials: TwilioCredentials,
    pub endpoints: TwilioEndpoints,
    /// Public base URL of this service; messaging webhooks point here.
    pub base_url: String,
    /// `None` disables API key authentication.
    pub api_key: Option<String>,
    /// Requests per minute per IP.
    pub rate_limit: u64,
    pub activity_capacity: usize,
    /// Snapshot file for the registration store. `None` keeps everything
    /// in memory.
    pub data_file: Option<PathBuf>,
}

impl fmt::Debug for A2pConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("A2pConfig")
            .field("credentials", &self.credentials)
            .field("endpoints", &self.endpoints)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("rate_limit", &self.rate_limit)
            .field("activity_capacity", &self.activity_capacity)
            .field("data_file", &self.data_file)
            .finish()
    }
}

impl A2pConfig {
    /// Load from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Some(read_file(path)?),
            None => None,
        };
        Self::resolve(file.unwrap_or_default(), |name| std::env::var(name).ok())
    }

    /// Load from TOML text and an explicit environment lookup.
    #[cfg(test)]
    fn from_parts(
        toml_text: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match toml_text {
            Some(text) => toml::from_str(text).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?,
            None => FileConfig::default(),
        };
        Self::resolve(file, env)
    }

    fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // Blank values count as unset, both in the file and the environment.
        let pick = |name: &str, from_file: Option<String>| {
            env(name)
                .or(from_file)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let account_sid = pick("TWILIO_ACCOUNT_SID", file.twilio.account_sid)
            .ok_or(ConfigError::Missing("TWILIO_ACCOUNT_SID"))?;
        let auth_token = pick("TWILIO_AUTH_TOKEN", file.twilio.auth_token)
            .ok_or(ConfigError::Missing("TWILIO_AUTH_TOKEN"))?;

        let base_url = pick("A2P_BASE_URL", file.base_url)
            .ok_or(ConfigError::Missing("A2P_BASE_URL"))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "A2P_BASE_URL",
                reason: format!("'{}' must start with http:// or https://", base_url),
            });
        }
        let base_url = base_url.trim_end_matches('/').to_string();

        let rate_limit = match env("A2P_RATE_LIMIT") {
            Some(raw) => parse_number("A2P_RATE_LIMIT", &raw)?,
            None => file.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT),
        };
        let activity_capacity = match env("A2P_ACTIVITY_CAPACITY") {
            Some(raw) => parse_number("A2P_ACTIVITY_CAPACITY", &raw)?,
            None => file.activity_capacity.unwrap_or(DEFAULT_ACTIVITY_CAPACITY),
        };
        if activity_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "A2P_ACTIVITY_CAPACITY",
                reason: "must be at least 1".to_string(),
            });
        }

        let defaults = TwilioEndpoints::default();
        let endpoint = |name: &str, from_file: Option<String>, default: String| {
            pick(name, from_file)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(default)
        };
        let endpoints = TwilioEndpoints {
            trusthub: endpoint("A2P_TRUSTHUB_URL", file.twilio.trusthub_url, defaults.trusthub),
            messaging: endpoint(
                "A2P_MESSAGING_URL",
                file.twilio.messaging_url,
                defaults.messaging,
            ),
            api: endpoint("A2P_API_URL", file.twilio.api_url, defaults.api),
        };

        let data_file = pick(
            "A2P_DATA_FILE",
            file.data_file.map(|p| p.to_string_lossy().into_owned()),
        )
        .map(PathBuf::from);

        Ok(A2pConfig {
            credentials: TwilioCredentials {
                account_sid,
                auth_token,
            },
            endpoints,
            base_url,
            api_key: pick("A2P_API_KEY", file.api_key),
            rate_limit,
            activity_capacity,
            data_file,
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        reason: format!("'{}' is not a non-negative integer", raw),
    })
}
