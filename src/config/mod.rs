use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use url::Url;

use crate::web::proxy::ProxyBypass;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub poll: PollConfig,

    /// Verbose logging, and fetch errors carry their full cause chain.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub debug: bool,

    #[serde(default = "default_lang")]
    pub lang: String,

    /// Extra/overriding messages, see [`crate::i18n::MessageCatalog::load`].
    #[serde(default)]
    pub i18n_path: Option<PathBuf>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// `http://`, `https://` or `socks5://` proxy for all fetches.
    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub proxy_bypass_private: bool,

    #[serde(default, deserialize_with = "lenient_list")]
    pub proxy_bypass_domains: Vec<String>,
}

/// Poll cycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Used when the server gives no reason to wait longer.
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid proxy URL {url:?}: {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_lang() -> String {
    crate::i18n::DEFAULT_LANG.to_string()
}
fn default_user_agent() -> String {
    concat!("RSStT-web/", env!("CARGO_PKG_VERSION"), " RSS Reader").to_string()
}
fn default_timeout_secs() -> u64 {
    12
}
fn default_max_retries() -> usize {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    250
}
fn default_concurrency() -> usize {
    16
}
fn default_interval_secs() -> i64 {
    600
}

// ── Lenient env values ───────────────────────────────────────────────────────

const FALSE_WORDS: [&str; 10] = [
    "FALSE", "NONE", "NULL", "NO", "NOT", "DISABLE", "DISABLED", "INACTIVE", "DEACTIVATED", "OFF",
];
const TRUE_WORDS: [&str; 8] = [
    "TRUE", "YES", "OK", "ENABLE", "ENABLED", "ACTIVE", "ACTIVATED", "ON",
];

/// "1" | "yes" | "Enabled" → true, "0" | "off" | "-3" → false, junk → `default`
pub fn parse_bool(s: &str, default: bool) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return default;
    }
    if let Ok(n) = s.parse::<i64>() {
        return n > 0;
    }
    let s = s.to_uppercase();
    if FALSE_WORDS.contains(&s.as_str()) {
        false
    } else if TRUE_WORDS.contains(&s.as_str()) {
        true
    } else {
        default
    }
}

/// Split on whitespace, commas and semicolons (ASCII or full-width).
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '，' | '；'))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Int(i64),
    Str(String),
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match BoolLike::deserialize(deserializer)? {
        BoolLike::Bool(b) => b,
        BoolLike::Int(n) => n > 0,
        BoolLike::Str(s) => parse_bool(&s, false),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListLike {
    List(Vec<String>),
    Str(String),
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match ListLike::deserialize(deserializer)? {
        ListLike::List(items) => items.iter().flat_map(|s| parse_list(s)).collect(),
        ListLike::Str(s) => parse_list(&s),
    })
}

// ── Global debug flag ────────────────────────────────────────────────────────

static DEBUG: AtomicBool = AtomicBool::new(false);

pub fn set_debug(on: bool) {
    DEBUG.store(on, Ordering::Relaxed);
}

pub fn is_debug() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("RSSTT").separator("__"))
            .build()?;

        Self::from_config(cfg)
    }

    /// Any value that does not deserialize fails the whole load.
    pub fn from_config(cfg: config::Config) -> Result<Self> {
        cfg.try_deserialize().context("Invalid configuration")
    }
}

impl WebConfig {
    pub fn proxy_url(&self) -> Result<Option<Url>, ConfigError> {
        let Some(raw) = self.proxy.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        Url::parse(raw)
            .map(Some)
            .map_err(|source| ConfigError::InvalidProxy {
                url: raw.to_string(),
                source,
            })
    }

    pub fn proxy_bypass(&self) -> ProxyBypass {
        ProxyBypass::new(self.proxy_bypass_private, &self.proxy_bypass_domains)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            proxy: None,
            proxy_bypass_private: false,
            proxy_bypass_domains: Vec::new(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            default_interval_secs: default_interval_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            poll: PollConfig::default(),
            debug: false,
            lang: default_lang(),
            i18n_path: None,
        }
    }
}
