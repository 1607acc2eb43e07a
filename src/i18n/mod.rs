//! Localized messages for user-facing errors.
//!
//! Catalog file format: `{ "<lang>": { "<key>": "<message>" } }`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_LANG: &str = "en";

const BUILTIN_EN: [(&str, &str); 10] = [
    ("network_error", "Network error"),
    ("timeout", "Request timed out"),
    ("status_code_error", "Unexpected HTTP status code"),
    ("not_rss", "The URL does not point to an RSS/Atom feed"),
    ("rss_parse_fail", "Failed to parse the RSS/Atom feed"),
    ("too_large", "The response is too large"),
    ("invalid_url", "Invalid URL"),
    ("redirect_error", "Too many redirects"),
    ("ssl_error", "TLS handshake failed"),
    ("decode_error", "Failed to decode the response body"),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read message catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed message catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
struct CatalogFile(HashMap<String, HashMap<String, String>>);

#[derive(Debug, Clone)]
pub struct MessageCatalog {
    default_lang: String,
    messages: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    /// English messages for every error the fetch layer raises.
    pub fn builtin() -> Self {
        let en = BUILTIN_EN
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            default_lang: DEFAULT_LANG.to_string(),
            messages: HashMap::from([(DEFAULT_LANG.to_string(), en)]),
        }
    }

    pub fn with_default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = lang.into();
        self
    }

    /// Built-in messages overlaid with the ones from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let path_str = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path_str.clone(),
            source,
        })?;
        let mut catalog = Self::builtin();
        catalog.merge_json(&raw).map_err(|source| CatalogError::Parse {
            path: path_str.clone(),
            source,
        })?;
        info!("Loaded message catalog {} ({} languages)", path_str, catalog.messages.len());
        Ok(catalog)
    }

    pub fn merge_json(&mut self, raw: &str) -> Result<(), serde_json::Error> {
        let CatalogFile(file) = serde_json::from_str(raw)?;
        for (lang, entries) in file {
            self.messages.entry(lang).or_default().extend(entries);
        }
        Ok(())
    }

    /// Message for `key` in `lang`, else in the default language, else the key.
    pub fn get(&self, lang: Option<&str>, key: &str) -> String {
        let lang = lang.unwrap_or(&self.default_lang);
        [lang, self.default_lang.as_str(), DEFAULT_LANG]
            .into_iter()
            .find_map(|l| self.messages.get(l)?.get(key))
            .cloned()
            .unwrap_or_else(|| {
                debug!("No message for {} ({})", key, lang);
                key.to_string()
            })
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

static CATALOG: OnceLock<MessageCatalog> = OnceLock::new();

/// Process-wide catalog; the built-in one unless [`install`] ran first.
pub fn catalog() -> &'static MessageCatalog {
    CATALOG.get_or_init(MessageCatalog::builtin)
}

/// Make `catalog` the process-wide one. Returns it back if one is already in use.
pub fn install(catalog: MessageCatalog) -> Result<(), MessageCatalog> {
    CATALOG.set(catalog)
}
