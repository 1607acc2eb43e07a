//! Fetch failures: logged when raised, rendered in the user's language.

use std::error::Error as StdError;
use std::fmt;
use tracing::{Level, debug, error, info, trace, warn};

use crate::config;
use crate::i18n;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub struct WebError {
    /// Human-readable name, also the catalog key once normalised
    /// ("status code error" → `status_code_error`).
    pub error_name: String,
    pub status: Option<u16>,
    pub url: Option<String>,
    pub base_error: Option<BoxError>,
    cause_kind: Option<String>,
    /// "<cause kind>, <status>", either part omitted when missing.
    detail: String,
}

impl WebError {
    pub fn builder(error_name: impl Into<String>) -> WebErrorBuilder {
        WebErrorBuilder {
            error_name: error_name.into(),
            status: None,
            url: None,
            base_error: None,
            cause_kind: None,
            level: Level::DEBUG,
        }
    }

    /// Shorthand for an error with no status, URL or cause, logged at DEBUG.
    pub fn new(error_name: impl Into<String>) -> Self {
        Self::builder(error_name).build()
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn cause_kind(&self) -> Option<&str> {
        self.cause_kind.as_deref()
    }

    /// Catalog key: lowercased, spaces to underscores.
    pub fn error_key(&self) -> String {
        self.error_name.to_lowercase().replace(' ', "_")
    }

    /// "ERROR: Network error (ConnectError, 502)"
    pub fn i18n_message(&self, lang: Option<&str>) -> String {
        let message = i18n::catalog().get(lang, &self.error_key());
        let detail = (!self.detail.is_empty()).then(|| format!("({})", self.detail));
        join_snips(" ", [Some("ERROR:".to_string()), Some(message), detail])
    }
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.i18n_message(None))
    }
}

impl fmt::Debug for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebError")
            .field("error_name", &self.error_name)
            .field("status", &self.status)
            .field("url", &self.url)
            .field("cause_kind", &self.cause_kind)
            .field("base_error", &self.base_error)
            .finish()
    }
}

impl StdError for WebError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.base_error
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

pub struct WebErrorBuilder {
    error_name: String,
    status: Option<u16>,
    url: Option<String>,
    base_error: Option<BoxError>,
    cause_kind: Option<String>,
    level: Level,
}

impl WebErrorBuilder {
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attach the underlying error. Its kind defaults to the short type name.
    pub fn cause<E>(mut self, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        if self.cause_kind.is_none() {
            self.cause_kind = Some(short_type_name::<E>().to_string());
        }
        self.base_error = Some(Box::new(err));
        self
    }

    /// Override the kind shown for the cause (useful when the type name says
    /// nothing, e.g. every reqwest failure is `reqwest::Error`).
    pub fn cause_kind(mut self, kind: impl Into<String>) -> Self {
        self.cause_kind = Some(kind.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Finish the error and log it.
    pub fn build(self) -> WebError {
        let status = self.status.map(|s| s.to_string());
        let detail = join_snips(", ", [self.cause_kind.clone(), status]);
        let reason = join_snips(", ", [Some(self.error_name.clone()), Some(detail.clone())]);
        let msg = join_snips(
            ": ",
            [Some(format!("Fetch failed ({reason})")), self.url.clone()],
        );

        let with_cause = self.level == Level::ERROR || config::is_debug();
        let cause = self
            .base_error
            .as_deref()
            .filter(|_| with_cause)
            .map(|e| error_chain(e));
        log_at(self.level, &msg, cause.as_deref());

        WebError {
            error_name: self.error_name,
            status: self.status,
            url: self.url,
            base_error: self.base_error,
            cause_kind: self.cause_kind,
            detail,
        }
    }
}

fn log_at(level: Level, msg: &str, cause: Option<&str>) {
    match (level, cause) {
        (Level::ERROR, Some(cause)) => error!(cause = %cause, "{}", msg),
        (Level::ERROR, None) => error!("{}", msg),
        (Level::WARN, Some(cause)) => warn!(cause = %cause, "{}", msg),
        (Level::WARN, None) => warn!("{}", msg),
        (Level::INFO, Some(cause)) => info!(cause = %cause, "{}", msg),
        (Level::INFO, None) => info!("{}", msg),
        (Level::DEBUG, Some(cause)) => debug!(cause = %cause, "{}", msg),
        (Level::DEBUG, None) => debug!("{}", msg),
        (_, Some(cause)) => trace!(cause = %cause, "{}", msg),
        (_, None) => trace!("{}", msg),
    }
}

/// "outer: middle: root"
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }
    chain
}

/// Join the non-empty parts with `sep`.
fn join_snips<I>(sep: &str, snips: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    snips
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// `std::io::Error` → "Error", `my::Thing<T>` → "Thing".
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
