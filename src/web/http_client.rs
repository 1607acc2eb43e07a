use crate::config::WebConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{Level, debug, info, warn};

use super::cookie_jar::LazyCookieJar;
use super::error::WebError;
use super::feed::WebFeed;
use super::response::WebResponse;

/// Swappable fetch abstraction.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch `url`, revalidating against `previous` when given.
    async fn fetch(&self, url: &str, previous: Option<&WebResponse>) -> WebFeed;
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: WebConfig,
    cookie_jar: Arc<LazyCookieJar>,
}

impl HttpClient {
    pub fn new(config: &WebConfig) -> Result<Self> {
        let cookie_jar = Arc::new(LazyCookieJar::new());

        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Most feeds never set cookies; the jar stays a no-op until one does
            .cookie_provider(Arc::clone(&cookie_jar));

        if let Some(proxy_url) = config.proxy_url()? {
            let bypass = config.proxy_bypass();
            info!(
                "Fetching through {} proxy at {} (bypass rules: {:?})",
                proxy_url.scheme(),
                proxy_url.host_str().unwrap_or_default(),
                bypass
            );
            builder = builder.proxy(reqwest::Proxy::custom(move |url| {
                if bypass.should_bypass_url(url) {
                    None
                } else {
                    Some(proxy_url.clone())
                }
            }));
        }

        let inner = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
            cookie_jar,
        })
    }

    pub fn cookie_jar(&self) -> &LazyCookieJar {
        &self.cookie_jar
    }

    /// Delays of 2×, 4×, 8×… the base delay, jittered, at most `max_retries` of them.
    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_base_delay_ms)
            .map(jitter)
            .take(self.config.max_retries)
    }

    async fn send(&self, url: &str, conditional: HeaderMap) -> reqwest::Result<reqwest::Response> {
        let mut attempt = 0u32;
        RetryIf::start(
            self.retry_strategy(),
            || {
                attempt += 1;
                debug!("GET {} (attempt {})", url, attempt);
                self.inner.get(url).headers(conditional.clone()).send()
            },
            |e: &reqwest::Error| {
                let retry = is_transient(e);
                if retry {
                    warn!("Request to {} failed, retrying: {}", url, e);
                }
                retry
            },
        )
        .await
    }
}

#[async_trait]
impl FeedFetcher for HttpClient {
    async fn fetch(&self, url: &str, previous: Option<&WebResponse>) -> WebFeed {
        let conditional = previous
            .map(WebResponse::conditional_headers)
            .unwrap_or_default();

        let resp = match self.send(url, conditional).await {
            Ok(resp) => resp,
            Err(e) => return WebFeed::from_error(url, transport_error(url, e)),
        };

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let level = if status.is_server_error() { Level::WARN } else { Level::DEBUG };
            let error = WebError::builder("status code error")
                .status(status.as_u16())
                .url(url)
                .level(level)
                .build();
            return WebFeed::from_error(url, error);
        }

        let final_url = resp.url().to_string();
        let headers = resp.headers().clone();
        let reason = status.canonical_reason().map(str::to_string);

        let content = if status == reqwest::StatusCode::NOT_MODIFIED {
            None
        } else {
            match resp.bytes().await {
                Ok(body) => Some(body.to_vec()),
                Err(e) => return WebFeed::from_error(url, transport_error(url, e)),
            }
        };

        debug!(
            "{} → {} ({} bytes)",
            url,
            status,
            content.as_ref().map_or(0, Vec::len)
        );

        let response = WebResponse::new(final_url, url, content, headers, status, reason, Utc::now());
        WebFeed::from_response(response)
    }
}

/// Worth another attempt: the server may answer next time.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || (e.is_request() && !e.is_builder())
}

/// (error name, cause kind) for a reqwest failure.
fn classify(e: &reqwest::Error) -> (&'static str, &'static str) {
    if e.is_builder() {
        ("invalid url", "BuilderError")
    } else if e.is_timeout() {
        ("timeout", "TimeoutError")
    } else if e.is_redirect() {
        ("redirect error", "RedirectError")
    } else if e.is_decode() {
        ("decode error", "DecodeError")
    } else if e.is_connect() {
        ("network error", "ConnectError")
    } else if e.is_body() {
        ("network error", "BodyError")
    } else {
        ("network error", "RequestError")
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> WebError {
    let (name, kind) = classify(&e);
    let builder = WebError::builder(name).url(url).cause_kind(kind);
    let builder = match e.status() {
        Some(status) => builder.status(status.as_u16()),
        None => builder,
    };
    builder.cause(e).build()
}
