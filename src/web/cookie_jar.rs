//! Cookie store that costs nothing until a server actually sets a cookie.
//!
//! Feeds and media files rarely come with cookies, so a full store is only
//! allocated on the first `Set-Cookie`. From then on every call is delegated to
//! it; there is no way back.

use cookie_store::{CookieStore as Store, RawCookie};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};
use url::Url;

#[derive(Default)]
pub struct LazyCookieJar {
    real: OnceLock<RwLock<Store>>,
}

impl fmt::Debug for LazyCookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCookieJar")
            .field("upgraded", &self.is_upgraded())
            .field("len", &self.len())
            .finish()
    }
}

impl LazyCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the real store has been allocated.
    pub fn is_upgraded(&self) -> bool {
        self.real.get().is_some()
    }

    /// Number of unexpired cookies held. Zero while dummy.
    pub fn len(&self) -> usize {
        self.read().map_or(0, |store| store.iter_unexpired().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a single `Set-Cookie` string for `url`.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        match RawCookie::parse(cookie) {
            Ok(raw) => self.write().store_response_cookies(std::iter::once(raw.into_owned()), url),
            Err(e) => warn!("Ignoring malformed cookie for {}: {}", url, e),
        }
    }

    /// Drop every stored cookie. The store itself stays allocated.
    #[allow(dead_code)]
    pub fn clear(&self) {
        if let Some(lock) = self.real.get() {
            lock.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    /// Concurrent first writers race on the `OnceLock`; exactly one store wins.
    fn upgrade(&self) -> &RwLock<Store> {
        self.real.get_or_init(|| {
            debug!("First cookie received, switching to a real cookie store");
            RwLock::new(Store::default())
        })
    }

    fn read(&self) -> Option<RwLockReadGuard<'_, Store>> {
        let lock = self.real.get()?;
        Some(lock.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.upgrade().write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for LazyCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut cookie_headers = cookie_headers.peekable();
        if cookie_headers.peek().is_none() {
            return;
        }
        let parsed = cookie_headers.filter_map(|value| {
            let raw = value.to_str().ok()?;
            RawCookie::parse(raw).map(RawCookie::into_owned).ok()
        });
        self.write().store_response_cookies(parsed, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let store = self.read()?;
        let header = store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}
