//! Poll cycle: fetch a batch of feeds concurrently and decide when each one
//! is due again.
//!
//! A feed is due again at the server-side cache hint from
//! [`WebFeed::calc_next_check`] when there is one, else after the configured
//! default interval. Failed fetches always fall back to the default interval.

use crate::config::PollConfig;
use crate::models::FeedMeta;
use crate::web::{FeedFetcher, WebFeed};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct FeedTarget {
    pub url: String,
    pub meta: FeedMeta,
}

#[derive(Debug)]
pub struct PollOutcome {
    pub feed: WebFeed,
    pub next_check: DateTime<Utc>,
    /// Whether `next_check` came from the server's caching rather than the
    /// default interval.
    pub deferred: bool,
}

pub struct Poller {
    fetcher: Arc<dyn FeedFetcher>,
    config: PollConfig,
}

impl Poller {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, config: PollConfig) -> Self {
        Self { fetcher, config }
    }

    pub async fn run(&self, targets: Vec<FeedTarget>) -> (Vec<PollOutcome>, PollStats) {
        let sem = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::new();

        for target in targets {
            let fetcher = Arc::clone(&self.fetcher);
            let sem = Arc::clone(&sem);
            let url = target.url.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;
                let feed = fetcher.fetch(&target.url, None).await;
                Ok::<WebFeed, anyhow::Error>(feed.with_meta(target.meta))
            });

            handles.push((url, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        let mut stats = PollStats::default();

        for (url, handle) in handles {
            let feed = match handle.await {
                Ok(Ok(feed)) => feed,
                Ok(Err(e)) => { warn!("{}: {:#}", url, e); stats.errors += 1; continue; }
                Err(e) => { error!("Task panic for {}: {}", url, e); stats.errors += 1; continue; }
            };
            let outcome = self.schedule(feed, Utc::now());
            stats.record(&outcome);
            outcomes.push(outcome);
        }

        info!(
            "=== Done: {} feeds | {} deferred | {} errors ===",
            stats.feeds_polled, stats.deferred, stats.errors
        );

        (outcomes, stats)
    }

    fn schedule(&self, feed: WebFeed, now: DateTime<Utc>) -> PollOutcome {
        let default_next = now + Duration::seconds(self.config.default_interval_secs.max(0));
        match feed.calc_next_check() {
            Some(at) if at > default_next => PollOutcome { feed, next_check: at, deferred: true },
            _ => PollOutcome { feed, next_check: default_next, deferred: false },
        }
    }
}

/// Poll all targets through the given client.
pub async fn poll_once(
    fetcher: Arc<dyn FeedFetcher>,
    config: PollConfig,
    targets: Vec<FeedTarget>,
) -> Result<Vec<PollOutcome>> {
    if targets.is_empty() {
        anyhow::bail!("nothing to poll");
    }
    let (outcomes, _stats) = Poller::new(fetcher, config).run(targets).await;
    Ok(outcomes)
}

#[derive(Debug, Default)]
pub struct PollStats {
    pub feeds_polled: usize,
    pub deferred: usize,
    pub errors: usize,
}

impl PollStats {
    fn record(&mut self, outcome: &PollOutcome) {
        self.feeds_polled += 1;
        if outcome.deferred {
            self.deferred += 1;
        }
        if outcome.feed.error.is_some() {
            self.errors += 1;
        }
    }
}
