use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.elapsed()
        );
    }
}

/// Time from `now` until `at`, coarse and human-sized.
/// 3725s → "in 1h 2m" | 45s → "in 45s" | past → "3m ago"
pub fn fmt_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (at - now).num_seconds();
    let span = fmt_span(secs.unsigned_abs());
    if secs < 0 {
        format!("{} ago", span)
    } else {
        format!("in {}", span)
    }
}

fn fmt_span(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) if s == 0 => format!("{}m", m),
        (0, _) => format!("{}m {}s", m, s),
        (_, 0) => format!("{}h", h),
        _ => format!("{}h {}m", h, m),
    }
}
