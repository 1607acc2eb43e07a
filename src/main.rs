mod config;
mod i18n;
mod models;
mod pipeline;
mod utils;
mod web;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

use crate::config::AppConfig;
use crate::i18n::MessageCatalog;
use crate::models::FeedMeta;
use crate::pipeline::{FeedTarget, PollOutcome, poll_once};
use crate::web::cookie_jar::LazyCookieJar;
use crate::web::{HttpClient, WebResponse, parse_http_or_iso_date};

#[derive(Parser)]
#[command(name = "rsstt-web", about = "Feed fetch diagnostics: caching, scheduling, proxy rules", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch feeds and show what their caching headers say about the next check
    Fetch {
        /// Feed URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Feed generator, e.g. RSSHub
        #[arg(long)]
        generator: Option<String>,

        /// Feed-level updated timestamp
        #[arg(long)]
        updated: Option<String>,

        /// Feed TTL in minutes
        #[arg(long)]
        ttl: Option<String>,

        /// Language for error messages (default: configured lang)
        #[arg(long)]
        lang: Option<String>,

        /// Cookie to send, as a Set-Cookie string, e.g. "session=abc; Path=/" (repeatable)
        #[arg(long = "cookie")]
        cookies: Vec<String>,
    },

    /// Tell whether a destination bypasses the configured proxy
    Bypass {
        target: String,

        /// Treat the target as a bare hostname rather than a URL
        #[arg(long)]
        host: bool,
    },

    /// Parse an HTTP (RFC 2822) or ISO 8601 timestamp
    Date { value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let verbosity = if config.debug { cli.verbose.max(1) } else { cli.verbose };
    let filter = match verbosity {
        0 => "rsstt_web=info,warn",
        1 => "rsstt_web=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    config::set_debug(config.debug);
    install_catalog(&config)?;

    match cli.command {
        Command::Fetch { urls, generator, updated, ttl, lang, cookies } => {
            let _t = utils::Timer::start(format!("Fetching {} feed(s)", urls.len()));
            let meta = FeedMeta::new(generator, updated, ttl);

            let client = Arc::new(
                HttpClient::new(&config.web).context("Failed to set up HTTP client")?,
            );
            seed_cookies(client.cookie_jar(), &urls, &cookies);

            let targets = urls
                .into_iter()
                .map(|url| FeedTarget { url, meta: meta.clone() })
                .collect();
            let outcomes = poll_once(client.clone(), config.poll.clone(), targets).await?;

            let lang = lang.as_deref().unwrap_or(&config.lang);
            for outcome in &outcomes {
                print_outcome(outcome, lang);
            }
            println!("─────────────────────────────────");
            let jar = client.cookie_jar();
            if jar.is_empty() {
                println!("  Cookies       : none");
            } else {
                println!("  Cookies       : {} stored", jar.len());
            }
        }

        Command::Bypass { target, host } => {
            let rules = config.web.proxy_bypass();
            if !rules.is_enabled() {
                info!("No proxy bypass rules configured");
            }
            if config.web.proxy.is_none() {
                warn!("No proxy configured; the decision below is hypothetical");
            }
            let verdict = if rules.should_bypass(&target, !host) { "direct" } else { "via proxy" };
            println!("{}: {}", target, verdict);
        }

        Command::Date { value } => {
            match parse_http_or_iso_date(Some(&value)) {
                Some(dt) => println!("{}", dt.to_rfc3339()),
                None => println!("—"),
            }
        }
    }

    Ok(())
}

fn install_catalog(config: &AppConfig) -> Result<()> {
    let catalog = match &config.i18n_path {
        Some(path) => MessageCatalog::load(path)?,
        None => MessageCatalog::builtin(),
    };
    if i18n::install(catalog.with_default_lang(config.lang.as_str())).is_err() {
        warn!("Message catalog already initialised");
    }
    Ok(())
}

/// Pre-load the jar with user-supplied cookies for every target URL.
fn seed_cookies(jar: &LazyCookieJar, urls: &[String], cookies: &[String]) {
    if cookies.is_empty() {
        return;
    }
    for raw in urls {
        match Url::parse(raw) {
            Ok(url) => cookies.iter().for_each(|c| jar.add_cookie_str(c, &url)),
            Err(e) => warn!("Not seeding cookies for {}: {}", raw, e),
        }
    }
}

fn print_outcome(outcome: &PollOutcome, lang: &str) {
    let feed = &outcome.feed;
    let now = Utc::now();
    println!("─────────────────────────────────");
    println!("  {}", feed.ori_url);
    if feed.url != feed.ori_url {
        println!("  → {}", feed.url);
    }
    println!("─────────────────────────────────");

    if let Some(status) = feed.status {
        println!("  Status        : {} {}", status, feed.reason.as_deref().unwrap_or_default());
    }
    if let Some(err) = &feed.error {
        println!("  {}", err.i18n_message(Some(lang)));
    }
    if let Some(resp) = &feed.web_response {
        print_cache_view(resp);
    }

    let source = if outcome.deferred { "server-side cache" } else { "default interval" };
    println!(
        "  Next check    : {} ({}, {})",
        outcome.next_check.to_rfc3339(),
        utils::fmt_relative(outcome.next_check, now),
        source
    );
}

fn print_cache_view(resp: &WebResponse) {
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "—".into());
    if resp.is_not_modified() {
        println!("  Revalidated   : not modified");
    }
    println!("  Body          : {} bytes", resp.content.as_ref().map_or(0, Vec::len));
    println!("  ETag          : {}", or_dash(resp.etag().map(str::to_string)));
    println!("  Date          : {}", resp.date().to_rfc3339());
    println!("  Last-Modified : {}", resp.last_modified().to_rfc3339());
    println!("  max-age       : {}", or_dash(resp.max_age().map(|v| v.to_string())));
    println!("  Age           : {}", or_dash(resp.age().map(|v| v.to_string())));
    println!("  Remaining     : {}", or_dash(resp.age_remaining().map(|v| format!("{}s", v))));
    println!("  Expires       : {}", or_dash(resp.expires().map(|v| v.to_rfc3339())));
    println!(
        "  Edge cache    : {}",
        or_dash(resp.header(web::feed::CF_CACHE_STATUS).map(str::to_string))
    );
}
