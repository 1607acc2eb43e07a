//! HTTP fetch support: caching headers, scheduling hints, proxy rules,
//! cookies and fetch errors.

pub mod cookie_jar;
pub mod dates;
pub mod error;
pub mod feed;
pub mod http_client;
pub mod proxy;
pub mod response;

pub use self::dates::parse_http_or_iso_date;
pub use self::feed::WebFeed;
pub use self::http_client::{FeedFetcher, HttpClient};
pub use self::response::WebResponse;
