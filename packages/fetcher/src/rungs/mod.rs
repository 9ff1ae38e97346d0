//! Concrete [`Fetcher`](crate::traits::Fetcher) implementations, one per
//! rung of the escalation ladder.

mod archive;
mod browser;
mod direct_http;
mod tor_http;

pub use archive::ArchiveFetcher;
pub use browser::{BrowserBackend, HeadfulBrowserFetcher, HeadlessBrowserFetcher};
pub use direct_http::DirectHttpFetcher;
pub use tor_http::TorHttpFetcher;
