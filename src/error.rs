//! Crate-wide error type.
//!
//! Mirrors the five error kinds from the crawl engine's error handling
//! design: configuration errors are fatal and surfaced at the CLI boundary,
//! the rest are recorded per-URL on a `Metric` and never abort the crawl.

use thiserror::Error;

/// Errors produced by `crawlkit`.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Invalid seed URL, missing seed, or another configuration problem.
    /// Fatal: surfaced with a usage banner and a non-zero exit.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection, TLS, or timeout failure while requesting a URL.
    /// Per-URL: increments `errored` and the crawl continues.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response status outside `[200,300)` for a content fetch, or a `5xx`
    /// robots.txt response. Per-URL, handled like a transport error.
    #[error("unexpected status {0}")]
    Status(u16),

    /// HTML or URL parse failure. Per-URL (content) or per-link (walker);
    /// logged and skipped, never aborts siblings.
    #[error("parse error: {0}")]
    Parse(String),

    /// Surfaces as a non-zero but non-error termination; triggers `close()`.
    #[error("interrupted")]
    Interrupted,

    /// A structural invariant of the engine itself was violated (e.g. the
    /// frontier channel closed while the engine still held a sender). Not
    /// one of the five per-URL/fatal kinds above — this always indicates a
    /// bug rather than a condition encountered while crawling.
    #[error("internal engine error: {0}")]
    Internal(String),
}
