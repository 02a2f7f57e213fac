//! `crawlkit` is a concurrent single-domain web crawler: given a seed URL it
//! discovers every reachable page on the seed's host, obeys per-host
//! `robots.txt` rules, records per-URL telemetry, and emits a site graph
//! plus a metrics table.
//!
//! The crawl engine (`engine`) and the document walker (`document`) are the
//! core; CLI parsing, logging setup, the static test-site fixture, the HTTP
//! transport, HTML tokenization, and robots.txt parsing are all external
//! collaborators, used here via `clap`, `tracing`, `axum`, `reqwest`,
//! `scraper`, and `texting_robots` respectively.

pub mod agent;
pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod filter;
pub mod gauge;
pub mod metric;
pub mod report;
pub mod robots;
pub mod static_site;
