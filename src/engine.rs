//! The frontier loop: dispatch of per-URL fetch tasks, dedup, quiescence,
//! shutdown.
//!
//! This is the hard part of the crawler (spec.md calls it out as THE CORE
//! alongside the document walker). The design follows DESIGN NOTES closely:
//! quiescence is detected via the atomic `Gauge`, never via a closeable
//! queue, and every terminal decision for a URL that was pushed onto the
//! frontier is paired with a `gauge.decrement()` — including filter
//! rejection, robots rejection, cache-hit dedup, and every error branch.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Url;
use scraper::Html;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::agent::{AgentContext, AgentKind, AgentPool};
use crate::cache::MetricCache;
use crate::document::{self, Walker};
use crate::error::CrawlError;
use crate::filter::FilterSet;
use crate::gauge::Gauge;
use crate::robots::{RobotsConfig, RobotsDecision, RobotsGate};

struct Shared {
    cache: Arc<MetricCache>,
    gauge: Gauge,
    pool: Arc<AgentPool>,
    filters: FilterSet,
    robots_gate: Option<RobotsGate>,
    extract_assets: bool,
    frontier_tx: mpsc::UnboundedSender<Url>,
    frontier_rx: Mutex<Option<mpsc::UnboundedReceiver<Url>>>,
    stop_requested: std::sync::atomic::AtomicBool,
    stop_notify: Notify,
    stop_ack: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

/// The crawl engine. Cheap to clone — every clone shares the same frontier,
/// cache, and gauge via an inner `Arc`.
#[derive(Clone)]
pub struct CrawlEngine {
    shared: Arc<Shared>,
}

impl CrawlEngine {
    pub fn new(
        pool: Arc<AgentPool>,
        filters: FilterSet,
        robots: Option<RobotsConfig>,
        extract_assets: bool,
    ) -> Self {
        let (frontier_tx, frontier_rx) = mpsc::unbounded_channel();
        let cache = Arc::new(MetricCache::new());
        let robots_gate = robots.map(|r| {
            RobotsGate::new(cache.clone(), pool.clone(), r.robot_agent, r.use_crawl_delay)
        });
        Self {
            shared: Arc::new(Shared {
                cache,
                gauge: Gauge::new(),
                pool,
                filters,
                robots_gate,
                extract_assets,
                frontier_tx,
                frontier_rx: Mutex::new(Some(frontier_rx)),
                stop_requested: std::sync::atomic::AtomicBool::new(false),
                stop_notify: Notify::new(),
                stop_ack: Mutex::new(None),
            }),
        }
    }

    pub fn cache(&self) -> &MetricCache {
        &self.shared.cache
    }

    /// Push `url` onto the frontier from a dedicated task, so the engine's
    /// consumer can never be starved by a producer awaiting it (see
    /// CONCURRENCY & RESOURCE MODEL, "Deadlock avoidance").
    fn push_frontier(&self, url: Url) {
        let tx = self.shared.frontier_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(url);
        });
    }

    /// Run the crawl from `seed` until quiescent or `close()`d.
    pub async fn run(&self, seed: Url) -> Result<(), CrawlError> {
        self.shared.gauge.increment();
        self.push_frontier(seed);

        let mut rx = self
            .shared
            .frontier_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| CrawlError::Internal("run() called more than once".to_string()))?;

        loop {
            if self.shared.gauge.is_quiescent() {
                break;
            }

            tokio::select! {
                biased;

                _ = self.shared.stop_notify.notified() => {
                    break;
                }

                _ = self.shared.gauge.changed() => {
                    continue;
                }

                popped = rx.recv() => {
                    match popped {
                        Some(url) => self.on_pop(url).await,
                        None => {
                            return Err(CrawlError::Internal(
                                "frontier channel closed unexpectedly".to_string(),
                            ));
                        }
                    }
                }
            }
        }

        if let Some(ack) = self.shared.stop_ack.lock().await.take() {
            let _ = ack.send(());
        }

        Ok(())
    }

    /// Send a shutdown token and wait for the loop to acknowledge it.
    /// Idempotent after natural (quiescent) termination.
    pub async fn close(&self) {
        if self.shared.stop_requested.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        let (tx, rx) = tokio::sync::oneshot::channel();
        *self.shared.stop_ack.lock().await = Some(tx);
        self.shared.stop_notify.notify_one();
        let _ = rx.await;
    }

    #[tracing::instrument(skip(self))]
    async fn on_pop(&self, url: Url) {
        if self.shared.gauge.is_quiescent() {
            // Stray pop after quiescence was reached: the push that put
            // this URL here still owes the gauge a decrement.
            self.shared.gauge.decrement();
            return;
        }

        if !self.shared.filters.valid(&url) {
            tracing::debug!("Rejected by filter {{ url: {url} }}.");
            self.record_filtered(&url).await;
            self.shared.gauge.decrement();
            return;
        }

        if let Some(gate) = &self.shared.robots_gate {
            match gate.check(&url).await {
                Ok(RobotsDecision::Disallowed) => {
                    tracing::debug!("Disallowed by robots.txt {{ url: {url} }}.");
                    self.record_filtered(&url).await;
                    self.shared.gauge.decrement();
                    return;
                }
                Ok(RobotsDecision::Allowed { delay: Some(delay) }) => {
                    tracing::debug!("Sleeping for crawl-delay {{ url: {url}, delay: {delay:?} }}.");
                    tokio::time::sleep(delay).await;
                }
                Ok(RobotsDecision::Allowed { delay: None }) => {}
                // A gate error (e.g. the URL had no host) is treated the
                // same as a disallow: we cannot safely crawl it.
                Err(err) => {
                    tracing::debug!("Robots gate error {{ url: {url}, err: {err} }}.");
                    self.record_filtered(&url).await;
                    self.shared.gauge.decrement();
                    return;
                }
            }
        }

        let engine = self.clone();
        tokio::spawn(async move { engine.fetch(url).await });
    }

    async fn record_filtered(&self, url: &Url) {
        let (metric, _) = self.shared.cache.get_or_create(url.as_str()).await;
        metric.inc_filtered();
    }

    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: Url) {
        let key = url.to_string();
        let (metric, created) = self.shared.cache.get_or_create(&key).await;

        if !created {
            // Raced with another discovery of the same URL between the
            // `exists` check at push time and this `get_or_create`: the
            // entry already existed, so this push is itself one more
            // request for the URL, not a filtered duplicate.
            metric.inc_requested();
            self.shared.gauge.decrement();
            return;
        }

        metric.inc_requested();
        let t0 = Instant::now();

        let agent = self.shared.pool.get();
        let ctx = AgentContext::new(url.clone());
        let result = agent.request(&ctx, AgentKind::Host).await;
        self.shared.pool.put(agent);

        let response = match result {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!("Transport error fetching {{ url: {url}, err: {err} }}.");
                metric.inc_errored();
                self.shared.gauge.decrement();
                return;
            }
        };

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            tracing::debug!("Non-2xx status fetching {{ url: {url}, status: {status} }}.");
            metric.inc_errored();
            self.shared.gauge.decrement();
            return;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!("Failed reading body {{ url: {url}, err: {err} }}.");
                metric.inc_errored();
                self.shared.gauge.decrement();
                return;
            }
        };

        let (links, assets) = match self.extract(&body, &url) {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!("Failed extracting links {{ url: {url}, err: {err} }}.");
                metric.inc_errored();
                self.shared.gauge.decrement();
                return;
            }
        };

        metric.inc_received();
        metric.set_duration(t0.elapsed());
        for asset in assets {
            metric.push_asset(asset.to_string());
        }

        for link in links {
            if !self.shared.filters.valid(&link) {
                continue;
            }
            let link_key = link.to_string();
            if self.shared.cache.exists(&link_key).await {
                if let Some(existing) = self.shared.cache.get(&link_key).await {
                    existing.inc_filtered();
                }
                continue;
            }
            metric.push_link(link.to_string());
            self.shared.gauge.increment();
            self.push_frontier(link);
        }

        self.shared.gauge.decrement();
    }

    /// Parse `body` as HTML and walk it for links (always) and assets (iff
    /// configured), in a single pass when both are requested.
    fn extract(&self, body: &str, base: &Url) -> Result<(Vec<Url>, Vec<Url>), CrawlError> {
        let document = Html::parse_document(body);

        let mut links = Vec::new();
        let mut assets = Vec::new();

        if self.shared.extract_assets {
            let link_walker: Walker<'_> = document::link_visitor(|u| {
                links.push(u);
                Ok(())
            });
            let asset_walker: Walker<'_> = document::asset_visitor(|u| {
                assets.push(u);
                Ok(())
            });
            let mut combined = document::compose(link_walker, asset_walker);
            document::walk(&document, base, &mut combined)?;
        } else {
            let mut link_walker: Walker<'_> = document::link_visitor(|u| {
                links.push(u);
                Ok(())
            });
            document::walk(&document, base, &mut link_walker)?;
        }

        Ok((links, assets))
    }
}
