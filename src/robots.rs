//! Per-host robots.txt fetch-once, test-path, optional crawl-delay gate.
//!
//! Robots.txt parsing itself is an external collaborator — `texting_robots`
//! is consumed purely as "given host+path+agent -> allowed? + crawl delay",
//! exactly the contract spec.md describes. `Robot::allowed(path)` plays the
//! role of the spec's "group.test(path)", and `Robot.delay` plays the role
//! of "group.crawl_delay".

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use texting_robots::Robot;

use crate::agent::{AgentContext, AgentKind, AgentPool};
use crate::cache::{MetricCache, RobotsEntry};
use crate::error::CrawlError;

/// Outcome of consulting the gate for a candidate URL.
pub enum RobotsDecision {
    /// The URL may be fetched. `delay` is `Some` iff the gate is configured
    /// to honor `Crawl-Delay` and the host's robots data specifies one.
    Allowed { delay: Option<Duration> },
    /// The URL is disallowed for the configured robot agent.
    Disallowed,
}

/// The two knobs an engine needs to stand up a `RobotsGate` once it has
/// created its shared `MetricCache` and `AgentPool`.
pub struct RobotsConfig {
    pub robot_agent: String,
    pub use_crawl_delay: bool,
}

pub struct RobotsGate {
    cache: Arc<MetricCache>,
    pool: Arc<AgentPool>,
    robot_agent: String,
    use_crawl_delay: bool,
}

impl RobotsGate {
    pub fn new(
        cache: Arc<MetricCache>,
        pool: Arc<AgentPool>,
        robot_agent: String,
        use_crawl_delay: bool,
    ) -> Self {
        Self { cache, pool, robot_agent, use_crawl_delay }
    }

    /// Decide whether `url` may be fetched, fetching and parsing the host's
    /// `robots.txt` at most once per host.
    #[tracing::instrument(skip(self))]
    pub async fn check(&self, url: &Url) -> Result<RobotsDecision, CrawlError> {
        let host = url
            .host_str()
            .ok_or_else(|| CrawlError::Config("URL has no host".to_string()))?
            .to_string();

        let entry = match self.cache.robots_get(&host).await {
            Some(entry) => entry,
            None => self.fetch_and_store(url, &host).await?,
        };

        Ok(self.decide(&entry, url))
    }

    async fn fetch_and_store(
        &self,
        url: &Url,
        host: &str,
    ) -> Result<Arc<RobotsEntry>, CrawlError> {
        let robots_url = {
            let mut u = url.clone();
            u.set_path("/robots.txt");
            u.set_query(None);
            u.set_fragment(None);
            u
        };

        let mut entry = RobotsEntry::new();
        entry.metric().inc_requested();

        let agent = self.pool.get();
        let ctx = AgentContext::new(robots_url);
        let response = agent.request(&ctx, AgentKind::Robot).await;
        self.pool.put(agent);

        entry.robot = match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if status >= 500 {
                    // Treated as allow-all: the group is simply empty.
                    tracing::debug!("robots.txt 5xx, treating as permissive {{ host: {host}, status: {status} }}.");
                    entry.metric().inc_errored();
                    None
                } else if (200..500).contains(&status) {
                    match resp.bytes().await {
                        Ok(body) => match Robot::new(&self.robot_agent, &body) {
                            Ok(robot) => {
                                entry.metric().inc_received();
                                Some(robot)
                            }
                            Err(err) => {
                                tracing::debug!("Failed parsing robots.txt {{ host: {host}, err: {err} }}.");
                                entry.metric().inc_errored();
                                None
                            }
                        },
                        Err(err) => {
                            tracing::debug!("Failed reading robots.txt body {{ host: {host}, err: {err} }}.");
                            entry.metric().inc_errored();
                            None
                        }
                    }
                } else {
                    tracing::debug!("Unexpected robots.txt status {{ host: {host}, status: {status} }}.");
                    entry.metric().inc_errored();
                    None
                }
            }
            Err(err) => {
                tracing::debug!("Transport error fetching robots.txt {{ host: {host}, err: {err} }}.");
                entry.metric().inc_errored();
                None
            }
        };

        Ok(self.cache.robots_set(host.to_string(), Arc::new(entry)).await)
    }

    fn decide(&self, entry: &RobotsEntry, url: &Url) -> RobotsDecision {
        let allowed = match &entry.robot {
            Some(robot) => robot.allowed(url.as_str()),
            // No robots data (never fetched successfully, or a 5xx): permissive.
            None => true,
        };

        if !allowed {
            return RobotsDecision::Disallowed;
        }

        let delay = if self.use_crawl_delay {
            entry
                .robot
                .as_ref()
                .and_then(|r| r.delay)
                .map(|secs| Duration::from_secs(secs as u64))
        } else {
            None
        };

        RobotsDecision::Allowed { delay }
    }
}
