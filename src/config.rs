//! Crawl configuration: every knob the CLI exposes, generalizing the
//! teacher's `CrawlerConfig`/`CrawlerBuilder` pair to this crate's surface.

use reqwest::Url;

use crate::agent::UserAgent;
use crate::error::CrawlError;
use crate::robots::RobotsConfig;

const DEFAULT_HOST_AGENT: &str = "crawlkit";
const DEFAULT_ROBOT_AGENT: &str = "crawlkit";

/// Which reports a run should emit.
#[derive(Debug, Clone, Copy)]
pub struct ReportSelection {
    pub sitemap: bool,
    pub metrics: bool,
}

impl Default for ReportSelection {
    fn default() -> Self {
        Self { sitemap: true, metrics: false }
    }
}

/// Fully resolved configuration for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seed: Url,
    pub debug: bool,
    pub follow_redirects: bool,
    pub user_agent: UserAgent,
    pub same_domain_filter: bool,
    pub use_robots: bool,
    pub use_crawl_delay: bool,
    pub reports: ReportSelection,
}

pub struct CrawlConfigBuilder {
    seed: Option<Url>,
    debug: bool,
    follow_redirects: bool,
    host_agent: String,
    robot_agent: String,
    same_domain_filter: bool,
    use_robots: bool,
    use_crawl_delay: bool,
    reports: ReportSelection,
}

impl Default for CrawlConfigBuilder {
    fn default() -> Self {
        Self {
            seed: None,
            debug: false,
            follow_redirects: true,
            host_agent: DEFAULT_HOST_AGENT.to_string(),
            robot_agent: DEFAULT_ROBOT_AGENT.to_string(),
            same_domain_filter: true,
            use_robots: true,
            use_crawl_delay: false,
            reports: ReportSelection::default(),
        }
    }
}

impl CrawlConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: Url) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    pub fn with_host_agent<S: Into<String>>(mut self, agent: S) -> Self {
        self.host_agent = agent.into();
        self
    }

    pub fn with_robot_agent<S: Into<String>>(mut self, agent: S) -> Self {
        self.robot_agent = agent.into();
        self
    }

    pub fn with_same_domain_filter(mut self, enabled: bool) -> Self {
        self.same_domain_filter = enabled;
        self
    }

    pub fn with_robots(mut self, enabled: bool) -> Self {
        self.use_robots = enabled;
        self
    }

    pub fn with_crawl_delay(mut self, enabled: bool) -> Self {
        self.use_crawl_delay = enabled;
        self
    }

    pub fn with_reports(mut self, reports: ReportSelection) -> Self {
        self.reports = reports;
        self
    }

    pub fn build(self) -> Result<CrawlConfig, CrawlError> {
        let seed = self
            .seed
            .ok_or_else(|| CrawlError::Config("missing seed URL".to_string()))?;

        Ok(CrawlConfig {
            seed,
            debug: self.debug,
            follow_redirects: self.follow_redirects,
            user_agent: UserAgent { host_agent: self.host_agent, robot_agent: self.robot_agent },
            same_domain_filter: self.same_domain_filter,
            use_robots: self.use_robots,
            use_crawl_delay: self.use_crawl_delay,
            reports: self.reports,
        })
    }
}

impl CrawlConfig {
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder::new()
    }

    /// The `RobotsConfig` to hand to the engine, or `None` if robots
    /// handling is disabled entirely.
    pub fn robots_config(&self) -> Option<RobotsConfig> {
        if !self.use_robots {
            return None;
        }
        Some(RobotsConfig {
            robot_agent: self.user_agent.robot_agent.clone(),
            use_crawl_delay: self.use_crawl_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_a_seed() {
        let result = CrawlConfigBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn defaults_match_the_documented_cli_defaults() {
        let seed = Url::parse("http://url.com/").unwrap();
        let config = CrawlConfigBuilder::new().with_seed(seed).build().unwrap();
        assert!(config.follow_redirects);
        assert!(config.same_domain_filter);
        assert!(config.use_robots);
        assert!(!config.use_crawl_delay);
        assert!(config.reports.sitemap);
        assert!(!config.reports.metrics);
    }

    #[test]
    fn disabling_robots_drops_the_robots_config() {
        let seed = Url::parse("http://url.com/").unwrap();
        let config = CrawlConfigBuilder::new()
            .with_seed(seed)
            .with_robots(false)
            .build()
            .unwrap();
        assert!(config.robots_config().is_none());
    }
}
