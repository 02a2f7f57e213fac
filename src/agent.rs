//! HTTP requesters bound to the shared client and user-agent pair, plus a
//! small object pool of them.
//!
//! Pooling here is an optimization, not a correctness mechanism (DESIGN
//! NOTES, "Pool of agents") — a direct shared `Agent` with per-request state
//! on the stack would be equally correct. The pool exists only to amortize
//! per-request allocation, mirroring the Go source's `sync.Pool` of peers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Response};
use tokio::sync::Notify;

use crate::error::CrawlError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The two user-agent strings a crawl uses: one for content fetches, one
/// for robots.txt fetches.
#[derive(Debug, Clone)]
pub struct UserAgent {
    pub host_agent: String,
    pub robot_agent: String,
}

/// Which user-agent string a request should present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Host,
    Robot,
}

/// Per-request bundle: URL, cancelation handle, and timeout. Owned by the
/// caller for the lifetime of one request.
pub struct AgentContext {
    pub url: reqwest::Url,
    pub timeout: Duration,
    cancelled: AtomicBool,
    notify: Notify,
}

impl AgentContext {
    pub fn new(url: reqwest::Url) -> Self {
        Self {
            url,
            timeout: DEFAULT_TIMEOUT,
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Cancel this request. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn cancellation(&self) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        self.notify.notified().await;
    }
}

/// Wraps the shared `reqwest::Client` with the user-agent pair to use.
#[derive(Clone)]
pub struct Agent {
    client: Client,
    user_agent: Arc<UserAgent>,
}

impl Agent {
    fn new(client: Client, user_agent: Arc<UserAgent>) -> Self {
        Self { client, user_agent }
    }

    /// Perform a `GET` with the User-Agent header for `kind`, honoring the
    /// context's timeout and cancelation handle.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn request(
        &self,
        ctx: &AgentContext,
        kind: AgentKind,
    ) -> Result<Response, CrawlError> {
        let agent_string = match kind {
            AgentKind::Host => &self.user_agent.host_agent,
            AgentKind::Robot => &self.user_agent.robot_agent,
        };

        let request = self
            .client
            .get(ctx.url.clone())
            .header(reqwest::header::USER_AGENT, agent_string.as_str())
            .timeout(ctx.timeout)
            .send();

        tokio::select! {
            result = request => Ok(result?),
            _ = ctx.cancellation() => {
                tracing::debug!("Request cancelled {{ url: {} }}.", ctx.url);
                Err(CrawlError::Interrupted)
            }
        }
    }
}

/// A small pool of `Agent`s sharing one `Client` and `UserAgent` pair.
pub struct AgentPool {
    client: Client,
    user_agent: Arc<UserAgent>,
    idle: Mutex<Vec<Agent>>,
}

impl AgentPool {
    pub fn new(client: Client, user_agent: UserAgent) -> Self {
        Self {
            client,
            user_agent: Arc::new(user_agent),
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Take an agent from the pool, or create one if the pool is empty.
    pub fn get(&self) -> Agent {
        if let Some(agent) = self.idle.lock().unwrap().pop() {
            agent
        } else {
            Agent::new(self.client.clone(), self.user_agent.clone())
        }
    }

    /// Return an agent to the pool for reuse.
    pub fn put(&self, agent: Agent) {
        self.idle.lock().unwrap().push(agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reuses_returned_agents() {
        let pool = AgentPool::new(
            Client::new(),
            UserAgent { host_agent: "a".into(), robot_agent: "b".into() },
        );
        assert_eq!(pool.idle.lock().unwrap().len(), 0);
        let agent = pool.get();
        pool.put(agent);
        assert_eq!(pool.idle.lock().unwrap().len(), 1);
        let _ = pool.get();
        assert_eq!(pool.idle.lock().unwrap().len(), 0);
    }
}
