//! Canonicalization and aggregation of a cache snapshot into the two TSV
//! reports emitted on stdout.
//!
//! Table-writer formatting is an external collaborator (`spec.md` §1) — this
//! module only canonicalizes and sums; it writes tab-separated values with
//! plain `std::io::Write`, nothing fancier.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

use reqwest::Url;

use crate::cache::MetricCache;
use crate::metric::Metric;

/// Strip query and fragment, keeping scheme+host+path. Idempotent:
/// `canonicalize(canonicalize(u)) == canonicalize(u)`.
pub fn canonicalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

struct SiteRow {
    links: Vec<String>,
    assets: Vec<String>,
}

struct MetricsRow {
    requested: u64,
    received: u64,
    filtered: u64,
    errored: u64,
    total_duration: Duration,
}

impl MetricsRow {
    fn merge(&mut self, m: &Metric) {
        self.requested += m.requested();
        self.received += m.received();
        self.filtered += m.filtered();
        self.errored += m.errored();
        if let Some(d) = m.duration() {
            self.total_duration += d;
        }
    }

    fn avg_duration_ms(&self) -> u128 {
        let divisor = self.received.max(1) as u128;
        self.total_duration.as_millis() / divisor
    }
}

/// Both reports, built from one consistent snapshot of the cache.
pub struct Reports {
    site_order: Vec<String>,
    site_rows: HashMap<String, SiteRow>,
    metrics_order: Vec<String>,
    metrics_rows: HashMap<String, MetricsRow>,
}

impl Reports {
    /// Take a snapshot of `cache` and aggregate it by canonical URL. Rows
    /// are emitted in first-seen order of their canonical key.
    pub async fn build(cache: &MetricCache) -> Self {
        let mut site_order = Vec::new();
        let mut site_rows: HashMap<String, SiteRow> = HashMap::new();
        let mut metrics_order = Vec::new();
        let mut metrics_rows: HashMap<String, MetricsRow> = HashMap::new();

        for (key, metric) in cache.snapshot().await {
            let canon = canonicalize(&key);

            let site = site_rows.entry(canon.clone()).or_insert_with(|| {
                site_order.push(canon.clone());
                SiteRow { links: Vec::new(), assets: Vec::new() }
            });
            site.links.extend(metric.ref_links());
            site.assets.extend(metric.ref_assets());

            let row = metrics_rows.entry(canon.clone()).or_insert_with(|| {
                metrics_order.push(canon.clone());
                MetricsRow {
                    requested: 0,
                    received: 0,
                    filtered: 0,
                    errored: 0,
                    total_duration: Duration::ZERO,
                }
            });
            row.merge(&metric);
        }

        Self { site_order, site_rows, metrics_order, metrics_rows }
    }

    /// `URL`, `Ref Links`, `Ref Assets` — one row per canonical page, links
    /// and assets joined with `, ` in discovery order.
    pub fn write_site_report<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "URL\tRef Links\tRef Assets")?;
        for key in &self.site_order {
            let row = &self.site_rows[key];
            writeln!(w, "{}\t{}\t{}", key, row.links.join(", "), row.assets.join(", "))?;
        }
        Ok(())
    }

    /// `URL`, `Avg Duration (ms)`, `Requested`, `Received`, `Filtered`,
    /// `Errored`, plus a trailing `Totals` row carrying `wall_clock`.
    pub fn write_metrics_report<W: Write>(&self, mut w: W, wall_clock: Duration) -> io::Result<()> {
        writeln!(w, "URL\tAvg Duration (ms)\tRequested\tReceived\tFiltered\tErrored")?;
        let mut totals = (0u64, 0u64, 0u64, 0u64);
        for key in &self.metrics_order {
            let row = &self.metrics_rows[key];
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}",
                key,
                row.avg_duration_ms(),
                row.requested,
                row.received,
                row.filtered,
                row.errored,
            )?;
            totals.0 += row.requested;
            totals.1 += row.received;
            totals.2 += row.filtered;
            totals.3 += row.errored;
        }
        writeln!(
            w,
            "Totals\t{}\t{}\t{}\t{}\t{}",
            wall_clock.as_millis(),
            totals.0,
            totals.1,
            totals.2,
            totals.3,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_query_and_fragment() {
        assert_eq!(canonicalize("http://a.com/p?x=1#y"), "http://a.com/p");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize("http://a.com/p?x=1");
        let twice = canonicalize(&once);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn duplicate_queries_aggregate_under_one_canonical_row() {
        let cache = MetricCache::new();
        let (m1, _) = cache.get_or_create("http://a.com/p?x=1").await;
        m1.inc_requested();
        m1.inc_received();
        let (m2, _) = cache.get_or_create("http://a.com/p?y=2").await;
        m2.inc_requested();
        m2.inc_errored();

        let reports = Reports::build(&cache).await;
        assert_eq!(reports.metrics_order.len(), 1);
        let row = &reports.metrics_rows["http://a.com/p"];
        assert_eq!(row.requested, 2);
        assert_eq!(row.received, 1);
        assert_eq!(row.errored, 1);
    }

    #[tokio::test]
    async fn metrics_report_totals_row_includes_errored() {
        let cache = MetricCache::new();
        let (m1, _) = cache.get_or_create("http://a.com/p").await;
        m1.inc_requested();
        m1.inc_errored();
        let (m2, _) = cache.get_or_create("http://a.com/q").await;
        m2.inc_requested();
        m2.inc_errored();

        let reports = Reports::build(&cache).await;
        let mut out = Vec::new();
        reports.write_metrics_report(&mut out, Duration::from_millis(500)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let totals_line = text.lines().last().unwrap();
        assert_eq!(totals_line, "Totals\t500\t2\t0\t0\t2");
    }

    #[tokio::test]
    async fn site_report_preserves_link_order_across_merged_queries() {
        let cache = MetricCache::new();
        let (m1, _) = cache.get_or_create("http://a.com/p?x=1").await;
        m1.push_link("http://a.com/1".to_string());
        let (m2, _) = cache.get_or_create("http://a.com/p?y=2").await;
        m2.push_link("http://a.com/2".to_string());

        let reports = Reports::build(&cache).await;
        let row = &reports.site_rows["http://a.com/p"];
        assert_eq!(row.links, vec!["http://a.com/1", "http://a.com/2"]);
    }
}
