use std::io::{self, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use reqwest::Url;

use crawlkit::agent::{AgentPool, UserAgent};
use crawlkit::config::{CrawlConfig, ReportSelection};
use crawlkit::engine::CrawlEngine;
use crawlkit::error::CrawlError;
use crawlkit::filter::{Filter, FilterSet};
use crawlkit::report::Reports;
use crawlkit::static_site;

#[derive(Parser, Debug)]
#[command(name = "crawlkit", about = "A concurrent single-domain web crawler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a single site starting from a seed URL.
    Crawl {
        #[arg(long = "addr")]
        addr: Option<String>,

        #[arg(long)]
        debug: bool,

        #[arg(long = "follow-redirects", default_value_t = true)]
        follow_redirects: bool,

        #[arg(long = "useragent.full", default_value = "crawlkit")]
        useragent_full: String,

        #[arg(long = "useragent.robot", default_value = "crawlkit")]
        useragent_robot: String,

        #[arg(long = "filter.same-domain", default_value_t = true)]
        filter_same_domain: bool,

        #[arg(long = "robots.request", default_value_t = true)]
        robots_request: bool,

        #[arg(long = "robots.crawl-delay", default_value_t = false)]
        robots_crawl_delay: bool,

        #[arg(long = "report.sitemap", default_value_t = true)]
        report_sitemap: bool,

        #[arg(long = "report.metrics", default_value_t = false)]
        report_metrics: bool,
    },
    /// Run a local static file server, for manual testing and benchmarks.
    Static {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

/// When stdin is piped (not a terminal), read its first line and split it on
/// whitespace to use as the process args, mirroring the original CLI's
/// support for piping a seed in rather than passing `-addr` directly.
fn effective_args() -> Vec<String> {
    let mut args: Vec<String> = std::env::args().collect();
    if args.len() > 1 || io::stdin().is_terminal() {
        return args;
    }

    let mut first_line = String::new();
    if io::stdin().read_to_string(&mut first_line).is_ok() {
        if let Some(line) = first_line.lines().next() {
            let mut piped: Vec<String> = vec![args.remove(0)];
            piped.extend(line.split_whitespace().map(str::to_string));
            return piped;
        }
    }
    args
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(effective_args()) {
        Ok(cli) => cli,
        Err(err) => {
            err.print().ok();
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Static { root, addr } => {
            init_tracing(false);
            if let Err(err) = static_site::serve(root, addr).await {
                eprintln!("static server error: {err}");
                return ExitCode::from(1);
            }
            ExitCode::SUCCESS
        }
        Command::Crawl {
            addr,
            debug,
            follow_redirects,
            useragent_full,
            useragent_robot,
            filter_same_domain,
            robots_request,
            robots_crawl_delay,
            report_sitemap,
            report_metrics,
        } => {
            init_tracing(debug);

            let config = match build_config(
                addr,
                debug,
                follow_redirects,
                useragent_full,
                useragent_robot,
                filter_same_domain,
                robots_request,
                robots_crawl_delay,
                report_sitemap,
                report_metrics,
            ) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("configuration error: {err}");
                    return ExitCode::from(1);
                }
            };

            run_crawl(config).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    addr: Option<String>,
    debug: bool,
    follow_redirects: bool,
    useragent_full: String,
    useragent_robot: String,
    filter_same_domain: bool,
    robots_request: bool,
    robots_crawl_delay: bool,
    report_sitemap: bool,
    report_metrics: bool,
) -> Result<CrawlConfig, CrawlError> {
    let addr = addr.ok_or_else(|| CrawlError::Config("missing -addr".to_string()))?;
    let seed = Url::parse(&addr).map_err(|e| CrawlError::Config(e.to_string()))?;

    CrawlConfig::builder()
        .with_seed(seed)
        .with_debug(debug)
        .with_follow_redirects(follow_redirects)
        .with_host_agent(useragent_full)
        .with_robot_agent(useragent_robot)
        .with_same_domain_filter(filter_same_domain)
        .with_robots(robots_request)
        .with_crawl_delay(robots_crawl_delay)
        .with_reports(ReportSelection { sitemap: report_sitemap, metrics: report_metrics })
        .build()
}

/// Wait for whichever of SIGINT or SIGTERM arrives first, mirroring the
/// original CLI's `interrupt()` (`cmd/crwlr/util.go`), which registers both.
#[cfg(unix)]
async fn wait_for_interrupt_or_terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt_or_terminate() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn run_crawl(config: CrawlConfig) -> ExitCode {
    let client = match build_client(&config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    let pool = Arc::new(AgentPool::new(client, config.user_agent.clone()));

    let mut filters = FilterSet::new();
    if config.same_domain_filter {
        filters.push(Filter::same_host_as(&config.seed));
    }

    let engine = CrawlEngine::new(pool, filters, config.robots_config(), config.reports.sitemap);

    let engine_for_signal = engine.clone();
    let shutdown = async move {
        wait_for_interrupt_or_terminate().await;
        tracing::info!("received interrupt, shutting down");
        engine_for_signal.close().await;
    };

    let start = Instant::now();
    let seed = config.seed.clone();
    let exit = tokio::select! {
        result = engine.run(seed) => {
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("crawl error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        _ = shutdown => ExitCode::SUCCESS,
    };
    let wall_clock = start.elapsed();

    let reports = Reports::build(engine.cache()).await;
    let stdout = io::stdout();
    if config.reports.sitemap {
        let _ = reports.write_site_report(stdout.lock());
    }
    if config.reports.metrics {
        let _ = reports.write_metrics_report(stdout.lock(), wall_clock);
    }

    exit
}

fn build_client(config: &CrawlConfig) -> Result<reqwest::Client, CrawlError> {
    let redirect_policy = if config.follow_redirects {
        reqwest::redirect::Policy::default()
    } else {
        reqwest::redirect::Policy::none()
    };

    reqwest::Client::builder()
        .redirect(redirect_policy)
        .connect_timeout(std::time::Duration::from_secs(10))
        .pool_max_idle_per_host(1)
        .build()
        .map_err(|e| CrawlError::Config(e.to_string()))
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("crawlkit={default_level}")));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
