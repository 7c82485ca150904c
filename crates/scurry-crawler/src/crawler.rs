use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Method, Request, StatusCode, Url};
use scraper::Html;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};

use crate::admission::{Enqueuer, Origin};
use crate::config::CrawlerConfig;
use crate::frontier::Frontier;
use crate::listeners::Listeners;
use crate::transport::read_body;
use crate::visited::Gate;

/// Same-origin crawler.
///
/// Pages are fetched starting from the base URL. Every fetched page is parsed
/// and handed to the document listeners, which decide what to crawl next
/// through [`Crawler::enqueue_url`] or an [`Enqueuer`]. Nothing is followed
/// automatically.
#[derive(Debug)]
pub struct Crawler {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    origin: Arc<Origin>,
    config: CrawlerConfig,
    frontier: Arc<Frontier>,
    gate: Gate,
    listeners: Listeners,
}

impl Crawler {
    pub fn new(base_url: &str, config: CrawlerConfig) -> Result<Self> {
        let origin =
            Origin::parse(base_url).with_context(|| format!("Invalid base URL {base_url:?}"))?;

        let shared = Shared {
            origin: Arc::new(origin),
            frontier: Arc::new(Frontier::new(config.queue_capacity())),
            gate: Gate::new(config.max_request_count),
            listeners: Listeners::default(),
            config,
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn with_defaults(base_url: &str) -> Result<Self> {
        Self::new(base_url, CrawlerConfig::default())
    }

    pub fn base_url(&self) -> &Url {
        self.shared.origin.base()
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.shared.config
    }

    /// Registers a listener called with every outgoing request, before it is
    /// sent.
    pub fn on_request<F>(&self, listener: F)
    where
        F: Fn(&Request) + Send + Sync + 'static,
    {
        self.shared.listeners.add_request(listener);
    }

    /// Registers a listener called with every successfully fetched document.
    pub fn on_document<F>(&self, listener: F)
    where
        F: Fn(&Html) + Send + Sync + 'static,
    {
        self.shared.listeners.add_document(listener);
    }

    pub fn enqueuer(&self) -> Enqueuer {
        Enqueuer::new(
            self.shared.origin.clone(),
            self.shared.frontier.clone(),
            self.shared.config.debug,
        )
    }

    pub fn enqueue_url(&self, href: &str) {
        self.enqueuer().enqueue_url(href);
    }

    /// Number of fetches issued so far.
    pub fn request_count(&self) -> u32 {
        self.shared.gate.request_count()
    }

    pub fn visited_count(&self) -> usize {
        self.shared.gate.visited_count()
    }

    /// Crawls until there is nothing left to fetch, the request budget is
    /// spent, or the configured timeout elapses.
    pub async fn run(&self) {
        self.run_with_shutdown(future::pending()).await
    }

    /// Same as [`Crawler::run`] but also stops as soon as `shutdown` resolves.
    pub async fn run_with_shutdown<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let shared = &self.shared;
        let started = Instant::now();
        let deadline = started + shared.config.timeout;
        tokio::pin!(shutdown);

        shared.frontier.submit(shared.origin.seed());

        let mut generation = 0;
        let halted = loop {
            generation += 1;

            let (tx_stop, rx_stop) = watch::channel(());
            let mut workers = JoinSet::new();
            for id in 0..shared.config.workers_per_generation() {
                workers.spawn(work(shared.clone(), id, rx_stop.clone(), deadline));
            }
            drop(rx_stop);
            log::debug!(
                "Generation {generation}: {} workers, {} URLs outstanding",
                workers.len(),
                shared.frontier.outstanding()
            );

            // Draining

            let halted = loop {
                if shared.frontier.is_settled() {
                    break false;
                }
                tokio::select! {
                    biased;
                    _ = time::sleep_until(deadline) => break true,
                    _ = &mut shutdown => break true,
                    _ = shared.frontier.settled() => (),
                    joined = workers.join_next() => match joined {
                        Some(res) => log_exit(res),
                        None => break false,
                    },
                }
            };

            drop(tx_stop);
            while let Some(res) = workers.join_next().await {
                log_exit(res);
            }

            let halted = halted || Instant::now() >= deadline;
            if halted || shared.frontier.is_settled() {
                break halted;
            }
            log::debug!(
                "Generation {generation} ended with {} URLs outstanding ({} buffered)",
                shared.frontier.outstanding(),
                shared.frontier.len()
            );
        };

        log::info!(
            "Crawled {} in {:?}: {} requests, {} URLs visited{}",
            shared.origin.base(),
            started.elapsed(),
            shared.gate.request_count(),
            shared.gate.visited_count(),
            if halted { " (stopped early)" } else { "" }
        );
    }
}

async fn work(shared: Arc<Shared>, id: usize, mut stop: watch::Receiver<()>, deadline: Instant) {
    loop {
        let url = tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = time::sleep_until(deadline) => break,
            url = shared.frontier.pop() => match url {
                Some(url) => url,
                None => break,
            },
        };
        let _settle = shared.frontier.settle_on_drop();

        if !shared.gate.admit(&url) {
            log::trace!("Worker {id}: rejected {url}");
            continue;
        }
        log::trace!("Worker {id}: admitted {url}");

        tokio::select! {
            biased;
            _ = stop.changed() => {
                log::debug!("Abandoning {url}: crawl stopped");
                break;
            }
            _ = time::sleep_until(deadline) => {
                shared.diagnose(format_args!("Abandoning {url}: crawl timed out"));
                break;
            }
            _ = shared.fetch(&url) => (),
        }
    }
    log::trace!("Worker {id}: exiting");
}

fn log_exit(res: Result<(), JoinError>) {
    if let Err(e) = res {
        log::error!("Worker ended abnormally: {e}");
    }
}

impl Shared {
    async fn fetch(&self, url: &str) {
        let request = match self.build_request(url) {
            Ok(request) => request,
            Err(e) => {
                self.diagnose(format_args!("Skipping URL {url} got: {e}"));
                return;
            }
        };

        self.listeners.notify_request(&request);

        let resp = match self.config.transport.send(request).await {
            Ok(resp) => resp,
            Err(e) => {
                self.diagnose(format_args!("Unable to visit URL {url} got: {e}"));
                return;
            }
        };

        if resp.status() != StatusCode::OK {
            log::debug!("Skipping URL {url}: status {}", resp.status());
            return;
        }

        match read_body(resp).await {
            Ok(page) => self.dispatch(&page),
            Err(e) => self.diagnose(format_args!("Couldn't read page {url} got: {e}")),
        }
    }

    fn build_request(&self, url: &str) -> Result<Request> {
        let mut request = Request::new(Method::GET, Url::parse(url)?);
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_str(&self.config.user_agent)?);
        Ok(request)
    }

    fn dispatch(&self, page: &str) {
        let document = Html::parse_document(page);
        if !document.errors.is_empty() {
            log::trace!("Recovered from {} HTML parse errors", document.errors.len());
        }
        self.listeners.notify_document(&document);
    }

    fn diagnose(&self, msg: fmt::Arguments<'_>) {
        if self.config.debug {
            log::warn!("{msg}");
        }
    }
}
