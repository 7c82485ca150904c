#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use futures::future::BoxFuture;
use reqwest::{Request, Response};
use scraper::{Html, Selector};
use scurry_crawler::{Crawler, CrawlerConfig, SharedTransport, Transport};

pub const BASE: &str = "http://example.test";

/// In-memory site recording every request it serves.
#[derive(Debug, Clone)]
pub struct FakeSite {
    pages: HashMap<String, (u16, String)>,
    fallback: Option<(u16, String)>,
    delay: Duration,
    log: Arc<RequestLog>,
}

#[derive(Debug, Default)]
pub struct RequestLog {
    urls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RequestLog {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.urls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl FakeSite {
    /// Every unknown URL answers `200` with an empty page.
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fallback: Some((200, String::new())),
            delay: Duration::ZERO,
            log: Arc::new(RequestLog::default()),
        }
    }

    pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.pages.insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn fallback(mut self, status: u16, body: &str) -> Self {
        self.fallback = Some((status, body.to_string()));
        self
    }

    /// Every request fails at the transport level.
    pub fn unreachable(mut self) -> Self {
        self.pages.clear();
        self.fallback = None;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn log(&self) -> Arc<RequestLog> {
        self.log.clone()
    }
}

impl Transport for FakeSite {
    fn send(&self, request: Request) -> BoxFuture<'static, anyhow::Result<Response>> {
        let url = request.url().to_string();
        let answer = self.pages.get(&url).cloned().or_else(|| self.fallback.clone());
        let delay = self.delay;
        let log = self.log.clone();

        Box::pin(async move {
            log.urls.lock().unwrap().push(url.clone());
            let now = log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            log.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            log.in_flight.fetch_sub(1, Ordering::SeqCst);

            let (status, body) = answer.ok_or_else(|| anyhow!("connection refused: {url}"))?;
            let resp = http::Response::builder().status(status).body(body)?;
            Ok(Response::from(resp))
        })
    }
}

/// Same settings as a typical small crawl, served by `site`.
pub fn config(site: &FakeSite) -> CrawlerConfig {
    CrawlerConfig {
        max_request_count: 5,
        concurrency: 5,
        timeout: Duration::from_secs(5),
        debug: true,
        transport: SharedTransport::new(site.clone()),
        ..Default::default()
    }
}

pub fn hrefs(document: &Html) -> Vec<String> {
    let selector = Selector::parse("a[href]").unwrap();
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(String::from)
        .collect()
}

/// Lets every fetched document enqueue all of its links.
pub fn follow_links(crawler: &Crawler) {
    let enqueuer = crawler.enqueuer();
    crawler.on_document(move |doc| {
        for href in hrefs(doc) {
            enqueuer.enqueue_url(&href);
        }
    });
}

pub fn sorted(mut urls: Vec<String>) -> Vec<String> {
    urls.sort();
    urls
}
