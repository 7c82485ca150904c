use std::fmt;
use std::io::prelude::*;
use std::sync::Arc;

use anyhow::Result;
use flate2::read::GzDecoder;
use futures::future::BoxFuture;
use futures::FutureExt;
use lazy_static::lazy_static;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Request, Response};

lazy_static! {
    static ref HTTP_CLI: reqwest::Client = reqwest::ClientBuilder::new()
        .gzip(true)
        .deflate(true)
        .build()
        .expect("Couldn't build default HTTP client");
}

/// Executes the requests issued by a crawl.
///
/// Timeouts, retries and redirects are the transport's business, the crawler
/// only looks at the final response.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response>>;
}

impl Transport for reqwest::Client {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response>> {
        let client = self.clone();
        async move { Ok(client.execute(request).await?) }.boxed()
    }
}

/// Cheaply clonable handle to the transport of a [`CrawlerConfig`](crate::CrawlerConfig).
#[derive(Clone)]
pub struct SharedTransport(Arc<dyn Transport>);

impl SharedTransport {
    pub fn new<T>(transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self(Arc::new(transport))
    }

    pub fn send(&self, request: Request) -> BoxFuture<'static, Result<Response>> {
        self.0.send(request)
    }
}

impl Default for SharedTransport {
    fn default() -> Self {
        Self::new(HTTP_CLI.clone())
    }
}

impl fmt::Debug for SharedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedTransport(..)")
    }
}

/// Reads a response body as text, inflating gzip payloads.
pub async fn read_body(resp: Response) -> Result<String> {
    match resp.headers().get(CONTENT_TYPE) {
        Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
            let compressed = resp.bytes().await?;
            let mut gz = GzDecoder::new(&compressed[..]);
            let mut page = String::new();
            gz.read_to_string(&mut page)?;
            Ok(page)
        }
        _ => Ok(resp.text().await?),
    }
}
