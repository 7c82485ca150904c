mod admission;
mod config;
mod counter;
mod crawler;
mod frontier;
mod listeners;
mod transport;
mod visited;

pub use admission::Enqueuer;
pub use config::CrawlerConfig;
pub use counter::Counter;
pub use crawler::Crawler;
pub use transport::{read_body, SharedTransport, Transport};

pub use anyhow;
pub use reqwest;
pub use scraper;
