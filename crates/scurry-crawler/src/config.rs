use std::cmp;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::SharedTransport;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    /// Upper bound on the number of fetches issued by one crawl
    #[serde(default = "default_max_request_count")]
    pub max_request_count: u32,

    /// Size of a worker generation plus one reserved slot. `1` behaves like `2`,
    /// a generation always has at least one worker.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Wall-clock bound of the whole crawl, in seconds when serialized
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    #[serde(default = "default_debug")]
    pub debug: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(skip)]
    pub transport: SharedTransport,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_request_count: default_max_request_count(),
            concurrency: default_concurrency(),
            timeout: default_timeout(),
            debug: default_debug(),
            user_agent: default_user_agent(),
            transport: SharedTransport::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn queue_capacity(&self) -> usize {
        self.concurrency as usize + 1
    }

    /// One slot is always left unused, but a generation never has zero workers.
    pub fn workers_per_generation(&self) -> usize {
        cmp::max(1, self.concurrency.saturating_sub(1) as usize)
    }
}

fn default_max_request_count() -> u32 {
    10
}

fn default_concurrency() -> u32 {
    10
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_debug() -> bool {
    false
}

fn default_user_agent() -> String {
    String::from("scurrybot")
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
