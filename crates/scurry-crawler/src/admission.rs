use std::sync::Arc;

use anyhow::{bail, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::frontier::Frontier;

/// Escaped when a request target is folded into a single path segment: every
/// reserved character except the sub-delimiters a segment may carry.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// The base URL of a crawl and the rules deciding which hrefs belong to it.
#[derive(Debug, Clone)]
pub(crate) struct Origin {
    base: Url,
    root: String,
}

impl Origin {
    pub fn parse(base: &str) -> Result<Self> {
        reject_control_chars(base)?;
        let base = Url::parse(base)?;
        if base.host_str().is_none() {
            bail!("Base URL {base} has no host");
        }
        let root = clear_slashes(base.as_str()).to_string();
        Ok(Self { base, root })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn seed(&self) -> String {
        format!("{}/", self.root)
    }

    /// Canonical frontier entry for `href`, or `None` when it points to
    /// another host.
    pub fn normalize(&self, href: &str) -> Result<Option<String>> {
        reject_control_chars(href)?;

        let url = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base.join("/")?.join(href)?,
            Err(e) => return Err(e.into()),
        };

        // Scheme is not part of the comparison, the entry is rebuilt on the root
        if url.host_str().is_some()
            && (url.host_str() != self.base.host_str() || url.port() != self.base.port())
        {
            return Ok(None);
        }

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        Ok(Some(format!(
            "{}/{}",
            self.root,
            utf8_percent_encode(clear_slashes(&target), PATH_SEGMENT)
        )))
    }
}

/// Drops the fragment then trims slashes on both ends.
fn clear_slashes(s: &str) -> &str {
    let s = s.split('#').next().unwrap_or_default();
    s.trim_end_matches('/').trim_start_matches('/')
}

fn reject_control_chars(s: &str) -> Result<()> {
    if s.chars().any(|c| c.is_ascii_control()) {
        bail!("Invalid control character in URL {s:?}");
    }
    Ok(())
}

/// Handle used to feed discovered hrefs back into a running crawl.
///
/// Cloning is cheap, document listeners usually capture one.
#[derive(Debug, Clone)]
pub struct Enqueuer {
    origin: Arc<Origin>,
    frontier: Arc<Frontier>,
    debug: bool,
}

impl Enqueuer {
    pub(crate) fn new(origin: Arc<Origin>, frontier: Arc<Frontier>, debug: bool) -> Self {
        Self {
            origin,
            frontier,
            debug,
        }
    }

    /// Queues `href` when it resolves to the crawl's host.
    ///
    /// Malformed and cross-origin hrefs are dropped. Whether the URL was
    /// already visited is decided later, when a worker picks it up.
    pub fn enqueue_url(&self, href: &str) {
        match self.origin.normalize(href) {
            Ok(Some(url)) => {
                log::trace!("Enqueuing {url}");
                self.frontier.submit(url);
            }
            Ok(None) => log::trace!("Ignoring cross-origin {href}"),
            Err(e) => {
                if self.debug {
                    log::warn!("Skipping href {href:?} got: {e}");
                }
            }
        }
    }
}
