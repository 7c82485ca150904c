use std::sync::atomic::{AtomicU32, Ordering};

/// Request counter shared by every worker of a crawl.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicU32,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn read(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}
