use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::counter::Counter;

/// Visited set and request budget, checked and updated as one step.
#[derive(Debug)]
pub(crate) struct Gate {
    visited: Mutex<HashSet<String>>,
    requests: Counter,
    max_request_count: u32,
}

impl Gate {
    pub fn new(max_request_count: u32) -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            requests: Counter::new(),
            max_request_count,
        }
    }

    /// Returns `true` when `url` was never seen and the budget allows one more
    /// fetch. The url is then marked visited and the fetch is counted.
    pub fn admit(&self, url: &str) -> bool {
        let mut visited = self.lock();
        if visited.contains(url) || self.requests.read() >= self.max_request_count {
            return false;
        }
        visited.insert(url.to_string());
        self.requests.increment();
        true
    }

    pub fn request_count(&self) -> u32 {
        self.requests.read()
    }

    pub fn visited_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The critical section cannot panic midway, the set is always consistent
        self.visited.lock().unwrap_or_else(|e| e.into_inner())
    }
}
