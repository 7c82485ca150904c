use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};

/// Bounded queue of URLs waiting to be admitted.
///
/// Besides the buffered entries, the frontier keeps track of every entry that
/// is still on its way (submitted but not yet buffered) or being processed by a
/// worker. The crawl is over only once that count drops back to zero.
#[derive(Debug)]
pub(crate) struct Frontier {
    tx: mpsc::Sender<String>,
    rx: Mutex<mpsc::Receiver<String>>,
    pending: Arc<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    outstanding: AtomicUsize,
    settled: Notify,
}

impl Pending {
    fn add(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    fn settle(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.settled.notify_one();
        }
    }
}

impl Frontier {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            pending: Arc::new(Pending::default()),
        }
    }

    /// Queues `url` without ever blocking the caller.
    ///
    /// When the buffer is full the push is handed to a separate task which
    /// waits for capacity.
    pub fn submit(&self, url: String) {
        self.pending.add();

        let url = match self.tx.try_send(url) {
            Ok(()) => return,
            Err(TrySendError::Full(url)) => url,
            Err(TrySendError::Closed(url)) => {
                log::debug!("Dropping {url}: frontier closed");
                self.pending.settle();
                return;
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                let tx = self.tx.clone();
                let pending = self.pending.clone();
                handle.spawn(async move {
                    if let Err(e) = tx.send(url).await {
                        log::debug!("Dropping {}: frontier closed", e.0);
                        pending.settle();
                    }
                });
            }
            Err(_) => {
                log::warn!("Dropping {url}: frontier is full and no runtime is available");
                self.pending.settle();
            }
        }
    }

    /// Waits for the next buffered entry. Cancel safe.
    pub async fn pop(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// Marks a popped entry as fully processed once the guard is dropped.
    pub fn settle_on_drop(&self) -> SettleGuard<'_> {
        SettleGuard(&self.pending)
    }

    pub fn is_settled(&self) -> bool {
        self.pending.outstanding.load(Ordering::SeqCst) == 0
    }

    pub fn outstanding(&self) -> usize {
        self.pending.outstanding.load(Ordering::SeqCst)
    }

    /// Number of buffered entries, approximate while producers are active.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Resolves once the outstanding count reached zero at least once since
    /// the last call. Callers must re-check [`Frontier::is_settled`].
    pub async fn settled(&self) {
        self.pending.settled.notified().await
    }
}

pub(crate) struct SettleGuard<'a>(&'a Pending);

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.0.settle();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::Frontier;

    #[tokio::test]
    async fn pop_settles_outstanding() {
        let frontier = Frontier::new(2);
        frontier.submit("http://a.test/".into());
        assert_eq!(frontier.outstanding(), 1);
        assert_eq!(frontier.len(), 1);

        let url = frontier.pop().await.unwrap();
        assert_eq!(url, "http://a.test/");
        assert!(!frontier.is_settled());

        drop(frontier.settle_on_drop());
        assert!(frontier.is_settled());
        timeout(Duration::from_secs(1), frontier.settled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn full_buffer_defers_to_task() {
        let frontier = Frontier::new(1);
        for i in 0..5 {
            frontier.submit(format!("http://a.test/{i}"));
        }
        assert_eq!(frontier.outstanding(), 5);

        let mut seen = vec![];
        for _ in 0..5 {
            let url = timeout(Duration::from_secs(1), frontier.pop())
                .await
                .unwrap()
                .unwrap();
            let _guard = frontier.settle_on_drop();
            seen.push(url);
        }
        seen.sort();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0], "http://a.test/0");
        assert!(frontier.is_settled());
    }

    #[test]
    fn full_buffer_without_runtime_drops() {
        let frontier = Frontier::new(1);
        frontier.submit("http://a.test/1".into());
        frontier.submit("http://a.test/2".into());
        assert_eq!(frontier.outstanding(), 1);
        assert_eq!(frontier.len(), 1);
    }
}
