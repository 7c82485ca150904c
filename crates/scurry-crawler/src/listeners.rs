use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::Request;
use scraper::Html;

type RequestListener = Arc<dyn Fn(&Request) + Send + Sync>;
type DocumentListener = Arc<dyn Fn(&Html) + Send + Sync>;

/// Callbacks invoked for every fetch, in registration order.
///
/// Listeners are called on a snapshot of the list, one registered while a
/// notification is running is only called from the next one.
#[derive(Default)]
pub(crate) struct Listeners {
    on_request: RwLock<Vec<RequestListener>>,
    on_document: RwLock<Vec<DocumentListener>>,
}

impl Listeners {
    pub fn add_request<F>(&self, listener: F)
    where
        F: Fn(&Request) + Send + Sync + 'static,
    {
        write(&self.on_request).push(Arc::new(listener));
    }

    pub fn add_document<F>(&self, listener: F)
    where
        F: Fn(&Html) + Send + Sync + 'static,
    {
        write(&self.on_document).push(Arc::new(listener));
    }

    pub fn notify_request(&self, request: &Request) {
        let listeners = read(&self.on_request).clone();
        for listener in listeners {
            listener(request);
        }
    }

    pub fn notify_document(&self, document: &Html) {
        let listeners = read(&self.on_document).clone();
        for listener in listeners {
            listener(document);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("on_request", &read(&self.on_request).len())
            .field("on_document", &read(&self.on_document).len())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use reqwest::{Method, Request};
    use scraper::Html;

    use super::Listeners;

    #[test]
    fn invoked_in_registration_order() {
        let listeners = Listeners::default();
        let calls = Arc::new(Mutex::new(vec![]));
        for id in 0..3 {
            let calls = calls.clone();
            listeners.add_request(move |_| calls.lock().unwrap().push(format!("req{id}")));
        }
        for id in 0..2 {
            let calls = calls.clone();
            listeners.add_document(move |_| calls.lock().unwrap().push(format!("doc{id}")));
        }

        let request = Request::new(Method::GET, "http://a.test/".parse().unwrap());
        listeners.notify_request(&request);
        listeners.notify_document(&Html::parse_document("<p>hi</p>"));

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["req0", "req1", "req2", "doc0", "doc1"]
        );
    }

    #[test]
    fn listener_can_register_another() {
        let listeners = Arc::new(Listeners::default());
        let calls = Arc::new(Mutex::new(vec![]));
        {
            let listeners_c = listeners.clone();
            let calls = calls.clone();
            listeners.add_document(move |_| {
                calls.lock().unwrap().push("outer");
                let calls = calls.clone();
                listeners_c.add_document(move |_| calls.lock().unwrap().push("inner"));
            });
        }

        let document = Html::parse_document("<p>hi</p>");
        listeners.notify_document(&document);
        assert_eq!(*calls.lock().unwrap(), vec!["outer"]);

        listeners.notify_document(&document);
        assert_eq!(*calls.lock().unwrap(), vec!["outer", "outer", "inner"]);
    }
}
