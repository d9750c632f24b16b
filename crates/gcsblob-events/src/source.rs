use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::kinds::{ContentEvent, ContentEventKind};

pub type ContentEventHandler = Arc<dyn Fn(&ContentEvent) + Send + Sync>;

/// In-process registry the host raises content lifecycle events on.
#[derive(Default, Clone)]
pub struct ContentEvents {
    handlers: Arc<RwLock<HashMap<ContentEventKind, Vec<ContentEventHandler>>>>,
}

impl ContentEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic in another registrant does not lose this subscription.
    pub fn subscribe(&self, kind: ContentEventKind, handler: ContentEventHandler) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind).or_default().push(handler);
    }

    pub fn handler_count(&self, kind: ContentEventKind) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every handler for `kind`; returns how many ran.
    pub fn raise(&self, kind: ContentEventKind, event: &ContentEvent) -> usize {
        let handlers: Vec<ContentEventHandler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn raise_only_reaches_matching_kind() {
        let events = ContentEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        events.subscribe(
            ContentEventKind::Saved,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(events.raise(ContentEventKind::Saved, &ContentEvent::default()), 1);
        assert_eq!(events.raise(ContentEventKind::Saving, &ContentEvent::default()), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_survives_poisoned_lock() {
        let events = ContentEvents::new();
        let shared = events.clone();
        let result = std::thread::spawn(move || {
            let _guard = shared.handlers.write().unwrap();
            panic!("registrant failed");
        })
        .join();
        assert!(result.is_err());
        assert!(events.handlers.is_poisoned());

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        events.subscribe(
            ContentEventKind::Published,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(events.handler_count(ContentEventKind::Published), 1);
        assert_eq!(events.raise(ContentEventKind::Published, &ContentEvent::default()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
