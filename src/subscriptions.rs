use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use teloxide::types::ChatId;

type Map = HashMap<ChatId, HashMap<String, u64>>;

#[derive(Default)]
struct Inner {
    map: Map,
    next_generation: u64,
}

/// Which chat is subscribed to which product.
///
/// Cloning yields another handle to the same registry. Every entry carries
/// the generation it was inserted with, so a worker started for an earlier
/// incarnation of the same pair can tell that it is stale.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // every critical section leaves the map consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts the pair, returning its generation if it was not present.
    pub(crate) fn insert(&self, chat_id: ChatId, product_id: &str) -> Option<u64> {
        let mut inner = self.lock();
        let generation = inner.next_generation;
        let products = inner.map.entry(chat_id).or_default();
        if products.contains_key(product_id) {
            return None;
        }
        products.insert(product_id.to_owned(), generation);
        inner.next_generation += 1;
        Some(generation)
    }

    /// Returns whether the pair was newly added.
    pub fn subscribe(&self, chat_id: ChatId, product_id: &str) -> bool {
        self.insert(chat_id, product_id).is_some()
    }

    pub fn unsubscribe(&self, chat_id: ChatId, product_id: &str) -> bool {
        let mut inner = self.lock();
        let Some(products) = inner.map.get_mut(&chat_id) else {
            return false;
        };
        let removed = products.remove(product_id).is_some();
        if products.is_empty() {
            inner.map.remove(&chat_id);
        }
        removed
    }

    /// Removes every subscription of the chat and returns how many there were.
    pub fn unsubscribe_all(&self, chat_id: ChatId) -> usize {
        self.lock()
            .map
            .remove(&chat_id)
            .map_or(0, |products| products.len())
    }

    pub fn is_active(&self, chat_id: ChatId, product_id: &str) -> bool {
        self.lock()
            .map
            .get(&chat_id)
            .is_some_and(|products| products.contains_key(product_id))
    }

    /// Like `is_active`, but only for the incarnation with this generation.
    pub(crate) fn is_current(&self, chat_id: ChatId, product_id: &str, generation: u64) -> bool {
        self.lock()
            .map
            .get(&chat_id)
            .and_then(|products| products.get(product_id))
            == Some(&generation)
    }

    pub fn products(&self, chat_id: ChatId) -> Vec<String> {
        let mut products: Vec<_> = self
            .lock()
            .map
            .get(&chat_id)
            .map(|products| products.keys().cloned().collect())
            .unwrap_or_default();
        products.sort();
        products
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.subscribe(ChatId(1), "123"));
        assert!(!registry.subscribe(ChatId(1), "123"));
        assert!(registry.is_active(ChatId(1), "123"));
        assert_eq!(registry.products(ChatId(1)), vec!["123"]);
    }

    #[test]
    fn unsubscribe_all_only_touches_its_chat() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(ChatId(1), "a");
        registry.subscribe(ChatId(1), "b");
        registry.subscribe(ChatId(2), "a");

        assert_eq!(registry.unsubscribe_all(ChatId(1)), 2);
        assert!(!registry.is_active(ChatId(1), "a"));
        assert!(!registry.is_active(ChatId(1), "b"));
        assert!(registry.is_active(ChatId(2), "a"));

        assert_eq!(registry.unsubscribe_all(ChatId(1)), 0);
        assert_eq!(registry.unsubscribe_all(ChatId(3)), 0);
    }

    #[test]
    fn unsubscribe_single_product() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(ChatId(1), "a");
        registry.subscribe(ChatId(1), "b");

        assert!(registry.unsubscribe(ChatId(1), "a"));
        assert!(!registry.unsubscribe(ChatId(1), "a"));
        assert!(registry.is_active(ChatId(1), "b"));
        assert_eq!(registry.products(ChatId(1)), vec!["b"]);

        assert!(registry.unsubscribe(ChatId(1), "b"));
        assert!(registry.products(ChatId(1)).is_empty());
    }

    #[test]
    fn resubscribing_gets_a_new_generation() {
        let registry = SubscriptionRegistry::new();
        let first = registry.insert(ChatId(1), "a").unwrap();
        assert!(registry.is_current(ChatId(1), "a", first));

        registry.unsubscribe_all(ChatId(1));
        assert!(!registry.is_current(ChatId(1), "a", first));

        let second = registry.insert(ChatId(1), "a").unwrap();
        assert_ne!(first, second);
        assert!(!registry.is_current(ChatId(1), "a", first));
        assert!(registry.is_current(ChatId(1), "a", second));
    }

    #[test]
    fn concurrent_subscribers_do_not_lose_entries() {
        let registry = SubscriptionRegistry::new();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut added = 0;
                    for p in 0..100 {
                        // every thread races for the same 100 products
                        if registry.subscribe(ChatId(1), &p.to_string()) {
                            added += 1;
                        }
                        registry.subscribe(ChatId(100 + t), &p.to_string());
                    }
                    added
                })
            })
            .collect();

        let added: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(added, 100);
        assert_eq!(registry.products(ChatId(1)).len(), 100);
        for t in 0..8 {
            assert_eq!(registry.unsubscribe_all(ChatId(100 + t)), 100);
        }
    }
}
