//! Per-(service, method) breaker cache.
//!
//! # Design Decisions
//! - Breakers are created lazily on first use and live for the process lifetime
//! - DashMap entry API guarantees at most one breaker per key under concurrent first access
//! - Every breaker is built from the same process-wide configuration

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::BreakerConfig;
use crate::resilience::circuit_breaker::{BreakerKey, BreakerSnapshot, CircuitBreaker};
use crate::resilience::events::BreakerListener;

/// Registry of circuit breakers keyed by (service, method).
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<BreakerKey, Arc<CircuitBreaker>>,
    config: BreakerConfig,
    listener: Arc<dyn BreakerListener>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig, listener: Arc<dyn BreakerListener>) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            listener,
        }
    }

    /// Return the breaker for `key`, creating it on first use.
    pub fn get_or_create(&self, key: BreakerKey) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(&key) {
            return existing.value().clone();
        }

        match self.breakers.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                tracing::debug!(
                    service = entry.key().service(),
                    method = entry.key().method(),
                    "Creating circuit breaker"
                );
                let breaker = Arc::new(CircuitBreaker::new(
                    entry.key().clone(),
                    self.config.clone(),
                    self.listener.clone(),
                ));
                entry.insert(breaker.clone());
                breaker
            }
        }
    }

    /// Number of breakers created so far.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshot of every breaker, sorted by key.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut breakers: Vec<_> = self.breakers.iter().map(|r| r.value().clone()).collect();
        breakers.sort_by(|a, b| a.key().cmp(b.key()));
        breakers.iter().map(|b| b.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::events::NoopListener;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(BreakerConfig::default(), Arc::new(NoopListener))
    }

    #[test]
    fn test_same_key_same_instance() {
        let registry = registry();
        let a = registry.get_or_create(BreakerKey::new("auth", "get"));
        let b = registry.get_or_create(BreakerKey::new("auth", "GET"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_keys_distinct_instances() {
        let registry = registry();
        let get = registry.get_or_create(BreakerKey::new("auth", "get"));
        let post = registry.get_or_create(BreakerKey::new("auth", "post"));
        let users = registry.get_or_create(BreakerKey::new("users", "get"));
        assert!(!Arc::ptr_eq(&get, &post));
        assert!(!Arc::ptr_eq(&get, &users));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share_state() {
        let registry = registry();
        let auth = registry.get_or_create(BreakerKey::new("auth", "get"));
        for _ in 0..3 {
            let _ = auth.execute(|| async { Err::<(), _>("refused") }).await;
        }
        assert_eq!(auth.state(), CircuitState::Open);

        let todos = registry.get_or_create(BreakerKey::new("todos", "get"));
        assert_eq!(todos.state(), CircuitState::Closed);
        let auth_post = registry.get_or_create(BreakerKey::new("auth", "post"));
        assert_eq!(auth_post.state(), CircuitState::Closed);
    }

    #[test]
    fn test_concurrent_first_access_creates_one() {
        let registry = registry();
        let created: Vec<Arc<CircuitBreaker>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| registry.get_or_create(BreakerKey::new("users", "put"))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(registry.len(), 1);
        assert!(created.iter().all(|b| Arc::ptr_eq(b, &created[0])));
    }

    #[test]
    fn test_snapshot_sorted() {
        let registry = registry();
        assert!(registry.is_empty());
        registry.get_or_create(BreakerKey::new("users", "get"));
        registry.get_or_create(BreakerKey::new("auth", "post"));
        registry.get_or_create(BreakerKey::new("auth", "get"));

        let keys: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|s| format!("{}_{}", s.service, s.method))
            .collect();
        assert_eq!(keys, ["auth_get", "auth_post", "users_get"]);
    }
}
