//! Per-domain concurrency gates.
//!
//! One semaphore per domain, created lazily on first use and retained for
//! the lifetime of the fetcher. The creation path runs under a single lock
//! so concurrent first access to the same domain still yields exactly one
//! gate. Entries are never removed; the map is bounded in practice by the
//! number of distinct domains seen.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

pub(crate) struct DomainGates {
    default_limit: usize,
    overrides: HashMap<String, usize>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl DomainGates {
    pub(crate) fn new(default_limit: usize, overrides: HashMap<String, usize>) -> Self {
        Self {
            default_limit: default_limit.max(1),
            overrides,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the gate for `domain`, creating it on first use.
    pub(crate) fn gate(&self, domain: &str) -> Arc<Semaphore> {
        let mut gates = self.gates.lock().expect("domain gate map lock poisoned");
        Arc::clone(gates.entry(domain.to_owned()).or_insert_with(|| {
            let limit = self.limit_for(domain);
            tracing::debug!(domain, limit, "created concurrency gate");
            Arc::new(Semaphore::new(limit))
        }))
    }

    pub(crate) fn limit_for(&self, domain: &str) -> usize {
        self.overrides
            .get(domain)
            .copied()
            .unwrap_or(self.default_limit)
            .max(1)
    }
}
