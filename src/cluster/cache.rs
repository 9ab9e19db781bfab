//! Bounded LRU cache of per-node clients.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::core::node::NodeClient;

/// Connection cache with strict least-recently-used eviction.
///
/// Holds at most `max_entries` node clients keyed by address. Recency is
/// refreshed by [`get`](ConnLru::get) and [`add`](ConnLru::add); every entry
/// that leaves the cache is closed exactly once.
///
/// The cache itself is not thread-safe; the router wraps it in a short-lived
/// mutex and never dials under it.
#[derive(Debug)]
pub(crate) struct ConnLru<N> {
    max_entries: usize,
    /// Most recent address first.
    order: VecDeque<String>,
    conns: HashMap<String, N>,
}

impl<N: NodeClient> ConnLru<N> {
    pub(crate) fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            order: VecDeque::new(),
            conns: HashMap::new(),
        }
    }

    /// Returns the cached client for `addr`, refreshing its recency.
    pub(crate) fn get(&mut self, addr: &str) -> Option<N> {
        let node = self.conns.get(addr)?.clone();
        self.touch(addr);
        Some(node)
    }

    /// Installs a client for `addr` and returns the handle now cached.
    ///
    /// An existing entry for the same address is closed and replaced, which
    /// collapses the duplicate produced by two concurrent dials to one cold
    /// address. Overflow evicts and closes the least-recent entry.
    pub(crate) fn add(&mut self, addr: &str, node: N) -> N {
        if let Some(previous) = self.conns.insert(addr.to_string(), node.clone()) {
            previous.close();
            self.touch(addr);
            return node;
        }

        self.order.push_front(addr.to_string());
        if self.order.len() > self.max_entries {
            self.remove_oldest();
        }
        node
    }

    /// Evicts and closes the least-recent entry.
    pub(crate) fn remove_oldest(&mut self) {
        let Some(addr) = self.order.pop_back() else {
            return;
        };
        if let Some(node) = self.conns.remove(&addr) {
            debug!(%addr, "evicting node connection");
            node.close();
        }
    }

    /// Evicts every entry, oldest first, closing each.
    pub(crate) fn clear(&mut self) {
        while !self.order.is_empty() {
            self.remove_oldest();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    fn touch(&mut self, addr: &str) {
        if let Some(pos) = self.order.iter().position(|entry| entry == addr) {
            if let Some(entry) = self.order.remove(pos) {
                self.order.push_front(entry);
            }
        }
    }
}
