//! Bounded recent-message cache for deduplication.
//!
//! Keys are evicted least-recently-seen first once the cache is full, so a
//! burst of new keys never reopens the window for everything at once.
//!
//! The cache is not internally synchronized; the gateway wraps it in a mutex.

use std::collections::{BTreeMap, HashMap};

/// Default number of keys remembered.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug)]
pub struct DedupCache {
  capacity:  usize,
  /// Monotonic sighting counter.
  tick:      u64,
  /// Key → tick of its latest sighting.
  last_seen: HashMap<String, u64>,
  /// Tick → key; the first entry is the least recently seen.
  order:     BTreeMap<u64, String>,
}

impl DedupCache {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity:  capacity.max(1),
      tick:      0,
      last_seen: HashMap::new(),
      order:     BTreeMap::new(),
    }
  }

  /// Record a sighting of `key`. Returns `true` the first time a key is seen
  /// (while it is still cached) and `false` for a repeat. Either way the key
  /// becomes the most recently seen.
  pub fn insert(&mut self, key: String) -> bool {
    self.tick += 1;
    let tick = self.tick;

    if let Some(previous) = self.last_seen.insert(key.clone(), tick) {
      self.order.remove(&previous);
      self.order.insert(tick, key);
      return false;
    }

    self.order.insert(tick, key);
    if self.last_seen.len() > self.capacity
      && let Some((_, evicted)) = self.order.pop_first()
    {
      self.last_seen.remove(&evicted);
    }
    true
  }

  pub fn contains(&self, key: &str) -> bool { self.last_seen.contains_key(key) }

  pub fn len(&self) -> usize { self.last_seen.len() }

  pub fn is_empty(&self) -> bool { self.last_seen.is_empty() }
}

impl Default for DedupCache {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repeats_are_detected() {
    let mut cache = DedupCache::new(4);
    assert!(cache.insert("a".into()));
    assert!(!cache.insert("a".into()));
    assert!(cache.insert("b".into()));
    assert_eq!(cache.len(), 2);
  }

  #[test]
  fn evicts_least_recently_seen() {
    let mut cache = DedupCache::new(3);
    for key in ["a", "b", "c"] {
      assert!(cache.insert(key.into()));
    }
    // Touch "a" so "b" becomes the oldest.
    assert!(!cache.insert("a".into()));
    assert!(cache.insert("d".into()));

    assert_eq!(cache.len(), 3);
    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
    assert!(cache.contains("d"));
  }

  #[test]
  fn overflow_keeps_recent_keys() {
    let mut cache = DedupCache::new(DEFAULT_CAPACITY);
    for i in 0..=DEFAULT_CAPACITY {
      assert!(cache.insert(format!("key-{i}")));
    }
    assert_eq!(cache.len(), DEFAULT_CAPACITY);
    assert!(!cache.contains("key-0"));
    // Everything else is still remembered, unlike a full clear.
    assert!(!cache.insert(format!("key-{DEFAULT_CAPACITY}")));
    assert!(!cache.insert("key-1".into()));
  }

  #[test]
  fn zero_capacity_still_remembers_the_last_key() {
    let mut cache = DedupCache::new(0);
    assert!(cache.insert("a".into()));
    assert!(!cache.insert("a".into()));
    assert!(cache.insert("b".into()));
    assert!(!cache.contains("a"));
  }
}
