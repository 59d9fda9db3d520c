use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Hooks fired by [`LruCache::add_with`].
pub trait CacheObserver<K> {
    /// Called for every insert or refresh.
    fn on_insert(&mut self, _key: &K) {}

    /// Called for every key evicted to make room.
    fn on_evict(&mut self, _key: &K) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl<K> CacheObserver<K> for NoopObserver {}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    tick: u64,
}

/// A capacity-bounded map evicting the least-recently inserted or refreshed
/// entry.
///
/// Reads do not count as use: only [`add`](Self::add) and its variants move a
/// key to the most-recent position.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, Entry<V>>,
    order: BTreeMap<u64, K>,
    next_tick: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty cache. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or refreshes `key`, evicting the oldest entry when a new key
    /// would exceed capacity.
    pub fn add(&mut self, key: K, value: V) {
        self.add_with(key, value, &mut NoopObserver);
    }

    /// Same as [`add`](Self::add), reporting inserts and evictions.
    pub fn add_with(&mut self, key: K, value: V, observer: &mut dyn CacheObserver<K>) {
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                let Some(evicted) = self.evict_oldest() else {
                    break;
                };
                observer.on_evict(&evicted);
            }
        }
        observer.on_insert(&key);
        self.put(key, value);
    }

    /// Inserts `key` only while under capacity. Never evicts; a key that is
    /// already present is refreshed in place.
    ///
    /// Returns whether the value was stored.
    pub fn add_if_room(&mut self, key: K, value: V) -> bool {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            return false;
        }
        self.put(key, value);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Keys from least to most recently inserted or refreshed.
    pub fn keys_by_age(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    fn put(&mut self, key: K, value: V) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(previous) = self.entries.insert(key.clone(), Entry { value, tick }) {
            self.order.remove(&previous.tick);
        }
        self.order.insert(tick, key);
    }

    fn evict_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        inserted: Vec<&'static str>,
        evicted: Vec<&'static str>,
    }

    impl CacheObserver<&'static str> for Recorder {
        fn on_insert(&mut self, key: &&'static str) {
            self.inserted.push(*key);
        }

        fn on_evict(&mut self, key: &&'static str) {
            self.evicted.push(*key);
        }
    }

    #[test]
    fn evicts_oldest_insert() {
        let mut cache = LruCache::new(2);
        cache.add("a", 1);
        cache.add("b", 2);
        cache.add("c", 3);
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn get_does_not_touch() {
        let mut cache = LruCache::new(2);
        cache.add("a", 1);
        cache.add("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));
        cache.add("c", 3);
        assert!(!cache.contains(&"a"));
    }

    #[test]
    fn refresh_moves_key_to_back() {
        let mut cache = LruCache::new(2);
        cache.add("a", 1);
        cache.add("b", 2);
        cache.add("a", 10);
        cache.add("c", 3);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert!(!cache.contains(&"b"));
        assert_eq!(cache.keys_by_age().copied().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn observer_sees_inserts_and_evictions() {
        let mut cache = LruCache::new(1);
        let mut recorder = Recorder::default();
        cache.add_with("a", 1, &mut recorder);
        cache.add_with("a", 2, &mut recorder);
        cache.add_with("b", 3, &mut recorder);
        assert_eq!(recorder.inserted, vec!["a", "a", "b"]);
        assert_eq!(recorder.evicted, vec!["a"]);
    }

    #[test]
    fn add_if_room_never_evicts() {
        let mut cache = LruCache::new(2);
        assert!(cache.add_if_room("a", 1));
        assert!(cache.add_if_room("b", 2));
        assert!(!cache.add_if_room("c", 3));
        assert!(cache.add_if_room("a", 5));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(&5));
        assert!(!cache.contains(&"c"));
    }

    #[test]
    fn clear_empties_but_keeps_capacity() {
        let mut cache = LruCache::new(3);
        cache.add("a", 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 3);
        cache.add("b", 2);
        assert_eq!(cache.keys_by_age().count(), 1);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut cache = LruCache::new(0);
        cache.add("a", 1);
        cache.add("b", 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"b"));
    }
}
