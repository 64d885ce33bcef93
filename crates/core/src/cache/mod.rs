//! A bounded, sharded LRU cache used on the storage read path.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

const NIL: usize = usize::MAX;

/// The outcome of [`ConcurrentLruCache::put_if_absent`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PutResult<V> {
	/// The key was absent and the value has been inserted
	Inserted,
	/// The key was present; this is its current value
	Existing(V),
}

/// A concurrent LRU cache sharded into `2^exp` independently locked
/// buckets. Capacity is split across the buckets; each bucket evicts
/// its own least-recently-used entry when full.
pub struct ConcurrentLruCache<K, V> {
	buckets: Vec<Mutex<Lru<K, V>>>,
	mask: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> ConcurrentLruCache<K, V> {
	/// Create a cache with the given total capacity and `2^exp` buckets.
	pub fn new(capacity: usize, exp: u32) -> Self {
		let buckets_num = 1usize << exp;
		assert!(capacity >= buckets_num, "capacity must cover every bucket");
		let per_bucket = capacity >> exp;
		let mut left = capacity;
		let mut buckets = Vec::with_capacity(buckets_num);
		for _ in 0..buckets_num - 1 {
			buckets.push(Mutex::new(Lru::new(per_bucket)));
			left -= per_bucket;
		}
		// The last bucket takes the remainder
		buckets.push(Mutex::new(Lru::new(left)));
		Self {
			buckets,
			mask: (buckets_num - 1) as u64,
		}
	}

	// The hint lets a caller that already hashed the key skip rehashing.
	fn bucket(&self, key: &K, hint: Option<u64>) -> &Mutex<Lru<K, V>> {
		let h = match hint {
			Some(h) => h,
			None => {
				let mut hasher = std::collections::hash_map::DefaultHasher::new();
				key.hash(&mut hasher);
				hasher.finish()
			}
		};
		&self.buckets[(h & self.mask) as usize]
	}

	pub fn contains(&self, key: &K, hint: Option<u64>) -> bool {
		self.bucket(key, hint).lock().contains(key)
	}

	/// Fetch a value, recording a lookup and marking the entry as most
	/// recently used on a hit.
	pub fn get(&self, key: &K, hint: Option<u64>) -> Option<V> {
		self.bucket(key, hint).lock().get(key)
	}

	/// Insert a value, overwriting on key collision and evicting the
	/// least-recently-used entry when the bucket is full.
	pub fn insert(&self, key: K, val: V, hint: Option<u64>) {
		self.bucket(&key, hint).lock().insert(key, val);
	}

	/// Insert only when absent; an existing value is returned untouched.
	pub fn put_if_absent(&self, key: K, val: V, hint: Option<u64>) -> PutResult<V> {
		let mut bucket = self.bucket(&key, hint).lock();
		match bucket.get(&key) {
			Some(v) => PutResult::Existing(v),
			None => {
				bucket.insert(key, val);
				PutResult::Inserted
			}
		}
	}

	/// Drop a key if present.
	pub fn evict(&self, key: &K, hint: Option<u64>) {
		self.bucket(key, hint).lock().evict(key);
	}

	/// Drop everything and reset the counters.
	pub fn clear(&self) {
		for bucket in &self.buckets {
			bucket.lock().clear();
		}
	}

	/// Total lookups across all buckets.
	pub fn total(&self) -> u64 {
		self.buckets.iter().map(|b| b.lock().total).sum()
	}

	/// Lookup hits across all buckets.
	pub fn hits(&self) -> u64 {
		self.buckets.iter().map(|b| b.lock().evicts_hits().1).sum()
	}

	/// Evictions across all buckets.
	pub fn evicts(&self) -> u64 {
		self.buckets.iter().map(|b| b.lock().evicts_hits().0).sum()
	}

	pub fn len(&self) -> usize {
		self.buckets.iter().map(|b| b.lock().len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

// One bucket: a hash map into a slab-backed doubly linked recency list,
// most recent at the head.
struct Lru<K, V> {
	map: HashMap<K, usize>,
	nodes: Vec<Node<K, V>>,
	free: Vec<usize>,
	head: usize,
	tail: usize,
	capacity: usize,
	total: u64,
	hits: u64,
	evicts: u64,
}

struct Node<K, V> {
	key: K,
	val: V,
	prev: usize,
	next: usize,
}

impl<K: Hash + Eq + Clone, V: Clone> Lru<K, V> {
	fn new(capacity: usize) -> Self {
		Self {
			map: HashMap::new(),
			nodes: Vec::new(),
			free: Vec::new(),
			head: NIL,
			tail: NIL,
			capacity,
			total: 0,
			hits: 0,
			evicts: 0,
		}
	}

	fn len(&self) -> usize {
		self.map.len()
	}

	fn contains(&self, key: &K) -> bool {
		self.map.contains_key(key)
	}

	fn get(&mut self, key: &K) -> Option<V> {
		self.total += 1;
		match self.map.get(key) {
			Some(&idx) => {
				self.touch(idx);
				self.hits += 1;
				Some(self.nodes[idx].val.clone())
			}
			None => None,
		}
	}

	fn insert(&mut self, key: K, val: V) {
		if let Some(&idx) = self.map.get(&key) {
			// Overwrite and refresh recency
			self.nodes[idx].val = val;
			self.touch(idx);
			return;
		}
		if self.map.len() >= self.capacity {
			self.evict_lru();
		}
		let idx = match self.free.pop() {
			Some(idx) => {
				self.nodes[idx] = Node {
					key: key.clone(),
					val,
					prev: NIL,
					next: NIL,
				};
				idx
			}
			None => {
				self.nodes.push(Node {
					key: key.clone(),
					val,
					prev: NIL,
					next: NIL,
				});
				self.nodes.len() - 1
			}
		};
		self.push_front(idx);
		self.map.insert(key, idx);
	}

	fn evict(&mut self, key: &K) {
		if let Some(idx) = self.map.remove(key) {
			self.unlink(idx);
			self.free.push(idx);
			self.evicts += 1;
		}
	}

	fn clear(&mut self) {
		self.map.clear();
		self.nodes.clear();
		self.free.clear();
		self.head = NIL;
		self.tail = NIL;
		self.total = 0;
		self.hits = 0;
		self.evicts = 0;
	}

	fn evicts_hits(&self) -> (u64, u64) {
		(self.evicts, self.hits)
	}

	fn evict_lru(&mut self) {
		let idx = self.tail;
		if idx == NIL {
			return;
		}
		let key = self.nodes[idx].key.clone();
		self.map.remove(&key);
		self.unlink(idx);
		self.free.push(idx);
		self.evicts += 1;
	}

	fn touch(&mut self, idx: usize) {
		if self.head != idx {
			self.unlink(idx);
			self.push_front(idx);
		}
	}

	fn push_front(&mut self, idx: usize) {
		self.nodes[idx].prev = NIL;
		self.nodes[idx].next = self.head;
		if self.head != NIL {
			self.nodes[self.head].prev = idx;
		}
		self.head = idx;
		if self.tail == NIL {
			self.tail = idx;
		}
	}

	fn unlink(&mut self, idx: usize) {
		let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
		if prev != NIL {
			self.nodes[prev].next = next;
		} else {
			self.head = next;
		}
		if next != NIL {
			self.nodes[next].prev = prev;
		} else {
			self.tail = prev;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn eviction_order_is_lru() {
		// One bucket so eviction order is deterministic
		let cache: ConcurrentLruCache<u64, u64> = ConcurrentLruCache::new(1000, 0);
		for i in 0..2000u64 {
			cache.insert(i, i, None);
		}
		assert_eq!(cache.evicts(), 1000);
		assert_eq!(cache.len(), 1000);
		assert!(cache.get(&500, None).is_none());
		assert_eq!(cache.get(&1500, None), Some(1500));
	}

	#[test]
	fn get_refreshes_recency() {
		let cache: ConcurrentLruCache<u64, u64> = ConcurrentLruCache::new(2, 0);
		cache.insert(1, 1, None);
		cache.insert(2, 2, None);
		// Touch 1 so 2 becomes the eviction victim
		assert_eq!(cache.get(&1, None), Some(1));
		cache.insert(3, 3, None);
		assert!(cache.get(&2, None).is_none());
		assert_eq!(cache.get(&1, None), Some(1));
		assert_eq!(cache.get(&3, None), Some(3));
	}

	#[test]
	fn put_if_absent_keeps_the_first_value() {
		let cache: ConcurrentLruCache<String, u64> = ConcurrentLruCache::new(16, 0);
		assert_eq!(cache.put_if_absent("k".to_string(), 1, None), PutResult::Inserted);
		assert_eq!(cache.put_if_absent("k".to_string(), 2, None), PutResult::Existing(1));
		assert_eq!(cache.get(&"k".to_string(), None), Some(1));
	}

	#[test]
	fn counters_track_lookups() {
		let cache: ConcurrentLruCache<u64, u64> = ConcurrentLruCache::new(16, 0);
		cache.insert(1, 1, None);
		cache.get(&1, None);
		cache.get(&2, None);
		assert_eq!(cache.total(), 2);
		assert_eq!(cache.hits(), 1);
	}

	#[test]
	fn hints_route_to_the_same_bucket() {
		let cache: ConcurrentLruCache<u64, u64> = ConcurrentLruCache::new(64, 2);
		cache.insert(9, 9, Some(5));
		assert!(cache.contains(&9, Some(5)));
		assert_eq!(cache.get(&9, Some(5)), Some(9));
		cache.evict(&9, Some(5));
		assert!(!cache.contains(&9, Some(5)));
	}

	#[test]
	fn overwrite_does_not_grow() {
		let cache: ConcurrentLruCache<u64, u64> = ConcurrentLruCache::new(16, 0);
		cache.insert(1, 1, None);
		cache.insert(1, 2, None);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get(&1, None), Some(2));
	}
}
