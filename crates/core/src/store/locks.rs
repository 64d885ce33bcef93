//! Keyed memory locks serializing forward/reverse edge pair writes.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ids::SpaceId;

const SHARDS: usize = 16;

type LockKey = (SpaceId, Vec<u8>);

/// A sharded map of keyed async mutexes. A lock is held only for the
/// duration of one batch commit; entries are created on demand and
/// reused.
pub struct MemoryLocks {
	shards: Vec<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl Default for MemoryLocks {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryLocks {
	pub fn new() -> Self {
		Self {
			shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
		}
	}

	/// Fetch the mutex guarding one edge key. The caller locks it across
	/// the forward/reverse pair commit.
	pub async fn lock_for(&self, space: SpaceId, key: &[u8]) -> Arc<Mutex<()>> {
		let mut hasher = DefaultHasher::new();
		(space, key).hash(&mut hasher);
		let shard = &self.shards[(hasher.finish() as usize) % SHARDS];
		let mut map = shard.lock().await;
		map.entry((space, key.to_vec())).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn same_key_same_lock() {
		let locks = MemoryLocks::new();
		let a = locks.lock_for(1, b"edge").await;
		let b = locks.lock_for(1, b"edge").await;
		assert!(Arc::ptr_eq(&a, &b));
		let c = locks.lock_for(2, b"edge").await;
		assert!(!Arc::ptr_eq(&a, &c));
	}

	#[tokio::test]
	async fn lock_serializes() {
		let locks = MemoryLocks::new();
		let m = locks.lock_for(1, b"k").await;
		let guard = m.lock().await;
		assert!(m.try_lock().is_err());
		drop(guard);
		assert!(m.try_lock().is_ok());
	}
}
