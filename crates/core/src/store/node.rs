//! One storage host: its partition engines and their admin state.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::ConcurrentLruCache;
use crate::cnf;
use crate::err::Error;
use crate::ids::{HostAddr, PartitionId, SpaceId, Version};
use crate::kvs::mem::MemStore;
use crate::kvs::Store;
use crate::meta::MetaCache;
use crate::meta::SpaceInfo;
use crate::rpc::PlanRef;
use crate::store::locks::MemoryLocks;
use crate::store::txn::TransactionManager;
use crate::val::Value;

/// The engines of one space on one host.
pub struct SpaceEngine {
	pub space: SpaceId,
	parts: DashMap<PartitionId, Arc<MemStore>>,
	blocked: AtomicBool,
}

impl SpaceEngine {
	fn new(space: SpaceId) -> Self {
		Self {
			space,
			parts: DashMap::new(),
			blocked: AtomicBool::new(false),
		}
	}

	pub fn part(&self, part: PartitionId) -> Result<Arc<MemStore>, Error> {
		self.parts.get(&part).map(|p| p.clone()).ok_or(Error::PartNotFound(part))
	}

	pub fn part_ids(&self) -> Vec<PartitionId> {
		let mut ids: Vec<PartitionId> = self.parts.iter().map(|p| *p.key()).collect();
		ids.sort();
		ids
	}

	pub fn set_blocked(&self, blocked: bool) {
		self.blocked.store(blocked, Ordering::SeqCst);
	}

	pub fn is_blocked(&self) -> bool {
		self.blocked.load(Ordering::SeqCst)
	}

	/// Fail with `WriteBlocked` while a snapshot is in flight.
	pub fn check_writable(&self) -> Result<(), Error> {
		if self.is_blocked() {
			Err(Error::WriteBlocked(self.space))
		} else {
			Ok(())
		}
	}
}

/// A storage service process: the unit the meta service addresses.
pub struct StorageNode {
	pub addr: HostAddr,
	pub cache: Arc<MetaCache>,
	pub locks: MemoryLocks,
	pub txn: TransactionManager,
	/// Decoded property maps keyed by raw row key. Row keys embed the
	/// version, so an entry can never go stale.
	pub decode_cache: ConcurrentLruCache<Vec<u8>, Value>,
	data_dir: PathBuf,
	spaces: DashMap<SpaceId, Arc<SpaceEngine>>,
}

impl StorageNode {
	pub fn new(addr: impl Into<HostAddr>, cache: Arc<MetaCache>, data_dir: PathBuf) -> Self {
		Self {
			addr: addr.into(),
			cache,
			locks: MemoryLocks::new(),
			txn: TransactionManager::new(),
			decode_cache: ConcurrentLruCache::new(*cnf::DECODE_CACHE_CAPACITY, cnf::LRU_BUCKETS_EXP),
			data_dir,
			spaces: DashMap::new(),
		}
	}

	/// Start serving a partition of a space on this host.
	pub fn add_part(&self, space: SpaceId, part: PartitionId) {
		self.spaces
			.entry(space)
			.or_insert_with(|| Arc::new(SpaceEngine::new(space)))
			.parts
			.insert(part, Arc::new(MemStore::new()));
	}

	pub fn engine(&self, space: SpaceId) -> Result<Arc<SpaceEngine>, Error> {
		self.spaces.get(&space).map(|e| e.clone()).ok_or(Error::SpaceNotFound(space))
	}

	pub fn space_ids(&self) -> Vec<SpaceId> {
		let mut ids: Vec<SpaceId> = self.spaces.iter().map(|e| *e.key()).collect();
		ids.sort();
		ids
	}

	/// Drop every engine of a space.
	pub fn remove_space(&self, space: SpaceId) {
		self.spaces.remove(&space);
	}

	/// Where this host keeps checkpoint directories for one partition.
	pub fn checkpoint_dir(&self, space: SpaceId, part: PartitionId) -> PathBuf {
		self.data_dir.join(space.to_string()).join(part.to_string())
	}

	/// Where this host keeps a space's data.
	pub fn space_dir(&self, space: SpaceId) -> PathBuf {
		self.data_dir.join(space.to_string())
	}

	/// The cached space info every processor starts from.
	pub fn space_info(&self, space: SpaceId) -> Result<Arc<SpaceInfo>, Error> {
		Ok(self.cache.load().space(space)?.clone())
	}

	/// Cooperative cancellation: fail fast when the plan was killed.
	pub fn check_plan(&self, plan: &Option<PlanRef>) -> Result<(), Error> {
		if let Some(p) = plan {
			if self.cache.is_plan_killed(p) {
				return Err(Error::PlanKilled);
			}
		}
		Ok(())
	}
}

/// The version stamp shared by every row of one mutation request.
pub fn version_stamp() -> Version {
	chrono::Utc::now().timestamp_micros()
}

/// The newest live row under a prefix: smallest inverted version wins,
/// selected by parsed version rather than scan order.
pub fn newest_under<F>(store: &MemStore, prefix: &[u8], version_of: F) -> Result<Option<(Vec<u8>, Vec<u8>)>, Error>
where
	F: Fn(&[u8]) -> Result<Version, Error>,
{
	let mut best: Option<(Version, Vec<u8>, Vec<u8>)> = None;
	for (key, val) in store.prefix(prefix)? {
		let version = version_of(&key)?;
		match &best {
			Some((v, _, _)) if *v >= version => {}
			_ => best = Some((version, key, val)),
		}
	}
	Ok(best.map(|(_, k, v)| (k, v)))
}
