//! Copy-on-write snapshots of the catalog.
//!
//! Readers hold an `Arc` to an immutable snapshot and are never blocked
//! by a refresh; the compaction filter additionally consults the last
//! refresh time to retain keys it cannot resolve inside one refresh
//! window.

use dashmap::DashSet;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cnf;
use crate::err::Error;
use crate::ids::{EdgeType, HostAddr, IndexId, PartitionId, SpaceId, TagId};
use crate::meta::catalog::Catalog;
use crate::meta::schema::{EdgeDesc, IndexDesc, SpaceDesc, TagDesc};
use crate::rpc::PlanRef;

/// Everything cached about one space.
#[derive(Clone, Debug, Default)]
pub struct SpaceInfo {
	pub desc: Option<SpaceDesc>,
	pub tags: HashMap<TagId, TagDesc>,
	pub tags_by_name: HashMap<String, TagId>,
	pub edges: HashMap<EdgeType, EdgeDesc>,
	pub edges_by_name: HashMap<String, EdgeType>,
	pub indexes: HashMap<IndexId, IndexDesc>,
	pub parts: HashMap<PartitionId, Vec<HostAddr>>,
}

impl SpaceInfo {
	pub fn desc(&self) -> &SpaceDesc {
		self.desc.as_ref().expect("a cached space always carries its descriptor")
	}

	pub fn vid_len(&self) -> usize {
		self.desc().vid_type.vid_len()
	}

	/// An edge descriptor, looked up by signed type.
	pub fn edge(&self, etype: EdgeType) -> Option<&EdgeDesc> {
		self.edges.get(&etype.abs())
	}
}

/// One immutable view of the whole catalog.
#[derive(Clone, Debug, Default)]
pub struct MetaSnapshot {
	pub spaces: HashMap<SpaceId, Arc<SpaceInfo>>,
}

impl MetaSnapshot {
	pub fn space(&self, id: SpaceId) -> Result<&Arc<SpaceInfo>, Error> {
		self.spaces.get(&id).ok_or(Error::SpaceNotFound(id))
	}
}

pub struct MetaCache {
	catalog: Arc<Catalog>,
	snapshot: RwLock<Arc<MetaSnapshot>>,
	refreshed_at: RwLock<Instant>,
	killed: DashSet<PlanRef>,
}

impl MetaCache {
	/// Build a cache over a catalog and load the first snapshot.
	pub fn new(catalog: Arc<Catalog>) -> Result<Self, Error> {
		let cache = Self {
			catalog,
			snapshot: RwLock::new(Arc::new(MetaSnapshot::default())),
			refreshed_at: RwLock::new(Instant::now()),
			killed: DashSet::new(),
		};
		cache.refresh()?;
		Ok(cache)
	}

	/// Rebuild the snapshot from the catalog. The single writer.
	pub fn refresh(&self) -> Result<(), Error> {
		let mut spaces = HashMap::new();
		for desc in self.catalog.list_spaces()? {
			let mut info = SpaceInfo {
				desc: Some(desc.clone()),
				..Default::default()
			};
			for tag in self.catalog.list_tags(desc.id)? {
				info.tags_by_name.insert(tag.name.clone(), tag.id);
				info.tags.insert(tag.id, tag);
			}
			for edge in self.catalog.list_edges(desc.id)? {
				info.edges_by_name.insert(edge.name.clone(), edge.id);
				info.edges.insert(edge.id, edge);
			}
			for index in self.catalog.list_indexes(desc.id)? {
				info.indexes.insert(index.id, index);
			}
			for (part, hosts) in self.catalog.list_parts(desc.id)? {
				info.parts.insert(part, hosts);
			}
			spaces.insert(desc.id, Arc::new(info));
		}
		*self.snapshot.write() = Arc::new(MetaSnapshot {
			spaces,
		});
		*self.refreshed_at.write() = Instant::now();
		Ok(())
	}

	/// The current snapshot. Cheap; the reader keeps the `Arc`.
	pub fn load(&self) -> Arc<MetaSnapshot> {
		self.snapshot.read().clone()
	}

	/// How long ago the snapshot was rebuilt.
	pub fn age(&self) -> Duration {
		self.refreshed_at.read().elapsed()
	}

	/// Is the snapshot old enough that a missing schema can be trusted
	/// to really be gone?
	pub fn is_fresh(&self) -> bool {
		self.age() < Duration::from_secs(*cnf::META_CACHE_REFRESH_SECS)
	}

	/// The underlying catalog, for paths that must bypass the cache.
	pub fn catalog(&self) -> &Arc<Catalog> {
		&self.catalog
	}

	// ----------------------------------------------------------------
	// Plan cancellation
	// ----------------------------------------------------------------

	/// Mark a plan as killed; processors observe it on their next check.
	pub fn kill_plan(&self, plan: PlanRef) {
		self.killed.insert(plan);
	}

	pub fn is_plan_killed(&self, plan: &PlanRef) -> bool {
		self.killed.contains(plan)
	}

	/// Forget a finished plan.
	pub fn release_plan(&self, plan: &PlanRef) {
		self.killed.remove(plan);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::schema::{Field, FieldType, Schema, VidType};

	#[test]
	fn refresh_builds_lookup_maps() {
		let catalog = Arc::new(Catalog::new());
		let space = catalog.create_space("test", 2, 1, VidType::Int64).unwrap();
		let tag = catalog
			.create_tag(space.id, "person", Schema::new(1, vec![Field::new("name", FieldType::String)]))
			.unwrap();
		let cache = MetaCache::new(catalog.clone()).unwrap();

		let snap = cache.load();
		let info = snap.space(space.id).unwrap();
		assert_eq!(info.tags_by_name["person"], tag.id);
		assert_eq!(info.vid_len(), 8);

		// A stale Arc keeps working after a refresh drops the space
		catalog.drop_space(space.id).unwrap();
		cache.refresh().unwrap();
		assert!(cache.load().space(space.id).is_err());
		assert_eq!(info.tags_by_name["person"], tag.id);
	}

	#[test]
	fn plan_kill_round_trip() {
		let catalog = Arc::new(Catalog::new());
		let cache = MetaCache::new(catalog).unwrap();
		let plan = PlanRef {
			session_id: 1,
			plan_id: 9,
		};
		assert!(!cache.is_plan_killed(&plan));
		cache.kill_plan(plan);
		assert!(cache.is_plan_killed(&plan));
		cache.release_plan(&plan);
		assert!(!cache.is_plan_killed(&plan));
	}
}
