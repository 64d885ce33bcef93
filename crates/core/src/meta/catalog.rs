//! The authoritative metadata store.
//!
//! Every record lives under a system key in the metadata space's own
//! engine, so the catalog itself is checkpointed like any partition.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use crate::cnf;
use crate::err::Error;
use crate::ids::{EdgeType, HostAddr, IndexId, PartitionId, SpaceId, TagId};
use crate::key::system;
use crate::key::system::SnapshotStatus;
use crate::kvs::mem::MemStore;
use crate::kvs::Store;
use crate::meta::schema::{
	EdgeDesc, IndexDesc, IndexTarget, Schema, SpaceDesc, TagDesc, VidType,
};

/// A snapshot registry entry as stored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotEntry {
	pub name: String,
	pub status: SnapshotStatus,
	pub hosts: Vec<HostAddr>,
}

pub struct Catalog {
	store: MemStore,
	next_space: AtomicI32,
	next_schema: AtomicI32,
	next_index: AtomicI32,
	heartbeats: DashMap<HostAddr, Instant>,
}

impl Default for Catalog {
	fn default() -> Self {
		Self::new()
	}
}

impl Catalog {
	pub fn new() -> Self {
		Self {
			store: MemStore::new(),
			// Space ids start after the reserved metadata space
			next_space: AtomicI32::new(cnf::META_SPACE + 1),
			next_schema: AtomicI32::new(1),
			next_index: AtomicI32::new(1),
			heartbeats: DashMap::new(),
		}
	}

	fn put_json<T: serde::Serialize>(&self, key: Vec<u8>, value: &T) -> Result<(), Error> {
		let blob = serde_json::to_vec(value)?;
		self.store.put(key, blob)?;
		Ok(())
	}

	fn get_json<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, Error> {
		match self.store.get(key)? {
			Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
			None => Ok(None),
		}
	}

	// ----------------------------------------------------------------
	// Spaces
	// ----------------------------------------------------------------

	pub fn create_space(
		&self,
		name: &str,
		partition_num: i32,
		replica_factor: i32,
		vid_type: VidType,
	) -> Result<SpaceDesc, Error> {
		if self.space_by_name(name)?.is_some() {
			return Err(Error::Thrown(format!("space `{name}` already exists")));
		}
		let desc = SpaceDesc {
			id: self.next_space.fetch_add(1, Ordering::SeqCst),
			name: name.to_string(),
			partition_num,
			replica_factor,
			vid_type,
		};
		self.put_json(system::space_key(desc.id), &desc)?;
		Ok(desc)
	}

	pub fn space(&self, id: SpaceId) -> Result<SpaceDesc, Error> {
		self.get_json(&system::space_key(id))?.ok_or(Error::SpaceNotFound(id))
	}

	pub fn space_by_name(&self, name: &str) -> Result<Option<SpaceDesc>, Error> {
		Ok(self.list_spaces()?.into_iter().find(|s| s.name == name))
	}

	pub fn list_spaces(&self) -> Result<Vec<SpaceDesc>, Error> {
		let mut out = Vec::new();
		for (_, blob) in self.store.prefix(&system::space_prefix())? {
			out.push(serde_json::from_slice(&blob)?);
		}
		Ok(out)
	}

	pub fn drop_space(&self, id: SpaceId) -> Result<(), Error> {
		// The space record and everything scoped to it
		self.store.del(&system::space_key(id))?;
		for prefix in [
			system::part_prefix(id),
			system::tag_prefix(id),
			system::edge_prefix(id),
			system::index_prefix(id),
		] {
			for (key, _) in self.store.prefix(&prefix)? {
				self.store.del(&key)?;
			}
		}
		Ok(())
	}

	// ----------------------------------------------------------------
	// Schemas
	// ----------------------------------------------------------------

	pub fn create_tag(&self, space: SpaceId, name: &str, schema: Schema) -> Result<TagDesc, Error> {
		self.space(space)?;
		if self.list_tags(space)?.iter().any(|t| t.name == name) {
			return Err(Error::Thrown(format!("tag `{name}` already exists")));
		}
		let desc = TagDesc {
			id: self.next_schema.fetch_add(1, Ordering::SeqCst),
			name: name.to_string(),
			schemas: vec![schema],
		};
		self.put_json(system::tag_key(space, desc.id), &desc)?;
		Ok(desc)
	}

	/// Append a new schema version to an existing tag.
	pub fn alter_tag(&self, space: SpaceId, tag: TagId, schema: Schema) -> Result<TagDesc, Error> {
		let mut desc = self.tag(space, tag)?;
		desc.schemas.push(schema);
		self.put_json(system::tag_key(space, tag), &desc)?;
		Ok(desc)
	}

	pub fn tag(&self, space: SpaceId, tag: TagId) -> Result<TagDesc, Error> {
		self.get_json(&system::tag_key(space, tag))?.ok_or(Error::TagNotFound(tag))
	}

	pub fn list_tags(&self, space: SpaceId) -> Result<Vec<TagDesc>, Error> {
		let mut out = Vec::new();
		for (_, blob) in self.store.prefix(&system::tag_prefix(space))? {
			out.push(serde_json::from_slice::<TagDesc>(&blob)?);
		}
		Ok(out)
	}

	pub fn drop_tag(&self, space: SpaceId, tag: TagId) -> Result<(), Error> {
		self.store.del(&system::tag_key(space, tag))?;
		Ok(())
	}

	pub fn create_edge(
		&self,
		space: SpaceId,
		name: &str,
		schema: Schema,
	) -> Result<EdgeDesc, Error> {
		self.space(space)?;
		if self.list_edges(space)?.iter().any(|e| e.name == name) {
			return Err(Error::Thrown(format!("edge `{name}` already exists")));
		}
		let desc = EdgeDesc {
			id: self.next_schema.fetch_add(1, Ordering::SeqCst),
			name: name.to_string(),
			schemas: vec![schema],
		};
		self.put_json(system::edge_key(space, desc.id), &desc)?;
		Ok(desc)
	}

	pub fn alter_edge(
		&self,
		space: SpaceId,
		etype: EdgeType,
		schema: Schema,
	) -> Result<EdgeDesc, Error> {
		let mut desc = self.edge(space, etype)?;
		desc.schemas.push(schema);
		self.put_json(system::edge_key(space, etype), &desc)?;
		Ok(desc)
	}

	pub fn edge(&self, space: SpaceId, etype: EdgeType) -> Result<EdgeDesc, Error> {
		self.get_json(&system::edge_key(space, etype.abs()))?.ok_or(Error::EdgeNotFound(etype))
	}

	pub fn list_edges(&self, space: SpaceId) -> Result<Vec<EdgeDesc>, Error> {
		let mut out = Vec::new();
		for (_, blob) in self.store.prefix(&system::edge_prefix(space))? {
			out.push(serde_json::from_slice::<EdgeDesc>(&blob)?);
		}
		Ok(out)
	}

	pub fn drop_edge(&self, space: SpaceId, etype: EdgeType) -> Result<(), Error> {
		self.store.del(&system::edge_key(space, etype.abs()))?;
		Ok(())
	}

	// ----------------------------------------------------------------
	// Indexes
	// ----------------------------------------------------------------

	pub fn create_index(
		&self,
		space: SpaceId,
		name: &str,
		target: IndexTarget,
		fields: Vec<String>,
	) -> Result<IndexDesc, Error> {
		self.space(space)?;
		// The indexed schema must exist
		match target {
			IndexTarget::Tag(t) => {
				self.tag(space, t)?;
			}
			IndexTarget::Edge(e) => {
				self.edge(space, e)?;
			}
		}
		let desc = IndexDesc {
			id: self.next_index.fetch_add(1, Ordering::SeqCst),
			name: name.to_string(),
			target,
			fields,
		};
		self.put_json(system::index_key(space, desc.id), &desc)?;
		Ok(desc)
	}

	pub fn index(&self, space: SpaceId, index: IndexId) -> Result<IndexDesc, Error> {
		self.get_json(&system::index_key(space, index))?.ok_or(Error::IndexNotFound(index))
	}

	pub fn list_indexes(&self, space: SpaceId) -> Result<Vec<IndexDesc>, Error> {
		let mut out = Vec::new();
		for (_, blob) in self.store.prefix(&system::index_prefix(space))? {
			out.push(serde_json::from_slice::<IndexDesc>(&blob)?);
		}
		Ok(out)
	}

	pub fn drop_index(&self, space: SpaceId, index: IndexId) -> Result<(), Error> {
		self.store.del(&system::index_key(space, index))?;
		Ok(())
	}

	// ----------------------------------------------------------------
	// Partition map and hosts
	// ----------------------------------------------------------------

	/// Record the replica hosts of one partition.
	pub fn set_part_hosts(
		&self,
		space: SpaceId,
		part: PartitionId,
		hosts: &[HostAddr],
	) -> Result<(), Error> {
		self.put_json(system::part_key(space, part), &hosts.to_vec())
	}

	/// The partition→hosts map of a space.
	pub fn list_parts(&self, space: SpaceId) -> Result<Vec<(PartitionId, Vec<HostAddr>)>, Error> {
		let mut out = Vec::new();
		for (key, blob) in self.store.prefix(&system::part_prefix(space))? {
			let (_, part) = system::parse_part_key(&key)?;
			out.push((part, serde_json::from_slice(&blob)?));
		}
		Ok(out)
	}

	/// The partition map restricted to the given partitions.
	pub fn list_parts_of(
		&self,
		space: SpaceId,
		part_ids: &[PartitionId],
	) -> Result<Vec<(PartitionId, Vec<HostAddr>)>, Error> {
		Ok(self
			.list_parts(space)?
			.into_iter()
			.filter(|(part, _)| part_ids.contains(part))
			.collect())
	}

	/// Which spaces each host holds partitions of, across the cluster.
	pub fn host_spaces(&self) -> Result<Vec<(HostAddr, Vec<SpaceId>)>, Error> {
		let mut map: std::collections::BTreeMap<HostAddr, std::collections::BTreeSet<SpaceId>> =
			std::collections::BTreeMap::new();
		for (key, blob) in self.store.prefix(&system::all_parts_prefix())? {
			let (space, _) = system::parse_part_key(&key)?;
			let hosts: Vec<HostAddr> = serde_json::from_slice(&blob)?;
			for host in hosts {
				map.entry(host).or_default().insert(space);
			}
		}
		Ok(map.into_iter().map(|(h, s)| (h, s.into_iter().collect())).collect())
	}

	/// Register a storage host and record a first heartbeat.
	pub fn register_host(&self, host: &HostAddr) -> Result<(), Error> {
		self.store.put(system::host_key(host), Vec::new())?;
		self.heartbeats.insert(host.clone(), Instant::now());
		Ok(())
	}

	pub fn heartbeat(&self, host: &HostAddr) {
		self.heartbeats.insert(host.clone(), Instant::now());
	}

	/// Hosts that have heartbeated within the expiry window.
	pub fn active_hosts(&self) -> Result<Vec<HostAddr>, Error> {
		let expiry = Duration::from_secs(*cnf::HOST_EXPIRY_SECS);
		let mut out = Vec::new();
		for (key, _) in self.store.prefix(&system::host_prefix())? {
			let host = system::parse_host_key(&key)?;
			if let Some(beat) = self.heartbeats.get(&host) {
				if beat.elapsed() < expiry {
					out.push(host);
				}
			}
		}
		out.sort();
		Ok(out)
	}

	// ----------------------------------------------------------------
	// Snapshot registry
	// ----------------------------------------------------------------

	pub fn put_snapshot(
		&self,
		name: &str,
		status: SnapshotStatus,
		hosts: &[HostAddr],
	) -> Result<(), Error> {
		self.store
			.put(system::snapshot_key(name), system::snapshot_value(status, hosts))?;
		Ok(())
	}

	pub fn snapshot(&self, name: &str) -> Result<Option<SnapshotEntry>, Error> {
		match self.store.get(&system::snapshot_key(name))? {
			Some(blob) => {
				let (status, hosts) = system::parse_snapshot_value(&blob)?;
				Ok(Some(SnapshotEntry {
					name: name.to_string(),
					status,
					hosts,
				}))
			}
			None => Ok(None),
		}
	}

	pub fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>, Error> {
		let mut out = Vec::new();
		for (key, blob) in self.store.prefix(&system::snapshot_prefix())? {
			let name = system::parse_snapshot_key(&key)?;
			let (status, hosts) = system::parse_snapshot_value(&blob)?;
			out.push(SnapshotEntry {
				name,
				status,
				hosts,
			});
		}
		Ok(out)
	}

	pub fn remove_snapshot(&self, name: &str) -> Result<(), Error> {
		self.store.del(&system::snapshot_key(name))?;
		Ok(())
	}
}
