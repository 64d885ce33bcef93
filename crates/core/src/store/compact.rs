//! The schema-aware compaction filter.
//!
//! Classifies each key by layout and reclaims what reads can no longer
//! see: rows of dropped schemas, undecodable rows, TTL-expired rows,
//! empty reverse edges, orphaned index entries and stale locks. System
//! keys always survive.

use std::sync::Arc;

use crate::key;
use crate::kvs::api::CompactionFilter;
use crate::meta::schema::IndexTarget;
use crate::meta::{MetaCache, SpaceInfo};
use crate::row;
use crate::row::RowReader;
use crate::store::ttl;

pub struct StorageCompactionFilter {
	info: Arc<SpaceInfo>,
	vid_len: usize,
	/// Whether the schema snapshot is fresh enough to trust absences.
	/// A stale snapshot must never be grounds for deletion.
	trust_absence: bool,
}

impl StorageCompactionFilter {
	/// Build a filter from the current cache state of one space.
	pub fn new(cache: &MetaCache, info: Arc<SpaceInfo>) -> Self {
		let vid_len = info.vid_len();
		Self {
			info,
			vid_len,
			trust_absence: cache.is_fresh(),
		}
	}

	/// Build a filter from an explicit snapshot, stating outright
	/// whether absences in it may be trusted.
	pub fn with_snapshot(info: Arc<SpaceInfo>, trust_absence: bool) -> Self {
		let vid_len = info.vid_len();
		Self {
			info,
			vid_len,
			trust_absence,
		}
	}

	fn tag_live(&self, raw: &[u8], val: &[u8]) -> bool {
		let Ok(parsed) = key::vertex::parse(self.vid_len, raw) else {
			return false;
		};
		let Some(desc) = self.info.tags.get(&parsed.tag) else {
			// Schema gone; only reclaim when the snapshot is trustworthy
			return !self.trust_absence;
		};
		let Ok(version) = row::schema_version(val) else {
			trace!("removing undecodable vertex row");
			return false;
		};
		let Some(schema) = desc.schema(version) else {
			return !self.trust_absence;
		};
		let Ok(reader) = RowReader::new(schema, val) else {
			trace!("removing bad format vertex row");
			return false;
		};
		!ttl::expired(schema, &reader)
	}

	fn edge_live(&self, raw: &[u8], val: &[u8]) -> bool {
		let Ok(parsed) = key::edge::parse(self.vid_len, raw) else {
			return false;
		};
		// A reverse copy with no payload carries no information
		if parsed.etype < 0 && val.is_empty() {
			trace!("removing empty reverse edge");
			return false;
		}
		let Some(desc) = self.info.edge(parsed.etype) else {
			return !self.trust_absence;
		};
		let Ok(version) = row::schema_version(val) else {
			trace!("removing undecodable edge row");
			return false;
		};
		let Some(schema) = desc.schema(version) else {
			return !self.trust_absence;
		};
		let Ok(reader) = RowReader::new(schema, val) else {
			trace!("removing bad format edge row");
			return false;
		};
		!ttl::expired(schema, &reader)
	}

	fn lock_live(&self, raw: &[u8]) -> bool {
		let Ok(parsed) = key::lock::parse(self.vid_len, raw) else {
			return false;
		};
		self.info.edge(parsed.etype).is_some() || !self.trust_absence
	}

	fn index_live(&self, raw: &[u8], val: &[u8]) -> bool {
		let Ok(parsed) = key::index::parse(raw) else {
			return false;
		};
		let Some(index) = self.info.indexes.get(&parsed.index) else {
			// Orphaned: no index definition anymore
			return !self.trust_absence;
		};
		// The owning base schema must still exist
		let ttl_duration = match index.target {
			IndexTarget::Tag(t) => match self.info.tags.get(&t) {
				Some(desc) => desc.latest().ttl.as_ref().map(|t| t.duration_secs),
				None => return !self.trust_absence,
			},
			IndexTarget::Edge(e) => match self.info.edge(e) {
				Some(desc) => desc.latest().ttl.as_ref().map(|t| t.duration_secs),
				None => return !self.trust_absence,
			},
		};
		// The trailing TTL stamp, when the schema carries one
		if let (Some(duration), true) = (ttl_duration, val.len() == 8) {
			let mut buf = [0u8; 8];
			buf.copy_from_slice(val);
			if ttl::stamp_expired(i64::from_le_bytes(buf), duration) {
				return false;
			}
		}
		true
	}
}

impl CompactionFilter for StorageCompactionFilter {
	fn filter(&self, raw: &[u8], val: &[u8]) -> bool {
		match key::kind(self.vid_len, raw) {
			key::KeyKind::Vertex => !self.tag_live(raw, val),
			key::KeyKind::Edge => !self.edge_live(raw, val),
			key::KeyKind::Lock => !self.lock_live(raw),
			key::KeyKind::Index => !self.index_live(raw, val),
			// System keys are always retained
			key::KeyKind::System => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ids::int_vid;
	use crate::meta::schema::{
		EdgeDesc, Field, FieldType, Schema, SpaceDesc, TagDesc, VidType,
	};
	use crate::val::Value;

	fn space_info(tags: Vec<TagDesc>, edges: Vec<EdgeDesc>) -> Arc<SpaceInfo> {
		let mut info = SpaceInfo {
			desc: Some(SpaceDesc {
				id: 1,
				name: "s".into(),
				partition_num: 1,
				replica_factor: 1,
				vid_type: VidType::Int64,
			}),
			..Default::default()
		};
		for t in tags {
			info.tags.insert(t.id, t);
		}
		for e in edges {
			info.edges.insert(e.id, e);
		}
		Arc::new(info)
	}

	#[test]
	fn dropped_schema_reclaims_when_fresh() {
		let info = space_info(vec![], vec![]);
		let raw = key::vertex::new(8, 1, &int_vid(1), 9, 1);
		let fresh = StorageCompactionFilter::with_snapshot(info.clone(), true);
		assert!(fresh.filter(&raw, b"anything"));
		// A stale snapshot must retain the row
		let stale = StorageCompactionFilter::with_snapshot(info, false);
		assert!(!stale.filter(&raw, b"anything"));
	}

	#[test]
	fn empty_reverse_edges_are_dropped() {
		let schema = Schema::new(1, vec![Field::new("w", FieldType::Float)]);
		let info = space_info(
			vec![],
			vec![EdgeDesc {
				id: 3,
				name: "e".into(),
				schemas: vec![schema.clone()],
			}],
		);
		let filter = StorageCompactionFilter::with_snapshot(info, true);
		let rev = key::edge::new(8, 1, &int_vid(2), -3, 0, &int_vid(1), 1);
		assert!(filter.filter(&rev, b""));
		let payload = crate::row::encode(&schema, &[Value::Float(1.0)]).unwrap();
		assert!(!filter.filter(&rev, &payload));
	}

	#[test]
	fn ttl_expiry_reclaims_rows() {
		let now = chrono::Utc::now().timestamp();
		let schema = Schema::new(
			1,
			vec![Field::new("c", FieldType::Int), Field::new("ts", FieldType::Timestamp)],
		)
		.with_ttl("ts", 1);
		let info = space_info(
			vec![TagDesc {
				id: 2,
				name: "t".into(),
				schemas: vec![schema.clone()],
			}],
			vec![],
		);
		let filter = StorageCompactionFilter::with_snapshot(info, true);
		let raw = key::vertex::new(8, 1, &int_vid(1), 2, 1);
		let stale = crate::row::encode(&schema, &[Value::Int(1), Value::Int(now - 10)]).unwrap();
		let fresh = crate::row::encode(&schema, &[Value::Int(1), Value::Int(now)]).unwrap();
		assert!(filter.filter(&raw, &stale));
		assert!(!filter.filter(&raw, &fresh));
	}

	#[test]
	fn system_keys_survive() {
		let info = space_info(vec![], vec![]);
		let filter = StorageCompactionFilter::with_snapshot(info, true);
		let raw = crate::key::system::snapshot_key("SNAP");
		assert!(!filter.filter(&raw, b"whatever"));
	}
}
