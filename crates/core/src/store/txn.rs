//! Resuming torn forward/reverse edge pairs.
//!
//! An edge write leaves a lock marker next to its forward copy until
//! the reverse copy is committed. The resume scan re-runs on leader
//! start: markers whose pair is complete are cleared, markers whose
//! forward copy survived have their reverse copy rewritten from the
//! marker payload, and markers with nothing behind them are declared
//! lost and dropped.

use tracing::instrument;
use dashmap::DashSet;

use crate::err::Error;
use crate::ids::SpaceId;
use crate::key;
use crate::kvs::Store;
use crate::store::node::{newest_under, StorageNode};

/// The identity of an edge whose pair is not yet known to be complete.
type DanglingEdge = (SpaceId, Vec<u8>);

#[derive(Default)]
pub struct TransactionManager {
	dangling: DashSet<DanglingEdge>,
}

impl TransactionManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Note an edge whose reverse copy is pending.
	pub fn add_dangling(&self, space: SpaceId, edge_key: Vec<u8>) {
		self.dangling.insert((space, edge_key));
	}

	pub fn dangling_count(&self) -> usize {
		self.dangling.len()
	}

	/// Walk every partition's lock markers and settle them.
	///
	/// Returns how many pairs were repaired.
	#[instrument(level = "debug", skip_all)]
	pub fn resume(&self, node: &StorageNode) -> Result<u64, Error> {
		let mut repaired = 0u64;
		for space in node.space_ids() {
			let info = match node.space_info(space) {
				Ok(info) => info,
				Err(_) => continue,
			};
			let vid_len = info.vid_len();
			let engine = node.engine(space)?;
			for part in engine.part_ids() {
				let store = engine.part(part)?;
				// Lock markers share the partition with data keys
				for (raw, payload) in store.prefix(&key::part_prefix(part))? {
					if !key::lock::is_lock(vid_len, &raw) {
						continue;
					}
					let edge = key::lock::parse(vid_len, &raw)?;
					let fwd_prefix = key::edge::prefix_rank_dst(
						vid_len, part, &edge.src, edge.etype, edge.rank, &edge.dst,
					);
					let forward =
						newest_under(&store, &fwd_prefix, |k| {
							Ok(key::edge::parse(vid_len, k)?.version)
						})?;
					if forward.is_none() {
						// Nothing committed; the operation is lost
						debug!("dropping lost edge marker on part {part}");
						store.del(&raw)?;
						continue;
					}
					let rev_part = info.desc().part_of(&edge.dst);
					let Ok(rev_store) = engine.part(rev_part) else {
						// Still remote; leave the marker for its owner
						continue;
					};
					let rev_prefix = key::edge::prefix_rank_dst(
						vid_len, rev_part, &edge.dst, -edge.etype, edge.rank, &edge.src,
					);
					let reverse = newest_under(&rev_store, &rev_prefix, |k| {
						Ok(key::edge::parse(vid_len, k)?.version)
					})?;
					if reverse.is_none() {
						rev_store.put(
							key::edge::new(
								vid_len,
								rev_part,
								&edge.dst,
								-edge.etype,
								edge.rank,
								&edge.src,
								edge.version,
							),
							payload.clone(),
						)?;
						repaired += 1;
					}
					store.del(&raw)?;
					self.dangling.remove(&(space, fwd_prefix));
				}
			}
		}
		Ok(repaired)
	}
}
