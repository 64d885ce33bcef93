//! Admin processors: checkpoints, write blocking and space clearing.

use tracing::instrument;
use std::collections::HashMap;
use std::time::Instant;

use crate::err::Error;
use crate::ids::SpaceId;
use crate::key;
use crate::kvs::Store;
use crate::rpc::{BlockSign, CheckpointStats, LogInfo};
use crate::store::metrics;
use crate::store::node::StorageNode;

/// Create a named checkpoint for every partition of the given spaces.
#[instrument(level = "debug", skip(node))]
pub fn create_checkpoint(
	node: &StorageNode,
	spaces: &[SpaceId],
	name: &str,
) -> Result<Vec<CheckpointStats>, Error> {
	let started = Instant::now();
	let result = (|| {
		let mut out = Vec::with_capacity(spaces.len());
		for space in spaces {
			let engine = node.engine(*space)?;
			let mut parts = HashMap::new();
			for part in engine.part_ids() {
				let store = engine.part(part)?;
				let info = store.create_checkpoint(&node.checkpoint_dir(*space, part), name)?;
				parts.insert(
					part,
					LogInfo {
						log_id: info.log_id,
						term: info.term,
					},
				);
			}
			out.push(CheckpointStats {
				space: *space,
				parts,
				data_path: node.space_dir(*space),
			});
		}
		Ok(out)
	})();
	metrics::record("create_checkpoint", started.elapsed(), result.is_ok());
	result
}

/// Drop a named checkpoint on every partition of the given spaces.
#[instrument(level = "debug", skip(node))]
pub fn drop_checkpoint(node: &StorageNode, spaces: &[SpaceId], name: &str) -> Result<(), Error> {
	let started = Instant::now();
	let result = (|| {
		for space in spaces {
			let engine = node.engine(*space)?;
			for part in engine.part_ids() {
				let store = engine.part(part)?;
				store.drop_checkpoint(&node.checkpoint_dir(*space, part), name)?;
			}
		}
		Ok(())
	})();
	metrics::record("drop_checkpoint", started.elapsed(), result.is_ok());
	result
}

/// Toggle the write block on the given spaces.
#[instrument(level = "debug", skip(node))]
pub fn blocking_writes(node: &StorageNode, spaces: &[SpaceId], sign: BlockSign) -> Result<(), Error> {
	let started = Instant::now();
	let result = (|| {
		for space in spaces {
			let engine = node.engine(*space)?;
			engine.set_blocked(sign == BlockSign::BlockOn);
		}
		Ok(())
	})();
	metrics::record("blocking_writes", started.elapsed(), result.is_ok());
	result
}

/// Delete every key of a space on this host, partition by partition.
#[instrument(level = "debug", skip(node))]
pub fn clear_space(node: &StorageNode, space: SpaceId) -> Result<(), Error> {
	let started = Instant::now();
	let result = (|| {
		let engine = node.engine(space)?;
		for part in engine.part_ids() {
			let store = engine.part(part)?;
			let prefix = key::part_prefix(part);
			let mut end = prefix.clone();
			for byte in end.iter_mut().rev() {
				if *byte < 0xff {
					*byte += 1;
					break;
				}
				*byte = 0x00;
			}
			store.delete_range(&prefix, &end)?;
		}
		Ok(())
	})();
	metrics::record("clear_space", started.elapsed(), result.is_ok());
	result
}
