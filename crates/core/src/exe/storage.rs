//! Storage fan-out helpers shared by the storage-facing executors.

use std::collections::HashMap;

use crate::err::Error;
use crate::ids::PartitionId;
use crate::meta::SpaceInfo;
use crate::rpc::ResponseCommon;
use crate::val::Value;

/// How completely a fanned-out storage call succeeded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completeness {
	AllSucceeded,
	Partial,
	AllFailed,
}

/// Merge per-partition codes into a completeness state, honouring the
/// accept-partial flag.
pub fn check_completeness(
	common: &ResponseCommon,
	requested_parts: usize,
	accept_partial: bool,
) -> Result<Completeness, Error> {
	if common.failed_parts.is_empty() {
		return Ok(Completeness::AllSucceeded);
	}
	if common.failed_parts.len() >= requested_parts {
		return Err(Error::Rpc(format!(
			"all {requested_parts} partitions failed, first code {:?}",
			common.failed_parts[0].code
		)));
	}
	if accept_partial {
		warn!("accepting a partial storage response, {} parts failed", common.failed_parts.len());
		Ok(Completeness::Partial)
	} else {
		Err(Error::Rpc(format!(
			"{} of {requested_parts} partitions failed, first code {:?}",
			common.failed_parts.len(),
			common.failed_parts[0].code
		)))
	}
}

/// Shard vertex ids by their owning partition.
pub fn shard_by_part(
	info: &SpaceInfo,
	vids: impl IntoIterator<Item = Value>,
) -> Result<HashMap<PartitionId, Vec<Value>>, Error> {
	let mut parts: HashMap<PartitionId, Vec<Value>> = HashMap::new();
	for vid in vids {
		let raw = info
			.desc()
			.vid_type
			.encode(&vid)
			.ok_or_else(|| Error::KeyFormat(format!("bad vertex id {vid}")))?;
		parts.entry(info.desc().part_of(&raw)).or_default().push(vid);
	}
	Ok(parts)
}

/// The vertex ids a column value stands for: a vertex yields its id, an
/// edge its destination, a list each of its elements, and a plain value
/// itself.
pub fn value_to_vids(v: &Value) -> Vec<Value> {
	match v {
		Value::Vertex(vx) => vec![vx.vid.clone()],
		Value::Edge(e) => vec![e.dst.clone()],
		Value::List(l) => l.iter().flat_map(value_to_vids).collect(),
		Value::Null(_) | Value::Empty => Vec::new(),
		other => vec![other.clone()],
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rpc::{ErrorCode, PartitionResult};

	fn common(failed: usize) -> ResponseCommon {
		ResponseCommon {
			failed_parts: (0..failed)
				.map(|i| PartitionResult {
					part: i as i32,
					code: ErrorCode::LeaderChanged,
				})
				.collect(),
			latency_us: 0,
		}
	}

	#[test]
	fn completeness_states() {
		assert_eq!(check_completeness(&common(0), 3, false).unwrap(), Completeness::AllSucceeded);
		assert!(check_completeness(&common(1), 3, false).is_err());
		assert_eq!(check_completeness(&common(1), 3, true).unwrap(), Completeness::Partial);
		assert!(check_completeness(&common(3), 3, true).is_err());
	}

	#[test]
	fn vid_extraction() {
		use crate::val::Vertex;
		let vertex = Value::Vertex(Box::new(Vertex::new(Value::Int(7))));
		assert_eq!(value_to_vids(&vertex), vec![Value::Int(7)]);
		let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
		assert_eq!(value_to_vids(&list), vec![Value::Int(1), Value::Int(2)]);
		assert!(value_to_vids(&Value::null()).is_empty());
	}
}
