//! Stores a vertex tag row
use crate::err::Error;
use crate::ids::{PartitionId, TagId, Version, Vid};
use crate::key::{decode_version, encode_version, format_err, read_i32, PART_LEN, TAG_LEN, VER_LEN};

/// A parsed vertex key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VertexKey {
	pub part: PartitionId,
	pub vid: Vid,
	pub tag: TagId,
	pub version: Version,
}

fn key_len(vid_len: usize) -> usize {
	PART_LEN + vid_len + TAG_LEN + VER_LEN
}

pub fn is_vertex(vid_len: usize, key: &[u8]) -> bool {
	key.len() == key_len(vid_len)
}

/// Build a vertex key. The caller passes the vertex id already widened
/// to `vid_len` bytes.
pub fn new(vid_len: usize, part: PartitionId, vid: &[u8], tag: TagId, version: Version) -> Vec<u8> {
	debug_assert_eq!(vid.len(), vid_len);
	let mut key = Vec::with_capacity(key_len(vid_len));
	key.extend_from_slice(&part.to_le_bytes());
	key.extend_from_slice(vid);
	key.extend_from_slice(&tag.to_le_bytes());
	key.extend_from_slice(&encode_version(version));
	key
}

/// The prefix of every key of one vertex: tags, then edges.
pub fn prefix(vid_len: usize, part: PartitionId, vid: &[u8]) -> Vec<u8> {
	debug_assert_eq!(vid.len(), vid_len);
	let mut key = Vec::with_capacity(PART_LEN + vid_len);
	key.extend_from_slice(&part.to_le_bytes());
	key.extend_from_slice(vid);
	key
}

/// The prefix of every version of one (vertex, tag) row.
pub fn tag_prefix(vid_len: usize, part: PartitionId, vid: &[u8], tag: TagId) -> Vec<u8> {
	let mut key = prefix(vid_len, part, vid);
	key.extend_from_slice(&tag.to_le_bytes());
	key
}

/// Parse a vertex key. Total: fails with `KeyFormat` on a length
/// mismatch.
pub fn parse(vid_len: usize, key: &[u8]) -> Result<VertexKey, Error> {
	if !is_vertex(vid_len, key) {
		return Err(format_err("not a vertex key", key));
	}
	let vid = key[PART_LEN..PART_LEN + vid_len].to_vec();
	let tag = read_i32(&key[PART_LEN + vid_len..]);
	let version = decode_version(&key[PART_LEN + vid_len + TAG_LEN..]);
	Ok(VertexKey {
		part: read_i32(key),
		vid,
		tag,
		version,
	})
}
