//! Stores one direction of an edge
use crate::err::Error;
use crate::ids::{EdgeRank, EdgeType, PartitionId, Version, Vid};
use crate::key::{
	decode_version, encode_version, format_err, read_i32, read_i64, PART_LEN, RANK_LEN, TYPE_LEN,
	VER_LEN,
};

/// A parsed edge key. `etype` keeps its sign: negative types are the
/// reverse copies stored under the destination's partition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgeKey {
	pub part: PartitionId,
	pub src: Vid,
	pub etype: EdgeType,
	pub rank: EdgeRank,
	pub dst: Vid,
	pub version: Version,
}

impl EdgeKey {
	/// The key of the paired edge stored under the other endpoint.
	pub fn reversed(&self, part: PartitionId) -> EdgeKey {
		EdgeKey {
			part,
			src: self.dst.clone(),
			etype: -self.etype,
			rank: self.rank,
			dst: self.src.clone(),
			version: self.version,
		}
	}
}

pub(crate) fn key_len(vid_len: usize) -> usize {
	PART_LEN + vid_len + TYPE_LEN + RANK_LEN + vid_len + VER_LEN
}

pub fn is_edge(vid_len: usize, key: &[u8]) -> bool {
	key.len() == key_len(vid_len)
}

/// Build an edge key.
pub fn new(
	vid_len: usize,
	part: PartitionId,
	src: &[u8],
	etype: EdgeType,
	rank: EdgeRank,
	dst: &[u8],
	version: Version,
) -> Vec<u8> {
	debug_assert_eq!(src.len(), vid_len);
	debug_assert_eq!(dst.len(), vid_len);
	let mut key = Vec::with_capacity(key_len(vid_len));
	key.extend_from_slice(&part.to_le_bytes());
	key.extend_from_slice(src);
	key.extend_from_slice(&etype.to_le_bytes());
	key.extend_from_slice(&rank.to_le_bytes());
	key.extend_from_slice(dst);
	key.extend_from_slice(&encode_version(version));
	key
}

/// The prefix of all edges of one type leaving one vertex.
pub fn prefix(vid_len: usize, part: PartitionId, src: &[u8], etype: EdgeType) -> Vec<u8> {
	debug_assert_eq!(src.len(), vid_len);
	let mut key = Vec::with_capacity(PART_LEN + vid_len + TYPE_LEN);
	key.extend_from_slice(&part.to_le_bytes());
	key.extend_from_slice(src);
	key.extend_from_slice(&etype.to_le_bytes());
	key
}

/// The prefix of every version of one exact edge.
pub fn prefix_rank_dst(
	vid_len: usize,
	part: PartitionId,
	src: &[u8],
	etype: EdgeType,
	rank: EdgeRank,
	dst: &[u8],
) -> Vec<u8> {
	let mut key = prefix(vid_len, part, src, etype);
	key.extend_from_slice(&rank.to_le_bytes());
	key.extend_from_slice(dst);
	key
}

/// Parse an edge key. Total: fails with `KeyFormat` on a length
/// mismatch.
pub fn parse(vid_len: usize, key: &[u8]) -> Result<EdgeKey, Error> {
	if !is_edge(vid_len, key) {
		return Err(format_err("not an edge key", key));
	}
	let mut at = PART_LEN;
	let src = key[at..at + vid_len].to_vec();
	at += vid_len;
	let etype = read_i32(&key[at..]);
	at += TYPE_LEN;
	let rank = read_i64(&key[at..]);
	at += RANK_LEN;
	let dst = key[at..at + vid_len].to_vec();
	at += vid_len;
	let version = decode_version(&key[at..]);
	Ok(EdgeKey {
		part: read_i32(key),
		src,
		etype,
		rank,
		dst,
		version,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ids::int_vid;

	#[test]
	fn key() {
		let src = int_vid(1);
		let dst = int_vid(2);
		let enc = new(8, 5, &src, -3, 9, &dst, 4);
		assert_eq!(enc.len(), 40);
		assert_eq!(&enc[0..4], &[5, 0, 0, 0]);
		assert_eq!(&enc[4..12], src.as_slice());
		// negative type keeps its two's-complement bytes
		assert_eq!(&enc[12..16], &(-3i32).to_le_bytes());
		assert_eq!(&enc[16..24], &9i64.to_le_bytes());
		assert_eq!(&enc[24..32], dst.as_slice());

		let dec = parse(8, &enc).unwrap();
		assert_eq!(dec.etype, -3);
		assert_eq!(dec.rank, 9);
		assert_eq!(dec.version, 4);
	}

	#[test]
	fn reverse_pairs_up() {
		let fwd = parse(8, &new(8, 1, &int_vid(1), 7, 0, &int_vid(2), 1)).unwrap();
		let rev = fwd.reversed(2);
		assert_eq!(rev.src, int_vid(2));
		assert_eq!(rev.dst, int_vid(1));
		assert_eq!(rev.etype, -7);
		assert_eq!(rev.reversed(1), fwd);
	}

	#[test]
	fn prefixes_nest() {
		let full = new(8, 1, &int_vid(1), 7, 0, &int_vid(2), 1);
		let p1 = prefix(8, 1, &int_vid(1), 7);
		let p2 = prefix_rank_dst(8, 1, &int_vid(1), 7, 0, &int_vid(2));
		assert!(full.starts_with(&p1));
		assert!(full.starts_with(&p2));
		assert!(p2.starts_with(&p1));
	}
}
