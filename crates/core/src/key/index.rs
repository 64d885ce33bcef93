//! Stores a secondary index entry
use crate::err::Error;
use crate::ids::{IndexId, PartitionId};
use crate::key::{format_err, read_i32, PART_LEN};

const INDEX_LEN: usize = 4;

/// A parsed index key: the owning index plus the opaque tail holding
/// the encoded field values and the reference key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexKey {
	pub part: PartitionId,
	pub index: IndexId,
	pub tail: Vec<u8>,
}

/// Build an index key: encoded field values followed by the reference
/// key of the base row (the vertex id, or the edge endpoint triple).
pub fn new(part: PartitionId, index: IndexId, values: &[u8], reference: &[u8]) -> Vec<u8> {
	let mut key = Vec::with_capacity(PART_LEN + INDEX_LEN + values.len() + reference.len());
	key.extend_from_slice(&part.to_le_bytes());
	key.extend_from_slice(&index.to_le_bytes());
	key.extend_from_slice(values);
	key.extend_from_slice(reference);
	key
}

/// The prefix of every entry of one index in one partition.
pub fn prefix(part: PartitionId, index: IndexId) -> Vec<u8> {
	let mut key = Vec::with_capacity(PART_LEN + INDEX_LEN);
	key.extend_from_slice(&part.to_le_bytes());
	key.extend_from_slice(&index.to_le_bytes());
	key
}

/// The prefix of the entries matching one encoded value tuple.
pub fn value_prefix(part: PartitionId, index: IndexId, values: &[u8]) -> Vec<u8> {
	let mut key = prefix(part, index);
	key.extend_from_slice(values);
	key
}

/// Parse an index key. The tail stays opaque; splitting it needs the
/// index definition, which the codec deliberately does not consult.
pub fn parse(key: &[u8]) -> Result<IndexKey, Error> {
	if key.len() < PART_LEN + INDEX_LEN {
		return Err(format_err("not an index key", key));
	}
	Ok(IndexKey {
		part: read_i32(key),
		index: read_i32(&key[PART_LEN..]),
		tail: key[PART_LEN + INDEX_LEN..].to_vec(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key() {
		let enc = new(1, 42, b"ab", b"ref");
		assert_eq!(&enc[0..4], &[1, 0, 0, 0]);
		assert_eq!(&enc[4..8], &[42, 0, 0, 0]);
		assert_eq!(&enc[8..], b"abref");
		let dec = parse(&enc).unwrap();
		assert_eq!(dec.index, 42);
		assert_eq!(dec.tail, b"abref");
		assert!(enc.starts_with(&value_prefix(1, 42, b"ab")));
	}
}
