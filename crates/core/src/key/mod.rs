//! How keys are structured in the key value store.
///
/// All multi-byte fields are little-endian. Versions are stored
/// inverted so the newest version of a row sorts first under its
/// prefix.
///
/// crate::key::vertex     {part}{vid}{tag}{version}
/// crate::key::edge       {part}{src}{etype}{rank}{dst}{version}
/// crate::key::lock       {part}{src}{etype}{rank}{dst}{version}\x00
/// crate::key::index      {part}{index}{values}{ref}
/// crate::key::system     {part=0}{marker}{payload}
pub mod edge;
pub mod index;
pub mod lock;
pub mod system;
pub mod vertex;

use crate::cnf::SYSTEM_PART;
use crate::err::Error;
use crate::ids::{PartitionId, Version};

pub(crate) const PART_LEN: usize = 4;
pub(crate) const TAG_LEN: usize = 4;
pub(crate) const TYPE_LEN: usize = 4;
pub(crate) const RANK_LEN: usize = 8;
pub(crate) const VER_LEN: usize = 8;

/// The classification of a raw key by its layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyKind {
	Vertex,
	Edge,
	Lock,
	Index,
	System,
}

/// Classify a key. Index keys are the fall-through: they are the only
/// variable-length family in a data partition.
pub fn kind(vid_len: usize, key: &[u8]) -> KeyKind {
	if system::is_system(key) {
		KeyKind::System
	} else if vertex::is_vertex(vid_len, key) {
		KeyKind::Vertex
	} else if edge::is_edge(vid_len, key) {
		KeyKind::Edge
	} else if lock::is_lock(vid_len, key) {
		KeyKind::Lock
	} else {
		KeyKind::Index
	}
}

/// The prefix every key of a partition shares.
pub fn part_prefix(part: PartitionId) -> Vec<u8> {
	part.to_le_bytes().to_vec()
}

// Store a version inverted so newer versions order first.
pub(crate) fn encode_version(v: Version) -> [u8; VER_LEN] {
	((i64::MAX - v) as u64).to_le_bytes()
}

pub(crate) fn decode_version(bytes: &[u8]) -> Version {
	let mut buf = [0u8; VER_LEN];
	buf.copy_from_slice(bytes);
	i64::MAX - u64::from_le_bytes(buf) as i64
}

pub(crate) fn read_i32(bytes: &[u8]) -> i32 {
	let mut buf = [0u8; 4];
	buf.copy_from_slice(&bytes[..4]);
	i32::from_le_bytes(buf)
}

pub(crate) fn read_i64(bytes: &[u8]) -> i64 {
	let mut buf = [0u8; 8];
	buf.copy_from_slice(&bytes[..8]);
	i64::from_le_bytes(buf)
}

pub(crate) fn format_err(what: &str, key: &[u8]) -> Error {
	Error::KeyFormat(format!("{what}: {} bytes", key.len()))
}

/// The partition a key belongs to. Total over every key family.
pub fn parse_part(key: &[u8]) -> Result<PartitionId, Error> {
	if key.len() < PART_LEN {
		return Err(format_err("key too short for a partition id", key));
	}
	Ok(read_i32(key))
}

const _: () = assert!(SYSTEM_PART == 0, "system keys assume the reserved partition is zero");
