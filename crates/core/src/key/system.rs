//! System keys living in the reserved partition of the metadata space
use crate::cnf::SYSTEM_PART;
use crate::err::Error;
use crate::ids::{EdgeType, HostAddr, IndexId, PartitionId, SpaceId, TagId};
use crate::key::{format_err, read_i32, PART_LEN};

// One marker byte per record family.
const SPACE: u8 = 0x01;
const PART: u8 = 0x02;
const HOST: u8 = 0x03;
const SNAPSHOT: u8 = 0x04;
const TAG: u8 = 0x05;
const EDGE: u8 = 0x06;
const INDEX: u8 = 0x07;
const MACHINE: u8 = 0x08;
const ZONE: u8 = 0x09;
const LEADER: u8 = 0x0a;

/// Is this a system key? System keys live in the reserved partition and
/// start with a known marker byte.
pub fn is_system(key: &[u8]) -> bool {
	key.len() > PART_LEN
		&& read_i32(key) == SYSTEM_PART
		&& (SPACE..=LEADER).contains(&key[PART_LEN])
}

fn base(marker: u8) -> Vec<u8> {
	let mut key = Vec::with_capacity(16);
	key.extend_from_slice(&SYSTEM_PART.to_le_bytes());
	key.push(marker);
	key
}

pub fn space_key(space: SpaceId) -> Vec<u8> {
	let mut key = base(SPACE);
	key.extend_from_slice(&space.to_le_bytes());
	key
}

pub fn space_prefix() -> Vec<u8> {
	base(SPACE)
}

pub fn part_key(space: SpaceId, part: PartitionId) -> Vec<u8> {
	let mut key = base(PART);
	key.extend_from_slice(&space.to_le_bytes());
	key.extend_from_slice(&part.to_le_bytes());
	key
}

pub fn part_prefix(space: SpaceId) -> Vec<u8> {
	let mut key = base(PART);
	key.extend_from_slice(&space.to_le_bytes());
	key
}

pub fn all_parts_prefix() -> Vec<u8> {
	base(PART)
}

/// The space a partition record belongs to.
pub fn parse_part_key(key: &[u8]) -> Result<(SpaceId, PartitionId), Error> {
	if key.len() != PART_LEN + 1 + 8 || key[PART_LEN] != PART {
		return Err(format_err("not a partition record key", key));
	}
	Ok((read_i32(&key[PART_LEN + 1..]), read_i32(&key[PART_LEN + 5..])))
}

pub fn host_key(host: &str) -> Vec<u8> {
	let mut key = base(HOST);
	key.extend_from_slice(host.as_bytes());
	key
}

pub fn host_prefix() -> Vec<u8> {
	base(HOST)
}

pub fn parse_host_key(key: &[u8]) -> Result<HostAddr, Error> {
	if key.len() <= PART_LEN + 1 || key[PART_LEN] != HOST {
		return Err(format_err("not a host record key", key));
	}
	String::from_utf8(key[PART_LEN + 1..].to_vec())
		.map_err(|_| format_err("host record key is not utf-8", key))
}

pub fn snapshot_key(name: &str) -> Vec<u8> {
	let mut key = base(SNAPSHOT);
	key.extend_from_slice(name.as_bytes());
	key
}

pub fn snapshot_prefix() -> Vec<u8> {
	base(SNAPSHOT)
}

pub fn parse_snapshot_key(key: &[u8]) -> Result<String, Error> {
	if key.len() <= PART_LEN + 1 || key[PART_LEN] != SNAPSHOT {
		return Err(format_err("not a snapshot record key", key));
	}
	String::from_utf8(key[PART_LEN + 1..].to_vec())
		.map_err(|_| format_err("snapshot record key is not utf-8", key))
}

pub fn tag_key(space: SpaceId, tag: TagId) -> Vec<u8> {
	let mut key = base(TAG);
	key.extend_from_slice(&space.to_le_bytes());
	key.extend_from_slice(&tag.to_le_bytes());
	key
}

pub fn tag_prefix(space: SpaceId) -> Vec<u8> {
	let mut key = base(TAG);
	key.extend_from_slice(&space.to_le_bytes());
	key
}

pub fn edge_key(space: SpaceId, etype: EdgeType) -> Vec<u8> {
	let mut key = base(EDGE);
	key.extend_from_slice(&space.to_le_bytes());
	key.extend_from_slice(&etype.to_le_bytes());
	key
}

pub fn edge_prefix(space: SpaceId) -> Vec<u8> {
	let mut key = base(EDGE);
	key.extend_from_slice(&space.to_le_bytes());
	key
}

pub fn index_key(space: SpaceId, index: IndexId) -> Vec<u8> {
	let mut key = base(INDEX);
	key.extend_from_slice(&space.to_le_bytes());
	key.extend_from_slice(&index.to_le_bytes());
	key
}

pub fn index_prefix(space: SpaceId) -> Vec<u8> {
	let mut key = base(INDEX);
	key.extend_from_slice(&space.to_le_bytes());
	key
}

pub fn machine_key(host: &str) -> Vec<u8> {
	let mut key = base(MACHINE);
	key.extend_from_slice(host.as_bytes());
	key
}

pub fn zone_key(name: &str) -> Vec<u8> {
	let mut key = base(ZONE);
	key.extend_from_slice(name.as_bytes());
	key
}

pub fn leader_key(space: SpaceId, part: PartitionId) -> Vec<u8> {
	let mut key = base(LEADER);
	key.extend_from_slice(&space.to_le_bytes());
	key.extend_from_slice(&part.to_le_bytes());
	key
}

/// The status of a snapshot record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SnapshotStatus {
	Invalid,
	Valid,
}

/// Encode a snapshot record value: status byte, then a length-prefixed
/// hosts string formatted as `ip:port,ip:port,…`.
pub fn snapshot_value(status: SnapshotStatus, hosts: &[HostAddr]) -> Vec<u8> {
	let joined = hosts.join(",");
	let mut val = Vec::with_capacity(1 + 4 + joined.len());
	val.push(match status {
		SnapshotStatus::Invalid => 0,
		SnapshotStatus::Valid => 1,
	});
	val.extend_from_slice(&(joined.len() as u32).to_le_bytes());
	val.extend_from_slice(joined.as_bytes());
	val
}

/// Decode a snapshot record value.
pub fn parse_snapshot_value(val: &[u8]) -> Result<(SnapshotStatus, Vec<HostAddr>), Error> {
	if val.len() < 5 {
		return Err(Error::Decode("snapshot record too short".to_string()));
	}
	let status = match val[0] {
		0 => SnapshotStatus::Invalid,
		1 => SnapshotStatus::Valid,
		b => return Err(Error::Decode(format!("bad snapshot status byte {b}"))),
	};
	let len = read_i32(&val[1..]) as usize;
	if val.len() != 5 + len {
		return Err(Error::Decode("snapshot record length mismatch".to_string()));
	}
	let joined = std::str::from_utf8(&val[5..])
		.map_err(|_| Error::Decode("snapshot hosts are not utf-8".to_string()))?;
	let hosts = if joined.is_empty() {
		Vec::new()
	} else {
		joined.split(',').map(|s| s.to_string()).collect()
	};
	Ok((status, hosts))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn markers_classify() {
		assert!(is_system(&space_key(1)));
		assert!(is_system(&snapshot_key("SNAP_1")));
		assert!(!is_system(&[1, 0, 0, 0, SPACE]));
	}

	#[test]
	fn part_key_round_trip() {
		let k = part_key(3, 7);
		assert_eq!(parse_part_key(&k).unwrap(), (3, 7));
	}

	#[test]
	fn snapshot_value_round_trip() {
		let hosts = vec!["127.0.0.1:44500".to_string(), "127.0.0.1:44501".to_string()];
		let val = snapshot_value(SnapshotStatus::Valid, &hosts);
		assert_eq!(val[0], 1);
		let (status, back) = parse_snapshot_value(&val).unwrap();
		assert_eq!(status, SnapshotStatus::Valid);
		assert_eq!(back, hosts);
	}

	#[test]
	fn snapshot_value_rejects_garbage() {
		assert!(parse_snapshot_value(&[9, 0, 0, 0, 0]).is_err());
		assert!(parse_snapshot_value(&[1, 4, 0, 0, 0, b'x']).is_err());
	}
}
