//! The in-memory ordered engine backing each partition.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::err::Error;
use crate::kvs::api::{CheckpointInfo, CompactionFilter, Store, WriteBatch, WriteOp};
use crate::kvs::{Key, Val};

const DATA_FILE: &str = "DATA";
const MANIFEST_FILE: &str = "MANIFEST";

/// An ordered map under a reader-writer lock, with a monotonic batch
/// sequence standing in for the commit log id.
pub struct MemStore {
	inner: RwLock<BTreeMap<Key, Val>>,
	seq: AtomicI64,
	term: i64,
	options: RwLock<BTreeMap<String, String>>,
}

impl Default for MemStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemStore {
	pub fn new() -> Self {
		Self {
			inner: RwLock::new(BTreeMap::new()),
			seq: AtomicI64::new(0),
			term: 1,
			options: RwLock::new(BTreeMap::new()),
		}
	}

	fn bump(&self) -> i64 {
		self.seq.fetch_add(1, Ordering::SeqCst) + 1
	}

	// The smallest key strictly greater than every key with this prefix.
	fn prefix_end(prefix: &[u8]) -> Option<Key> {
		let mut end = prefix.to_vec();
		while let Some(last) = end.last_mut() {
			if *last < 0xff {
				*last += 1;
				return Some(end);
			}
			end.pop();
		}
		None
	}
}

impl Store for MemStore {
	fn get(&self, key: &[u8]) -> Result<Option<Val>, Error> {
		Ok(self.inner.read().get(key).cloned())
	}

	fn put(&self, key: Key, val: Val) -> Result<i64, Error> {
		self.inner.write().insert(key, val);
		Ok(self.bump())
	}

	fn del(&self, key: &[u8]) -> Result<i64, Error> {
		self.inner.write().remove(key);
		Ok(self.bump())
	}

	fn delete_range(&self, start: &[u8], end: &[u8]) -> Result<i64, Error> {
		let mut inner = self.inner.write();
		let doomed: Vec<Key> = inner
			.range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
			.map(|(k, _)| k.clone())
			.collect();
		for k in doomed {
			inner.remove(&k);
		}
		Ok(self.bump())
	}

	fn prefix(&self, prefix: &[u8]) -> Result<Vec<(Key, Val)>, Error> {
		let inner = self.inner.read();
		let upper = match Self::prefix_end(prefix) {
			Some(end) => Bound::Excluded(end),
			None => Bound::Unbounded,
		};
		Ok(inner
			.range::<[u8], _>((Bound::Included(prefix), as_bound(&upper)))
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect())
	}

	fn range(&self, start: &[u8], end: &[u8], limit: u32) -> Result<Vec<(Key, Val)>, Error> {
		let inner = self.inner.read();
		let iter = inner
			.range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
			.map(|(k, v)| (k.clone(), v.clone()));
		Ok(match limit {
			0 => iter.collect(),
			n => iter.take(n as usize).collect(),
		})
	}

	fn write(&self, batch: WriteBatch) -> Result<i64, Error> {
		let mut inner = self.inner.write();
		for op in batch.ops {
			match op {
				WriteOp::Put(k, v) => {
					inner.insert(k, v);
				}
				WriteOp::Del(k) => {
					inner.remove(&k);
				}
				WriteOp::DelRange(start, end) => {
					let doomed: Vec<Key> = inner
						.range::<[u8], _>((
							Bound::Included(start.as_slice()),
							Bound::Excluded(end.as_slice()),
						))
						.map(|(k, _)| k.clone())
						.collect();
					for k in doomed {
						inner.remove(&k);
					}
				}
			}
		}
		Ok(self.bump())
	}

	fn seq(&self) -> i64 {
		self.seq.load(Ordering::SeqCst)
	}

	fn create_checkpoint(&self, dir: &Path, name: &str) -> Result<CheckpointInfo, Error> {
		let root = dir.join(name);
		std::fs::create_dir_all(&root)?;
		// Snapshot the map and the sequence under the same read lock
		let (pairs, log_id) = {
			let inner = self.inner.read();
			let pairs: Vec<(Key, Val)> =
				inner.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
			(pairs, self.seq())
		};
		let mut data = std::fs::File::create(root.join(DATA_FILE))?;
		for (k, v) in &pairs {
			data.write_all(&(k.len() as u32).to_le_bytes())?;
			data.write_all(k)?;
			data.write_all(&(v.len() as u32).to_le_bytes())?;
			data.write_all(v)?;
		}
		data.sync_all()?;
		let manifest = serde_json::json!({
			"name": name,
			"log_id": log_id,
			"term": self.term,
		});
		std::fs::write(root.join(MANIFEST_FILE), manifest.to_string())?;
		Ok(CheckpointInfo {
			name: name.to_string(),
			log_id,
			term: self.term,
			path: root,
		})
	}

	fn drop_checkpoint(&self, dir: &Path, name: &str) -> Result<(), Error> {
		let root = dir.join(name);
		if root.exists() {
			std::fs::remove_dir_all(&root)?;
		}
		Ok(())
	}

	fn ingest(&self, file: &Path) -> Result<u64, Error> {
		let mut data = std::fs::File::open(file)?;
		let mut adopted = 0u64;
		let mut inner = self.inner.write();
		loop {
			let mut len = [0u8; 4];
			match data.read_exact(&mut len) {
				Ok(()) => {}
				Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
				Err(e) => return Err(e.into()),
			}
			let mut key = vec![0u8; u32::from_le_bytes(len) as usize];
			data.read_exact(&mut key)?;
			data.read_exact(&mut len)?;
			let mut val = vec![0u8; u32::from_le_bytes(len) as usize];
			data.read_exact(&mut val)?;
			inner.insert(key, val);
			adopted += 1;
		}
		drop(inner);
		self.bump();
		Ok(adopted)
	}

	fn set_option(&self, name: &str, value: &str) -> Result<(), Error> {
		self.options.write().insert(name.to_string(), value.to_string());
		Ok(())
	}

	fn compact_range(
		&self,
		start: &[u8],
		end: &[u8],
		filter: &dyn CompactionFilter,
	) -> Result<u64, Error> {
		let mut inner = self.inner.write();
		let upper = if end.is_empty() {
			Bound::Unbounded
		} else {
			Bound::Excluded(end)
		};
		let doomed: Vec<Key> = inner
			.range::<[u8], _>((Bound::Included(start), upper))
			.filter(|(k, v)| filter.filter(k, v))
			.map(|(k, _)| k.clone())
			.collect();
		let dropped = doomed.len() as u64;
		for k in doomed {
			inner.remove(&k);
		}
		Ok(dropped)
	}
}

fn as_bound(b: &Bound<Key>) -> Bound<&[u8]> {
	match b {
		Bound::Included(k) => Bound::Included(k.as_slice()),
		Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
		Bound::Unbounded => Bound::Unbounded,
	}
}

/// Open a checkpoint manifest written by [`MemStore::create_checkpoint`].
pub fn read_manifest(path: &Path) -> Result<(i64, i64), Error> {
	let text = std::fs::read_to_string(path.join(MANIFEST_FILE))?;
	let manifest: serde_json::Value = serde_json::from_str(&text)?;
	let log_id = manifest["log_id"].as_i64().ok_or_else(|| {
		Error::Checkpoint("manifest is missing its log id".to_string())
	})?;
	let term = manifest["term"]
		.as_i64()
		.ok_or_else(|| Error::Checkpoint("manifest is missing its term".to_string()))?;
	Ok((log_id, term))
}

/// The path of a checkpoint's data file.
pub fn data_file(path: &Path) -> std::path::PathBuf {
	path.join(DATA_FILE)
}

#[cfg(test)]
mod tests {
	use super::*;

	struct DropOdd;

	impl CompactionFilter for DropOdd {
		fn filter(&self, key: &[u8], _val: &[u8]) -> bool {
			key.last().map(|b| b % 2 == 1).unwrap_or(false)
		}
	}

	#[test]
	fn batch_is_atomic_and_ordered() {
		let store = MemStore::new();
		let mut batch = WriteBatch::new();
		batch.put(b"a".to_vec(), b"1".to_vec());
		batch.put(b"b".to_vec(), b"2".to_vec());
		batch.del(b"a".to_vec());
		let seq = store.write(batch).unwrap();
		assert_eq!(seq, 1);
		assert_eq!(store.get(b"a").unwrap(), None);
		assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
		assert_eq!(store.seq(), 1);
	}

	#[test]
	fn prefix_and_range_scans() {
		let store = MemStore::new();
		for i in 0u8..10 {
			store.put(vec![1, i], vec![i]).unwrap();
		}
		store.put(vec![2, 0], vec![0]).unwrap();
		let hits = store.prefix(&[1]).unwrap();
		assert_eq!(hits.len(), 10);
		let window = store.range(&[1, 2], &[1, 5], 0).unwrap();
		assert_eq!(window.len(), 3);
		let capped = store.range(&[1, 0], &[2, 0], 4).unwrap();
		assert_eq!(capped.len(), 4);
	}

	#[test]
	fn delete_range_is_end_exclusive() {
		let store = MemStore::new();
		for i in 0u8..5 {
			store.put(vec![i], vec![i]).unwrap();
		}
		store.delete_range(&[1], &[3]).unwrap();
		assert!(store.get(&[0]).unwrap().is_some());
		assert!(store.get(&[1]).unwrap().is_none());
		assert!(store.get(&[2]).unwrap().is_none());
		assert!(store.get(&[3]).unwrap().is_some());
	}

	#[test]
	fn checkpoint_and_ingest_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let store = MemStore::new();
		store.put(b"k1".to_vec(), b"v1".to_vec()).unwrap();
		store.put(b"k2".to_vec(), b"v2".to_vec()).unwrap();
		let info = store.create_checkpoint(dir.path(), "SNAP_1").unwrap();
		assert_eq!(info.log_id, 2);
		assert!(info.path.join(DATA_FILE).exists());
		assert_eq!(read_manifest(&info.path).unwrap(), (2, 1));

		let other = MemStore::new();
		let adopted = other.ingest(&data_file(&info.path)).unwrap();
		assert_eq!(adopted, 2);
		assert_eq!(other.get(b"k1").unwrap(), Some(b"v1".to_vec()));

		store.drop_checkpoint(dir.path(), "SNAP_1").unwrap();
		assert!(!info.path.exists());
	}

	#[test]
	fn compaction_applies_the_filter() {
		let store = MemStore::new();
		for i in 0u8..6 {
			store.put(vec![i], vec![]).unwrap();
		}
		let dropped = store.compact(&DropOdd).unwrap();
		assert_eq!(dropped, 3);
		assert!(store.get(&[2]).unwrap().is_some());
		assert!(store.get(&[3]).unwrap().is_none());
	}
}
