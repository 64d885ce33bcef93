use std::path::{Path, PathBuf};

use crate::err::Error;
use crate::kvs::{Key, Val};

/// One operation of an atomic write batch.
#[derive(Clone, Debug)]
pub enum WriteOp {
	Put(Key, Val),
	Del(Key),
	DelRange(Key, Key),
}

/// A set of writes applied atomically under one sequence number.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
	pub ops: Vec<WriteOp>,
}

impl WriteBatch {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn put(&mut self, key: impl Into<Key>, val: impl Into<Val>) -> &mut Self {
		self.ops.push(WriteOp::Put(key.into(), val.into()));
		self
	}

	pub fn del(&mut self, key: impl Into<Key>) -> &mut Self {
		self.ops.push(WriteOp::Del(key.into()));
		self
	}

	pub fn del_range(&mut self, start: impl Into<Key>, end: impl Into<Key>) -> &mut Self {
		self.ops.push(WriteOp::DelRange(start.into(), end.into()));
		self
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}
}

/// What a named checkpoint recorded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckpointInfo {
	pub name: String,
	/// The last committed sequence number the checkpoint covers
	pub log_id: i64,
	pub term: i64,
	pub path: PathBuf,
}

/// Decides, during a compaction pass, whether a key survives.
pub trait CompactionFilter: Send + Sync {
	/// Return `true` when the key should be dropped.
	fn filter(&self, key: &[u8], val: &[u8]) -> bool;
}

/// The ordered KV contract a partition engine provides.
///
/// All reads observe committed batches; a batch is atomic and ordered
/// by the sequence number it returns.
pub trait Store: Send + Sync {
	/// Fetch a single key.
	fn get(&self, key: &[u8]) -> Result<Option<Val>, Error>;

	/// Fetch many keys at once, preserving order.
	fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<Val>>, Error> {
		keys.iter().map(|k| self.get(k)).collect()
	}

	/// Insert or overwrite a single key.
	fn put(&self, key: Key, val: Val) -> Result<i64, Error>;

	/// Insert or overwrite many keys under one sequence number.
	fn multi_put(&self, pairs: Vec<(Key, Val)>) -> Result<i64, Error> {
		let mut batch = WriteBatch::new();
		for (key, val) in pairs {
			batch.put(key, val);
		}
		self.write(batch)
	}

	/// Delete a single key.
	fn del(&self, key: &[u8]) -> Result<i64, Error>;

	/// Delete every key in `[start, end)`.
	fn delete_range(&self, start: &[u8], end: &[u8]) -> Result<i64, Error>;

	/// All pairs whose key starts with `prefix`, in key order.
	fn prefix(&self, prefix: &[u8]) -> Result<Vec<(Key, Val)>, Error>;

	/// Up to `limit` pairs in `[start, end)`, in key order. A zero limit
	/// means unbounded.
	fn range(&self, start: &[u8], end: &[u8], limit: u32) -> Result<Vec<(Key, Val)>, Error>;

	/// Apply a batch atomically, returning its sequence number.
	fn write(&self, batch: WriteBatch) -> Result<i64, Error>;

	/// The last committed sequence number.
	fn seq(&self) -> i64;

	/// Create a named checkpoint under `dir`.
	fn create_checkpoint(&self, dir: &Path, name: &str) -> Result<CheckpointInfo, Error>;

	/// Remove a named checkpoint under `dir`.
	fn drop_checkpoint(&self, dir: &Path, name: &str) -> Result<(), Error>;

	/// Adopt the pairs staged in an external file, written in the
	/// checkpoint data format, as current data.
	fn ingest(&self, file: &Path) -> Result<u64, Error>;

	/// Set an engine option.
	fn set_option(&self, name: &str, value: &str) -> Result<(), Error>;

	/// Run the compaction filter over `[start, end)`, returning how
	/// many keys were reclaimed. An empty end bound is unbounded.
	fn compact_range(
		&self,
		start: &[u8],
		end: &[u8],
		filter: &dyn CompactionFilter,
	) -> Result<u64, Error>;

	/// Run the compaction filter over the whole key range.
	fn compact(&self, filter: &dyn CompactionFilter) -> Result<u64, Error> {
		self.compact_range(&[], &[], filter)
	}
}
