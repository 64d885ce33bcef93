use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::err::Error;

/// The publicly visible name of the server
pub const SERVER_NAME: &str = "Quasar";

/// The partition inside the metadata space reserved for system keys
pub const SYSTEM_PART: i32 = 0;

/// The space id of the metadata space itself
pub const META_SPACE: i32 = 0;

/// Default number of buckets (as a power of two) in the concurrent LRU cache
pub const LRU_BUCKETS_EXP: u32 = 4;

/// Default capacity of the vertex/edge decode cache
pub static DECODE_CACHE_CAPACITY: Lazy<usize> =
	lazy_env_parse!("QUASAR_DECODE_CACHE_CAPACITY", usize, 200_000);

/// Storage processor batch size for scan operations
pub static SCAN_BATCH_SIZE: Lazy<u32> = lazy_env_parse!("QUASAR_SCAN_BATCH_SIZE", u32, 1000);

/// How often the meta cache refreshes its schema and partition snapshots,
/// in seconds. The compaction filter retains keys it cannot resolve for at
/// least one refresh interval.
pub static META_CACHE_REFRESH_SECS: Lazy<u64> =
	lazy_env_parse!("QUASAR_META_CACHE_REFRESH_SECS", u64, 10);

/// How long a registered host stays active without a heartbeat, in seconds
pub static HOST_EXPIRY_SECS: Lazy<u64> = lazy_env_parse!("QUASAR_HOST_EXPIRY_SECS", u64, 60);

/// Whether storage responses with failed partitions are accepted downstream
pub static ACCEPT_PARTIAL_SUCCESS: Lazy<bool> =
	lazy_env_parse!("QUASAR_ACCEPT_PARTIAL_SUCCESS", bool, false);

// The runtime-tunable subset. Everything above is read once at startup;
// these may change while the server runs and must go through the accessor.
static TUNABLES: Lazy<RwLock<HashMap<String, i64>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Read a runtime-tunable flag, falling back to the given default.
pub fn tunable(name: &str, default: i64) -> i64 {
	TUNABLES.read().get(name).copied().unwrap_or(default)
}

/// Update a runtime-tunable flag.
pub fn set_tunable(name: &str, value: i64) {
	TUNABLES.write().insert(name.to_string(), value);
}

/// A parsed configuration file.
///
/// Configuration files are JSON extended with `//` and `#` line comments,
/// and may nest objects for sub-configurations.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
	#[serde(flatten)]
	values: serde_json::Map<String, serde_json::Value>,
}

impl Config {
	/// Parse a configuration file from disk.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Config, Error> {
		let text = std::fs::read_to_string(path).map_err(|e| Error::Config(e.to_string()))?;
		Config::from_str(&text)
	}

	/// Parse configuration text, stripping line comments first.
	pub fn from_str(text: &str) -> Result<Config, Error> {
		let stripped = strip_comments(text);
		serde_json::from_str(&stripped).map_err(|e| Error::Config(e.to_string()))
	}

	/// Fetch a string option.
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.values.get(name).and_then(|v| v.as_str())
	}

	/// Fetch an integer option.
	pub fn get_int(&self, name: &str) -> Option<i64> {
		self.values.get(name).and_then(|v| v.as_i64())
	}

	/// Fetch a boolean option.
	pub fn get_bool(&self, name: &str) -> Option<bool> {
		self.values.get(name).and_then(|v| v.as_bool())
	}

	/// Fetch a nested sub-configuration.
	pub fn get_sub(&self, name: &str) -> Option<Config> {
		match self.values.get(name) {
			Some(serde_json::Value::Object(m)) => Some(Config {
				values: m.clone(),
			}),
			_ => None,
		}
	}
}

// Remove `//` and `#` line comments outside of string literals.
fn strip_comments(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for line in text.lines() {
		let mut in_str = false;
		let mut escaped = false;
		let mut cut = line.len();
		let bytes = line.as_bytes();
		for (i, &b) in bytes.iter().enumerate() {
			if escaped {
				escaped = false;
				continue;
			}
			match b {
				b'\\' if in_str => escaped = true,
				b'"' => in_str = !in_str,
				b'#' if !in_str => {
					cut = i;
					break;
				}
				b'/' if !in_str && i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
					cut = i;
					break;
				}
				_ => {}
			}
		}
		out.push_str(&line[..cut]);
		out.push('\n');
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn comments_are_stripped() {
		let text = r#"
		// leading comment
		{
			"port": 9669, # trailing comment
			"name": "a # not a comment", // but this is
			"storage": {
				"data_path": "/tmp/quasar"
			}
		}
		"#;
		let cfg = Config::from_str(text).unwrap();
		assert_eq!(cfg.get_int("port"), Some(9669));
		assert_eq!(cfg.get_str("name"), Some("a # not a comment"));
		let sub = cfg.get_sub("storage").unwrap();
		assert_eq!(sub.get_str("data_path"), Some("/tmp/quasar"));
	}

	#[test]
	fn tunables_round_trip() {
		assert_eq!(tunable("max_fanout", 8), 8);
		set_tunable("max_fanout", 32);
		assert_eq!(tunable("max_fanout", 8), 32);
	}
}
