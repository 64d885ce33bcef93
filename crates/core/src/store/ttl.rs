//! TTL visibility checks shared by the read path and the compaction
//! filter.

use crate::meta::schema::Schema;
use crate::row::RowReader;
use crate::val::Value;

/// Has this row outlived its schema's TTL?
///
/// A schema without TTL never expires. A TTL column holding anything
/// but an integer timestamp is treated as not expired; bad data is the
/// decoder's problem, not the reaper's.
pub fn expired(schema: &Schema, reader: &RowReader) -> bool {
	let Some(ttl) = &schema.ttl else {
		return false;
	};
	if ttl.duration_secs <= 0 {
		return false;
	}
	match reader.get_by_name(&ttl.col) {
		Ok(Value::Int(written)) => stamp_expired(written, ttl.duration_secs),
		_ => false,
	}
}

/// The same check over an already-decoded property map.
pub fn props_expired(
	schema: &Schema,
	props: &std::collections::BTreeMap<String, Value>,
) -> bool {
	let Some(ttl) = &schema.ttl else {
		return false;
	};
	if ttl.duration_secs <= 0 {
		return false;
	}
	match props.get(&ttl.col) {
		Some(Value::Int(written)) => stamp_expired(*written, ttl.duration_secs),
		_ => false,
	}
}

/// The TTL check over a raw column value, used for the stamps carried
/// by index entries.
pub fn stamp_expired(written: i64, duration_secs: i64) -> bool {
	let now = chrono::Utc::now().timestamp();
	written.saturating_add(duration_secs) < now
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::schema::{Field, FieldType};
	use crate::row;

	#[test]
	fn expiry_is_duration_based() {
		let now = chrono::Utc::now().timestamp();
		assert!(stamp_expired(now - 10, 1));
		assert!(!stamp_expired(now, 3600));
	}

	#[test]
	fn rows_expire_through_their_column() {
		let schema = Schema::new(
			1,
			vec![Field::new("c", FieldType::Int), Field::new("ts", FieldType::Timestamp)],
		)
		.with_ttl("ts", 1);
		let now = chrono::Utc::now().timestamp();
		let stale = row::encode(&schema, &[Value::Int(1), Value::Int(now - 10)]).unwrap();
		let fresh = row::encode(&schema, &[Value::Int(1), Value::Int(now)]).unwrap();
		assert!(expired(&schema, &RowReader::new(&schema, &stale).unwrap()));
		assert!(!expired(&schema, &RowReader::new(&schema, &fresh).unwrap()));
	}
}
