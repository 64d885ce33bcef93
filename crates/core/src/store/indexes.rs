//! Building and encoding secondary index entries.

use crate::err::Error;
use crate::ids::{PartitionId, Vid};
use crate::key;
use crate::meta::schema::{IndexDesc, Schema};
use crate::val::Value;

// A null cell in an index tuple.
const NULL_MARK: u8 = 0xff;

/// Encode one value as an index field cell.
pub fn encode_value(v: &Value) -> Vec<u8> {
	match v {
		Value::Bool(b) => vec![0x01, *b as u8],
		Value::Int(i) => {
			let mut out = vec![0x02];
			out.extend_from_slice(&i.to_le_bytes());
			out
		}
		Value::Float(f) => {
			let mut out = vec![0x03];
			out.extend_from_slice(&f.to_le_bytes());
			out
		}
		Value::String(s) => {
			// Terminated so shorter strings order before extensions
			let mut out = vec![0x04];
			out.extend_from_slice(s.as_bytes());
			out.push(0x00);
			out
		}
		_ => vec![NULL_MARK],
	}
}

/// Encode a tuple of indexed field values, in declaration order.
pub fn encode_values(values: &[Value]) -> Vec<u8> {
	let mut out = Vec::new();
	for v in values {
		out.extend_from_slice(&encode_value(v));
	}
	out
}

/// The values an index wants, pulled from a row by field name.
pub fn values_for(index: &IndexDesc, names: &[String], row: &[Value]) -> Vec<Value> {
	index
		.fields
		.iter()
		.map(|f| {
			names
				.iter()
				.position(|n| n == f)
				.and_then(|i| row.get(i).cloned())
				.unwrap_or(Value::null())
		})
		.collect()
}

/// The stored value of an index entry: the TTL stamp when the base
/// schema carries a TTL, empty otherwise.
pub fn entry_value(schema: &Schema, names: &[String], row: &[Value]) -> Vec<u8> {
	let Some(ttl) = &schema.ttl else {
		return Vec::new();
	};
	match names.iter().position(|n| *n == ttl.col).and_then(|i| row.get(i)) {
		Some(Value::Int(ts)) => ts.to_le_bytes().to_vec(),
		_ => Vec::new(),
	}
}

/// The key of a tag index entry.
pub fn tag_entry_key(
	part: PartitionId,
	index: &IndexDesc,
	names: &[String],
	row: &[Value],
	vid: &Vid,
) -> Vec<u8> {
	let values = encode_values(&values_for(index, names, row));
	key::index::new(part, index.id, &values, vid)
}

/// The key of an edge index entry; the reference is the endpoint triple.
pub fn edge_entry_key(
	part: PartitionId,
	index: &IndexDesc,
	names: &[String],
	row: &[Value],
	src: &Vid,
	etype: i32,
	rank: i64,
	dst: &Vid,
) -> Vec<u8> {
	let values = encode_values(&values_for(index, names, row));
	let mut reference = Vec::with_capacity(src.len() + 4 + 8 + dst.len());
	reference.extend_from_slice(src);
	reference.extend_from_slice(&etype.to_le_bytes());
	reference.extend_from_slice(&rank.to_le_bytes());
	reference.extend_from_slice(dst);
	key::index::new(part, index.id, &values, &reference)
}

/// Split an index tail back into its reference key, given the encoded
/// value tuple length.
pub fn reference_of(tail: &[u8], values_len: usize) -> Result<&[u8], Error> {
	if tail.len() < values_len {
		return Err(Error::KeyFormat("index tail shorter than its values".to_string()));
	}
	Ok(&tail[values_len..])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::schema::IndexTarget;

	#[test]
	fn tuple_encoding_is_prefix_friendly() {
		let ab = encode_values(&["ab".into()]);
		let abc = encode_values(&["abc".into()]);
		// The terminator keeps "ab" from being a prefix of "abc"
		assert!(!abc.starts_with(&ab));
	}

	#[test]
	fn values_follow_declaration_order() {
		let index = IndexDesc {
			id: 1,
			name: "i".into(),
			target: IndexTarget::Tag(1),
			fields: vec!["b".into(), "a".into()],
		};
		let names = vec!["a".to_string(), "b".to_string()];
		let row = vec![Value::Int(1), Value::Int(2)];
		assert_eq!(values_for(&index, &names, &row), vec![Value::Int(2), Value::Int(1)]);
	}
}
