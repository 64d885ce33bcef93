//! Schema-driven row encoding.
//!
//! A row is laid out as: one header byte carrying the width of the
//! schema-version field, the schema version itself, a null bitmap with
//! one bit per field, the fixed-width region in schema order, and a
//! variable-width tail. Strings occupy an `offset(4)|len(4)` slot in
//! the fixed region pointing into the tail.

use crate::err::Error;
use crate::ids::Version;
use crate::meta::schema::{Field, FieldType, Schema};
use crate::val::{Date, DateTime, NullKind, Time, Value};

// Low three bits of the header byte hold the version width.
const VER_WIDTH_MASK: u8 = 0x07;

fn fixed_width(ftype: FieldType) -> usize {
	match ftype {
		FieldType::Bool => 1,
		FieldType::Int | FieldType::Float | FieldType::Timestamp => 8,
		FieldType::String => 8,
		FieldType::Date => 4,
		FieldType::Time => 7,
		FieldType::DateTime => 11,
	}
}

fn version_width(version: Version) -> usize {
	let mut v = version as u64;
	let mut n = 0;
	while v > 0 {
		n += 1;
		v >>= 8;
	}
	n
}

/// Encode a row of values against a schema. Values are given in schema
/// field order; `Empty` cells take the field default, or null when the
/// field is nullable.
pub fn encode(schema: &Schema, values: &[Value]) -> Result<Vec<u8>, Error> {
	if values.len() > schema.fields.len() {
		return Err(Error::Encode(format!(
			"{} values for {} fields",
			values.len(),
			schema.fields.len()
		)));
	}
	let ver_width = version_width(schema.version);
	let bitmap_len = schema.fields.len().div_ceil(8);
	let fixed_len: usize = schema.fields.iter().map(|f| fixed_width(f.ftype)).sum();
	let mut out = vec![0u8; 1 + ver_width + bitmap_len + fixed_len];
	out[0] = ver_width as u8 & VER_WIDTH_MASK;
	let ver_bytes = (schema.version as u64).to_le_bytes();
	out[1..1 + ver_width].copy_from_slice(&ver_bytes[..ver_width]);

	let bitmap_at = 1 + ver_width;
	let mut slot = bitmap_at + bitmap_len;
	let mut tail: Vec<u8> = Vec::new();
	let tail_base = out.len();

	for (i, field) in schema.fields.iter().enumerate() {
		let value = match values.get(i) {
			Some(Value::Empty) | None => match &field.default {
				Some(d) => d.clone(),
				None => Value::null(),
			},
			Some(v) => v.clone(),
		};
		let width = fixed_width(field.ftype);
		if value.is_null() {
			if !field.nullable {
				return Err(Error::Encode(format!("field `{}` is not nullable", field.name)));
			}
			out[bitmap_at + i / 8] |= 1 << (i % 8);
			slot += width;
			continue;
		}
		write_fixed(&mut out[slot..slot + width], field, &value, tail_base, &mut tail)?;
		slot += width;
	}
	out.extend_from_slice(&tail);
	Ok(out)
}

fn write_fixed(
	slot: &mut [u8],
	field: &Field,
	value: &Value,
	tail_base: usize,
	tail: &mut Vec<u8>,
) -> Result<(), Error> {
	let bad = || Error::Encode(format!("field `{}` got a {}", field.name, value.type_name()));
	match field.ftype {
		FieldType::Bool => match value {
			Value::Bool(b) => slot[0] = *b as u8,
			_ => return Err(bad()),
		},
		FieldType::Int | FieldType::Timestamp => match value {
			Value::Int(i) => slot.copy_from_slice(&i.to_le_bytes()),
			_ => return Err(bad()),
		},
		FieldType::Float => match value.as_float() {
			Some(f) => slot.copy_from_slice(&f.to_le_bytes()),
			None => return Err(bad()),
		},
		FieldType::String => match value {
			Value::String(s) => {
				let offset = (tail_base + tail.len()) as u32;
				slot[..4].copy_from_slice(&offset.to_le_bytes());
				slot[4..].copy_from_slice(&(s.len() as u32).to_le_bytes());
				tail.extend_from_slice(s.as_bytes());
			}
			_ => return Err(bad()),
		},
		FieldType::Date => match value {
			Value::Date(d) => {
				slot[..2].copy_from_slice(&d.year.to_le_bytes());
				slot[2] = d.month;
				slot[3] = d.day;
			}
			_ => return Err(bad()),
		},
		FieldType::Time => match value {
			Value::Time(t) => {
				slot[0] = t.hour;
				slot[1] = t.minute;
				slot[2] = t.sec;
				slot[3..].copy_from_slice(&t.microsec.to_le_bytes());
			}
			_ => return Err(bad()),
		},
		FieldType::DateTime => match value {
			Value::DateTime(dt) => {
				slot[..2].copy_from_slice(&dt.date.year.to_le_bytes());
				slot[2] = dt.date.month;
				slot[3] = dt.date.day;
				slot[4] = dt.time.hour;
				slot[5] = dt.time.minute;
				slot[6] = dt.time.sec;
				slot[7..].copy_from_slice(&dt.time.microsec.to_le_bytes());
			}
			_ => return Err(bad()),
		},
	}
	Ok(())
}

/// Read the schema version a row was written with, without a schema.
pub fn schema_version(data: &[u8]) -> Result<Version, Error> {
	if data.is_empty() {
		return Err(Error::Decode("empty row".to_string()));
	}
	let ver_width = (data[0] & VER_WIDTH_MASK) as usize;
	if data.len() < 1 + ver_width {
		return Err(Error::Decode("row shorter than its header".to_string()));
	}
	let mut buf = [0u8; 8];
	buf[..ver_width].copy_from_slice(&data[1..1 + ver_width]);
	Ok(u64::from_le_bytes(buf) as Version)
}

/// A decoded view over one encoded row.
pub struct RowReader<'a> {
	schema: &'a Schema,
	data: &'a [u8],
	bitmap_at: usize,
	fixed_at: usize,
}

impl<'a> RowReader<'a> {
	/// Open a row against the schema version it was written with.
	pub fn new(schema: &'a Schema, data: &'a [u8]) -> Result<Self, Error> {
		let version = schema_version(data)?;
		if version != schema.version {
			return Err(Error::Decode(format!(
				"row version {version} read with schema version {}",
				schema.version
			)));
		}
		let ver_width = (data[0] & VER_WIDTH_MASK) as usize;
		let bitmap_at = 1 + ver_width;
		let bitmap_len = schema.fields.len().div_ceil(8);
		let fixed_len: usize = schema.fields.iter().map(|f| fixed_width(f.ftype)).sum();
		if data.len() < bitmap_at + bitmap_len + fixed_len {
			return Err(Error::Decode("row shorter than its fixed region".to_string()));
		}
		Ok(Self {
			schema,
			data,
			bitmap_at,
			fixed_at: bitmap_at + bitmap_len,
		})
	}

	/// Read a field by position.
	pub fn get(&self, idx: usize) -> Result<Value, Error> {
		let field = self
			.schema
			.fields
			.get(idx)
			.ok_or_else(|| Error::Decode(format!("field {idx} out of range")))?;
		if self.data[self.bitmap_at + idx / 8] & (1 << (idx % 8)) != 0 {
			return Ok(Value::null());
		}
		let mut at = self.fixed_at;
		for f in &self.schema.fields[..idx] {
			at += fixed_width(f.ftype);
		}
		let slot = &self.data[at..at + fixed_width(field.ftype)];
		Ok(match field.ftype {
			FieldType::Bool => Value::Bool(slot[0] != 0),
			FieldType::Int | FieldType::Timestamp => {
				let mut buf = [0u8; 8];
				buf.copy_from_slice(slot);
				Value::Int(i64::from_le_bytes(buf))
			}
			FieldType::Float => {
				let mut buf = [0u8; 8];
				buf.copy_from_slice(slot);
				Value::Float(f64::from_le_bytes(buf))
			}
			FieldType::String => {
				let mut buf = [0u8; 4];
				buf.copy_from_slice(&slot[..4]);
				let offset = u32::from_le_bytes(buf) as usize;
				buf.copy_from_slice(&slot[4..]);
				let len = u32::from_le_bytes(buf) as usize;
				if offset + len > self.data.len() {
					return Err(Error::Decode(format!(
						"string field `{}` points outside the row",
						field.name
					)));
				}
				match std::str::from_utf8(&self.data[offset..offset + len]) {
					Ok(s) => Value::String(s.to_string()),
					Err(_) => Value::Null(NullKind::BadData),
				}
			}
			FieldType::Date => {
				let mut year = [0u8; 2];
				year.copy_from_slice(&slot[..2]);
				Value::Date(Date::new(i16::from_le_bytes(year), slot[2], slot[3]))
			}
			FieldType::Time => {
				let mut micro = [0u8; 4];
				micro.copy_from_slice(&slot[3..]);
				Value::Time(Time::new(slot[0], slot[1], slot[2], u32::from_le_bytes(micro)))
			}
			FieldType::DateTime => {
				let mut year = [0u8; 2];
				year.copy_from_slice(&slot[..2]);
				let mut micro = [0u8; 4];
				micro.copy_from_slice(&slot[7..]);
				Value::DateTime(DateTime::new(
					Date::new(i16::from_le_bytes(year), slot[2], slot[3]),
					Time::new(slot[4], slot[5], slot[6], u32::from_le_bytes(micro)),
				))
			}
		})
	}

	/// Read a field by name.
	pub fn get_by_name(&self, name: &str) -> Result<Value, Error> {
		match self.schema.field_index(name) {
			Some(idx) => self.get(idx),
			None => Ok(Value::Null(NullKind::UnknownProp)),
		}
	}

	/// Read the whole row in schema order.
	pub fn values(&self) -> Result<Vec<Value>, Error> {
		(0..self.schema.fields.len()).map(|i| self.get(i)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::schema::{Field, FieldType, Schema};

	fn person() -> Schema {
		Schema::new(
			1,
			vec![Field::new("name", FieldType::String), Field::new("age", FieldType::Int)],
		)
	}

	#[test]
	fn encode_decode_round_trip() {
		let schema = person();
		let row = encode(&schema, &["Bob".into(), Value::Int(10)]).unwrap();
		let reader = RowReader::new(&schema, &row).unwrap();
		assert_eq!(reader.get_by_name("name").unwrap(), "Bob".into());
		assert_eq!(reader.get_by_name("age").unwrap(), Value::Int(10));
		assert_eq!(reader.get_by_name("ghost").unwrap(), Value::Null(NullKind::UnknownProp));
	}

	#[test]
	fn nulls_and_defaults() {
		let mut schema = person();
		schema.fields[1].default = Some(Value::Int(18));
		let row = encode(&schema, &[Value::null(), Value::Empty]).unwrap();
		let reader = RowReader::new(&schema, &row).unwrap();
		assert_eq!(reader.get(0).unwrap(), Value::null());
		assert_eq!(reader.get(1).unwrap(), Value::Int(18));
	}

	#[test]
	fn version_is_readable_without_schema() {
		let schema = Schema::new(3, vec![Field::new("c", FieldType::Int)]);
		let row = encode(&schema, &[Value::Int(1)]).unwrap();
		assert_eq!(schema_version(&row).unwrap(), 3);
		// Reading with the wrong schema version is a decode error
		let newer = Schema::new(4, vec![Field::new("c", FieldType::Int)]);
		assert!(RowReader::new(&newer, &row).is_err());
	}

	#[test]
	fn type_mismatch_is_an_encode_error() {
		let schema = person();
		assert!(encode(&schema, &[Value::Int(1), Value::Int(2)]).is_err());
	}

	#[test]
	fn temporal_fields_round_trip() {
		let schema = Schema::new(
			1,
			vec![
				Field::new("d", FieldType::Date),
				Field::new("t", FieldType::Time),
				Field::new("dt", FieldType::DateTime),
				Field::new("ts", FieldType::Timestamp),
			],
		);
		let d = Date::new(2024, 2, 29);
		let t = Time::new(23, 59, 1, 250);
		let dt = DateTime::new(d, t);
		let row = encode(
			&schema,
			&[Value::Date(d), Value::Time(t), Value::DateTime(dt), Value::Int(1700000000)],
		)
		.unwrap();
		let reader = RowReader::new(&schema, &row).unwrap();
		assert_eq!(reader.get(0).unwrap(), Value::Date(d));
		assert_eq!(reader.get(1).unwrap(), Value::Time(t));
		assert_eq!(reader.get(2).unwrap(), Value::DateTime(dt));
		assert_eq!(reader.get(3).unwrap(), Value::Int(1700000000));
	}
}
