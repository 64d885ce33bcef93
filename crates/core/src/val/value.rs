#![allow(clippy::derive_ord_xor_partial_ord)]

use revision::revisioned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::val::{DataSet, Date, DateTime, Edge, Path, Time, Vertex};

/// Why a value is null.
///
/// Failed operations materialize one of these instead of raising an
/// error, so that a single bad cell never aborts a whole request.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum NullKind {
	/// An ordinary null
	#[default]
	Null,
	/// A property was read that the schema does not declare
	UnknownProp,
	/// An operation was applied to operands of the wrong type
	BadType,
	/// Stored data failed to decode
	BadData,
	/// A numeric operation left the representable range
	OutOfRange,
	/// Division by zero
	DivByZero,
}

/// The tagged value variant.
///
/// `Empty` is the absence of a value (an unset column); `Null` is an
/// explicit null carrying the reason it appeared.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Value {
	#[default]
	Empty,
	Null(NullKind),
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Date(Date),
	Time(Time),
	DateTime(DateTime),
	Vertex(Box<Vertex>),
	Edge(Box<Edge>),
	Path(Box<Path>),
	List(Vec<Value>),
	Map(BTreeMap<String, Value>),
	Set(Vec<Value>),
	DataSet(Box<DataSet>),
}

impl Eq for Value {}

impl Ord for Value {
	fn cmp(&self, other: &Self) -> Ordering {
		self.partial_cmp(other).unwrap_or(Ordering::Equal)
	}
}

impl Value {
	/// An ordinary null.
	pub const fn null() -> Self {
		Value::Null(NullKind::Null)
	}

	/// Build a set value: a sorted, deduplicated list.
	pub fn set_from(values: impl IntoIterator<Item = Value>) -> Self {
		let mut v: Vec<Value> = values.into_iter().collect();
		v.sort();
		v.dedup();
		Value::Set(v)
	}

	/// Is this any null, regardless of kind?
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null(_))
	}

	pub fn is_empty_value(&self) -> bool {
		matches!(self, Value::Empty)
	}

	/// The truthiness used by logical operators and filters.
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Bool(b) => *b,
			Value::Int(i) => *i != 0,
			Value::Float(f) => *f != 0.0,
			Value::String(s) => !s.is_empty(),
			Value::List(l) => !l.is_empty(),
			Value::Set(s) => !s.is_empty(),
			Value::Map(m) => !m.is_empty(),
			_ => false,
		}
	}

	/// A short name for the type of this value, used in error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Empty => "empty",
			Value::Null(_) => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::String(_) => "string",
			Value::Date(_) => "date",
			Value::Time(_) => "time",
			Value::DateTime(_) => "datetime",
			Value::Vertex(_) => "vertex",
			Value::Edge(_) => "edge",
			Value::Path(_) => "path",
			Value::List(_) => "list",
			Value::Map(_) => "map",
			Value::Set(_) => "set",
			Value::DataSet(_) => "dataset",
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Value::Int(i) => Some(*i as f64),
			Value::Float(f) => Some(*f),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// The vertex id of a vertex value, or the value itself for ids.
	pub fn vid(&self) -> Value {
		match self {
			Value::Vertex(v) => v.vid.clone(),
			v => v.clone(),
		}
	}

	/// Attribute access: `edge.prop`, `map.key`, `vertex.tag` lookups.
	pub fn attr(&self, name: &str) -> Value {
		match self {
			Value::Map(m) => m.get(name).cloned().unwrap_or(Value::Null(NullKind::UnknownProp)),
			Value::Edge(e) => match name {
				"_src" => e.src.clone(),
				"_dst" => e.dst.clone(),
				"_rank" => Value::Int(e.rank),
				"_type" => Value::Int(e.etype as i64),
				_ => e.props.get(name).cloned().unwrap_or(Value::Null(NullKind::UnknownProp)),
			},
			Value::Vertex(v) => match name {
				"_vid" => v.vid.clone(),
				_ => {
					// A tag name yields that tag's property map, so
					// `v.tag.prop` chains through two attribute hops
					if let Some(tag) = v.tags.iter().find(|t| t.name == name) {
						return Value::Map(tag.props.clone());
					}
					// A bare attribute resolves across all tags
					for tag in &v.tags {
						if let Some(p) = tag.props.get(name) {
							return p.clone();
						}
					}
					Value::Null(NullKind::UnknownProp)
				}
			},
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		}
	}

	/// Subscript access over lists (by index) and maps (by key).
	pub fn subscript(&self, idx: &Value) -> Value {
		match (self, idx) {
			(Value::List(l), Value::Int(i)) => {
				let i = *i;
				let n = l.len() as i64;
				// Negative subscripts count from the tail
				let pos = if i < 0 {
					n + i
				} else {
					i
				};
				if pos < 0 || pos >= n {
					Value::Null(NullKind::OutOfRange)
				} else {
					l[pos as usize].clone()
				}
			}
			(Value::Map(m), Value::String(k)) => {
				m.get(k).cloned().unwrap_or(Value::Null(NullKind::UnknownProp))
			}
			(Value::Null(k), _) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v as i64)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<Vertex> for Value {
	fn from(v: Vertex) -> Self {
		Value::Vertex(Box::new(v))
	}
}

impl From<Edge> for Value {
	fn from(v: Edge) -> Self {
		Value::Edge(Box::new(v))
	}
}

impl From<Path> for Value {
	fn from(v: Path) -> Self {
		Value::Path(Box::new(v))
	}
}

impl From<DataSet> for Value {
	fn from(v: DataSet) -> Self {
		Value::DataSet(Box::new(v))
	}
}

impl From<Vec<Value>> for Value {
	fn from(v: Vec<Value>) -> Self {
		Value::List(v)
	}
}

impl From<BTreeMap<String, Value>> for Value {
	fn from(v: BTreeMap<String, Value>) -> Self {
		Value::Map(v)
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Value::Empty => write!(f, "__EMPTY__"),
			Value::Null(NullKind::Null) => write!(f, "NULL"),
			Value::Null(k) => write!(f, "NULL({k:?})"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v}"),
			Value::String(v) => write!(f, "\"{v}\""),
			Value::Date(v) => write!(f, "{v}"),
			Value::Time(v) => write!(f, "{v}"),
			Value::DateTime(v) => write!(f, "{v}"),
			Value::Vertex(v) => write!(f, "{v}"),
			Value::Edge(v) => write!(f, "{v}"),
			Value::Path(v) => write!(f, "{v}"),
			Value::List(l) => {
				let cells: Vec<String> = l.iter().map(|v| v.to_string()).collect();
				write!(f, "[{}]", cells.join(", "))
			}
			Value::Set(s) => {
				let cells: Vec<String> = s.iter().map(|v| v.to_string()).collect();
				write!(f, "{{{}}}", cells.join(", "))
			}
			Value::Map(m) => {
				let cells: Vec<String> = m.iter().map(|(k, v)| format!("{k}: {v}")).collect();
				write!(f, "{{{}}}", cells.join(", "))
			}
			Value::DataSet(d) => write!(f, "{d}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truthiness() {
		assert!(Value::Bool(true).is_truthy());
		assert!(!Value::Bool(false).is_truthy());
		assert!(Value::Int(7).is_truthy());
		assert!(!Value::Int(0).is_truthy());
		assert!(!Value::null().is_truthy());
		assert!(!Value::Empty.is_truthy());
	}

	#[test]
	fn subscript_bounds() {
		let l = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
		assert_eq!(l.subscript(&Value::Int(0)), Value::Int(1));
		assert_eq!(l.subscript(&Value::Int(-1)), Value::Int(3));
		assert_eq!(l.subscript(&Value::Int(3)), Value::Null(NullKind::OutOfRange));
		assert_eq!(l.subscript(&Value::String("x".into())), Value::Null(NullKind::BadType));
	}

	#[test]
	fn sets_are_deduplicated() {
		let s = Value::set_from(vec![Value::Int(2), Value::Int(1), Value::Int(2)]);
		assert_eq!(s, Value::Set(vec![Value::Int(1), Value::Int(2)]));
	}
}
