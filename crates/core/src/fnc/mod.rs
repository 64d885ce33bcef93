//! Scalar function registry and operator implementations.

pub mod aggregate;
pub mod operate;

use crate::err::Error;
use crate::val::{DateTime, NullKind, Value};

/// A registered scalar function.
pub struct Function {
	pub name: &'static str,
	pub min_args: usize,
	pub max_args: usize,
	func: fn(&[Value]) -> Value,
}

impl Function {
	pub fn call(&self, args: &[Value]) -> Value {
		(self.func)(args)
	}
}

/// Resolve a function by name.
pub fn get(name: &str) -> Option<&'static Function> {
	FUNCTIONS.iter().find(|f| f.name == name)
}

/// Check that `name` resolves and accepts `n` arguments.
///
/// Called when decoding a shipped expression, so that a malformed plan
/// fails at decode time rather than mid-evaluation.
pub fn check_arity(name: &str, n: usize) -> Result<(), Error> {
	match get(name) {
		None => Err(Error::UnknownFunction(name.to_string())),
		Some(f) if n < f.min_args || n > f.max_args => {
			Err(Error::FunctionArity(name.to_string(), f.min_args))
		}
		Some(_) => Ok(()),
	}
}

static FUNCTIONS: &[Function] = &[
	Function {
		name: "abs",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Int(i) => Value::Int(i.wrapping_abs()),
			Value::Float(f) => Value::Float(f.abs()),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "ceil",
		min_args: 1,
		max_args: 1,
		func: |a| float_fn(&a[0], f64::ceil),
	},
	Function {
		name: "floor",
		min_args: 1,
		max_args: 1,
		func: |a| float_fn(&a[0], f64::floor),
	},
	Function {
		name: "round",
		min_args: 1,
		max_args: 1,
		func: |a| float_fn(&a[0], f64::round),
	},
	Function {
		name: "sqrt",
		min_args: 1,
		max_args: 1,
		func: |a| float_fn(&a[0], f64::sqrt),
	},
	Function {
		name: "lower",
		min_args: 1,
		max_args: 1,
		func: |a| str_fn(&a[0], |s| s.to_lowercase()),
	},
	Function {
		name: "upper",
		min_args: 1,
		max_args: 1,
		func: |a| str_fn(&a[0], |s| s.to_uppercase()),
	},
	Function {
		name: "trim",
		min_args: 1,
		max_args: 1,
		func: |a| str_fn(&a[0], |s| s.trim().to_string()),
	},
	Function {
		name: "size",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::String(s) => Value::Int(s.chars().count() as i64),
			Value::List(l) => Value::Int(l.len() as i64),
			Value::Set(s) => Value::Int(s.len() as i64),
			Value::Map(m) => Value::Int(m.len() as i64),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "length",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Path(p) => Value::Int(p.len() as i64),
			Value::String(s) => Value::Int(s.chars().count() as i64),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "id",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Vertex(v) => v.vid.clone(),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "tags",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Vertex(v) => {
				Value::List(v.tags.iter().map(|t| Value::String(t.name.clone())).collect())
			}
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "properties",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Vertex(v) => {
				let mut m = std::collections::BTreeMap::new();
				for tag in &v.tags {
					for (k, p) in &tag.props {
						m.insert(k.clone(), p.clone());
					}
				}
				Value::Map(m)
			}
			Value::Edge(e) => Value::Map(e.props.clone()),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "src",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Edge(e) => e.src.clone(),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "dst",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Edge(e) => e.dst.clone(),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "rank",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Edge(e) => Value::Int(e.rank),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "typeid",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Edge(e) => Value::Int(e.etype as i64),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "keys",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::Map(m) => Value::List(m.keys().map(|k| Value::String(k.clone())).collect()),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "head",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::List(l) => l.first().cloned().unwrap_or(Value::null()),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "last",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::List(l) => l.last().cloned().unwrap_or(Value::null()),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "reverse",
		min_args: 1,
		max_args: 1,
		func: |a| match &a[0] {
			Value::List(l) => Value::List(l.iter().rev().cloned().collect()),
			Value::String(s) => Value::String(s.chars().rev().collect()),
			Value::Null(k) => Value::Null(*k),
			_ => Value::Null(NullKind::BadType),
		},
	},
	Function {
		name: "coalesce",
		min_args: 1,
		max_args: 64,
		func: |a| {
			for v in a {
				if !v.is_null() && !v.is_empty_value() {
					return v.clone();
				}
			}
			Value::null()
		},
	},
	Function {
		name: "range",
		min_args: 2,
		max_args: 3,
		func: |a| {
			let (start, end) = match (a[0].as_int(), a[1].as_int()) {
				(Some(s), Some(e)) => (s, e),
				_ => return Value::Null(NullKind::BadType),
			};
			let step = match a.get(2) {
				Some(v) => match v.as_int() {
					Some(0) | None => return Value::Null(NullKind::BadType),
					Some(s) => s,
				},
				None => 1,
			};
			let mut out = Vec::new();
			let mut i = start;
			while (step > 0 && i <= end) || (step < 0 && i >= end) {
				out.push(Value::Int(i));
				i += step;
			}
			Value::List(out)
		},
	},
	Function {
		name: "now",
		min_args: 0,
		max_args: 0,
		func: |_| Value::DateTime(DateTime::now()),
	},
	Function {
		name: "timestamp",
		min_args: 0,
		max_args: 0,
		func: |_| Value::Int(chrono::Utc::now().timestamp()),
	},
];

fn float_fn(v: &Value, f: impl Fn(f64) -> f64) -> Value {
	match v {
		Value::Int(i) => Value::Float(f(*i as f64)),
		Value::Float(x) => Value::Float(f(*x)),
		Value::Null(k) => Value::Null(*k),
		_ => Value::Null(NullKind::BadType),
	}
}

fn str_fn(v: &Value, f: impl Fn(&str) -> String) -> Value {
	match v {
		Value::String(s) => Value::String(f(s)),
		Value::Null(k) => Value::Null(*k),
		_ => Value::Null(NullKind::BadType),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registry_resolves() {
		assert!(get("size").is_some());
		assert!(get("nope").is_none());
		assert!(check_arity("range", 2).is_ok());
		assert!(check_arity("range", 1).is_err());
		assert!(check_arity("missing", 1).is_err());
	}

	#[test]
	fn range_generates() {
		let f = get("range").unwrap();
		assert_eq!(
			f.call(&[Value::Int(1), Value::Int(3)]),
			Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
		);
	}
}
