use revision::revisioned;
use serde::{Deserialize, Serialize};

use crate::fnc::operate;
use crate::val::{NullKind, Value};

/// The aggregate functions supported by the `Aggregate` operator.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum AggKind {
	Count,
	Sum,
	Avg,
	Min,
	Max,
	Collect,
	CollectSet,
	Std,
}

/// The running state of one aggregate over one group.
#[derive(Clone, Debug)]
pub struct AggState {
	kind: AggKind,
	count: u64,
	sum: Value,
	// Welford accumulators for the standard deviation
	mean: f64,
	m2: f64,
	min: Option<Value>,
	max: Option<Value>,
	collected: Vec<Value>,
}

impl AggState {
	pub fn new(kind: AggKind) -> Self {
		Self {
			kind,
			count: 0,
			sum: Value::Int(0),
			mean: 0.0,
			m2: 0.0,
			min: None,
			max: None,
			collected: Vec::new(),
		}
	}

	/// Feed one input value into the aggregate.
	///
	/// Nulls and empties are skipped, matching the count/sum semantics of
	/// the query surface: `count(x)` counts non-null values only.
	pub fn apply(&mut self, v: &Value) {
		if v.is_null() || v.is_empty_value() {
			return;
		}
		self.count += 1;
		match self.kind {
			AggKind::Count => {}
			AggKind::Sum | AggKind::Avg => {
				self.sum = operate::add(&self.sum, v);
			}
			AggKind::Std => {
				if let Some(x) = v.as_float() {
					let delta = x - self.mean;
					self.mean += delta / self.count as f64;
					self.m2 += delta * (x - self.mean);
				} else {
					self.sum = Value::Null(NullKind::BadType);
				}
			}
			AggKind::Min => match &self.min {
				Some(m) if operate::less_than(v, m) != Value::Bool(true) => {}
				_ => self.min = Some(v.clone()),
			},
			AggKind::Max => match &self.max {
				Some(m) if operate::more_than(v, m) != Value::Bool(true) => {}
				_ => self.max = Some(v.clone()),
			},
			AggKind::Collect | AggKind::CollectSet => {
				self.collected.push(v.clone());
			}
		}
	}

	/// Produce the final value of the aggregate.
	pub fn finish(self) -> Value {
		match self.kind {
			AggKind::Count => Value::Int(self.count as i64),
			AggKind::Sum => self.sum,
			AggKind::Avg => {
				if self.count == 0 {
					Value::null()
				} else {
					operate::div(&self.sum, &Value::Float(self.count as f64))
				}
			}
			AggKind::Std => {
				if self.sum.is_null() {
					self.sum
				} else if self.count == 0 {
					Value::null()
				} else {
					Value::Float((self.m2 / self.count as f64).sqrt())
				}
			}
			AggKind::Min => self.min.unwrap_or(Value::null()),
			AggKind::Max => self.max.unwrap_or(Value::null()),
			AggKind::Collect => Value::List(self.collected),
			AggKind::CollectSet => Value::set_from(self.collected),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn run(kind: AggKind, vals: &[Value]) -> Value {
		let mut s = AggState::new(kind);
		for v in vals {
			s.apply(v);
		}
		s.finish()
	}

	#[test]
	fn count_skips_nulls() {
		let vals = [Value::Int(1), Value::null(), Value::Int(2)];
		assert_eq!(run(AggKind::Count, &vals), Value::Int(2));
	}

	#[test]
	fn sum_avg_min_max() {
		let vals = [Value::Int(1), Value::Int(2), Value::Int(3)];
		assert_eq!(run(AggKind::Sum, &vals), Value::Int(6));
		assert_eq!(run(AggKind::Avg, &vals), Value::Float(2.0));
		assert_eq!(run(AggKind::Min, &vals), Value::Int(1));
		assert_eq!(run(AggKind::Max, &vals), Value::Int(3));
	}

	#[test]
	fn std_is_population() {
		let vals = [Value::Float(2.0), Value::Float(4.0)];
		assert_eq!(run(AggKind::Std, &vals), Value::Float(1.0));
	}

	#[test]
	fn collect_set_dedups() {
		let vals = [Value::Int(2), Value::Int(1), Value::Int(2)];
		assert_eq!(run(AggKind::CollectSet, &vals), Value::set_from(vec![1.into(), 2.into()]));
	}
}
