use crate::val::Value;

static EMPTY: Value = Value::Empty;

/// The row and state provider an [`Expression`](super::Expression) is
/// evaluated against.
///
/// Every accessor has a default returning `Empty`, so contexts only
/// implement what their call site can actually supply.
pub trait ExpressionContext {
	/// The current input row, by column position.
	fn input_column(&self, _idx: usize) -> &Value {
		&EMPTY
	}

	/// The current input row, by column name.
	fn input_prop(&self, _name: &str) -> &Value {
		&EMPTY
	}

	/// The source vertex of the hop being evaluated.
	fn src_vertex(&self) -> &Value {
		&EMPTY
	}

	/// The destination vertex of the hop being evaluated.
	fn dst_vertex(&self) -> &Value {
		&EMPTY
	}

	/// The edge being evaluated.
	fn edge(&self) -> &Value {
		&EMPTY
	}

	/// A named variable bound earlier in the query.
	fn variable(&self, _name: &str) -> &Value {
		&EMPTY
	}

	/// A column of a named variable's current row.
	fn var_prop(&self, _var: &str, _name: &str) -> &Value {
		&EMPTY
	}

	/// A query parameter.
	fn parameter(&self, _name: &str) -> &Value {
		&EMPTY
	}

	/// A session variable.
	fn session(&self, _name: &str) -> &Value {
		&EMPTY
	}
}

/// A context with nothing bound; constants and parameters-free
/// expressions evaluate against this.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyContext;

impl ExpressionContext for EmptyContext {}

/// A context over one named row, with optional current vertex and edge.
///
/// This is what the storage filter push-down and the executors use: the
/// row supplies columns by name and position, and traversal state
/// supplies the graph values.
#[derive(Clone, Debug, Default)]
pub struct RowContext {
	pub names: Vec<String>,
	pub row: Vec<Value>,
	pub src: Value,
	pub dst: Value,
	pub edge: Value,
	pub params: std::collections::BTreeMap<String, Value>,
	pub vars: std::collections::BTreeMap<String, Value>,
}

impl ExpressionContext for RowContext {
	fn input_column(&self, idx: usize) -> &Value {
		self.row.get(idx).unwrap_or(&EMPTY)
	}

	fn input_prop(&self, name: &str) -> &Value {
		match self.names.iter().position(|n| n == name) {
			Some(idx) => self.input_column(idx),
			None => &EMPTY,
		}
	}

	fn src_vertex(&self) -> &Value {
		&self.src
	}

	fn dst_vertex(&self) -> &Value {
		&self.dst
	}

	fn edge(&self) -> &Value {
		&self.edge
	}

	fn variable(&self, name: &str) -> &Value {
		self.vars.get(name).unwrap_or(&EMPTY)
	}

	fn var_prop(&self, var: &str, name: &str) -> &Value {
		match self.vars.get(var) {
			Some(Value::Map(m)) => m.get(name).unwrap_or(&EMPTY),
			_ => &EMPTY,
		}
	}

	fn parameter(&self, name: &str) -> &Value {
		self.params.get(name).unwrap_or(&EMPTY)
	}
}
