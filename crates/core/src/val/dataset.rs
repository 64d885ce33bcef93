use revision::revisioned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::val::Value;

/// A named-column row set, the unit of data moved between plan operators
/// and returned to clients.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DataSet {
	pub column_names: Vec<String>,
	pub rows: Vec<Vec<Value>>,
}

impl DataSet {
	pub fn new(column_names: Vec<String>) -> Self {
		Self {
			column_names,
			rows: Vec::new(),
		}
	}

	/// The position of a named column, if present.
	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.column_names.iter().position(|c| c == name)
	}

	/// Append a row. The caller guarantees the arity matches.
	pub fn push(&mut self, row: Vec<Value>) {
		debug_assert_eq!(row.len(), self.column_names.len());
		self.rows.push(row);
	}

	/// Move all rows of another data set with the same columns into this one.
	pub fn append(&mut self, other: &mut DataSet) {
		self.rows.append(&mut other.rows);
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}
}

impl fmt::Display for DataSet {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "{}", self.column_names.join(" | "))?;
		for row in &self.rows {
			let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
			writeln!(f, "{}", cells.join(" | "))?;
		}
		Ok(())
	}
}
