use revision::revisioned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::val::Value;

/// The properties a vertex carries for one of its tags.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TagData {
	pub name: String,
	pub props: BTreeMap<String, Value>,
}

/// A materialized vertex: its id plus the tags read for it.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Vertex {
	pub vid: Value,
	pub tags: Vec<TagData>,
}

impl Vertex {
	pub fn new(vid: Value) -> Self {
		Self {
			vid,
			tags: Vec::new(),
		}
	}

	/// Look up a property across all tags of this vertex.
	pub fn prop(&self, tag: &str, name: &str) -> Option<&Value> {
		self.tags.iter().find(|t| t.name == tag).and_then(|t| t.props.get(name))
	}
}

impl fmt::Display for Vertex {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "({})", self.vid)
	}
}

/// A materialized edge with its endpoints, rank and properties.
///
/// `etype` keeps the sign it was read with: a negative value marks the
/// reverse copy of the edge.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Edge {
	pub src: Value,
	pub dst: Value,
	pub etype: i32,
	pub name: String,
	pub rank: i64,
	pub props: BTreeMap<String, Value>,
}

impl Edge {
	/// The same edge seen from the other endpoint.
	pub fn reversed(&self) -> Edge {
		Edge {
			src: self.dst.clone(),
			dst: self.src.clone(),
			etype: -self.etype,
			name: self.name.clone(),
			rank: self.rank,
			props: self.props.clone(),
		}
	}
}

impl fmt::Display for Edge {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "({})-[{}@{}]->({})", self.src, self.name, self.rank, self.dst)
	}
}

/// One hop of a path: the edge taken and the vertex reached.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Step {
	pub dst: Vertex,
	pub etype: i32,
	pub name: String,
	pub rank: i64,
	pub props: BTreeMap<String, Value>,
}

/// An alternating vertex/edge sequence.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Path {
	pub src: Vertex,
	pub steps: Vec<Step>,
}

impl Path {
	pub fn new(src: Vertex) -> Self {
		Self {
			src,
			steps: Vec::new(),
		}
	}

	/// The number of hops in this path.
	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}
}

impl fmt::Display for Path {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.src)?;
		for s in &self.steps {
			write!(f, "-[{}@{}]->{}", s.name, s.rank, s.dst)?;
		}
		Ok(())
	}
}
