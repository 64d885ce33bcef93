//! The physical operator DAG.
//!
//! Operators live in an arena and reference each other by index; the
//! buffers between them are named by variables resolved through the
//! query context's symbol table at execution time.

use crate::err::Error;
use crate::exp::{visitor, Expression, Visitor};
use crate::fnc::aggregate::AggKind;
use crate::ids::{EdgeType, SpaceId, TagId};
use crate::val::Value;

/// An operator's position in the arena.
pub type NodeId = usize;

/// A fragment of a plan: where input flows in and where output is read.
#[derive(Clone, Copy, Debug)]
pub struct SubPlan {
	pub tail: NodeId,
	pub root: NodeId,
}

/// How a `Sort` orders one column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortKey {
	pub column: usize,
	pub ascending: bool,
}

/// The operator variants the planner emits.
#[derive(Clone, Debug)]
pub enum NodeKind {
	/// The inert head of a plan or loop body
	Start,
	/// Reads a bound alias from the outer row instead of storage
	Argument {
		alias: String,
	},
	/// Seeds a plan from an index seek
	IndexScan {
		space: SpaceId,
		index: crate::ids::IndexId,
		values: Vec<Value>,
	},
	/// Seeds a plan from a full tag scan
	ScanVertices {
		space: SpaceId,
		tag: TagId,
	},
	/// Seeds a plan from a literal vid list
	VidList {
		vids: Vec<Value>,
	},
	/// Materializes whole vertices for the vids of one input column
	GetVertices {
		space: SpaceId,
		src_col: String,
	},
	/// One hop (or a step range) of neighbourhood expansion
	Traverse {
		space: SpaceId,
		/// Signed types: the direction is baked into the sign
		edge_types: Vec<EdgeType>,
		src_col: String,
		node_alias: String,
		edge_alias: String,
		vertex_filter: Option<Expression>,
		edge_filter: Option<Expression>,
		min_steps: usize,
		max_steps: usize,
		/// Keep the upstream columns on every emitted row
		track_prev_path: bool,
	},
	/// Materializes the terminal node of a path
	AppendVertices {
		space: SpaceId,
		edge_col: String,
		node_alias: String,
	},
	Filter {
		condition: Expression,
		/// Preserve input order even under parallel evaluation
		stable: bool,
	},
	Project {
		columns: Vec<(String, Expression)>,
	},
	Aggregate {
		group_keys: Vec<(String, Expression)>,
		group_items: Vec<(String, AggKind, bool, Expression)>,
	},
	Dedup,
	Sort {
		keys: Vec<SortKey>,
	},
	Limit {
		skip: usize,
		count: Option<usize>,
	},
	Sample {
		count: usize,
	},
	Unwind {
		expr: Expression,
		alias: String,
	},
	/// Runs a sub-plan per row and collects its matches into a column
	RollUpApply {
		sub: SubPlan,
		collect_col: String,
		alias: String,
	},
	/// Re-runs its body until the condition fails
	Loop {
		body: SubPlan,
		/// Stop after this many iterations
		steps: usize,
		/// Also stop once this variable holds no rows
		until_empty: String,
	},
	/// One subgraph step: expands the frontier variable in place and
	/// accumulates into the vertex/edge holdover variables
	SubgraphStep {
		space: SpaceId,
		edge_types: Vec<EdgeType>,
		with_props: bool,
		frontier_var: String,
		visited_var: String,
		vertices_var: String,
		edges_var: String,
		steps: usize,
	},
	/// Merges the subgraph holdover variables into the final row set
	DataCollect {
		vertices_var: String,
		edges_var: String,
		vertex_col: String,
		edge_col: String,
	},
}

/// One operator: its kind, dependencies, output columns and the
/// variable its result is published under.
#[derive(Clone, Debug)]
pub struct PlanNode {
	pub kind: NodeKind,
	pub deps: Vec<NodeId>,
	pub output: Vec<String>,
	pub out_var: String,
}

impl PlanNode {
	/// Operators that read no upstream row set; when used as the body
	/// side of a loop or apply, the connector seeds them with a `Start`.
	pub fn is_single_input(&self) -> bool {
		matches!(
			self.kind,
			NodeKind::Start
				| NodeKind::Argument {
					..
				} | NodeKind::IndexScan {
				..
			} | NodeKind::ScanVertices {
				..
			} | NodeKind::VidList {
				..
			}
		)
	}

	/// The input column names this operator requires of its upstream.
	pub fn required_columns(&self) -> Vec<String> {
		struct Collect(Vec<String>);
		impl Visitor for Collect {
			fn visit(&mut self, expr: &Expression) {
				if let Expression::InputProp(name) = expr {
					self.0.push(name.clone());
				}
				visitor::walk(self, expr);
			}
		}
		let mut collect = Collect(Vec::new());
		match &self.kind {
			NodeKind::GetVertices {
				src_col,
				..
			} => return vec![src_col.clone()],
			NodeKind::Traverse {
				src_col,
				..
			} => return vec![src_col.clone()],
			NodeKind::AppendVertices {
				edge_col,
				..
			} => return vec![edge_col.clone()],
			NodeKind::Filter {
				condition,
				..
			} => collect.visit(condition),
			NodeKind::Project {
				columns,
			} => {
				for (_, e) in columns {
					collect.visit(e);
				}
			}
			NodeKind::Aggregate {
				group_keys,
				group_items,
			} => {
				for (_, e) in group_keys {
					collect.visit(e);
				}
				for (_, _, _, e) in group_items {
					collect.visit(e);
				}
			}
			NodeKind::Unwind {
				expr,
				..
			} => collect.visit(expr),
			_ => {}
		}
		collect.0.sort();
		collect.0.dedup();
		collect.0
	}
}

/// The arena owning every operator of one query plan.
#[derive(Clone, Debug, Default)]
pub struct PlanArena {
	nodes: Vec<PlanNode>,
}

impl PlanArena {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, kind: NodeKind, output: Vec<String>, out_var: String) -> NodeId {
		self.nodes.push(PlanNode {
			kind,
			deps: Vec::new(),
			output,
			out_var,
		});
		self.nodes.len() - 1
	}

	pub fn node(&self, id: NodeId) -> &PlanNode {
		&self.nodes[id]
	}

	pub fn node_mut(&mut self, id: NodeId) -> &mut PlanNode {
		&mut self.nodes[id]
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn nodes(&self) -> &[PlanNode] {
		&self.nodes
	}

	/// Wire `down`'s input to `up`'s output, validating that every
	/// column `down` requires is produced by `up`.
	pub fn connect(&mut self, up: NodeId, down: NodeId) -> Result<(), Error> {
		let produced = self.nodes[up].output.clone();
		for required in self.nodes[down].required_columns() {
			if !produced.contains(&required) {
				return Err(Error::ColumnMismatch(self.describe(down), required));
			}
		}
		self.nodes[down].deps.push(up);
		Ok(())
	}

	/// Join two sub-plans in sequence, returning the combined fragment.
	pub fn link(&mut self, up: SubPlan, down: SubPlan) -> Result<SubPlan, Error> {
		self.connect(up.root, down.tail)?;
		Ok(SubPlan {
			tail: up.tail,
			root: down.root,
		})
	}

	fn describe(&self, id: NodeId) -> String {
		let name = match &self.nodes[id].kind {
			NodeKind::Start => "Start",
			NodeKind::Argument {
				..
			} => "Argument",
			NodeKind::IndexScan {
				..
			} => "IndexScan",
			NodeKind::ScanVertices {
				..
			} => "ScanVertices",
			NodeKind::VidList {
				..
			} => "VidList",
			NodeKind::GetVertices {
				..
			} => "GetVertices",
			NodeKind::Traverse {
				..
			} => "Traverse",
			NodeKind::AppendVertices {
				..
			} => "AppendVertices",
			NodeKind::Filter {
				..
			} => "Filter",
			NodeKind::Project {
				..
			} => "Project",
			NodeKind::Aggregate {
				..
			} => "Aggregate",
			NodeKind::Dedup => "Dedup",
			NodeKind::Sort {
				..
			} => "Sort",
			NodeKind::Limit {
				..
			} => "Limit",
			NodeKind::Sample {
				..
			} => "Sample",
			NodeKind::Unwind {
				..
			} => "Unwind",
			NodeKind::RollUpApply {
				..
			} => "RollUpApply",
			NodeKind::Loop {
				..
			} => "Loop",
			NodeKind::SubgraphStep {
				..
			} => "SubgraphStep",
			NodeKind::DataCollect {
				..
			} => "DataCollect",
		};
		format!("{name}#{id}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connect_validates_columns() {
		let mut arena = PlanArena::new();
		let up = arena.add(NodeKind::Start, vec!["a".to_string()], "v0".to_string());
		let down = arena.add(
			NodeKind::Filter {
				condition: Expression::InputProp("missing".into()),
				stable: false,
			},
			vec!["a".to_string()],
			"v1".to_string(),
		);
		assert!(matches!(arena.connect(up, down), Err(Error::ColumnMismatch(..))));

		let ok = arena.add(
			NodeKind::Filter {
				condition: Expression::InputProp("a".into()),
				stable: false,
			},
			vec!["a".to_string()],
			"v2".to_string(),
		);
		assert!(arena.connect(up, ok).is_ok());
		assert_eq!(arena.node(ok).deps, vec![up]);
	}

	#[test]
	fn single_input_detection() {
		let mut arena = PlanArena::new();
		let start = arena.add(NodeKind::Start, vec![], "v0".to_string());
		let dedup = arena.add(NodeKind::Dedup, vec![], "v1".to_string());
		assert!(arena.node(start).is_single_input());
		assert!(!arena.node(dedup).is_single_input());
	}
}
