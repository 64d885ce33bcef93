//! Planning one match path pattern.
//!
//! A pattern is planned in three moves: pick the start node through the
//! finder chain, expand hop by hop in both directions with `Traverse`
//! operators and a closing `AppendVertices`, then project the aliases
//! the caller asked for.

use crate::err::Error;
use crate::exp::{BinaryOp, Expression};
use crate::plan::context::{AliasType, PathInfo, QueryContext};
use crate::plan::node::{NodeKind, SubPlan};
use crate::plan::start;

pub struct MatchPathPlanner<'a> {
	qctx: &'a mut QueryContext,
}

impl<'a> MatchPathPlanner<'a> {
	pub fn new(qctx: &'a mut QueryContext) -> Self {
		Self {
			qctx,
		}
	}

	/// Lower a pattern into a sub-plan whose root emits one column per
	/// alias in `yields`.
	pub fn transform(mut self, path: &PathInfo, yields: &[String]) -> Result<SubPlan, Error> {
		let (start_index, mut plan) = self.find_start(path)?;
		let mut columns = vec![path.nodes[start_index].alias.clone()];
		plan = self.expand(path, start_index, plan, &mut columns)?;
		self.project(plan, &columns, yields)
	}

	// Try every finder against every node until one accepts.
	fn find_start(&mut self, path: &PathInfo) -> Result<(usize, SubPlan), Error> {
		for finder in start::finders() {
			for (i, node) in path.nodes.iter().enumerate() {
				if finder.matches(self.qctx, node) {
					debug!("starting pattern at node {i} via {}", finder.name());
					let plan = finder.transform(self.qctx, node)?;
					return Ok((i, plan));
				}
			}
		}
		Err(Error::NoStartVid)
	}

	// Expand rightwards from the start, then leftwards, binding every
	// alias on the way.
	fn expand(
		&mut self,
		path: &PathInfo,
		start_index: usize,
		mut plan: SubPlan,
		columns: &mut Vec<String>,
	) -> Result<SubPlan, Error> {
		let space = self.qctx.space.desc().id;
		if !path.nodes[start_index].alias.is_empty()
			&& !self.qctx.is_bound(&path.nodes[start_index].alias)
		{
			self.qctx.bind_alias(&path.nodes[start_index].alias.clone(), AliasType::Node)?;
		}

		// Rightward: edge i connects node i to node i+1
		let mut src_col = path.nodes[start_index].alias.clone();
		for i in start_index..path.edges.len() {
			let edge = &path.edges[i];
			let node = &path.nodes[i];
			let (min, max) = edge.hops();
			let var = self.qctx.new_var();
			let track = i > start_index;
			let mut output = if track {
				columns.clone()
			} else {
				Vec::new()
			};
			if !track {
				columns.clear();
			}
			output.retain(|c| c != &node.alias);
			columns.retain(|c| c != &node.alias);
			output.push(node.alias.clone());
			output.push(edge.alias.clone());
			columns.push(node.alias.clone());
			columns.push(edge.alias.clone());
			let traverse = self.qctx.arena.add(
				NodeKind::Traverse {
					space,
					edge_types: edge.direction.signed(&edge.edge_types),
					src_col: src_col.clone(),
					node_alias: node.alias.clone(),
					edge_alias: edge.alias.clone(),
					vertex_filter: node.filter.clone(),
					edge_filter: edge.filter.clone(),
					min_steps: min,
					max_steps: max,
					track_prev_path: track,
				},
				output,
				var,
			);
			self.qctx.arena.connect(plan.root, traverse)?;
			plan.root = traverse;
			if !edge.alias.is_empty() && !self.qctx.is_bound(&edge.alias) {
				self.qctx.bind_alias(&edge.alias, AliasType::Edge)?;
			}
			src_col = edge.alias.clone();
		}

		// The terminal node of the rightward walk
		if start_index < path.nodes.len() - 1 {
			let terminal = &path.nodes[path.nodes.len() - 1];
			plan = self.append_vertex(plan, &src_col, &terminal.alias.clone(), columns)?;
		}

		// Leftward: re-read each edge against its reversed direction
		let mut left_src = path.nodes[start_index].alias.clone();
		for i in (0..start_index).rev() {
			let edge = &path.edges[i];
			let node = &path.nodes[i];
			let (min, max) = edge.hops();
			let var = self.qctx.new_var();
			let hop_alias = format!("__left_{i}");
			let mut output = columns.clone();
			output.push(hop_alias.clone());
			output.push(edge.alias.clone());
			columns.push(hop_alias.clone());
			columns.push(edge.alias.clone());
			let reversed = match edge.direction {
				crate::plan::context::Direction::Out => crate::plan::context::Direction::In,
				crate::plan::context::Direction::In => crate::plan::context::Direction::Out,
				crate::plan::context::Direction::Both => crate::plan::context::Direction::Both,
			};
			let traverse = self.qctx.arena.add(
				NodeKind::Traverse {
					space,
					edge_types: reversed.signed(&edge.edge_types),
					src_col: left_src.clone(),
					node_alias: hop_alias,
					edge_alias: edge.alias.clone(),
					vertex_filter: None,
					edge_filter: edge.filter.clone(),
					min_steps: min,
					max_steps: max,
					track_prev_path: true,
				},
				output,
				var,
			);
			self.qctx.arena.connect(plan.root, traverse)?;
			plan.root = traverse;
			if !edge.alias.is_empty() && !self.qctx.is_bound(&edge.alias) {
				self.qctx.bind_alias(&edge.alias, AliasType::Edge)?;
			}
			left_src = edge.alias.clone();
			// The node reached leftwards
			plan = self.append_vertex(plan, &left_src, &node.alias.clone(), columns)?;
		}
		Ok(plan)
	}

	// Materialize a reached node; an already-bound alias becomes an
	// expand-into filter on the fresh column instead of a new binding.
	fn append_vertex(
		&mut self,
		mut plan: SubPlan,
		edge_col: &str,
		alias: &str,
		columns: &mut Vec<String>,
	) -> Result<SubPlan, Error> {
		let space = self.qctx.space.desc().id;
		let expand_into = self.qctx.is_bound(alias);
		let out_alias = if expand_into {
			format!("__into_{alias}")
		} else {
			alias.to_string()
		};
		let var = self.qctx.new_var();
		let mut output = columns.clone();
		output.push(out_alias.clone());
		columns.push(out_alias.clone());
		let append = self.qctx.arena.add(
			NodeKind::AppendVertices {
				space,
				edge_col: edge_col.to_string(),
				node_alias: out_alias.clone(),
			},
			output.clone(),
			var,
		);
		self.qctx.arena.connect(plan.root, append)?;
		plan.root = append;
		if expand_into {
			// The pattern closed a cycle: keep rows whose fresh vertex
			// is the one already bound
			let condition = Expression::binary(
				Expression::FunctionCall {
					name: "id".into(),
					args: vec![Expression::InputProp(out_alias.clone())],
				},
				BinaryOp::Equal,
				Expression::FunctionCall {
					name: "id".into(),
					args: vec![Expression::InputProp(alias.to_string())],
				},
			);
			let var = self.qctx.new_var();
			let filter = self.qctx.arena.add(
				NodeKind::Filter {
					condition,
					stable: false,
				},
				output,
				var,
			);
			self.qctx.arena.connect(plan.root, filter)?;
			plan.root = filter;
		} else if !alias.is_empty() {
			self.qctx.bind_alias(alias, AliasType::Node)?;
		}
		Ok(plan)
	}

	// The closing projection selecting the yielded aliases.
	fn project(
		&mut self,
		mut plan: SubPlan,
		columns: &[String],
		yields: &[String],
	) -> Result<SubPlan, Error> {
		let wanted: Vec<String> = if yields.is_empty() {
			columns.iter().filter(|c| !c.starts_with("__")).cloned().collect()
		} else {
			yields.to_vec()
		};
		let items: Vec<(String, Expression)> = wanted
			.iter()
			.map(|c| (c.clone(), Expression::InputProp(c.clone())))
			.collect();
		let var = self.qctx.new_var();
		let project = self.qctx.arena.add(
			NodeKind::Project {
				columns: items,
			},
			wanted,
			var,
		);
		self.qctx.arena.connect(plan.root, project)?;
		plan.root = project;
		Ok(plan)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::schema::{SpaceDesc, VidType};
	use crate::meta::SpaceInfo;
	use crate::plan::context::{EdgeInfo, NodeInfo};
	use crate::val::Value;
	use std::sync::Arc;

	fn qctx() -> QueryContext {
		QueryContext::new(Arc::new(SpaceInfo {
			desc: Some(SpaceDesc {
				id: 1,
				name: "s".into(),
				partition_num: 1,
				replica_factor: 1,
				vid_type: VidType::Int64,
			}),
			..Default::default()
		}))
	}

	fn two_hop_path() -> PathInfo {
		PathInfo {
			nodes: vec![
				NodeInfo {
					alias: "a".into(),
					vids: vec![Value::Int(1)],
					..Default::default()
				},
				NodeInfo {
					alias: "b".into(),
					..Default::default()
				},
				NodeInfo {
					alias: "c".into(),
					..Default::default()
				},
			],
			edges: vec![
				EdgeInfo {
					alias: "e1".into(),
					edge_types: vec![3],
					..Default::default()
				},
				EdgeInfo {
					alias: "e2".into(),
					edge_types: vec![3],
					..Default::default()
				},
			],
		}
	}

	#[test]
	fn two_hop_plan_shape() {
		let mut ctx = qctx();
		let plan = MatchPathPlanner::new(&mut ctx)
			.transform(
				&two_hop_path(),
				&["a".into(), "e1".into(), "b".into(), "e2".into(), "c".into()],
			)
			.unwrap();

		let mut traverses = 0;
		let mut appends = 0;
		let mut projects = 0;
		for node in ctx.arena.nodes() {
			match node.kind {
				NodeKind::Traverse {
					..
				} => traverses += 1,
				NodeKind::AppendVertices {
					..
				} => appends += 1,
				NodeKind::Project {
					..
				} => projects += 1,
				_ => {}
			}
		}
		assert_eq!(traverses, 2);
		assert_eq!(appends, 1);
		assert_eq!(projects, 1);
		assert_eq!(
			ctx.arena.node(plan.root).output,
			vec!["a", "e1", "b", "e2", "c"]
		);
	}

	#[test]
	fn bound_alias_becomes_expand_into_filter() {
		let mut ctx = qctx();
		// A two-hop cycle: (a)-[e1]->(b)-[e2]->(a)
		let mut path = two_hop_path();
		path.nodes[2].alias = "a".into();
		MatchPathPlanner::new(&mut ctx).transform(&path, &["a".into(), "b".into()]).unwrap();
		let filters = ctx
			.arena
			.nodes()
			.iter()
			.filter(|n| {
				matches!(
					n.kind,
					NodeKind::Filter {
						..
					}
				)
			})
			.count();
		assert_eq!(filters, 1);
	}

	#[test]
	fn pattern_without_start_is_rejected() {
		let mut ctx = qctx();
		let path = PathInfo {
			nodes: vec![NodeInfo::default(), NodeInfo::default()],
			edges: vec![EdgeInfo::default()],
		};
		assert!(matches!(
			MatchPathPlanner::new(&mut ctx).transform(&path, &[]),
			Err(Error::NoStartVid)
		));
	}
}
