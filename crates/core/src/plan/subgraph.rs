//! Planning a subgraph traversal.
//!
//! The shape is a `Loop` over one `SubgraphStep`: the step expands the
//! frontier variable in place and accumulates vertices and edges into
//! holdover variables, and a final `DataCollect` merges the holdovers
//! into the two-column result. Zero steps shortcut to materializing
//! the seed vertices alone.

use crate::err::Error;
use crate::plan::context::{QueryContext, SubgraphContext};
use crate::plan::node::{NodeKind, SubPlan};

pub struct SubgraphPlanner<'a> {
	qctx: &'a mut QueryContext,
}

impl<'a> SubgraphPlanner<'a> {
	pub fn new(qctx: &'a mut QueryContext) -> Self {
		Self {
			qctx,
		}
	}

	pub fn transform(self, ctx: &SubgraphContext) -> Result<SubPlan, Error> {
		if ctx.steps == 0 {
			return self.zero_step(ctx);
		}
		let space = self.qctx.space.desc().id;
		let frontier_var = self.qctx.new_var();
		let visited_var = self.qctx.new_var();
		let vertices_var = self.qctx.new_var();
		let edges_var = self.qctx.new_var();

		// The loop seed: the starting vid set
		let seed_var = frontier_var.clone();
		let seed = self.qctx.arena.add(
			NodeKind::VidList {
				vids: ctx.from.clone(),
			},
			vec!["_vids".to_string()],
			seed_var,
		);

		// The loop body re-reads and rewrites the frontier variable
		let body_var = self.qctx.new_var();
		let body_start = self.qctx.arena.add(NodeKind::Start, Vec::new(), body_var);
		let step_var = self.qctx.new_var();
		let step = self.qctx.arena.add(
			NodeKind::SubgraphStep {
				space,
				edge_types: ctx.edge_types.clone(),
				with_props: ctx.with_props,
				frontier_var: frontier_var.clone(),
				visited_var: visited_var.clone(),
				vertices_var: vertices_var.clone(),
				edges_var: edges_var.clone(),
				steps: ctx.steps,
			},
			Vec::new(),
			step_var,
		);
		self.qctx.arena.connect(body_start, step)?;

		let loop_var = self.qctx.new_var();
		let loop_node = self.qctx.arena.add(
			NodeKind::Loop {
				body: SubPlan {
					tail: body_start,
					root: step,
				},
				steps: ctx.steps,
				until_empty: frontier_var,
			},
			Vec::new(),
			loop_var,
		);
		self.qctx.arena.connect(seed, loop_node)?;

		let collect_var = self.qctx.new_var();
		let collect = self.qctx.arena.add(
			NodeKind::DataCollect {
				vertices_var,
				edges_var,
				vertex_col: ctx.vertex_alias.clone(),
				edge_col: ctx.edge_alias.clone(),
			},
			vec![ctx.vertex_alias.clone(), ctx.edge_alias.clone()],
			collect_var,
		);
		self.qctx.arena.connect(loop_node, collect)?;

		Ok(SubPlan {
			tail: seed,
			root: collect,
		})
	}

	// Zero steps: only the seed vertices, no traversal at all.
	fn zero_step(self, ctx: &SubgraphContext) -> Result<SubPlan, Error> {
		let space = self.qctx.space.desc().id;
		let seed_var = self.qctx.new_var();
		let seed = self.qctx.arena.add(
			NodeKind::VidList {
				vids: ctx.from.clone(),
			},
			vec!["_vids".to_string()],
			seed_var,
		);
		let get_var = self.qctx.new_var();
		let get = self.qctx.arena.add(
			NodeKind::GetVertices {
				space,
				src_col: "_vids".to_string(),
			},
			vec![ctx.vertex_alias.clone()],
			get_var,
		);
		self.qctx.arena.connect(seed, get)?;
		// The seed vertices collapse into one row; the edge column
		// exists and is empty, keeping the result shape
		let agg_var = self.qctx.new_var();
		let agg = self.qctx.arena.add(
			NodeKind::Aggregate {
				group_keys: Vec::new(),
				group_items: vec![(
					ctx.vertex_alias.clone(),
					crate::fnc::aggregate::AggKind::Collect,
					false,
					crate::exp::Expression::InputProp(ctx.vertex_alias.clone()),
				)],
			},
			vec![ctx.vertex_alias.clone()],
			agg_var,
		);
		self.qctx.arena.connect(get, agg)?;
		let project_var = self.qctx.new_var();
		let project = self.qctx.arena.add(
			NodeKind::Project {
				columns: vec![
					(
						ctx.vertex_alias.clone(),
						crate::exp::Expression::InputProp(ctx.vertex_alias.clone()),
					),
					(
						ctx.edge_alias.clone(),
						crate::exp::Expression::ListLiteral(Vec::new()),
					),
				],
			},
			vec![ctx.vertex_alias.clone(), ctx.edge_alias.clone()],
			project_var,
		);
		self.qctx.arena.connect(agg, project)?;
		Ok(SubPlan {
			tail: seed,
			root: project,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::schema::{SpaceDesc, VidType};
	use crate::meta::SpaceInfo;
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

	fn ctx(steps: usize) -> SubgraphContext {
		SubgraphContext {
			from: vec![Value::Int(1)],
			steps,
			edge_types: vec![],
			with_props: true,
			vertex_alias: "v".into(),
			edge_alias: "e".into(),
		}
	}

	#[test]
	fn loop_shape() {
		let mut qctx = qctx();
		let plan = SubgraphPlanner::new(&mut qctx).transform(&ctx(2)).unwrap();
		let root = qctx.arena.node(plan.root);
		assert!(matches!(
			root.kind,
			NodeKind::DataCollect {
				..
			}
		));
		assert_eq!(root.output, vec!["v", "e"]);
		let loop_node = qctx.arena.node(root.deps[0]);
		match &loop_node.kind {
			NodeKind::Loop {
				steps,
				body,
				..
			} => {
				assert_eq!(*steps, 2);
				assert!(matches!(
					qctx.arena.node(body.root).kind,
					NodeKind::SubgraphStep {
						..
					}
				));
			}
			other => panic!("expected a Loop, got {other:?}"),
		}
	}

	#[test]
	fn zero_steps_has_no_loop() {
		let mut qctx = qctx();
		let plan = SubgraphPlanner::new(&mut qctx).transform(&ctx(0)).unwrap();
		assert!(qctx.arena.nodes().iter().all(|n| {
			!matches!(
				n.kind,
				NodeKind::Loop {
					..
				}
			)
		}));
		assert_eq!(qctx.arena.node(plan.root).output, vec!["v", "e"]);
	}
}
