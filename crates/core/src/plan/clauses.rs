//! Clause-level planners: where, with/return, unwind, order-by,
//! pagination and sampling. Each consumes a validated context and a
//! known input column layout, and appends operators to the arena.

use crate::err::Error;
use crate::exp::{visitor, Expression, Rewriter};
use crate::plan::context::{QueryContext, ReturnContext, UnwindContext};
use crate::plan::match_path::MatchPathPlanner;
use crate::plan::node::{NodeKind, SortKey, SubPlan};

/// Emits a `Filter` over the current row layout.
pub fn plan_where(
	qctx: &mut QueryContext,
	input: SubPlan,
	input_cols: &[String],
	condition: Expression,
	stable: bool,
) -> Result<SubPlan, Error> {
	let var = qctx.new_var();
	let filter = qctx.arena.add(
		NodeKind::Filter {
			condition,
			stable,
		},
		input_cols.to_vec(),
		var,
	);
	qctx.arena.connect(input.root, filter)?;
	Ok(SubPlan {
		tail: input.tail,
		root: filter,
	})
}

/// Emits the projection pipeline of a `WITH` / `RETURN` clause:
/// aggregate or project, then where, order, skip/limit and distinct.
pub fn plan_return(
	qctx: &mut QueryContext,
	input: SubPlan,
	ctx: &ReturnContext,
) -> Result<SubPlan, Error> {
	let out_cols: Vec<String> = ctx.items.iter().map(|i| i.alias.clone()).collect();
	let has_aggregate = ctx.items.iter().any(|i| i.expr.has_aggregate());

	let mut plan = input;
	if has_aggregate {
		// Non-aggregated items become the group keys, in order
		let mut group_keys = Vec::new();
		let mut group_items = Vec::new();
		for item in &ctx.items {
			match &item.expr {
				Expression::Aggregate {
					kind,
					distinct,
					arg,
				} => group_items.push((item.alias.clone(), *kind, *distinct, (**arg).clone())),
				e => group_keys.push((item.alias.clone(), e.clone())),
			}
		}
		let var = qctx.new_var();
		let agg = qctx.arena.add(
			NodeKind::Aggregate {
				group_keys,
				group_items,
			},
			out_cols.clone(),
			var,
		);
		qctx.arena.connect(plan.root, agg)?;
		plan.root = agg;
	} else {
		let columns: Vec<(String, Expression)> =
			ctx.items.iter().map(|i| (i.alias.clone(), i.expr.clone())).collect();
		let var = qctx.new_var();
		let project = qctx.arena.add(
			NodeKind::Project {
				columns,
			},
			out_cols.clone(),
			var,
		);
		qctx.arena.connect(plan.root, project)?;
		plan.root = project;
	}

	if let Some(filter) = &ctx.filter {
		plan = plan_where(qctx, plan, &out_cols, filter.clone(), !ctx.order.is_empty())?;
	}
	if !ctx.order.is_empty() {
		plan = plan_order_by(qctx, plan, &out_cols, ctx)?;
	}
	if ctx.skip > 0 || ctx.limit.is_some() {
		plan = plan_pagination(qctx, plan, &out_cols, ctx.skip, ctx.limit)?;
	}
	if ctx.distinct {
		let var = qctx.new_var();
		let dedup = qctx.arena.add(NodeKind::Dedup, out_cols.clone(), var);
		qctx.arena.connect(plan.root, dedup)?;
		plan.root = dedup;
	}
	Ok(plan)
}

/// Emits a `Sort` with pre-resolved column positions.
pub fn plan_order_by(
	qctx: &mut QueryContext,
	input: SubPlan,
	input_cols: &[String],
	ctx: &ReturnContext,
) -> Result<SubPlan, Error> {
	let mut keys = Vec::with_capacity(ctx.order.len());
	for item in &ctx.order {
		let column = input_cols
			.iter()
			.position(|c| c == &item.column)
			.ok_or_else(|| Error::ColumnMismatch("Sort".to_string(), item.column.clone()))?;
		keys.push(SortKey {
			column,
			ascending: item.ascending,
		});
	}
	let var = qctx.new_var();
	let sort = qctx.arena.add(
		NodeKind::Sort {
			keys,
		},
		input_cols.to_vec(),
		var,
	);
	qctx.arena.connect(input.root, sort)?;
	Ok(SubPlan {
		tail: input.tail,
		root: sort,
	})
}

/// Emits a `Limit` covering skip and count.
pub fn plan_pagination(
	qctx: &mut QueryContext,
	input: SubPlan,
	input_cols: &[String],
	skip: usize,
	limit: Option<usize>,
) -> Result<SubPlan, Error> {
	let var = qctx.new_var();
	let node = qctx.arena.add(
		NodeKind::Limit {
			skip,
			count: limit,
		},
		input_cols.to_vec(),
		var,
	);
	qctx.arena.connect(input.root, node)?;
	Ok(SubPlan {
		tail: input.tail,
		root: node,
	})
}

/// Emits a `Sample`.
pub fn plan_sampling(
	qctx: &mut QueryContext,
	input: SubPlan,
	input_cols: &[String],
	count: usize,
) -> Result<SubPlan, Error> {
	let var = qctx.new_var();
	let node = qctx.arena.add(
		NodeKind::Sample {
			count,
		},
		input_cols.to_vec(),
		var,
	);
	qctx.arena.connect(input.root, node)?;
	Ok(SubPlan {
		tail: input.tail,
		root: node,
	})
}

/// Emits an `Unwind`, rolling up any embedded pattern first.
pub fn plan_unwind(
	qctx: &mut QueryContext,
	input: SubPlan,
	input_cols: &[String],
	ctx: &UnwindContext,
) -> Result<SubPlan, Error> {
	let mut expr = ctx.expr.clone();
	let mut cols = input_cols.to_vec();
	let mut plan = input;

	if let Some(pattern) = &ctx.pattern {
		// The embedded pattern runs as a sub-plan per driving row; its
		// matches come back as a list column the expression reads
		let collect_col = "__pattern".to_string();
		let sub = MatchPathPlanner::new(qctx).transform(pattern, &[])?;
		let var = qctx.new_var();
		let mut output = cols.clone();
		output.push(collect_col.clone());
		let rollup = qctx.arena.add(
			NodeKind::RollUpApply {
				sub,
				collect_col: collect_col.clone(),
				alias: ctx.alias.clone(),
			},
			output.clone(),
			var,
		);
		qctx.arena.connect(plan.root, rollup)?;
		plan.root = rollup;
		cols = output;

		struct PatternToColumn(String);
		impl Rewriter for PatternToColumn {
			fn rewrite(&mut self, expr: &Expression) -> Option<Expression> {
				match expr {
					Expression::MatchPathPattern {
						..
					} => Some(Expression::InputProp(self.0.clone())),
					_ => None,
				}
			}
		}
		expr = visitor::rewrite(&mut PatternToColumn(collect_col), &expr);
	}

	let mut output = cols.clone();
	output.push(ctx.alias.clone());
	let var = qctx.new_var();
	let unwind = qctx.arena.add(
		NodeKind::Unwind {
			expr,
			alias: ctx.alias.clone(),
		},
		output,
		var,
	);
	qctx.arena.connect(plan.root, unwind)?;
	plan.root = unwind;
	Ok(plan)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fnc::aggregate::AggKind;
	use crate::meta::schema::{SpaceDesc, VidType};
	use crate::meta::SpaceInfo;
	use crate::plan::context::{OrderItem, YieldItem};
	use std::sync::Arc;

	fn setup() -> (QueryContext, SubPlan) {
		let mut qctx = QueryContext::new(Arc::new(SpaceInfo {
			desc: Some(SpaceDesc {
				id: 1,
				name: "s".into(),
				partition_num: 1,
				replica_factor: 1,
				vid_type: VidType::Int64,
			}),
			..Default::default()
		}));
		let var = qctx.new_var();
		let start = qctx.arena.add(NodeKind::Start, vec!["n".to_string()], var);
		(
			qctx,
			SubPlan {
				tail: start,
				root: start,
			},
		)
	}

	#[test]
	fn aggregation_splits_keys_and_items() {
		let (mut qctx, input) = setup();
		let ctx = ReturnContext {
			items: vec![
				YieldItem {
					alias: "n".into(),
					expr: Expression::InputProp("n".into()),
				},
				YieldItem {
					alias: "c".into(),
					expr: Expression::Aggregate {
						kind: AggKind::Count,
						distinct: false,
						arg: Box::new(Expression::InputProp("n".into())),
					},
				},
			],
			..Default::default()
		};
		let plan = plan_return(&mut qctx, input, &ctx).unwrap();
		match &qctx.arena.node(plan.root).kind {
			NodeKind::Aggregate {
				group_keys,
				group_items,
			} => {
				assert_eq!(group_keys.len(), 1);
				assert_eq!(group_items.len(), 1);
				assert_eq!(group_items[0].1, AggKind::Count);
			}
			other => panic!("expected an Aggregate root, got {other:?}"),
		}
	}

	#[test]
	fn return_pipeline_order() {
		let (mut qctx, input) = setup();
		let ctx = ReturnContext {
			items: vec![YieldItem {
				alias: "n".into(),
				expr: Expression::InputProp("n".into()),
			}],
			distinct: true,
			order: vec![OrderItem {
				column: "n".into(),
				ascending: true,
			}],
			skip: 1,
			limit: Some(10),
			filter: None,
		};
		let plan = plan_return(&mut qctx, input, &ctx).unwrap();
		// Root is the Dedup, fed by Limit, fed by Sort, fed by Project
		let dedup = qctx.arena.node(plan.root);
		assert!(matches!(dedup.kind, NodeKind::Dedup));
		let limit = qctx.arena.node(dedup.deps[0]);
		assert!(matches!(
			limit.kind,
			NodeKind::Limit {
				skip: 1,
				count: Some(10),
			}
		));
		let sort = qctx.arena.node(limit.deps[0]);
		assert!(matches!(
			sort.kind,
			NodeKind::Sort {
				..
			}
		));
		let project = qctx.arena.node(sort.deps[0]);
		assert!(matches!(
			project.kind,
			NodeKind::Project {
				..
			}
		));
	}

	#[test]
	fn sampling_caps_the_row_count() {
		let (mut qctx, input) = setup();
		let plan = plan_sampling(&mut qctx, input, &["n".to_string()], 100).unwrap();
		assert!(matches!(
			qctx.arena.node(plan.root).kind,
			NodeKind::Sample {
				count: 100,
			}
		));
	}

	#[test]
	fn unwind_adds_the_alias_column() {
		let (mut qctx, input) = setup();
		let ctx = UnwindContext {
			alias: "x".into(),
			expr: Expression::InputProp("n".into()),
			pattern: None,
		};
		let plan = plan_unwind(&mut qctx, input, &["n".to_string()], &ctx).unwrap();
		let unwind = qctx.arena.node(plan.root);
		assert_eq!(unwind.output, vec!["n", "x"]);
	}

	#[test]
	fn unwind_rolls_up_embedded_patterns() {
		use crate::plan::context::{EdgeInfo, NodeInfo, PathInfo};
		use crate::val::Value;
		let (mut qctx, input) = setup();
		let ctx = UnwindContext {
			alias: "p".into(),
			expr: Expression::MatchPathPattern {
				aliases: vec!["a".into(), "b".into()],
			},
			pattern: Some(PathInfo {
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
				],
				edges: vec![EdgeInfo {
					alias: "r".into(),
					edge_types: vec![1],
					..Default::default()
				}],
			}),
		};
		let plan = plan_unwind(&mut qctx, input, &["n".to_string()], &ctx).unwrap();
		// The pattern became a rollup feeding the unwound expression
		let unwind = qctx.arena.node(plan.root);
		match &unwind.kind {
			NodeKind::Unwind {
				expr,
				..
			} => assert_eq!(expr, &Expression::InputProp("__pattern".into())),
			other => panic!("expected an Unwind root, got {other:?}"),
		}
		let rollup = qctx.arena.node(unwind.deps[0]);
		assert!(matches!(
			rollup.kind,
			NodeKind::RollUpApply {
				..
			}
		));
	}

	#[test]
	fn unknown_order_column_is_rejected() {
		let (mut qctx, input) = setup();
		let ctx = ReturnContext {
			items: vec![YieldItem {
				alias: "n".into(),
				expr: Expression::InputProp("n".into()),
			}],
			order: vec![OrderItem {
				column: "ghost".into(),
				ascending: true,
			}],
			..Default::default()
		};
		assert!(plan_return(&mut qctx, input, &ctx).is_err());
	}
}
