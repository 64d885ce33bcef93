//! End-to-end: schema, inserts, write invariants, and a one-hop
//! traversal driven through the planner and executors.

mod common;

use std::collections::BTreeSet;
use std::collections::HashMap;

use quasar_core::exe::{ExecutionContext, Executor};
use quasar_core::exp::Expression;
use quasar_core::key;
use quasar_core::kvs::Store;
use quasar_core::plan::{
	clauses, EdgeInfo, MatchPathPlanner, NodeInfo, PathInfo, QueryContext, ReturnContext,
	YieldItem,
};
use quasar_core::rpc::{EdgeKeySpec, GetPropRequest, GraphStorage, PropKeySpec};
use quasar_core::val::Value;

fn attr(expr: Expression, name: &str) -> Expression {
	Expression::Attribute {
		expr: Box::new(expr),
		name: name.to_string(),
	}
}

#[test_log::test(tokio::test)]
async fn insert_and_traverse() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	// Forward payload reads back through GetProp
	let raw = space.vid_type.encode(&Value::Int(1)).unwrap();
	let part = space.part_of(&raw);
	let mut parts = HashMap::new();
	parts.insert(
		part,
		vec![PropKeySpec::Edge(EdgeKeySpec {
			src: Value::Int(1),
			etype: like,
			rank: 0,
			dst: Value::Int(2),
		})],
	);
	let resp = tc
		.cluster
		.get_props(GetPropRequest {
			space: space.id,
			parts,
			props: None,
			plan: None,
		})
		.await
		.unwrap();
	assert!(resp.common.ok());
	assert_eq!(resp.dataset.rows.len(), 1);
	let Value::Map(props) = &resp.dataset.rows[0][1] else {
		panic!("expected a property map");
	};
	assert_eq!(props["likeness"], Value::Float(80.0));

	// The reverse copy exists under the destination's partition with
	// the same payload (or empty)
	let raw2 = space.vid_type.encode(&Value::Int(2)).unwrap();
	let rev_part = space.part_of(&raw2);
	let mut parts = HashMap::new();
	parts.insert(
		rev_part,
		vec![PropKeySpec::Edge(EdgeKeySpec {
			src: Value::Int(2),
			etype: -like,
			rank: 0,
			dst: Value::Int(1),
		})],
	);
	let resp = tc
		.cluster
		.get_props(GetPropRequest {
			space: space.id,
			parts,
			props: None,
			plan: None,
		})
		.await
		.unwrap();
	assert!(resp.common.ok());
	assert_eq!(resp.dataset.rows.len(), 1);
	match &resp.dataset.rows[0][1] {
		Value::Map(rev) if rev.is_empty() => {}
		Value::Map(rev) => assert_eq!(rev["likeness"], Value::Float(80.0)),
		other => panic!("unexpected reverse payload {other:?}"),
	}

	// A prefix scan of the source partition lists both destinations
	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let prefix = key::edge::prefix(8, part, &raw, like);
	let mut dsts = BTreeSet::new();
	for (k, _) in store.prefix(&prefix).unwrap() {
		let parsed = key::edge::parse(8, &k).unwrap();
		assert_eq!(parsed.rank, 0);
		dsts.insert(parsed.dst);
	}
	assert_eq!(dsts.len(), 2);

	// GO FROM 1 OVER like YIELD $$.person.name, $$.person.age,
	// like.likeness
	let mut qctx = QueryContext::new(tc.space_info(space.id));
	let path = PathInfo {
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
			alias: "e".into(),
			edge_types: vec![like],
			..Default::default()
		}],
	};
	let matched = MatchPathPlanner::new(&mut qctx)
		.transform(&path, &["a".into(), "e".into(), "b".into()])
		.unwrap();
	let plan = clauses::plan_return(
		&mut qctx,
		matched,
		&ReturnContext {
			items: vec![
				YieldItem {
					alias: "name".into(),
					expr: attr(attr(Expression::InputProp("b".into()), "person"), "name"),
				},
				YieldItem {
					alias: "age".into(),
					expr: attr(attr(Expression::InputProp("b".into()), "person"), "age"),
				},
				YieldItem {
					alias: "likeness".into(),
					expr: attr(Expression::InputProp("e".into()), "likeness"),
				},
			],
			..Default::default()
		},
	)
	.unwrap();

	let executor = Executor::new(qctx, tc.nodes[0].clone());
	let result = executor.execute(plan, &ExecutionContext::new()).await.unwrap();
	assert_eq!(result.column_names, vec!["name", "age", "likeness"]);
	let rows: BTreeSet<Vec<Value>> = result.rows.into_iter().collect();
	let expected: BTreeSet<Vec<Value>> = [
		vec![Value::String("Lily".into()), Value::Int(9), Value::Float(80.0)],
		vec![Value::String("Tom".into()), Value::Int(10), Value::Float(70.0)],
	]
	.into_iter()
	.collect();
	assert_eq!(rows, expected);
}

#[test_log::test(tokio::test)]
async fn traversal_works_across_partitions_and_hosts() {
	let (tc, space) = common::cluster(2, 4);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let mut qctx = QueryContext::new(tc.space_info(space.id));
	let path = PathInfo {
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
			alias: "e".into(),
			edge_types: vec![like],
			..Default::default()
		}],
	};
	let plan = MatchPathPlanner::new(&mut qctx)
		.transform(&path, &["b".into()])
		.unwrap();
	// The cluster client shards by partition and routes per host
	let executor = Executor::new(qctx, tc.cluster.clone());
	let result = executor.execute(plan, &ExecutionContext::new()).await.unwrap();
	let reached: BTreeSet<Value> = result
		.rows
		.into_iter()
		.map(|row| match &row[0] {
			Value::Vertex(v) => v.vid.clone(),
			other => other.clone(),
		})
		.collect();
	assert_eq!(reached, [Value::Int(2), Value::Int(3)].into_iter().collect());
}

#[test_log::test(tokio::test)]
async fn edge_filter_pushdown() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let mut qctx = QueryContext::new(tc.space_info(space.id));
	let path = PathInfo {
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
			alias: "e".into(),
			edge_types: vec![like],
			// likeness > 75 survives only for Lily
			filter: Some(Expression::binary(
				Expression::EdgeProp {
					prop: "likeness".into(),
				},
				quasar_core::exp::BinaryOp::MoreThan,
				Expression::constant(75.0),
			)),
			..Default::default()
		}],
	};
	let plan = MatchPathPlanner::new(&mut qctx).transform(&path, &["b".into()]).unwrap();
	let executor = Executor::new(qctx, tc.nodes[0].clone());
	let result = executor.execute(plan, &ExecutionContext::new()).await.unwrap();
	assert_eq!(result.rows.len(), 1);
	match &result.rows[0][0] {
		Value::Vertex(v) => assert_eq!(v.vid, Value::Int(2)),
		other => panic!("expected a vertex, got {other}"),
	}
}
