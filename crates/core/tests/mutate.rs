//! Mutation semantics: duplicate handling, if-not-exists, index
//! maintenance, optimistic updates and pair resumption.

mod common;

use std::collections::HashMap;

use quasar_core::key;
use quasar_core::kvs::Store;
use quasar_core::meta::schema::IndexTarget;
use quasar_core::rpc::{
	GraphStorage, LookupIndexRequest, ScanVertexRequest, UpdatedProp, UpdateVertexRequest,
};
use quasar_core::store::mutate::UpdateVertexProcessor;
use quasar_core::store::node::newest_under;
use quasar_core::val::Value;

#[tokio::test]
async fn if_not_exists_keeps_the_first_value() {
	let (tc, space) = common::cluster(1, 1);
	let (person, _) = common::person_like(&tc, space.id);
	tc.catalog
		.create_index(space.id, "person_name", IndexTarget::Tag(person), vec!["name".into()])
		.unwrap();
	tc.cache.refresh().unwrap();

	let resp = tc
		.cluster
		.add_vertices(common::vertices_request(&space, person, &[(1, "Bob", 10)], false))
		.await
		.unwrap();
	assert!(resp.common.ok());

	// A second insert under if-not-exists must not replace the row
	let resp = tc
		.cluster
		.add_vertices(common::vertices_request(&space, person, &[(1, "Impostor", 99)], true))
		.await
		.unwrap();
	assert!(resp.common.ok());

	let raw = space.vid_type.encode(&Value::Int(1)).unwrap();
	let part = space.part_of(&raw);
	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let prefix = key::vertex::tag_prefix(8, part, &raw, person);
	// Exactly one stored version, carrying the first writer's value
	assert_eq!(store.prefix(&prefix).unwrap().len(), 1);
	let resp = tc
		.cluster
		.lookup_index(LookupIndexRequest {
			space: space.id,
			index: tc.catalog.list_indexes(space.id).unwrap()[0].id,
			values: vec![Value::String("Bob".into())],
			plan: None,
		})
		.await
		.unwrap();
	assert_eq!(resp.dataset.rows.len(), 1);
	// No index entry was written for the losing value
	let resp = tc
		.cluster
		.lookup_index(LookupIndexRequest {
			space: space.id,
			index: tc.catalog.list_indexes(space.id).unwrap()[0].id,
			values: vec![Value::String("Impostor".into())],
			plan: None,
		})
		.await
		.unwrap();
	assert!(resp.dataset.rows.is_empty());
}

#[tokio::test]
async fn duplicate_vids_keep_the_last_occurrence() {
	let (tc, space) = common::cluster(1, 1);
	let (person, _) = common::person_like(&tc, space.id);

	let resp = tc
		.cluster
		.add_vertices(common::vertices_request(
			&space,
			person,
			&[(1, "First", 1), (1, "Second", 2)],
			false,
		))
		.await
		.unwrap();
	assert!(resp.common.ok());

	let raw = space.vid_type.encode(&Value::Int(1)).unwrap();
	let part = space.part_of(&raw);
	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let info = tc.space_info(space.id);
	let prefix = key::vertex::tag_prefix(8, part, &raw, person);
	let (_, data) = newest_under(&store, &prefix, |k| {
		Ok(key::vertex::parse(8, k)?.version)
	})
	.unwrap()
	.unwrap();
	let schema = info.tags[&person].latest();
	let reader = quasar_core::row::RowReader::new(schema, &data).unwrap();
	assert_eq!(reader.get_by_name("name").unwrap(), Value::String("Second".into()));
}

#[tokio::test]
async fn update_vertex_honours_the_version_check() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let raw = space.vid_type.encode(&Value::Int(1)).unwrap();
	let part = space.part_of(&raw);
	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let prefix = key::vertex::tag_prefix(8, part, &raw, person);
	let (stored_key, _) = newest_under(&store, &prefix, |k| {
		Ok(key::vertex::parse(8, k)?.version)
	})
	.unwrap()
	.unwrap();
	let version = key::vertex::parse(8, &stored_key).unwrap().version;

	// A mismatched expectation conflicts
	let resp = UpdateVertexProcessor::new(&tc.nodes[0])
		.process(UpdateVertexRequest {
			space: space.id,
			part,
			vid: Value::Int(1),
			tag: person,
			props: vec![UpdatedProp {
				name: "age".into(),
				value: Value::Int(11),
			}],
			expected_version: Some(version - 1),
		})
		.await;
	assert!(!resp.common.ok());
	assert_eq!(resp.common.failed_parts[0].code, quasar_core::rpc::ErrorCode::VersionConflict);

	// The matching expectation applies
	let resp = UpdateVertexProcessor::new(&tc.nodes[0])
		.process(UpdateVertexRequest {
			space: space.id,
			part,
			vid: Value::Int(1),
			tag: person,
			props: vec![UpdatedProp {
				name: "age".into(),
				value: Value::Int(11),
			}],
			expected_version: Some(version),
		})
		.await;
	assert!(resp.common.ok());

	let (_, data) = newest_under(&store, &prefix, |k| {
		Ok(key::vertex::parse(8, k)?.version)
	})
	.unwrap()
	.unwrap();
	let info = tc.space_info(space.id);
	let schema = info.tags[&person].latest();
	let reader = quasar_core::row::RowReader::new(schema, &data).unwrap();
	assert_eq!(reader.get_by_name("age").unwrap(), Value::Int(11));
}

#[tokio::test]
async fn torn_edge_pairs_resume_from_their_markers() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let raw1 = space.vid_type.encode(&Value::Int(1)).unwrap();
	let raw2 = space.vid_type.encode(&Value::Int(2)).unwrap();
	let part = space.part_of(&raw1);
	let rev_part = space.part_of(&raw2);
	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let rev_store = tc.nodes[0].engine(space.id).unwrap().part(rev_part).unwrap();

	// Tear the pair: delete the reverse copy, re-plant the marker
	let rev_prefix = key::edge::prefix_rank_dst(8, rev_part, &raw2, -like, 0, &raw1);
	let (rev_key, _) = newest_under(&rev_store, &rev_prefix, |k| {
		Ok(key::edge::parse(8, k)?.version)
	})
	.unwrap()
	.unwrap();
	rev_store.del(&rev_key).unwrap();
	let fwd_prefix = key::edge::prefix_rank_dst(8, part, &raw1, like, 0, &raw2);
	let (fwd_key, payload) = newest_under(&store, &fwd_prefix, |k| {
		Ok(key::edge::parse(8, k)?.version)
	})
	.unwrap()
	.unwrap();
	let version = key::edge::parse(8, &fwd_key).unwrap().version;
	store
		.put(key::lock::new(8, part, &raw1, like, 0, &raw2, version), payload.clone())
		.unwrap();

	let repaired = tc.nodes[0].txn.resume(&tc.nodes[0]).unwrap();
	assert_eq!(repaired, 1);
	// The reverse copy is back with the same payload
	let (_, restored) = newest_under(&rev_store, &rev_prefix, |k| {
		Ok(key::edge::parse(8, k)?.version)
	})
	.unwrap()
	.unwrap();
	assert_eq!(restored, payload);
	// The marker is gone and a second resume is a no-op
	assert_eq!(tc.nodes[0].txn.resume(&tc.nodes[0]).unwrap(), 0);
}

#[tokio::test]
async fn scan_vertex_pages_with_a_cursor() {
	let (tc, space) = common::cluster(1, 1);
	let (person, _) = common::person_like(&tc, space.id);

	let rows: Vec<(i64, String, i64)> =
		(0..25).map(|i| (i, format!("p{i}"), i)).collect();
	let borrowed: Vec<(i64, &str, i64)> =
		rows.iter().map(|(v, n, a)| (*v, n.as_str(), *a)).collect();
	let resp = tc
		.cluster
		.add_vertices(common::vertices_request(&space, person, &borrowed, false))
		.await
		.unwrap();
	assert!(resp.common.ok());

	let mut seen = 0;
	let mut cursor = None;
	loop {
		let resp = tc
			.cluster
			.scan_vertex(ScanVertexRequest {
				space: space.id,
				part: 1,
				tag: person,
				cursor: cursor.clone(),
				limit: 10,
			})
			.await
			.unwrap();
		assert!(resp.common.ok());
		seen += resp.rows.rows.len();
		match resp.next_cursor {
			Some(next) => cursor = Some(next),
			None => break,
		}
	}
	assert_eq!(seen, 25);
}

#[tokio::test]
async fn clear_space_empties_every_partition() {
	let (tc, space) = common::cluster(1, 2);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let mut parts = HashMap::new();
	for part in tc.nodes[0].engine(space.id).unwrap().part_ids() {
		let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
		parts.insert(part, store.prefix(&key::part_prefix(part)).unwrap().len());
	}
	assert!(parts.values().sum::<usize>() > 0);

	quasar_core::store::admin::clear_space(&tc.nodes[0], space.id).unwrap();
	for part in tc.nodes[0].engine(space.id).unwrap().part_ids() {
		let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
		assert!(store.prefix(&key::part_prefix(part)).unwrap().is_empty());
	}
}
