//! Compaction reclaims: TTL expiry, dropped schemas, empty reverse
//! edges.

mod common;

use std::collections::HashMap;

use quasar_core::key;
use quasar_core::kvs::Store;
use quasar_core::meta::schema::{Field, FieldType, Schema};
use quasar_core::rpc::{AddVerticesRequest, GraphStorage, NewTag, NewVertex};
use quasar_core::store::StorageCompactionFilter;
use quasar_core::val::Value;

#[tokio::test]
async fn ttl_expired_rows_are_reclaimed() {
	let (tc, space) = common::cluster(1, 1);
	let tag = tc
		.catalog
		.create_tag(
			space.id,
			"t",
			Schema::new(
				1,
				vec![Field::new("c", FieldType::Int), Field::new("ts", FieldType::Timestamp)],
			)
			.with_ttl("ts", 1),
		)
		.unwrap();
	tc.cache.refresh().unwrap();

	let now = chrono::Utc::now().timestamp();
	let mut parts = HashMap::new();
	let raw = space.vid_type.encode(&Value::Int(1)).unwrap();
	let part = space.part_of(&raw);
	parts.insert(
		part,
		vec![NewVertex {
			vid: Value::Int(1),
			tags: vec![NewTag {
				tag_id: tag.id,
				prop_names: vec!["c".to_string(), "ts".to_string()],
				prop_values: vec![Value::Int(7), Value::Int(now - 10)],
			}],
		}],
	);
	let resp = tc
		.cluster
		.add_vertices(AddVerticesRequest {
			space: space.id,
			parts,
			if_not_exists: false,
			ignore_existed_index: false,
		})
		.await
		.unwrap();
	assert!(resp.common.ok());

	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let prefix = key::vertex::tag_prefix(8, part, &raw, tag.id);
	assert_eq!(store.prefix(&prefix).unwrap().len(), 1);

	let info = tc.space_info(space.id);
	let filter = StorageCompactionFilter::new(&tc.cache, info);
	let dropped = store.compact(&filter).unwrap();
	assert!(dropped >= 1);
	assert!(store.prefix(&prefix).unwrap().is_empty());
}

#[tokio::test]
async fn dropped_tag_rows_are_reclaimed() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let raw = space.vid_type.encode(&Value::Int(1)).unwrap();
	let part = space.part_of(&raw);
	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let prefix = key::vertex::tag_prefix(8, part, &raw, person);
	assert_eq!(store.prefix(&prefix).unwrap().len(), 1);

	// The schema disappears and the cache observes it
	tc.catalog.drop_tag(space.id, person).unwrap();
	tc.cache.refresh().unwrap();

	let info = tc.space_info(space.id);
	let filter = StorageCompactionFilter::new(&tc.cache, info);
	store.compact(&filter).unwrap();
	assert!(store.prefix(&prefix).unwrap().is_empty());
	// Edge rows with a live schema survived
	let edges = key::edge::prefix(8, part, &raw, like);
	assert!(!store.prefix(&edges).unwrap().is_empty());
}

#[tokio::test]
async fn stale_cache_never_reclaims_missing_schemas() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let raw = space.vid_type.encode(&Value::Int(1)).unwrap();
	let part = space.part_of(&raw);
	let store = tc.nodes[0].engine(space.id).unwrap().part(part).unwrap();
	let prefix = key::vertex::tag_prefix(8, part, &raw, person);

	tc.catalog.drop_tag(space.id, person).unwrap();
	tc.cache.refresh().unwrap();
	let info = tc.space_info(space.id);
	// A snapshot past its refresh window must retain the rows
	let filter = StorageCompactionFilter::with_snapshot(info, false);
	store.compact(&filter).unwrap();
	assert_eq!(store.prefix(&prefix).unwrap().len(), 1);
}
