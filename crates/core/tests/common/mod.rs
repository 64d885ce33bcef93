//! Shared fixtures: an in-process cluster with a real catalog, cache
//! and storage nodes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use quasar_core::ids::{EdgeRank, EdgeType, PartitionId, SpaceId};
use quasar_core::meta::schema::{Field, FieldType, Schema, SpaceDesc, VidType};
use quasar_core::meta::{Catalog, JobManager, MetaCache};
use quasar_core::rpc::{
	AddEdgesRequest, AddVerticesRequest, EdgeKeySpec, GraphStorage, NewEdge, NewTag, NewVertex,
};
use quasar_core::store::{LocalCluster, StorageNode};
use quasar_core::val::Value;

pub struct TestCluster {
	pub catalog: Arc<Catalog>,
	pub cache: Arc<MetaCache>,
	pub jobs: Arc<JobManager>,
	pub cluster: Arc<LocalCluster>,
	pub nodes: Vec<Arc<StorageNode>>,
	// Keeps the checkpoint directories alive for the test's duration
	pub dirs: Vec<tempfile::TempDir>,
}

impl TestCluster {
	pub fn space_info(&self, space: SpaceId) -> Arc<quasar_core::meta::SpaceInfo> {
		self.cache.load().space(space).unwrap().clone()
	}
}

/// Build a cluster of `hosts` storage nodes serving one space with
/// `parts` partitions assigned round-robin.
pub fn cluster(hosts: usize, parts: i32) -> (TestCluster, SpaceDesc) {
	let catalog = Arc::new(Catalog::new());
	let cache = Arc::new(MetaCache::new(catalog.clone()).unwrap());
	let jobs = Arc::new(JobManager::new());
	let space = catalog.create_space("test", parts, 1, VidType::Int64).unwrap();

	let mut dirs = Vec::new();
	let mut nodes = Vec::new();
	for i in 0..hosts {
		let addr = format!("127.0.0.1:4450{i}");
		catalog.register_host(&addr).unwrap();
		let dir = tempfile::tempdir().unwrap();
		nodes.push(Arc::new(StorageNode::new(addr, cache.clone(), dir.path().to_path_buf())));
		dirs.push(dir);
	}
	for part in 1..=parts {
		let node = &nodes[(part as usize - 1) % hosts];
		node.add_part(space.id, part);
		catalog.set_part_hosts(space.id, part, &[node.addr.clone()]).unwrap();
	}
	cache.refresh().unwrap();

	let mut cluster = LocalCluster::new(cache.clone());
	for node in &nodes {
		cluster.add_node(node.clone());
	}
	(
		TestCluster {
			catalog,
			cache,
			jobs,
			cluster: Arc::new(cluster),
			nodes,
			dirs,
		},
		space,
	)
}

/// The scenario schema: `person(name string, age int)` and
/// `like(likeness float)`.
pub fn person_like(tc: &TestCluster, space: SpaceId) -> (i32, EdgeType) {
	let person = tc
		.catalog
		.create_tag(
			space,
			"person",
			Schema::new(
				1,
				vec![Field::new("name", FieldType::String), Field::new("age", FieldType::Int)],
			),
		)
		.unwrap();
	let like = tc
		.catalog
		.create_edge(space, "like", Schema::new(1, vec![Field::new("likeness", FieldType::Float)]))
		.unwrap();
	tc.cache.refresh().unwrap();
	(person.id, like.id)
}

/// Group new vertices by their owning partition.
pub fn vertices_request(
	space: &SpaceDesc,
	tag: i32,
	rows: &[(i64, &str, i64)],
	if_not_exists: bool,
) -> AddVerticesRequest {
	let mut parts: HashMap<PartitionId, Vec<NewVertex>> = HashMap::new();
	for (vid, name, age) in rows {
		let raw = space.vid_type.encode(&Value::Int(*vid)).unwrap();
		parts.entry(space.part_of(&raw)).or_default().push(NewVertex {
			vid: Value::Int(*vid),
			tags: vec![NewTag {
				tag_id: tag,
				prop_names: vec!["name".to_string(), "age".to_string()],
				prop_values: vec![Value::String(name.to_string()), Value::Int(*age)],
			}],
		});
	}
	AddVerticesRequest {
		space: space.id,
		parts,
		if_not_exists,
		ignore_existed_index: false,
	}
}

/// Group new edges by the partition of their source vertex.
pub fn edges_request(
	space: &SpaceDesc,
	etype: EdgeType,
	rows: &[(i64, i64, f64)],
) -> AddEdgesRequest {
	let mut parts: HashMap<PartitionId, Vec<NewEdge>> = HashMap::new();
	for (src, dst, likeness) in rows {
		let raw = space.vid_type.encode(&Value::Int(*src)).unwrap();
		parts.entry(space.part_of(&raw)).or_default().push(NewEdge {
			key: EdgeKeySpec {
				src: Value::Int(*src),
				etype,
				rank: 0 as EdgeRank,
				dst: Value::Int(*dst),
			},
			prop_names: vec!["likeness".to_string()],
			prop_values: vec![Value::Float(*likeness)],
		});
	}
	AddEdgesRequest {
		space: space.id,
		parts,
		if_not_exists: false,
	}
}

/// Seed the scenario data set: three people, two likes from Bob.
pub async fn seed_people(tc: &TestCluster, space: &SpaceDesc, tag: i32, etype: EdgeType) {
	let resp = tc
		.cluster
		.add_vertices(vertices_request(
			space,
			tag,
			&[(1, "Bob", 10), (2, "Lily", 9), (3, "Tom", 10)],
			false,
		))
		.await
		.unwrap();
	assert!(resp.common.ok());
	let resp = tc
		.cluster
		.add_edges(edges_request(space, etype, &[(1, 2, 80.0), (1, 3, 70.0)]))
		.await
		.unwrap();
	assert!(resp.common.ok());
}
