//! The storage service: partition engines, the RPC processors over
//! them, and the write-pair transaction machinery.

pub mod admin;
pub mod compact;
pub mod indexes;
pub mod locks;
pub mod metrics;
pub mod mutate;
pub mod node;
pub mod query;
pub mod ttl;
pub mod txn;

pub use self::compact::StorageCompactionFilter;
pub use self::node::SpaceEngine;
pub use self::node::StorageNode;

use async_trait::async_trait;
use std::sync::Arc;

use crate::err::Error;
use crate::ids::Vid;
use crate::meta::schema::Schema;
use crate::meta::SpaceInfo;
use crate::rpc;
use crate::val::Value;

/// Widen a vertex id value to its raw key form for a space.
pub(crate) fn encode_vid(info: &SpaceInfo, v: &Value) -> Result<Vid, Error> {
	info.desc()
		.vid_type
		.encode(v)
		.ok_or_else(|| Error::KeyFormat(format!("bad vertex id {v} for this space")))
}

/// Rearrange named property values into schema field order.
pub(crate) fn schema_row(
	schema: &Schema,
	names: &[String],
	values: &[Value],
) -> Result<Vec<Value>, Error> {
	if names.len() != values.len() {
		return Err(Error::Encode(format!(
			"{} property names for {} values",
			names.len(),
			values.len()
		)));
	}
	let mut row = vec![Value::Empty; schema.fields.len()];
	for (name, value) in names.iter().zip(values) {
		match schema.field_index(name) {
			Some(idx) => row[idx] = value.clone(),
			None => return Err(Error::Encode(format!("unknown property `{name}`"))),
		}
	}
	Ok(row)
}

/// The storage query surface, served by one node's processors.
#[async_trait]
impl rpc::GraphStorage for StorageNode {
	async fn add_vertices(&self, req: rpc::AddVerticesRequest) -> Result<rpc::ExecResponse, Error> {
		Ok(mutate::AddVerticesProcessor::new(self).process(req).await)
	}

	async fn add_edges(&self, req: rpc::AddEdgesRequest) -> Result<rpc::ExecResponse, Error> {
		Ok(mutate::AddEdgesProcessor::new(self).process(req).await)
	}

	async fn get_neighbors(
		&self,
		req: rpc::GetNeighborsRequest,
	) -> Result<rpc::GetNeighborsResponse, Error> {
		Ok(query::GetNeighborsProcessor::new(self).process(req).await)
	}

	async fn get_props(&self, req: rpc::GetPropRequest) -> Result<rpc::GetPropResponse, Error> {
		Ok(query::GetPropProcessor::new(self).process(req).await)
	}

	async fn get_vertices(
		&self,
		req: rpc::GetVerticesRequest,
	) -> Result<rpc::GetVerticesResponse, Error> {
		Ok(query::GetVerticesProcessor::new(self).process(req).await)
	}

	async fn scan_vertex(&self, req: rpc::ScanVertexRequest) -> Result<rpc::ScanResponse, Error> {
		Ok(query::ScanVertexProcessor::new(self).process(req).await)
	}

	async fn scan_edge(&self, req: rpc::ScanEdgeRequest) -> Result<rpc::ScanResponse, Error> {
		Ok(query::ScanEdgeProcessor::new(self).process(req).await)
	}

	async fn lookup_index(
		&self,
		req: rpc::LookupIndexRequest,
	) -> Result<rpc::LookupIndexResponse, Error> {
		Ok(query::LookupIndexProcessor::new(self).process(req).await)
	}
}

/// An in-process cluster: storage nodes addressed by host, standing in
/// for the wire transport. Logical requests are sharded by partition,
/// routed to the owning host through the partition map, fanned out
/// concurrently and merged back into one response.
pub struct LocalCluster {
	cache: Arc<crate::meta::MetaCache>,
	nodes: Vec<Arc<StorageNode>>,
}

impl LocalCluster {
	pub fn new(cache: Arc<crate::meta::MetaCache>) -> Self {
		Self {
			cache,
			nodes: Vec::new(),
		}
	}

	pub fn add_node(&mut self, node: Arc<StorageNode>) {
		self.nodes.push(node);
	}

	pub fn node(&self, host: &str) -> Result<&Arc<StorageNode>, Error> {
		self.nodes
			.iter()
			.find(|n| n.addr == host)
			.ok_or_else(|| Error::Rpc(format!("no route to host {host}")))
	}

	pub fn nodes(&self) -> &[Arc<StorageNode>] {
		&self.nodes
	}

	// Split a parts map into one sub-map per owning host.
	fn route<T>(
		&self,
		space: i32,
		parts: std::collections::HashMap<i32, T>,
	) -> Result<Vec<(Arc<StorageNode>, std::collections::HashMap<i32, T>)>, Error> {
		let snapshot = self.cache.load();
		let info = snapshot.space(space)?;
		let mut by_host: std::collections::HashMap<String, std::collections::HashMap<i32, T>> =
			std::collections::HashMap::new();
		for (part, data) in parts {
			let host = info
				.parts
				.get(&part)
				.and_then(|hosts| hosts.first())
				.ok_or(Error::PartNotFound(part))?;
			by_host.entry(host.clone()).or_default().insert(part, data);
		}
		by_host
			.into_iter()
			.map(|(host, parts)| Ok((self.node(&host)?.clone(), parts)))
			.collect()
	}
}

#[async_trait]
impl rpc::GraphStorage for LocalCluster {
	async fn add_vertices(&self, req: rpc::AddVerticesRequest) -> Result<rpc::ExecResponse, Error> {
		let routed = self.route(req.space, req.parts)?;
		let calls = routed.into_iter().map(|(node, parts)| {
			let sub = rpc::AddVerticesRequest {
				space: req.space,
				parts,
				if_not_exists: req.if_not_exists,
				ignore_existed_index: req.ignore_existed_index,
			};
			async move { node.add_vertices(sub).await }
		});
		let mut merged = rpc::ExecResponse::default();
		for resp in futures::future::join_all(calls).await {
			let resp = resp?;
			merged.common.failed_parts.extend(resp.common.failed_parts);
			merged.common.latency_us = merged.common.latency_us.max(resp.common.latency_us);
		}
		Ok(merged)
	}

	async fn add_edges(&self, req: rpc::AddEdgesRequest) -> Result<rpc::ExecResponse, Error> {
		let routed = self.route(req.space, req.parts)?;
		let calls = routed.into_iter().map(|(node, parts)| {
			let sub = rpc::AddEdgesRequest {
				space: req.space,
				parts,
				if_not_exists: req.if_not_exists,
			};
			async move { node.add_edges(sub).await }
		});
		let mut merged = rpc::ExecResponse::default();
		for resp in futures::future::join_all(calls).await {
			let resp = resp?;
			merged.common.failed_parts.extend(resp.common.failed_parts);
			merged.common.latency_us = merged.common.latency_us.max(resp.common.latency_us);
		}
		Ok(merged)
	}

	async fn get_neighbors(
		&self,
		req: rpc::GetNeighborsRequest,
	) -> Result<rpc::GetNeighborsResponse, Error> {
		let routed = self.route(req.space, req.parts.clone())?;
		let calls = routed.into_iter().map(|(node, parts)| {
			let sub = rpc::GetNeighborsRequest {
				parts,
				..req.clone()
			};
			async move { node.get_neighbors(sub).await }
		});
		let mut merged = rpc::GetNeighborsResponse::default();
		for resp in futures::future::join_all(calls).await {
			let mut resp = resp?;
			if merged.dataset.column_names.is_empty() {
				merged.dataset.column_names = resp.dataset.column_names.clone();
			}
			merged.dataset.rows.append(&mut resp.dataset.rows);
			merged.common.failed_parts.extend(resp.common.failed_parts);
			merged.common.latency_us = merged.common.latency_us.max(resp.common.latency_us);
		}
		Ok(merged)
	}

	async fn get_props(&self, req: rpc::GetPropRequest) -> Result<rpc::GetPropResponse, Error> {
		let routed = self.route(req.space, req.parts.clone())?;
		let calls = routed.into_iter().map(|(node, parts)| {
			let sub = rpc::GetPropRequest {
				parts,
				..req.clone()
			};
			async move { node.get_props(sub).await }
		});
		let mut merged = rpc::GetPropResponse::default();
		for resp in futures::future::join_all(calls).await {
			let mut resp = resp?;
			if merged.dataset.column_names.is_empty() {
				merged.dataset.column_names = resp.dataset.column_names.clone();
			}
			merged.dataset.rows.append(&mut resp.dataset.rows);
			merged.common.failed_parts.extend(resp.common.failed_parts);
		}
		Ok(merged)
	}

	async fn get_vertices(
		&self,
		req: rpc::GetVerticesRequest,
	) -> Result<rpc::GetVerticesResponse, Error> {
		let routed = self.route(req.space, req.parts.clone())?;
		let calls = routed.into_iter().map(|(node, parts)| {
			let sub = rpc::GetVerticesRequest {
				parts,
				..req.clone()
			};
			async move { node.get_vertices(sub).await }
		});
		let mut merged = rpc::GetVerticesResponse::default();
		for resp in futures::future::join_all(calls).await {
			let mut resp = resp?;
			if merged.dataset.column_names.is_empty() {
				merged.dataset.column_names = resp.dataset.column_names.clone();
			}
			merged.dataset.rows.append(&mut resp.dataset.rows);
			merged.common.failed_parts.extend(resp.common.failed_parts);
		}
		Ok(merged)
	}

	async fn scan_vertex(&self, req: rpc::ScanVertexRequest) -> Result<rpc::ScanResponse, Error> {
		let snapshot = self.cache.load();
		let host = snapshot
			.space(req.space)?
			.parts
			.get(&req.part)
			.and_then(|hosts| hosts.first())
			.cloned()
			.ok_or(Error::PartNotFound(req.part))?;
		self.node(&host)?.scan_vertex(req).await
	}

	async fn scan_edge(&self, req: rpc::ScanEdgeRequest) -> Result<rpc::ScanResponse, Error> {
		let snapshot = self.cache.load();
		let host = snapshot
			.space(req.space)?
			.parts
			.get(&req.part)
			.and_then(|hosts| hosts.first())
			.cloned()
			.ok_or(Error::PartNotFound(req.part))?;
		self.node(&host)?.scan_edge(req).await
	}

	async fn lookup_index(
		&self,
		req: rpc::LookupIndexRequest,
	) -> Result<rpc::LookupIndexResponse, Error> {
		// Index entries live in every data partition; ask every node
		let calls = self.nodes.iter().map(|node| {
			let sub = req.clone();
			let node = node.clone();
			async move { node.lookup_index(sub).await }
		});
		let mut merged = rpc::LookupIndexResponse::default();
		for resp in futures::future::join_all(calls).await {
			let mut resp = resp?;
			if merged.dataset.column_names.is_empty() {
				merged.dataset.column_names = resp.dataset.column_names.clone();
			}
			merged.dataset.rows.append(&mut resp.dataset.rows);
			merged.common.failed_parts.extend(resp.common.failed_parts);
		}
		Ok(merged)
	}
}

#[async_trait]
impl rpc::StorageAdmin for LocalCluster {
	async fn blocking_writes(
		&self,
		host: &String,
		spaces: &[i32],
		sign: rpc::BlockSign,
	) -> Result<(), Error> {
		admin::blocking_writes(self.node(host)?, spaces, sign)
	}

	async fn create_checkpoint(
		&self,
		host: &String,
		spaces: &[i32],
		name: &str,
	) -> Result<Vec<rpc::CheckpointStats>, Error> {
		admin::create_checkpoint(self.node(host)?, spaces, name)
	}

	async fn drop_checkpoint(
		&self,
		host: &String,
		spaces: &[i32],
		name: &str,
	) -> Result<(), Error> {
		admin::drop_checkpoint(self.node(host)?, spaces, name)
	}

	async fn clear_space(&self, host: &String, space: i32) -> Result<(), Error> {
		admin::clear_space(self.node(host)?, space)
	}
}
