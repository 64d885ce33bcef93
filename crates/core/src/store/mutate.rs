//! Mutation processors: vertex and edge inserts and updates.

use tracing::instrument;
use std::collections::HashMap;
use std::time::Instant;

use crate::err::Error;
use crate::ids::{PartitionId, Version, Vid};
use crate::key;
use crate::kvs::{Store, WriteBatch};
use crate::meta::schema::IndexTarget;
use crate::rpc::{
	AddEdgesRequest, AddVerticesRequest, ErrorCode, ExecResponse, NewEdge, NewVertex,
	PartitionResult, UpdateEdgeRequest, UpdateVertexRequest,
};
use crate::row;
use crate::row::RowReader;
use crate::store::indexes;
use crate::store::metrics;
use crate::store::node::{newest_under, version_stamp, StorageNode};
use crate::store::{encode_vid, schema_row};

/// Inserts vertices with their tag rows and index entries, one atomic
/// batch per partition.
pub struct AddVerticesProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> AddVerticesProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space))]
	pub async fn process(self, req: AddVerticesRequest) -> ExecResponse {
		let started = Instant::now();
		let mut resp = ExecResponse::default();
		let stamp = version_stamp();
		for (part, vertices) in &req.parts {
			if let Err(e) = self.process_part(&req, *part, vertices, stamp) {
				trace!("add_vertices failed on part {part}: {e}");
				resp.common.failed_parts.push(PartitionResult {
					part: *part,
					code: ErrorCode::from_error(&e),
				});
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("add_vertices", started.elapsed(), resp.common.ok());
		resp
	}

	fn process_part(
		&self,
		req: &AddVerticesRequest,
		part: PartitionId,
		vertices: &[NewVertex],
		stamp: Version,
	) -> Result<(), Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		engine.check_writable()?;
		let store = engine.part(part)?;
		let vid_len = info.vid_len();

		// Duplicate vids keep the last occurrence, or the first when
		// if-not-exists is set
		let mut order: Vec<&NewVertex> = Vec::new();
		let mut seen: HashMap<Vid, usize> = HashMap::new();
		for vertex in vertices {
			let vid = encode_vid(&info, &vertex.vid)?;
			match seen.get(&vid) {
				Some(&at) if !req.if_not_exists => order[at] = vertex,
				Some(_) => {}
				None => {
					seen.insert(vid, order.len());
					order.push(vertex);
				}
			}
		}

		let mut batch = WriteBatch::new();
		for vertex in order {
			let vid = encode_vid(&info, &vertex.vid)?;
			for tag in &vertex.tags {
				let desc = info.tags.get(&tag.tag_id).ok_or(Error::TagNotFound(tag.tag_id))?;
				let schema = desc.latest();
				// The fused pre-read resolving if-not-exists
				if req.if_not_exists {
					let prefix = key::vertex::tag_prefix(vid_len, part, &vid, tag.tag_id);
					let existing = newest_under(&store, &prefix, |k| {
						Ok(key::vertex::parse(vid_len, k)?.version)
					})?;
					if existing.is_some() {
						continue;
					}
				}
				let values = schema_row(schema, &tag.prop_names, &tag.prop_values)?;
				let data = row::encode(schema, &values)?;
				batch.put(key::vertex::new(vid_len, part, &vid, tag.tag_id, stamp), data);
				if !req.ignore_existed_index {
					for index in info.indexes.values() {
						if index.target != IndexTarget::Tag(tag.tag_id) {
							continue;
						}
						let names: Vec<String> =
							schema.fields.iter().map(|f| f.name.clone()).collect();
						batch.put(
							indexes::tag_entry_key(part, index, &names, &values, &vid),
							indexes::entry_value(schema, &names, &values),
						);
					}
				}
			}
		}
		if !batch.is_empty() {
			store.write(batch)?;
		}
		Ok(())
	}
}

/// Inserts both directions of each edge, maintaining edge indexes; the
/// pair write is serialized by a keyed memory lock and resumable
/// through the lock marker.
pub struct AddEdgesProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> AddEdgesProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space))]
	pub async fn process(self, req: AddEdgesRequest) -> ExecResponse {
		let started = Instant::now();
		let mut resp = ExecResponse::default();
		let stamp = version_stamp();
		for (part, edges) in &req.parts {
			if let Err(e) = self.process_part(&req, *part, edges, stamp).await {
				trace!("add_edges failed on part {part}: {e}");
				resp.common.failed_parts.push(PartitionResult {
					part: *part,
					code: ErrorCode::from_error(&e),
				});
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("add_edges", started.elapsed(), resp.common.ok());
		resp
	}

	async fn process_part(
		&self,
		req: &AddEdgesRequest,
		part: PartitionId,
		edges: &[NewEdge],
		stamp: Version,
	) -> Result<(), Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		engine.check_writable()?;
		let store = engine.part(part)?;
		let vid_len = info.vid_len();

		for edge in edges {
			let src = encode_vid(&info, &edge.key.src)?;
			let dst = encode_vid(&info, &edge.key.dst)?;
			let etype = edge.key.etype;
			let desc = info.edge(etype).ok_or(Error::EdgeNotFound(etype))?;
			let schema = desc.latest();
			if req.if_not_exists {
				let prefix =
					key::edge::prefix_rank_dst(vid_len, part, &src, etype, edge.key.rank, &dst);
				let existing =
					newest_under(&store, &prefix, |k| Ok(key::edge::parse(vid_len, k)?.version))?;
				if existing.is_some() {
					continue;
				}
			}
			let values = schema_row(schema, &edge.prop_names, &edge.prop_values)?;
			let data = row::encode(schema, &values)?;

			// Serialize the forward/reverse pair on the edge key bytes
			let guard_key = key::edge::prefix_rank_dst(vid_len, part, &src, etype, edge.key.rank, &dst);
			let mutex = self.node.locks.lock_for(req.space, &guard_key).await;
			let _held = mutex.lock().await;

			// The lock marker makes a torn pair resumable
			let marker = key::lock::new(vid_len, part, &src, etype, edge.key.rank, &dst, stamp);
			store.put(marker.clone(), data.clone())?;

			let mut batch = WriteBatch::new();
			batch.put(key::edge::new(vid_len, part, &src, etype, edge.key.rank, &dst, stamp), data.clone());
			let names: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
			for index in info.indexes.values() {
				if index.target != IndexTarget::Edge(etype.abs()) {
					continue;
				}
				batch.put(
					indexes::edge_entry_key(
						part, index, &names, &values, &src, etype, edge.key.rank, &dst,
					),
					indexes::entry_value(schema, &names, &values),
				);
			}
			store.write(batch)?;

			// The reverse copy lands in the destination's partition
			let rev_part = info.desc().part_of(&dst);
			match engine.part(rev_part) {
				Ok(rev_store) => {
					rev_store.put(
						key::edge::new(vid_len, rev_part, &dst, -etype, edge.key.rank, &src, stamp),
						data,
					)?;
					store.del(&marker)?;
				}
				Err(_) => {
					// The owning host will finish the pair; the marker
					// stays behind for the resume scan
					trace!("reverse partition {rev_part} is remote, leaving the edge dangling");
					self.node.txn.add_dangling(req.space, guard_key.clone());
				}
			}
		}
		Ok(())
	}
}

/// Read-modify-write of one tag row with an optimistic version check.
pub struct UpdateVertexProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> UpdateVertexProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space))]
	pub async fn process(self, req: UpdateVertexRequest) -> ExecResponse {
		let started = Instant::now();
		let mut resp = ExecResponse::default();
		if let Err(e) = self.apply(&req) {
			trace!("update_vertex failed on part {}: {e}", req.part);
			resp.common.failed_parts.push(PartitionResult {
				part: req.part,
				code: ErrorCode::from_error(&e),
			});
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("update_vertex", started.elapsed(), resp.common.ok());
		resp
	}

	fn apply(&self, req: &UpdateVertexRequest) -> Result<(), Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		engine.check_writable()?;
		let store = engine.part(req.part)?;
		let vid_len = info.vid_len();
		let vid = encode_vid(&info, &req.vid)?;
		let desc = info.tags.get(&req.tag).ok_or(Error::TagNotFound(req.tag))?;

		let prefix = key::vertex::tag_prefix(vid_len, req.part, &vid, req.tag);
		let (old_key, old_val) = newest_under(&store, &prefix, |k| {
			Ok(key::vertex::parse(vid_len, k)?.version)
		})?
		.ok_or(Error::Thrown("vertex not found".to_string()))?;
		let old_version = key::vertex::parse(vid_len, &old_key)?.version;
		if let Some(expected) = req.expected_version {
			if expected != old_version {
				return Err(Error::VersionConflict);
			}
		}
		let row_version = row::schema_version(&old_val)?;
		let schema = desc
			.schema(row_version)
			.ok_or_else(|| Error::Decode(format!("no schema version {row_version}")))?;
		let reader = RowReader::new(schema, &old_val)?;
		let mut values = reader.values()?;
		for update in &req.props {
			let idx = schema
				.field_index(&update.name)
				.ok_or_else(|| Error::Thrown(format!("unknown field `{}`", update.name)))?;
			values[idx] = update.value.clone();
		}
		let names: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
		let old_values = reader.values()?;

		// Replace the row and rewrite its index entries in one batch
		let mut batch = WriteBatch::new();
		batch.del(old_key);
		batch.put(
			key::vertex::new(vid_len, req.part, &vid, req.tag, version_stamp()),
			row::encode(schema, &values)?,
		);
		for index in info.indexes.values() {
			if index.target != IndexTarget::Tag(req.tag) {
				continue;
			}
			batch.del(indexes::tag_entry_key(req.part, index, &names, &old_values, &vid));
			batch.put(
				indexes::tag_entry_key(req.part, index, &names, &values, &vid),
				indexes::entry_value(schema, &names, &values),
			);
		}
		store.write(batch)?;
		Ok(())
	}
}

/// Read-modify-write of one edge, forward copy first, reverse kept in
/// step when local.
pub struct UpdateEdgeProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> UpdateEdgeProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space))]
	pub async fn process(self, req: UpdateEdgeRequest) -> ExecResponse {
		let started = Instant::now();
		let mut resp = ExecResponse::default();
		if let Err(e) = self.apply(&req).await {
			trace!("update_edge failed on part {}: {e}", req.part);
			resp.common.failed_parts.push(PartitionResult {
				part: req.part,
				code: ErrorCode::from_error(&e),
			});
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("update_edge", started.elapsed(), resp.common.ok());
		resp
	}

	async fn apply(&self, req: &UpdateEdgeRequest) -> Result<(), Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		engine.check_writable()?;
		let store = engine.part(req.part)?;
		let vid_len = info.vid_len();
		let src = encode_vid(&info, &req.key.src)?;
		let dst = encode_vid(&info, &req.key.dst)?;
		let desc = info.edge(req.key.etype).ok_or(Error::EdgeNotFound(req.key.etype))?;

		let guard_key =
			key::edge::prefix_rank_dst(vid_len, req.part, &src, req.key.etype, req.key.rank, &dst);
		let mutex = self.node.locks.lock_for(req.space, &guard_key).await;
		let _held = mutex.lock().await;

		let (old_key, old_val) = newest_under(&store, &guard_key, |k| {
			Ok(key::edge::parse(vid_len, k)?.version)
		})?
		.ok_or(Error::Thrown("edge not found".to_string()))?;
		let old_version = key::edge::parse(vid_len, &old_key)?.version;
		if let Some(expected) = req.expected_version {
			if expected != old_version {
				return Err(Error::VersionConflict);
			}
		}
		let row_version = row::schema_version(&old_val)?;
		let schema = desc
			.schema(row_version)
			.ok_or_else(|| Error::Decode(format!("no schema version {row_version}")))?;
		let reader = RowReader::new(schema, &old_val)?;
		let old_values = reader.values()?;
		let mut values = old_values.clone();
		for update in &req.props {
			let idx = schema
				.field_index(&update.name)
				.ok_or_else(|| Error::Thrown(format!("unknown field `{}`", update.name)))?;
			values[idx] = update.value.clone();
		}
		let names: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
		let data = row::encode(schema, &values)?;
		let stamp = version_stamp();

		let mut batch = WriteBatch::new();
		batch.del(old_key);
		batch.put(
			key::edge::new(vid_len, req.part, &src, req.key.etype, req.key.rank, &dst, stamp),
			data.clone(),
		);
		for index in info.indexes.values() {
			if index.target != IndexTarget::Edge(req.key.etype.abs()) {
				continue;
			}
			batch.del(indexes::edge_entry_key(
				req.part,
				index,
				&names,
				&old_values,
				&src,
				req.key.etype,
				req.key.rank,
				&dst,
			));
			batch.put(
				indexes::edge_entry_key(
					req.part,
					index,
					&names,
					&values,
					&src,
					req.key.etype,
					req.key.rank,
					&dst,
				),
				indexes::entry_value(schema, &names, &values),
			);
		}
		store.write(batch)?;

		// Keep the reverse copy in step when it lives here
		let rev_part = info.desc().part_of(&dst);
		if let Ok(rev_store) = engine.part(rev_part) {
			let rev_prefix = key::edge::prefix_rank_dst(
				vid_len,
				rev_part,
				&dst,
				-req.key.etype,
				req.key.rank,
				&src,
			);
			if let Some((rev_key, _)) = newest_under(&rev_store, &rev_prefix, |k| {
				Ok(key::edge::parse(vid_len, k)?.version)
			})? {
				let mut rev_batch = WriteBatch::new();
				rev_batch.del(rev_key);
				rev_batch.put(
					key::edge::new(
						vid_len,
						rev_part,
						&dst,
						-req.key.etype,
						req.key.rank,
						&src,
						stamp,
					),
					data,
				);
				rev_store.write(rev_batch)?;
			}
		}
		Ok(())
	}
}
