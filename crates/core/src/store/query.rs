//! Read processors: neighbourhood expansion, point lookups, scans and
//! index seeks.

use tracing::instrument;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::err::Error;
use crate::cache::ConcurrentLruCache;
use crate::exp::{Expression, RowContext};
use crate::ids::{EdgeRank, EdgeType, PartitionId, Vid};
use crate::key;
use crate::kvs::mem::MemStore;
use crate::kvs::Store;
use crate::meta::schema::IndexTarget;
use crate::meta::SpaceInfo;
use crate::row::RowReader;
use crate::rpc::{
	EdgePropSpec, ErrorCode, FilterMode, GetNeighborsRequest, GetNeighborsResponse,
	GetPropRequest, GetPropResponse, LookupIndexRequest, LookupIndexResponse, PartitionResult,
	PropKeySpec, ScanEdgeRequest, ScanResponse, ScanVertexRequest, VertexPropSpec,
};
use crate::row;
use crate::store::indexes;
use crate::store::metrics;
use crate::store::node::{newest_under, StorageNode};
use crate::store::ttl;
use crate::store::encode_vid;
use crate::val::{DataSet, Edge, TagData, Value, Vertex};

/// The column names every `GetNeighbors` response carries.
pub const NEIGHBORS_COLUMNS: [&str; 3] = ["_vid", "_vertex", "_edges"];

/// The hottest read path: one prefix scan per source vertex, one output
/// row per source vertex.
pub struct GetNeighborsProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> GetNeighborsProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space))]
	pub async fn process(self, req: GetNeighborsRequest) -> GetNeighborsResponse {
		let started = Instant::now();
		let mut resp = GetNeighborsResponse {
			dataset: DataSet::new(NEIGHBORS_COLUMNS.iter().map(|c| c.to_string()).collect()),
			..Default::default()
		};
		// A killed plan aborts the whole request
		if let Err(e) = self.node.check_plan(&req.plan) {
			for part in req.parts.keys() {
				resp.common.failed_parts.push(PartitionResult {
					part: *part,
					code: ErrorCode::from_error(&e),
				});
			}
			metrics::record("get_neighbors", started.elapsed(), false);
			return resp;
		}
		let filter = match req.filter.as_deref().map(Expression::decode).transpose() {
			Ok(f) => f,
			Err(e) => {
				for part in req.parts.keys() {
					resp.common.failed_parts.push(PartitionResult {
						part: *part,
						code: ErrorCode::from_error(&e),
					});
				}
				metrics::record("get_neighbors", started.elapsed(), false);
				return resp;
			}
		};
		for (part, vids) in &req.parts {
			match self.process_part(&req, *part, vids, &filter) {
				Ok(mut rows) => resp.dataset.rows.append(&mut rows),
				Err(e) => {
					trace!("get_neighbors failed on part {part}: {e}");
					resp.common.failed_parts.push(PartitionResult {
						part: *part,
						code: ErrorCode::from_error(&e),
					});
				}
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("get_neighbors", started.elapsed(), resp.common.ok());
		resp
	}

	fn process_part(
		&self,
		req: &GetNeighborsRequest,
		part: PartitionId,
		vids: &[Value],
		filter: &Option<Expression>,
	) -> Result<Vec<Vec<Value>>, Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		let store = engine.part(part)?;
		let mut rows = Vec::with_capacity(vids.len());
		for vid_value in vids {
			let vid = encode_vid(&info, vid_value)?;
			let (vertex, edges) = scan_vertex_prefix(
				&info,
				&store,
				&self.node.decode_cache,
				part,
				&vid,
				&req.edge_types,
				&req.vertex_props,
				&req.edge_props,
			)?;
			let mut out_edges = Vec::with_capacity(edges.len());
			for edge in edges {
				if let Some(f) = filter {
					let ctx = RowContext {
						src: Value::Vertex(Box::new(vertex.clone())),
						edge: Value::Edge(Box::new(edge.clone())),
						..Default::default()
					};
					if !f.eval(&ctx).is_truthy() {
						match req.filter_mode {
							FilterMode::Drop => continue,
							// The marker keeps the slot visible downstream
							FilterMode::Mark => {
								out_edges.push(Value::null());
								continue;
							}
						}
					}
				}
				out_edges.push(Value::Edge(Box::new(edge)));
			}
			rows.push(vec![
				vid_value.clone(),
				Value::Vertex(Box::new(vertex)),
				Value::List(out_edges),
			]);
		}
		Ok(rows)
	}
}

// One pass over the (part, vid) prefix: tag rows become the vertex,
// edge rows become candidate edges, TTL-expired rows stay invisible.
#[allow(clippy::too_many_arguments)]
fn scan_vertex_prefix(
	info: &SpaceInfo,
	store: &MemStore,
	decode_cache: &ConcurrentLruCache<Vec<u8>, Value>,
	part: PartitionId,
	vid: &Vid,
	edge_types: &[EdgeType],
	vertex_props: &Option<Vec<VertexPropSpec>>,
	edge_props: &Option<Vec<EdgePropSpec>>,
) -> Result<(Vertex, Vec<Edge>), Error> {
	let vid_len = info.vid_len();
	let prefix = key::vertex::prefix(vid_len, part, vid);
	// Newest version per tag and per exact edge, with the raw key kept
	// as the decode-cache handle
	let mut tags: BTreeMap<i32, (i64, Vec<u8>, Vec<u8>)> = BTreeMap::new();
	let mut edges: BTreeMap<(EdgeType, EdgeRank, Vid), (i64, Vec<u8>, Vec<u8>)> = BTreeMap::new();
	for (raw, val) in store.prefix(&prefix)? {
		match key::kind(vid_len, &raw) {
			key::KeyKind::Vertex => {
				let parsed = key::vertex::parse(vid_len, &raw)?;
				let slot = tags.entry(parsed.tag).or_insert((i64::MIN, Vec::new(), Vec::new()));
				if parsed.version > slot.0 {
					*slot = (parsed.version, raw, val);
				}
			}
			key::KeyKind::Edge => {
				let parsed = key::edge::parse(vid_len, &raw)?;
				if !edge_types.is_empty() && !edge_types.contains(&parsed.etype) {
					continue;
				}
				let slot = edges
					.entry((parsed.etype, parsed.rank, parsed.dst))
					.or_insert((i64::MIN, Vec::new(), Vec::new()));
				if parsed.version > slot.0 {
					*slot = (parsed.version, raw, val);
				}
			}
			_ => {}
		}
	}

	let mut vertex = Vertex::new(info.desc().vid_type.decode(vid));
	for (tag_id, (_, raw, data)) in tags {
		let Some(desc) = info.tags.get(&tag_id) else {
			continue;
		};
		let wanted: Option<&VertexPropSpec> = match vertex_props {
			None => None,
			Some(specs) => match specs.iter().find(|s| s.tag == tag_id) {
				Some(spec) => Some(spec),
				// Tags outside the request are not materialized
				None => continue,
			},
		};
		let version = row::schema_version(&data)?;
		let Some(schema) = desc.schema(version) else {
			continue;
		};
		let Some(props) = decode_props(decode_cache, schema, raw, &data)? else {
			continue;
		};
		if ttl::props_expired(schema, &props) {
			continue;
		}
		let props = match wanted.and_then(|w| w.props.as_ref()) {
			Some(names) => names
				.iter()
				.map(|n| (n.clone(), props.get(n).cloned().unwrap_or(Value::null())))
				.collect(),
			None => props,
		};
		vertex.tags.push(TagData {
			name: desc.name.clone(),
			props,
		});
	}

	let mut out = Vec::with_capacity(edges.len());
	for ((etype, rank, dst), (_, raw, data)) in edges {
		let Some(desc) = info.edge(etype) else {
			continue;
		};
		let version = row::schema_version(&data)?;
		let Some(schema) = desc.schema(version) else {
			continue;
		};
		let Some(props) = decode_props(decode_cache, schema, raw, &data)? else {
			continue;
		};
		if ttl::props_expired(schema, &props) {
			continue;
		}
		let wanted = edge_props
			.as_ref()
			.and_then(|specs| specs.iter().find(|s| s.etype == etype))
			.and_then(|s| s.props.as_ref());
		let props = match wanted {
			Some(names) => names
				.iter()
				.map(|n| (n.clone(), props.get(n).cloned().unwrap_or(Value::null())))
				.collect(),
			None => props,
		};
		out.push(Edge {
			src: info.desc().vid_type.decode(vid),
			dst: info.desc().vid_type.decode(&dst),
			etype,
			name: desc.name.clone(),
			rank,
			props,
		});
	}
	Ok((vertex, out))
}

// Decode a full property map through the node's decode cache. The raw
// key embeds the version, so hits can never observe a stale row.
fn decode_props(
	cache: &ConcurrentLruCache<Vec<u8>, Value>,
	schema: &crate::meta::schema::Schema,
	raw: Vec<u8>,
	data: &[u8],
) -> Result<Option<BTreeMap<String, Value>>, Error> {
	if let Some(Value::Map(props)) = cache.get(&raw, None) {
		return Ok(Some(props));
	}
	let Ok(reader) = RowReader::new(schema, data) else {
		return Ok(None);
	};
	let mut props = BTreeMap::new();
	for field in &schema.fields {
		props.insert(field.name.clone(), reader.get_by_name(&field.name)?);
	}
	cache.insert(raw, Value::Map(props.clone()), None);
	Ok(Some(props))
}

/// Materializes whole vertices by id, tags and properties included.
pub struct GetVerticesProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> GetVerticesProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space))]
	pub async fn process(
		self,
		req: crate::rpc::GetVerticesRequest,
	) -> crate::rpc::GetVerticesResponse {
		let started = Instant::now();
		let mut resp = crate::rpc::GetVerticesResponse {
			dataset: DataSet::new(vec!["_vid".to_string(), "_vertex".to_string()]),
			..Default::default()
		};
		if let Err(e) = self.node.check_plan(&req.plan) {
			for part in req.parts.keys() {
				resp.common.failed_parts.push(PartitionResult {
					part: *part,
					code: ErrorCode::from_error(&e),
				});
			}
			metrics::record("get_vertices", started.elapsed(), false);
			return resp;
		}
		for (part, vids) in &req.parts {
			match self.process_part(&req, *part, vids) {
				Ok(mut rows) => resp.dataset.rows.append(&mut rows),
				Err(e) => {
					trace!("get_vertices failed on part {part}: {e}");
					resp.common.failed_parts.push(PartitionResult {
						part: *part,
						code: ErrorCode::from_error(&e),
					});
				}
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("get_vertices", started.elapsed(), resp.common.ok());
		resp
	}

	fn process_part(
		&self,
		req: &crate::rpc::GetVerticesRequest,
		part: PartitionId,
		vids: &[Value],
	) -> Result<Vec<Vec<Value>>, Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		let store = engine.part(part)?;
		let mut rows = Vec::with_capacity(vids.len());
		for vid_value in vids {
			let vid = encode_vid(&info, vid_value)?;
			// Reuse the neighbourhood pass restricted to tag rows
			let (vertex, _) = scan_vertex_prefix(
				&info,
				&store,
				&self.node.decode_cache,
				part,
				&vid,
				&[i32::MAX],
				&req.vertex_props,
				&None,
			)?;
			if vertex.tags.is_empty() {
				// The vertex has no live tag row; absence, not an error
				continue;
			}
			rows.push(vec![vid_value.clone(), Value::Vertex(Box::new(vertex))]);
		}
		Ok(rows)
	}
}

/// Point lookups by key list.
pub struct GetPropProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> GetPropProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space))]
	pub async fn process(self, req: GetPropRequest) -> GetPropResponse {
		let started = Instant::now();
		let mut resp = GetPropResponse::default();
		if let Err(e) = self.node.check_plan(&req.plan) {
			for part in req.parts.keys() {
				resp.common.failed_parts.push(PartitionResult {
					part: *part,
					code: ErrorCode::from_error(&e),
				});
			}
			metrics::record("get_prop", started.elapsed(), false);
			return resp;
		}
		resp.dataset.column_names = vec!["_key".to_string(), "_props".to_string()];
		for (part, specs) in &req.parts {
			match self.process_part(&req, *part, specs) {
				Ok(mut rows) => resp.dataset.rows.append(&mut rows),
				Err(e) => {
					trace!("get_prop failed on part {part}: {e}");
					resp.common.failed_parts.push(PartitionResult {
						part: *part,
						code: ErrorCode::from_error(&e),
					});
				}
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("get_prop", started.elapsed(), resp.common.ok());
		resp
	}

	fn process_part(
		&self,
		req: &GetPropRequest,
		part: PartitionId,
		specs: &[PropKeySpec],
	) -> Result<Vec<Vec<Value>>, Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		let store = engine.part(part)?;
		let vid_len = info.vid_len();
		let mut rows = Vec::with_capacity(specs.len());
		for spec in specs {
			match spec {
				PropKeySpec::Vertex {
					vid,
					tag,
				} => {
					let raw = encode_vid(&info, vid)?;
					let prefix = key::vertex::tag_prefix(vid_len, part, &raw, *tag);
					let Some((_, data)) = newest_under(&store, &prefix, |k| {
						Ok(key::vertex::parse(vid_len, k)?.version)
					})?
					else {
						// Absence is not an error
						continue;
					};
					let desc = info.tags.get(tag).ok_or(Error::TagNotFound(*tag))?;
					let version = row::schema_version(&data)?;
					let schema = desc
						.schema(version)
						.ok_or_else(|| Error::Decode(format!("no schema version {version}")))?;
					let reader = RowReader::new(schema, &data)?;
					if ttl::expired(schema, &reader) {
						continue;
					}
					rows.push(vec![vid.clone(), props_value(&reader, schema, &req.props)?]);
				}
				PropKeySpec::Edge(ek) => {
					let src = encode_vid(&info, &ek.src)?;
					let dst = encode_vid(&info, &ek.dst)?;
					let prefix =
						key::edge::prefix_rank_dst(vid_len, part, &src, ek.etype, ek.rank, &dst);
					let Some((_, data)) = newest_under(&store, &prefix, |k| {
						Ok(key::edge::parse(vid_len, k)?.version)
					})?
					else {
						continue;
					};
					// A reverse copy may carry an empty payload
					if data.is_empty() {
						rows.push(vec![ek.src.clone(), Value::Map(BTreeMap::new())]);
						continue;
					}
					let desc = info.edge(ek.etype).ok_or(Error::EdgeNotFound(ek.etype))?;
					let version = row::schema_version(&data)?;
					let schema = desc
						.schema(version)
						.ok_or_else(|| Error::Decode(format!("no schema version {version}")))?;
					let reader = RowReader::new(schema, &data)?;
					if ttl::expired(schema, &reader) {
						continue;
					}
					rows.push(vec![ek.src.clone(), props_value(&reader, schema, &req.props)?]);
				}
			}
		}
		Ok(rows)
	}
}

fn props_value(
	reader: &RowReader,
	schema: &crate::meta::schema::Schema,
	wanted: &Option<Vec<String>>,
) -> Result<Value, Error> {
	let mut map = BTreeMap::new();
	match wanted {
		Some(names) => {
			for name in names {
				map.insert(name.clone(), reader.get_by_name(name)?);
			}
		}
		None => {
			for field in &schema.fields {
				map.insert(field.name.clone(), reader.get_by_name(&field.name)?);
			}
		}
	}
	Ok(Value::Map(map))
}

/// Partition-ordered vertex scan with a continuation cursor.
pub struct ScanVertexProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> ScanVertexProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space, part = req.part))]
	pub async fn process(self, req: ScanVertexRequest) -> ScanResponse {
		let started = Instant::now();
		let mut resp = ScanResponse::default();
		match self.scan(&req) {
			Ok((dataset, cursor)) => {
				resp.rows = dataset;
				resp.next_cursor = cursor;
			}
			Err(e) => {
				trace!("scan_vertex failed on part {}: {e}", req.part);
				resp.common.failed_parts.push(PartitionResult {
					part: req.part,
					code: ErrorCode::from_error(&e),
				});
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("scan_vertex", started.elapsed(), resp.common.ok());
		resp
	}

	fn scan(&self, req: &ScanVertexRequest) -> Result<(DataSet, Option<Vec<u8>>), Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		let store = engine.part(req.part)?;
		let vid_len = info.vid_len();
		let desc = info.tags.get(&req.tag).ok_or(Error::TagNotFound(req.tag))?;
		let schema = desc.latest();
		let mut columns = vec!["_vid".to_string()];
		columns.extend(schema.fields.iter().map(|f| f.name.clone()));
		let mut dataset = DataSet::new(columns);

		let (start, end) = scan_window(req.part, &req.cursor);
		let mut cursor = None;
		for (raw, data) in store.range(&start, &end, 0)? {
			if dataset.rows.len() >= req.limit as usize {
				cursor = Some(successor(&raw));
				break;
			}
			if !key::vertex::is_vertex(vid_len, &raw) {
				continue;
			}
			let parsed = key::vertex::parse(vid_len, &raw)?;
			if parsed.tag != req.tag {
				continue;
			}
			let version = row::schema_version(&data)?;
			let Some(schema) = desc.schema(version) else {
				continue;
			};
			let reader = RowReader::new(schema, &data)?;
			if ttl::expired(schema, &reader) {
				continue;
			}
			let mut row = vec![info.desc().vid_type.decode(&parsed.vid)];
			row.extend(reader.values()?);
			dataset.rows.push(row);
		}
		Ok((dataset, cursor))
	}
}

/// Partition-ordered edge scan with a continuation cursor.
pub struct ScanEdgeProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> ScanEdgeProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space, part = req.part))]
	pub async fn process(self, req: ScanEdgeRequest) -> ScanResponse {
		let started = Instant::now();
		let mut resp = ScanResponse::default();
		match self.scan(&req) {
			Ok((dataset, cursor)) => {
				resp.rows = dataset;
				resp.next_cursor = cursor;
			}
			Err(e) => {
				trace!("scan_edge failed on part {}: {e}", req.part);
				resp.common.failed_parts.push(PartitionResult {
					part: req.part,
					code: ErrorCode::from_error(&e),
				});
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("scan_edge", started.elapsed(), resp.common.ok());
		resp
	}

	fn scan(&self, req: &ScanEdgeRequest) -> Result<(DataSet, Option<Vec<u8>>), Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		let store = engine.part(req.part)?;
		let vid_len = info.vid_len();
		let desc = info.edge(req.etype).ok_or(Error::EdgeNotFound(req.etype))?;
		let schema = desc.latest();
		let mut columns = vec![
			"_src".to_string(),
			"_type".to_string(),
			"_rank".to_string(),
			"_dst".to_string(),
		];
		columns.extend(schema.fields.iter().map(|f| f.name.clone()));
		let mut dataset = DataSet::new(columns);

		let (start, end) = scan_window(req.part, &req.cursor);
		let mut cursor = None;
		for (raw, data) in store.range(&start, &end, 0)? {
			if dataset.rows.len() >= req.limit as usize {
				cursor = Some(successor(&raw));
				break;
			}
			if !key::edge::is_edge(vid_len, &raw) {
				continue;
			}
			let parsed = key::edge::parse(vid_len, &raw)?;
			if parsed.etype != req.etype {
				continue;
			}
			let version = row::schema_version(&data)?;
			let Some(schema) = desc.schema(version) else {
				continue;
			};
			let reader = RowReader::new(schema, &data)?;
			if ttl::expired(schema, &reader) {
				continue;
			}
			let mut row = vec![
				info.desc().vid_type.decode(&parsed.src),
				Value::Int(parsed.etype as i64),
				Value::Int(parsed.rank),
				info.desc().vid_type.decode(&parsed.dst),
			];
			row.extend(reader.values()?);
			dataset.rows.push(row);
		}
		Ok((dataset, cursor))
	}
}

/// A seek against a secondary index: every entry matching a value
/// prefix, resolved to its reference key.
pub struct LookupIndexProcessor<'a> {
	node: &'a StorageNode,
}

impl<'a> LookupIndexProcessor<'a> {
	pub fn new(node: &'a StorageNode) -> Self {
		Self {
			node,
		}
	}

	#[instrument(level = "trace", skip_all, fields(space = req.space, index = req.index))]
	pub async fn process(self, req: LookupIndexRequest) -> LookupIndexResponse {
		let started = Instant::now();
		let mut resp = LookupIndexResponse::default();
		if let Err(e) = self.node.check_plan(&req.plan) {
			resp.common.failed_parts.push(PartitionResult {
				part: 0,
				code: ErrorCode::from_error(&e),
			});
			metrics::record("lookup_index", started.elapsed(), false);
			return resp;
		}
		match self.lookup(&req) {
			Ok(dataset) => resp.dataset = dataset,
			Err(e) => {
				trace!("lookup_index failed: {e}");
				resp.common.failed_parts.push(PartitionResult {
					part: 0,
					code: ErrorCode::from_error(&e),
				});
			}
		}
		resp.common.latency_us = started.elapsed().as_micros() as u64;
		metrics::record("lookup_index", started.elapsed(), resp.common.ok());
		resp
	}

	fn lookup(&self, req: &LookupIndexRequest) -> Result<DataSet, Error> {
		let info = self.node.space_info(req.space)?;
		let engine = self.node.engine(req.space)?;
		let index =
			info.indexes.get(&req.index).ok_or(Error::IndexNotFound(req.index))?.clone();
		let vid_len = info.vid_len();
		let values = indexes::encode_values(&req.values);
		let ttl_duration = match index.target {
			IndexTarget::Tag(t) => {
				info.tags.get(&t).and_then(|d| d.latest().ttl.as_ref()).map(|t| t.duration_secs)
			}
			IndexTarget::Edge(e) => {
				info.edge(e).and_then(|d| d.latest().ttl.as_ref()).map(|t| t.duration_secs)
			}
		};
		let mut dataset = match index.target {
			IndexTarget::Tag(_) => DataSet::new(vec!["_vid".to_string()]),
			IndexTarget::Edge(_) => DataSet::new(vec![
				"_src".to_string(),
				"_rank".to_string(),
				"_dst".to_string(),
			]),
		};
		for part in engine.part_ids() {
			let store = engine.part(part)?;
			let prefix = key::index::value_prefix(part, index.id, &values);
			for (raw, entry_val) in store.prefix(&prefix)? {
				// TTL stamps piggyback on the entry value
				if let (Some(duration), true) = (ttl_duration, entry_val.len() == 8) {
					let mut buf = [0u8; 8];
					buf.copy_from_slice(&entry_val);
					if ttl::stamp_expired(i64::from_le_bytes(buf), duration) {
						continue;
					}
				}
				let parsed = key::index::parse(&raw)?;
				match index.target {
					IndexTarget::Tag(_) => {
						let reference = &parsed.tail[parsed.tail.len() - vid_len..];
						dataset.rows.push(vec![info.desc().vid_type.decode(reference)]);
					}
					IndexTarget::Edge(_) => {
						let ref_len = vid_len + 4 + 8 + vid_len;
						let reference = &parsed.tail[parsed.tail.len() - ref_len..];
						let src = &reference[..vid_len];
						let mut rank = [0u8; 8];
						rank.copy_from_slice(&reference[vid_len + 4..vid_len + 12]);
						let dst = &reference[vid_len + 12..];
						dataset.rows.push(vec![
							info.desc().vid_type.decode(src),
							Value::Int(i64::from_le_bytes(rank)),
							info.desc().vid_type.decode(dst),
						]);
					}
				}
			}
		}
		Ok(dataset)
	}
}

// The byte window a cursor-driven scan covers.
fn scan_window(part: PartitionId, cursor: &Option<Vec<u8>>) -> (Vec<u8>, Vec<u8>) {
	let prefix = key::part_prefix(part);
	let start = cursor.clone().unwrap_or_else(|| prefix.clone());
	let mut end = prefix;
	// The exclusive upper bound of the partition's key range
	for byte in end.iter_mut().rev() {
		if *byte < 0xff {
			*byte += 1;
			break;
		}
		*byte = 0x00;
	}
	(start, end)
}

fn successor(key: &[u8]) -> Vec<u8> {
	let mut next = key.to_vec();
	next.push(0x00);
	next
}
