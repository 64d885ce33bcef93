//! Executors: drive the operator DAG against storage.
//!
//! Execution walks the arena depth-first from the root, publishing each
//! operator's row set under its output variable. Storage-facing
//! operators shard their requests by partition, fan out through the
//! [`GraphStorage`] trait and merge per-partition outcomes into a
//! completeness state.

pub mod storage;

pub use self::storage::Completeness;

use tracing::instrument;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::err::Error;
use crate::exp::{Expression, RowContext};
use crate::fnc::aggregate::AggState;
use crate::meta::SpaceInfo;
use crate::plan::node::{NodeId, NodeKind, PlanNode, SubPlan};
use crate::plan::QueryContext;
use crate::rpc::{
	GetNeighborsRequest, GetVerticesRequest, GraphStorage, LookupIndexRequest, ScanVertexRequest,
};
use crate::val::{DataSet, Value, Vertex};

/// The shared run state: variable bindings and query parameters.
#[derive(Default)]
pub struct ExecutionContext {
	vars: Mutex<HashMap<String, Value>>,
	pub params: BTreeMap<String, Value>,
}

impl ExecutionContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, name: &str, value: Value) {
		self.vars.lock().insert(name.to_string(), value);
	}

	pub fn get(&self, name: &str) -> Value {
		self.vars.lock().get(name).cloned().unwrap_or(Value::Empty)
	}

	// A variable read as a flat value list, whether it holds a dataset
	// or a list.
	fn get_values(&self, name: &str) -> Vec<Value> {
		match self.get(name) {
			Value::DataSet(ds) => ds.rows.into_iter().filter_map(|r| r.into_iter().next()).collect(),
			Value::List(l) => l,
			Value::Empty => Vec::new(),
			other => vec![other],
		}
	}

	fn is_var_empty(&self, name: &str) -> bool {
		self.get_values(name).is_empty()
	}
}

/// Drives one plan to completion.
pub struct Executor {
	qctx: QueryContext,
	storage: Arc<dyn GraphStorage>,
	accept_partial: bool,
}

type Memo = Mutex<HashMap<NodeId, DataSet>>;

impl Executor {
	pub fn new(qctx: QueryContext, storage: Arc<dyn GraphStorage>) -> Self {
		Self {
			qctx,
			storage,
			accept_partial: *crate::cnf::ACCEPT_PARTIAL_SUCCESS,
		}
	}

	pub fn accept_partial(mut self, accept: bool) -> Self {
		self.accept_partial = accept;
		self
	}

	fn info(&self) -> &Arc<SpaceInfo> {
		&self.qctx.space
	}

	/// Run a plan and read its root's row set.
	#[instrument(level = "debug", skip_all)]
	pub async fn execute(&self, plan: SubPlan, ectx: &ExecutionContext) -> Result<DataSet, Error> {
		let memo = Memo::default();
		self.run_node(plan.root, ectx, &memo).await
	}

	// Depth-first, memoized within one pass; loop bodies re-enter with
	// a fresh memo per iteration.
	fn run_node<'a>(
		&'a self,
		id: NodeId,
		ectx: &'a ExecutionContext,
		memo: &'a Memo,
	) -> BoxFuture<'a, Result<DataSet, Error>> {
		Box::pin(async move {
			if let Some(done) = memo.lock().get(&id) {
				return Ok(done.clone());
			}
			let node = self.qctx.arena.node(id).clone();
			let input = match node.deps.first() {
				Some(&dep) => self.run_node(dep, ectx, memo).await?,
				None => DataSet::default(),
			};
			let out = self.run_kind(&node, input, ectx).await?;
			ectx.set(&node.out_var, Value::DataSet(Box::new(out.clone())));
			memo.lock().insert(id, out.clone());
			Ok(out)
		})
	}

	async fn run_kind(
		&self,
		node: &PlanNode,
		input: DataSet,
		ectx: &ExecutionContext,
	) -> Result<DataSet, Error> {
		match &node.kind {
			NodeKind::Start => Ok(DataSet::new(node.output.clone())),
			NodeKind::Argument {
				alias,
			} => {
				let mut out = DataSet::new(node.output.clone());
				for v in storage::value_to_vids(&ectx.get(alias)) {
					out.rows.push(vec![v]);
				}
				Ok(out)
			}
			NodeKind::VidList {
				vids,
			} => {
				let mut out = DataSet::new(node.output.clone());
				for v in vids {
					out.rows.push(vec![v.clone()]);
				}
				Ok(out)
			}
			NodeKind::IndexScan {
				space,
				index,
				values,
			} => {
				let resp = self
					.storage
					.lookup_index(LookupIndexRequest {
						space: *space,
						index: *index,
						values: values.clone(),
						plan: None,
					})
					.await?;
				storage::check_completeness(&resp.common, 1, self.accept_partial)?;
				let mut out = DataSet::new(node.output.clone());
				for row in resp.dataset.rows {
					if let Some(first) = row.into_iter().next() {
						out.rows.push(vec![first]);
					}
				}
				Ok(out)
			}
			NodeKind::ScanVertices {
				space,
				tag,
			} => {
				let mut out = DataSet::new(node.output.clone());
				for part in self.info().desc().parts() {
					let mut cursor = None;
					loop {
						let resp = self
							.storage
							.scan_vertex(ScanVertexRequest {
								space: *space,
								part,
								tag: *tag,
								cursor: cursor.clone(),
								limit: *crate::cnf::SCAN_BATCH_SIZE,
							})
							.await?;
						storage::check_completeness(&resp.common, 1, self.accept_partial)?;
						for row in resp.rows.rows {
							if let Some(vid) = row.into_iter().next() {
								out.rows.push(vec![vid]);
							}
						}
						match resp.next_cursor {
							Some(next) => cursor = Some(next),
							None => break,
						}
					}
				}
				Ok(out)
			}
			NodeKind::GetVertices {
				space,
				src_col,
			} => {
				let idx = column_of(&input, src_col)?;
				let vids: Vec<Value> = input
					.rows
					.iter()
					.flat_map(|r| storage::value_to_vids(&r[idx]))
					.collect();
				let fetched = self.fetch_vertices(*space, vids).await?;
				let mut out = DataSet::new(node.output.clone());
				for (_, vertex) in fetched {
					out.rows.push(vec![vertex]);
				}
				Ok(out)
			}
			NodeKind::Traverse {
				space,
				edge_types,
				src_col,
				vertex_filter,
				edge_filter,
				min_steps,
				max_steps,
				track_prev_path,
				..
			} => {
				self.traverse(
					&input,
					*space,
					edge_types,
					src_col,
					vertex_filter,
					edge_filter,
					*min_steps,
					*max_steps,
					*track_prev_path,
					node,
				)
				.await
			}
			NodeKind::AppendVertices {
				space,
				edge_col,
				..
			} => {
				let idx = column_of(&input, edge_col)?;
				let vids: Vec<Value> =
					input.rows.iter().flat_map(|r| dst_of(&r[idx])).collect();
				let fetched = self.fetch_vertices(*space, vids).await?;
				let mut out = DataSet::new(node.output.clone());
				for row in input.rows {
					for vid in dst_of(&row[idx]) {
						let vertex = fetched
							.get(&vid)
							.cloned()
							.unwrap_or_else(|| Value::Vertex(Box::new(Vertex::new(vid.clone()))));
						let mut new_row = row.clone();
						new_row.push(vertex);
						out.rows.push(new_row);
					}
				}
				Ok(out)
			}
			NodeKind::Filter {
				condition,
				..
			} => {
				let mut out = DataSet::new(node.output.clone());
				for row in input.rows {
					let ctx = self.row_ctx(&input.column_names, &row, ectx);
					if condition.eval(&ctx).is_truthy() {
						out.rows.push(row);
					}
				}
				Ok(out)
			}
			NodeKind::Project {
				columns,
			} => {
				let mut out = DataSet::new(node.output.clone());
				for row in input.rows {
					let ctx = self.row_ctx(&input.column_names, &row, ectx);
					out.rows.push(columns.iter().map(|(_, e)| e.eval(&ctx)).collect());
				}
				Ok(out)
			}
			NodeKind::Aggregate {
				group_keys,
				group_items,
			} => self.aggregate(node, input, group_keys, group_items, ectx),
			NodeKind::Dedup => {
				let mut seen: BTreeSet<Vec<Value>> = BTreeSet::new();
				let mut out = DataSet::new(node.output.clone());
				for row in input.rows {
					if seen.insert(row.clone()) {
						out.rows.push(row);
					}
				}
				Ok(out)
			}
			NodeKind::Sort {
				keys,
			} => {
				let mut rows = input.rows;
				rows.sort_by(|a, b| {
					for key in keys {
						let ord = a[key.column].cmp(&b[key.column]);
						let ord = if key.ascending {
							ord
						} else {
							ord.reverse()
						};
						if ord != std::cmp::Ordering::Equal {
							return ord;
						}
					}
					std::cmp::Ordering::Equal
				});
				let mut out = DataSet::new(node.output.clone());
				out.rows = rows;
				Ok(out)
			}
			NodeKind::Limit {
				skip,
				count,
			} => {
				let mut out = DataSet::new(node.output.clone());
				let iter = input.rows.into_iter().skip(*skip);
				out.rows = match count {
					Some(n) => iter.take(*n).collect(),
					None => iter.collect(),
				};
				Ok(out)
			}
			NodeKind::Sample {
				count,
			} => {
				use rand::seq::SliceRandom;
				let mut out = DataSet::new(node.output.clone());
				if input.rows.len() <= *count {
					out.rows = input.rows;
				} else {
					let mut rng = rand::thread_rng();
					out.rows =
						input.rows.choose_multiple(&mut rng, *count).cloned().collect();
				}
				Ok(out)
			}
			NodeKind::Unwind {
				expr,
				alias: _,
			} => {
				let mut out = DataSet::new(node.output.clone());
				for row in input.rows {
					let ctx = self.row_ctx(&input.column_names, &row, ectx);
					match expr.eval(&ctx) {
						Value::List(items) => {
							for item in items {
								let mut new_row = row.clone();
								new_row.push(item);
								out.rows.push(new_row);
							}
						}
						// An empty or null input removes the row
						Value::Empty | Value::Null(_) => {}
						single => {
							let mut new_row = row;
							new_row.push(single);
							out.rows.push(new_row);
						}
					}
				}
				Ok(out)
			}
			NodeKind::RollUpApply {
				sub,
				..
			} => {
				// The sub-plan's matches, rolled into a list column on
				// every driving row
				let memo = Memo::default();
				let matches = self.run_node(sub.root, ectx, &memo).await?;
				let collected = Value::List(
					matches.rows.into_iter().filter_map(|r| r.into_iter().next()).collect(),
				);
				let mut out = DataSet::new(node.output.clone());
				for row in input.rows {
					let mut new_row = row;
					new_row.push(collected.clone());
					out.rows.push(new_row);
				}
				Ok(out)
			}
			NodeKind::Loop {
				body,
				steps,
				until_empty,
			} => {
				for iteration in 0..*steps {
					if ectx.is_var_empty(until_empty) {
						debug!("loop variable drained after {iteration} iterations");
						break;
					}
					// Each iteration recomputes the whole body
					let memo = Memo::default();
					self.run_node(body.root, ectx, &memo).await?;
				}
				Ok(DataSet::new(node.output.clone()))
			}
			NodeKind::SubgraphStep {
				space,
				edge_types,
				with_props: _,
				frontier_var,
				visited_var,
				vertices_var,
				edges_var,
				steps: _,
			} => {
				self.subgraph_step(
					*space,
					edge_types,
					frontier_var,
					visited_var,
					vertices_var,
					edges_var,
					ectx,
				)
				.await?;
				Ok(DataSet::new(node.output.clone()))
			}
			NodeKind::DataCollect {
				vertices_var,
				edges_var,
				..
			} => {
				let mut out = DataSet::new(node.output.clone());
				out.rows.push(vec![
					Value::List(ectx.get_values(vertices_var)),
					Value::List(ectx.get_values(edges_var)),
				]);
				Ok(out)
			}
		}
	}

	fn row_ctx(&self, names: &[String], row: &[Value], ectx: &ExecutionContext) -> RowContext {
		RowContext {
			names: names.to_vec(),
			row: row.to_vec(),
			params: ectx.params.clone(),
			..Default::default()
		}
	}

	// Fetch whole vertices for a vid set, sharded by partition.
	async fn fetch_vertices(
		&self,
		space: crate::ids::SpaceId,
		vids: Vec<Value>,
	) -> Result<BTreeMap<Value, Value>, Error> {
		let mut unique: Vec<Value> = vids;
		unique.sort();
		unique.dedup();
		if unique.is_empty() {
			return Ok(BTreeMap::new());
		}
		let parts = storage::shard_by_part(self.info(), unique)?;
		let requested = parts.len();
		let resp = self
			.storage
			.get_vertices(GetVerticesRequest {
				space,
				parts,
				vertex_props: None,
				plan: None,
			})
			.await?;
		storage::check_completeness(&resp.common, requested, self.accept_partial)?;
		let mut out = BTreeMap::new();
		for row in resp.dataset.rows {
			let mut cells = row.into_iter();
			if let (Some(vid), Some(vertex)) = (cells.next(), cells.next()) {
				out.insert(vid, vertex);
			}
		}
		Ok(out)
	}

	#[allow(clippy::too_many_arguments)]
	async fn traverse(
		&self,
		input: &DataSet,
		space: crate::ids::SpaceId,
		edge_types: &[i32],
		src_col: &str,
		vertex_filter: &Option<Expression>,
		edge_filter: &Option<Expression>,
		min_steps: usize,
		max_steps: usize,
		track_prev_path: bool,
		node: &PlanNode,
	) -> Result<DataSet, Error> {
		struct Frontier {
			prefix: Vec<Value>,
			src: Value,
			first_vertex: Option<Value>,
			walked: Vec<Value>,
		}

		let idx = column_of(input, src_col)?;
		let mut frontier: Vec<Frontier> = Vec::new();
		for row in &input.rows {
			for vid in storage::value_to_vids(&row[idx]) {
				frontier.push(Frontier {
					prefix: if track_prev_path {
						row.clone()
					} else {
						Vec::new()
					},
					src: vid,
					first_vertex: None,
					walked: Vec::new(),
				});
			}
		}

		let mut out = DataSet::new(node.output.clone());
		for depth in 1..=max_steps {
			if frontier.is_empty() {
				break;
			}
			let vids: Vec<Value> = frontier.iter().map(|f| f.src.clone()).collect();
			let mut unique = vids;
			unique.sort();
			unique.dedup();
			let parts = storage::shard_by_part(self.info(), unique)?;
			let requested = parts.len();
			let resp = self
				.storage
				.get_neighbors(GetNeighborsRequest {
					space,
					parts,
					edge_types: edge_types.to_vec(),
					vertex_props: None,
					edge_props: None,
					// The edge filter rides down to the storage side
					filter: edge_filter.as_ref().map(|f| f.encode()).transpose()?,
					filter_mode: Default::default(),
					plan: None,
				})
				.await?;
			storage::check_completeness(&resp.common, requested, self.accept_partial)?;

			let mut by_vid: BTreeMap<Value, (Value, Vec<Value>)> = BTreeMap::new();
			for row in resp.dataset.rows {
				let mut cells = row.into_iter();
				if let (Some(vid), Some(vertex), Some(Value::List(edges))) =
					(cells.next(), cells.next(), cells.next())
				{
					by_vid.insert(vid, (vertex, edges));
				}
			}

			let mut next: Vec<Frontier> = Vec::new();
			for f in frontier {
				let Some((vertex, edges)) = by_vid.get(&f.src) else {
					continue;
				};
				if let Some(filter) = vertex_filter {
					let ctx = RowContext {
						dst: vertex.clone(),
						..Default::default()
					};
					if !filter.eval(&ctx).is_truthy() {
						continue;
					}
				}
				let first = f.first_vertex.clone().unwrap_or_else(|| vertex.clone());
				for edge in edges {
					if edge.is_null() {
						continue;
					}
					let mut walked = f.walked.clone();
					walked.push(edge.clone());
					if depth >= min_steps {
						let mut row = f.prefix.clone();
						row.push(first.clone());
						// A step range flattens its hops into a list
						row.push(if max_steps > 1 {
							Value::List(walked.clone())
						} else {
							edge.clone()
						});
						out.rows.push(row);
					}
					if let Value::Edge(e) = edge {
						next.push(Frontier {
							prefix: f.prefix.clone(),
							src: e.dst.clone(),
							first_vertex: Some(first.clone()),
							walked,
						});
					}
				}
			}
			frontier = next;
		}
		Ok(out)
	}

	fn aggregate(
		&self,
		node: &PlanNode,
		input: DataSet,
		group_keys: &[(String, Expression)],
		group_items: &[(String, crate::fnc::aggregate::AggKind, bool, Expression)],
		ectx: &ExecutionContext,
	) -> Result<DataSet, Error> {
		let mut groups: BTreeMap<Vec<Value>, Vec<AggState>> = BTreeMap::new();
		let mut distinct_seen: BTreeMap<Vec<Value>, BTreeSet<(usize, Value)>> = BTreeMap::new();
		for row in &input.rows {
			let ctx = self.row_ctx(&input.column_names, row, ectx);
			let key: Vec<Value> = group_keys.iter().map(|(_, e)| e.eval(&ctx)).collect();
			let states = groups.entry(key.clone()).or_insert_with(|| {
				group_items.iter().map(|(_, kind, _, _)| AggState::new(*kind)).collect()
			});
			for (i, (_, _, distinct, expr)) in group_items.iter().enumerate() {
				let value = expr.eval(&ctx);
				if *distinct {
					let seen = distinct_seen.entry(key.clone()).or_default();
					if !seen.insert((i, value.clone())) {
						continue;
					}
				}
				states[i].apply(&value);
			}
		}
		// Aggregation over nothing still yields one ungrouped row
		if groups.is_empty() && group_keys.is_empty() {
			groups.insert(
				Vec::new(),
				group_items.iter().map(|(_, kind, _, _)| AggState::new(*kind)).collect(),
			);
		}
		let mut out = DataSet::new(node.output.clone());
		for (key, states) in groups {
			let finished: Vec<Value> = states.into_iter().map(|s| s.finish()).collect();
			let mut row = Vec::with_capacity(node.output.len());
			for col in &node.output {
				if let Some(at) = group_keys.iter().position(|(name, _)| name == col) {
					row.push(key[at].clone());
				} else if let Some(at) = group_items.iter().position(|(name, ..)| name == col) {
					row.push(finished[at].clone());
				} else {
					row.push(Value::Empty);
				}
			}
			out.rows.push(row);
		}
		Ok(out)
	}

	#[allow(clippy::too_many_arguments)]
	async fn subgraph_step(
		&self,
		space: crate::ids::SpaceId,
		edge_types: &[i32],
		frontier_var: &str,
		visited_var: &str,
		vertices_var: &str,
		edges_var: &str,
		ectx: &ExecutionContext,
	) -> Result<(), Error> {
		let visited: BTreeSet<Value> = ectx.get_values(visited_var).into_iter().collect();
		let frontier: Vec<Value> = ectx
			.get_values(frontier_var)
			.into_iter()
			.filter(|v| !visited.contains(v))
			.collect();
		if frontier.is_empty() {
			ectx.set(frontier_var, Value::List(Vec::new()));
			return Ok(());
		}
		let parts = storage::shard_by_part(self.info(), frontier.clone())?;
		let requested = parts.len();
		let resp = self
			.storage
			.get_neighbors(GetNeighborsRequest {
				space,
				parts,
				edge_types: edge_types.to_vec(),
				vertex_props: None,
				edge_props: None,
				filter: None,
				filter_mode: Default::default(),
				plan: None,
			})
			.await?;
		storage::check_completeness(&resp.common, requested, self.accept_partial)?;

		let mut vertices = ectx.get_values(vertices_var);
		let mut edges = ectx.get_values(edges_var);
		// Canonical edge identity deduplicates the two stored directions
		let mut seen_edges: BTreeSet<(Value, i64, i64, Value)> = edges
			.iter()
			.filter_map(|e| match e {
				Value::Edge(e) => Some(canonical_edge(e)),
				_ => None,
			})
			.collect();
		let mut next_visited = visited;
		let mut next_frontier: BTreeSet<Value> = BTreeSet::new();

		for row in resp.dataset.rows {
			let mut cells = row.into_iter();
			let (Some(vid), Some(vertex), Some(Value::List(found))) =
				(cells.next(), cells.next(), cells.next())
			else {
				continue;
			};
			next_visited.insert(vid);
			vertices.push(vertex);
			for edge in found {
				let Value::Edge(e) = &edge else {
					continue;
				};
				if seen_edges.insert(canonical_edge(e)) {
					edges.push(edge.clone());
				}
				if !next_visited.contains(&e.dst) {
					next_frontier.insert(e.dst.clone());
				}
			}
		}

		ectx.set(frontier_var, Value::List(next_frontier.into_iter().collect()));
		ectx.set(visited_var, Value::List(next_visited.into_iter().collect()));
		ectx.set(vertices_var, Value::List(vertices));
		ectx.set(edges_var, Value::List(edges));
		Ok(())
	}
}

fn column_of(input: &DataSet, name: &str) -> Result<usize, Error> {
	input
		.column_index(name)
		.ok_or_else(|| Error::ColumnMismatch("executor input".to_string(), name.to_string()))
}

// The destination vids a column value leads to: the last hop of a step
// range, the destination of a single edge.
fn dst_of(v: &Value) -> Vec<Value> {
	match v {
		Value::Edge(e) => vec![e.dst.clone()],
		Value::List(l) => l.last().map(dst_of).unwrap_or_default(),
		Value::Null(_) | Value::Empty => Vec::new(),
		other => vec![other.clone()],
	}
}

fn canonical_edge(e: &crate::val::Edge) -> (Value, i64, i64, Value) {
	if e.etype < 0 {
		(e.dst.clone(), -e.etype as i64, e.rank, e.src.clone())
	} else {
		(e.src.clone(), e.etype as i64, e.rank, e.dst.clone())
	}
}
