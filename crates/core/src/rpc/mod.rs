//! Request and response shapes for the storage and meta surfaces.
//!
//! The wire library is out of scope; these are the transport-opaque
//! message shapes, plus the traits in-process callers exercise them
//! through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::err::Error;
use crate::ids::{EdgeRank, EdgeType, HostAddr, PartitionId, SpaceId, TagId, Version};
use crate::val::{DataSet, Value};

/// The status a partition reports for its part of a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ErrorCode {
	Succeeded,
	LeaderChanged,
	PartNotFound,
	SpaceNotFound,
	KeyNotFound,
	KeyFormat,
	DecodeFailure,
	RpcFailure,
	WriteBlocked,
	IndexRebuilding,
	PlanKilled,
	VersionConflict,
	Internal,
}

impl ErrorCode {
	pub fn from_error(e: &Error) -> ErrorCode {
		match e {
			Error::LeaderChanged(_) => ErrorCode::LeaderChanged,
			Error::PartNotFound(_) => ErrorCode::PartNotFound,
			Error::SpaceNotFound(_) => ErrorCode::SpaceNotFound,
			Error::KeyFormat(_) => ErrorCode::KeyFormat,
			Error::Decode(_) => ErrorCode::DecodeFailure,
			Error::Rpc(_) | Error::Disconnected | Error::Timeout => ErrorCode::RpcFailure,
			Error::WriteBlocked(_) => ErrorCode::WriteBlocked,
			Error::IndexRebuilding => ErrorCode::IndexRebuilding,
			Error::PlanKilled => ErrorCode::PlanKilled,
			Error::VersionConflict => ErrorCode::VersionConflict,
			_ => ErrorCode::Internal,
		}
	}
}

/// The per-partition outcome attached to every storage response.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PartitionResult {
	pub part: PartitionId,
	pub code: ErrorCode,
}

/// Fields shared by every storage response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResponseCommon {
	/// Partitions that did not succeed, with their codes
	pub failed_parts: Vec<PartitionResult>,
	pub latency_us: u64,
}

impl ResponseCommon {
	pub fn ok(&self) -> bool {
		self.failed_parts.is_empty()
	}
}

/// Identifies a running plan for cooperative cancellation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PlanRef {
	pub session_id: i64,
	pub plan_id: i64,
}

// ------------------------------------------------------------------
// Mutations
// ------------------------------------------------------------------

/// One tag row of a new vertex.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTag {
	pub tag_id: TagId,
	pub prop_names: Vec<String>,
	pub prop_values: Vec<Value>,
}

/// A vertex to insert, with one entry per tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewVertex {
	pub vid: Value,
	pub tags: Vec<NewTag>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddVerticesRequest {
	pub space: SpaceId,
	pub parts: HashMap<PartitionId, Vec<NewVertex>>,
	pub if_not_exists: bool,
	pub ignore_existed_index: bool,
}

/// The endpoints of an edge, in value form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeKeySpec {
	pub src: Value,
	pub etype: EdgeType,
	pub rank: EdgeRank,
	pub dst: Value,
}

/// An edge to insert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewEdge {
	pub key: EdgeKeySpec,
	pub prop_names: Vec<String>,
	pub prop_values: Vec<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddEdgesRequest {
	pub space: SpaceId,
	pub parts: HashMap<PartitionId, Vec<NewEdge>>,
	pub if_not_exists: bool,
}

/// A property update applied by `UpdateVertex` / `UpdateEdge`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdatedProp {
	pub name: String,
	pub value: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateVertexRequest {
	pub space: SpaceId,
	pub part: PartitionId,
	pub vid: Value,
	pub tag: TagId,
	pub props: Vec<UpdatedProp>,
	/// When set, the update only applies if the stored row still
	/// carries this version
	pub expected_version: Option<Version>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateEdgeRequest {
	pub space: SpaceId,
	pub part: PartitionId,
	pub key: EdgeKeySpec,
	pub props: Vec<UpdatedProp>,
	pub expected_version: Option<Version>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecResponse {
	pub common: ResponseCommon,
}

// ------------------------------------------------------------------
// Reads
// ------------------------------------------------------------------

/// Which tag properties to return. `None` for `props` means every
/// field of the tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VertexPropSpec {
	pub tag: TagId,
	pub props: Option<Vec<String>>,
}

/// Which edge properties to return, keyed by signed type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgePropSpec {
	pub etype: EdgeType,
	pub props: Option<Vec<String>>,
}

/// How rows failing the pushed-down filter are treated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum FilterMode {
	/// Failing edges are dropped from the response
	#[default]
	Drop,
	/// Failing edges are kept, marked by a trailing null
	Mark,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetNeighborsRequest {
	pub space: SpaceId,
	/// Source vertices grouped by owning partition
	pub parts: HashMap<PartitionId, Vec<Value>>,
	/// Signed edge types to traverse; empty means every type, both ways
	pub edge_types: Vec<EdgeType>,
	pub vertex_props: Option<Vec<VertexPropSpec>>,
	pub edge_props: Option<Vec<EdgePropSpec>>,
	/// An encoded [`crate::exp::Expression`] evaluated per candidate edge
	pub filter: Option<Vec<u8>>,
	pub filter_mode: FilterMode,
	pub plan: Option<PlanRef>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetNeighborsResponse {
	pub common: ResponseCommon,
	pub dataset: DataSet,
}

/// What `GetProp` should look up.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PropKeySpec {
	Vertex {
		vid: Value,
		tag: TagId,
	},
	Edge(EdgeKeySpec),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetPropRequest {
	pub space: SpaceId,
	pub parts: HashMap<PartitionId, Vec<PropKeySpec>>,
	pub props: Option<Vec<String>>,
	pub plan: Option<PlanRef>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetPropResponse {
	pub common: ResponseCommon,
	pub dataset: DataSet,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanVertexRequest {
	pub space: SpaceId,
	pub part: PartitionId,
	pub tag: TagId,
	pub cursor: Option<Vec<u8>>,
	pub limit: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanEdgeRequest {
	pub space: SpaceId,
	pub part: PartitionId,
	pub etype: EdgeType,
	pub cursor: Option<Vec<u8>>,
	pub limit: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScanResponse {
	pub common: ResponseCommon,
	pub rows: DataSet,
	/// Where the next scan should resume; `None` when exhausted
	pub next_cursor: Option<Vec<u8>>,
}

/// Materialize whole vertices (every tag, with properties) by id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetVerticesRequest {
	pub space: SpaceId,
	pub parts: HashMap<PartitionId, Vec<Value>>,
	pub vertex_props: Option<Vec<VertexPropSpec>>,
	pub plan: Option<PlanRef>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetVerticesResponse {
	pub common: ResponseCommon,
	/// Columns `_vid`, `_vertex`
	pub dataset: DataSet,
}

/// A lookup against a secondary index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupIndexRequest {
	pub space: SpaceId,
	pub index: crate::ids::IndexId,
	/// Values for a prefix of the indexed fields, in declaration order
	pub values: Vec<Value>,
	pub plan: Option<PlanRef>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LookupIndexResponse {
	pub common: ResponseCommon,
	pub dataset: DataSet,
}

// ------------------------------------------------------------------
// Admin
// ------------------------------------------------------------------

/// The toggle broadcast while a snapshot is in flight.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum BlockSign {
	BlockOn,
	BlockOff,
}

/// What one partition's checkpoint recorded.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LogInfo {
	pub log_id: i64,
	pub term: i64,
}

/// A host's checkpoint result for one space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointStats {
	pub space: SpaceId,
	pub parts: HashMap<PartitionId, LogInfo>,
	pub data_path: PathBuf,
}

/// A host's contribution to a backup, grouped per space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostBackup {
	pub host: HostAddr,
	pub checkpoints: Vec<CheckpointStats>,
}

// ------------------------------------------------------------------
// Traits
// ------------------------------------------------------------------

/// The storage query surface the graph executors fan out against.
#[async_trait]
pub trait GraphStorage: Send + Sync {
	async fn add_vertices(&self, req: AddVerticesRequest) -> Result<ExecResponse, Error>;
	async fn add_edges(&self, req: AddEdgesRequest) -> Result<ExecResponse, Error>;
	async fn get_neighbors(&self, req: GetNeighborsRequest)
		-> Result<GetNeighborsResponse, Error>;
	async fn get_props(&self, req: GetPropRequest) -> Result<GetPropResponse, Error>;
	async fn get_vertices(&self, req: GetVerticesRequest) -> Result<GetVerticesResponse, Error>;
	async fn scan_vertex(&self, req: ScanVertexRequest) -> Result<ScanResponse, Error>;
	async fn scan_edge(&self, req: ScanEdgeRequest) -> Result<ScanResponse, Error>;
	async fn lookup_index(&self, req: LookupIndexRequest) -> Result<LookupIndexResponse, Error>;
}

/// The per-host admin surface the snapshot coordinator drives.
#[async_trait]
pub trait StorageAdmin: Send + Sync {
	/// Toggle the write block on every partition of the given spaces.
	async fn blocking_writes(
		&self,
		host: &HostAddr,
		spaces: &[SpaceId],
		sign: BlockSign,
	) -> Result<(), Error>;

	/// Create a named checkpoint for every partition of the given
	/// spaces, reporting per-partition log positions.
	async fn create_checkpoint(
		&self,
		host: &HostAddr,
		spaces: &[SpaceId],
		name: &str,
	) -> Result<Vec<CheckpointStats>, Error>;

	/// Drop a named checkpoint.
	async fn drop_checkpoint(
		&self,
		host: &HostAddr,
		spaces: &[SpaceId],
		name: &str,
	) -> Result<(), Error>;

	/// Remove every key of a space.
	async fn clear_space(&self, host: &HostAddr, space: SpaceId) -> Result<(), Error>;
}
