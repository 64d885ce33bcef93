use thiserror::Error;

/// Errors raised by the Quasar core.
///
/// Value arithmetic never surfaces here; a failed operation on a
/// [`crate::val::Value`] materializes a typed null instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// The partition leader moved; the caller should refresh and retry
	#[error("The leader of partition {0} has changed")]
	LeaderChanged(i32),
	/// The partition is not served by this host
	#[error("Partition {0} was not found")]
	PartNotFound(i32),
	/// The space id is not present in the catalog
	#[error("Space {0} was not found")]
	SpaceNotFound(i32),
	/// The tag id is not present in the catalog
	#[error("Tag {0} was not found")]
	TagNotFound(i32),
	/// The edge type id is not present in the catalog
	#[error("Edge type {0} was not found")]
	EdgeNotFound(i32),
	/// The index id is not present in the catalog
	#[error("Index {0} was not found")]
	IndexNotFound(i32),
	/// A key failed to parse against the expected layout
	#[error("Key format error: {0}")]
	KeyFormat(String),
	/// A row value failed to decode against its schema
	#[error("Unable to decode row: {0}")]
	Decode(String),
	/// A row value failed to encode against its schema
	#[error("Unable to encode row: {0}")]
	Encode(String),
	/// A remote call failed
	#[error("Remote call failed: {0}")]
	Rpc(String),
	/// The remote host closed the connection
	#[error("The remote host disconnected")]
	Disconnected,
	/// The operation did not complete in time
	#[error("The operation timed out")]
	Timeout,
	/// Writes are currently blocked by an in-flight snapshot
	#[error("Writes are blocked on space {0}")]
	WriteBlocked(i32),
	/// A conflicting index rebuild job is running
	#[error("An index rebuild is in progress")]
	IndexRebuilding,
	/// A backup was requested for a space that does not exist
	#[error("Backup space {0} was not found")]
	BackupSpaceNotFound(i32),
	/// The snapshot protocol failed and was rolled back
	#[error("Snapshot {0} failed: {1}")]
	SnapshotFailure(String, String),
	/// The requested snapshot record does not exist
	#[error("Snapshot {0} was not found")]
	SnapshotNotFound(String),
	/// A checkpoint could not be created or dropped
	#[error("Checkpoint error: {0}")]
	Checkpoint(String),
	/// The plan was killed by the session or an operator
	#[error("Query plan was killed")]
	PlanKilled,
	/// There are no active storage hosts to run the operation on
	#[error("There are no active storage hosts")]
	NoHosts,
	/// The transaction has already been committed or cancelled
	#[error("Couldn't update a finished transaction")]
	TxFinished,
	/// The transaction is read only
	#[error("Couldn't write to a read only transaction")]
	TxReadonly,
	/// A plan alias was bound twice
	#[error("Alias `{0}` is already bound in this query")]
	AliasShadowed(String),
	/// Two plan operators were connected with incompatible columns
	#[error("Operator `{0}` requires input column `{1}` which upstream does not produce")]
	ColumnMismatch(String, String),
	/// A pattern had no startable node or edge
	#[error("No starting point could be chosen for the pattern")]
	NoStartVid,
	/// A function call could not be resolved against the registry
	#[error("Unknown function `{0}`")]
	UnknownFunction(String),
	/// A function was called with the wrong number of arguments
	#[error("Function `{0}` expects {1} arguments")]
	FunctionArity(String, usize),
	/// An encoded expression failed to decode
	#[error("Unable to decode expression: {0}")]
	ExprDecode(String),
	/// An update lost its optimistic version check
	#[error("Version conflict on update")]
	VersionConflict,
	/// The configuration file could not be parsed
	#[error("Invalid configuration: {0}")]
	Config(String),
	/// A catch-all for storage engine misuse
	#[error("Datastore error: {0}")]
	Ds(String),
	/// The feature has not been implemented
	#[error("Feature not yet implemented: {0}")]
	Unimplemented(String),
	/// An error string raised by a downstream component
	#[error("{0}")]
	Thrown(String),
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Decode(e.to_string())
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Error::Ds(e.to_string())
	}
}

impl From<revision::Error> for Error {
	fn from(e: revision::Error) -> Self {
		Error::ExprDecode(e.to_string())
	}
}
