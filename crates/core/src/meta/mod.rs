//! The metadata service: the authoritative catalog, its cached
//! snapshots, the job registry and the snapshot coordinator.

pub mod cache;
pub mod catalog;
pub mod jobs;
pub mod schema;
pub mod snapshot;

pub use self::cache::MetaCache;
pub use self::cache::MetaSnapshot;
pub use self::cache::SpaceInfo;
pub use self::catalog::Catalog;
pub use self::jobs::JobKind;
pub use self::jobs::JobManager;
pub use self::snapshot::SnapshotCoordinator;
pub use self::snapshot::SnapshotRecord;
