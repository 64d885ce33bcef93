//! The cluster-wide snapshot and backup coordinator.
//!
//! A snapshot walks a linear protocol: record `INVALID`, block writes
//! everywhere, checkpoint everywhere, unblock writes, flip the record
//! to `VALID`. The only reversible side effect is the write block, and
//! the unblock broadcast runs on every failure path.

use tracing::instrument;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::err::Error;
use crate::ids::{HostAddr, SpaceId};
use crate::key::system::SnapshotStatus;
use crate::meta::catalog::Catalog;
use crate::meta::jobs::JobManager;
use crate::rpc::{BlockSign, HostBackup, StorageAdmin};

/// A registry entry as reported to admins.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotRecord {
	pub name: String,
	pub status: SnapshotStatus,
	pub hosts: Vec<HostAddr>,
}

/// What a successful snapshot or backup returns: per space, the
/// checkpoints each host produced.
#[derive(Clone, Debug, Default)]
pub struct SnapshotCreated {
	pub name: String,
	pub spaces: HashMap<SpaceId, Vec<HostBackup>>,
}

pub struct SnapshotCoordinator {
	catalog: Arc<Catalog>,
	jobs: Arc<JobManager>,
	// Write-exclusive: one snapshot-class operation at a time
	lock: RwLock<()>,
}

impl SnapshotCoordinator {
	pub fn new(catalog: Arc<Catalog>, jobs: Arc<JobManager>) -> Self {
		Self {
			catalog,
			jobs,
			lock: RwLock::new(()),
		}
	}

	/// Create a snapshot of every space.
	#[instrument(level = "debug", skip(self, client))]
	pub async fn create_snapshot(
		&self,
		client: &dyn StorageAdmin,
	) -> Result<SnapshotCreated, Error> {
		let name = format!("SNAPSHOT_{}", chrono::Utc::now().format("%Y_%m_%d_%H_%M_%S%.3f"));
		self.create_named(&name, None, client).await
	}

	/// Create a backup restricted to the given spaces.
	#[instrument(level = "debug", skip(self, client))]
	pub async fn create_backup(
		&self,
		spaces: Option<Vec<SpaceId>>,
		client: &dyn StorageAdmin,
	) -> Result<SnapshotCreated, Error> {
		if let Some(ids) = &spaces {
			for id in ids {
				self.catalog.space(*id).map_err(|_| Error::BackupSpaceNotFound(*id))?;
			}
		}
		let name = format!("BACKUP_{}", chrono::Utc::now().format("%Y_%m_%d_%H_%M_%S%.3f"));
		self.create_named(&name, spaces, client).await
	}

	async fn create_named(
		&self,
		name: &str,
		spaces: Option<Vec<SpaceId>>,
		client: &dyn StorageAdmin,
	) -> Result<SnapshotCreated, Error> {
		// Not allowed while an index rebuild is running
		if self.jobs.index_job_running() {
			info!("Index is rebuilding, not allowed to create snapshot");
			return Err(Error::IndexRebuilding);
		}
		let _guard = self.lock.write();

		let hosts = self.catalog.active_hosts()?;
		if hosts.is_empty() {
			info!("There are no active hosts");
			return Err(Error::NoHosts);
		}
		let host_spaces = self.host_spaces(&spaces)?;

		// Step 1: record the snapshot as INVALID so a later failure is
		// visible and can be dropped
		self.catalog.put_snapshot(name, SnapshotStatus::Invalid, &hosts)?;

		// Step 2: block writes on every participating host
		if let Err(e) = self.blocking_writes(&host_spaces, BlockSign::BlockOn, client).await {
			warn!("Send blocking sign to storage engine error: {e}");
			self.cancel_write_blocking(&host_spaces, client).await;
			return Err(Error::SnapshotFailure(name.to_string(), e.to_string()));
		}

		// Step 3: create the checkpoints
		let result = self.checkpoints(name, &host_spaces, client).await;

		// Step 4: release the write blocking regardless of the outcome
		self.cancel_write_blocking(&host_spaces, client).await;

		match result {
			Ok(spaces) => {
				// Step 5: flip the record to VALID
				self.catalog.put_snapshot(name, SnapshotStatus::Valid, &hosts)?;
				info!("Created snapshot {name}");
				Ok(SnapshotCreated {
					name: name.to_string(),
					spaces,
				})
			}
			Err(e) => {
				warn!("Checkpoint create error on storage engine: {e}");
				// Best-effort cleanup; the INVALID record stays behind
				// for an explicit DropSnapshot
				for (host, spaces) in &host_spaces {
					if let Err(e) = client.drop_checkpoint(host, spaces, name).await {
						info!("failed to drop checkpoint {name} on host {host}: {e}");
					}
				}
				Err(Error::SnapshotFailure(name.to_string(), e.to_string()))
			}
		}
	}

	/// Drop a snapshot: drop each host's checkpoint, then the record.
	#[instrument(level = "debug", skip(self, client))]
	pub async fn drop_snapshot(
		&self,
		name: &str,
		client: &dyn StorageAdmin,
	) -> Result<(), Error> {
		let _guard = self.lock.write();
		let record = self
			.catalog
			.snapshot(name)?
			.ok_or_else(|| Error::SnapshotNotFound(name.to_string()))?;
		let host_spaces = self.host_spaces(&None)?;
		for (host, spaces) in &host_spaces {
			// Only hosts recorded at creation time participate
			if !record.hosts.contains(host) {
				continue;
			}
			if let Err(e) = client.drop_checkpoint(host, spaces, name).await {
				// Not retried; DropSnapshot is safe to re-issue
				info!("failed to drop checkpoint {name} on host {host}: {e}");
			}
		}
		self.catalog.remove_snapshot(name)
	}

	/// Drop several snapshots; the first failure wins, later names are
	/// still attempted.
	pub async fn drop_snapshots(
		&self,
		names: &[String],
		client: &dyn StorageAdmin,
	) -> Result<(), Error> {
		let mut first_err = None;
		for name in names {
			if let Err(e) = self.drop_snapshot(name, client).await {
				warn!("failed to drop snapshot {name}: {e}");
				first_err.get_or_insert(e);
			}
		}
		match first_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	/// The registry, for `ListSnapshots`.
	pub fn list_snapshots(&self) -> Result<Vec<SnapshotRecord>, Error> {
		Ok(self
			.catalog
			.list_snapshots()?
			.into_iter()
			.map(|e| SnapshotRecord {
				name: e.name,
				status: e.status,
				hosts: e.hosts,
			})
			.collect())
	}

	// Which spaces each host must participate for, derived from the
	// partition map and optionally restricted to target spaces.
	fn host_spaces(
		&self,
		filter: &Option<Vec<SpaceId>>,
	) -> Result<Vec<(HostAddr, Vec<SpaceId>)>, Error> {
		let mut out = Vec::new();
		for (host, spaces) in self.catalog.host_spaces()? {
			let spaces: Vec<SpaceId> = match filter {
				Some(wanted) => spaces.into_iter().filter(|s| wanted.contains(s)).collect(),
				None => spaces,
			};
			if !spaces.is_empty() {
				out.push((host, spaces));
			}
		}
		Ok(out)
	}

	async fn blocking_writes(
		&self,
		host_spaces: &[(HostAddr, Vec<SpaceId>)],
		sign: BlockSign,
		client: &dyn StorageAdmin,
	) -> Result<(), Error> {
		for (host, spaces) in host_spaces {
			debug!("sending blocking sign {sign:?} to host {host}");
			client.blocking_writes(host, spaces, sign).await?;
		}
		Ok(())
	}

	// The unconditional unblock. A failure here is logged and swallowed.
	async fn cancel_write_blocking(
		&self,
		host_spaces: &[(HostAddr, Vec<SpaceId>)],
		client: &dyn StorageAdmin,
	) {
		for (host, spaces) in host_spaces {
			if let Err(e) = client.blocking_writes(host, spaces, BlockSign::BlockOff).await {
				warn!("Cancel write blocking error on host {host}: {e}");
			}
		}
	}

	async fn checkpoints(
		&self,
		name: &str,
		host_spaces: &[(HostAddr, Vec<SpaceId>)],
		client: &dyn StorageAdmin,
	) -> Result<HashMap<SpaceId, Vec<HostBackup>>, Error> {
		let mut info: HashMap<SpaceId, Vec<HostBackup>> = HashMap::new();
		for (host, spaces) in host_spaces {
			let stats = client.create_checkpoint(host, spaces, name).await?;
			// Split this host's checkpoints by space
			let mut per_space: HashMap<SpaceId, HostBackup> = HashMap::new();
			for ck in stats {
				per_space
					.entry(ck.space)
					.or_insert_with(|| HostBackup {
						host: host.clone(),
						checkpoints: Vec::new(),
					})
					.checkpoints
					.push(ck);
			}
			for (space, backup) in per_space {
				info.entry(space).or_default().push(backup);
			}
		}
		Ok(info)
	}
}
