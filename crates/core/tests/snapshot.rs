//! The snapshot protocol: the happy path, the rollback paths, and the
//! index-rebuild guard.

mod common;

use async_trait::async_trait;

use quasar_core::err::Error;
use quasar_core::ids::{HostAddr, SpaceId};
use quasar_core::key::system::SnapshotStatus;
use quasar_core::meta::jobs::JobKind;
use quasar_core::meta::SnapshotCoordinator;
use quasar_core::rpc::{BlockSign, CheckpointStats, GraphStorage, StorageAdmin};

/// Wraps the real cluster, failing one chosen step on one chosen host.
struct FaultyAdmin<'a> {
	inner: &'a quasar_core::store::LocalCluster,
	fail_checkpoint_on: Option<HostAddr>,
	fail_block_on: Option<HostAddr>,
}

#[async_trait]
impl StorageAdmin for FaultyAdmin<'_> {
	async fn blocking_writes(
		&self,
		host: &HostAddr,
		spaces: &[SpaceId],
		sign: BlockSign,
	) -> Result<(), Error> {
		if sign == BlockSign::BlockOn && self.fail_block_on.as_ref() == Some(host) {
			return Err(Error::Rpc("injected blocking failure".to_string()));
		}
		self.inner.blocking_writes(host, spaces, sign).await
	}

	async fn create_checkpoint(
		&self,
		host: &HostAddr,
		spaces: &[SpaceId],
		name: &str,
	) -> Result<Vec<CheckpointStats>, Error> {
		if self.fail_checkpoint_on.as_ref() == Some(host) {
			return Err(Error::Checkpoint("injected checkpoint failure".to_string()));
		}
		self.inner.create_checkpoint(host, spaces, name).await
	}

	async fn drop_checkpoint(
		&self,
		host: &HostAddr,
		spaces: &[SpaceId],
		name: &str,
	) -> Result<(), Error> {
		self.inner.drop_checkpoint(host, spaces, name).await
	}

	async fn clear_space(&self, host: &HostAddr, space: SpaceId) -> Result<(), Error> {
		self.inner.clear_space(host, space).await
	}
}

#[tokio::test]
async fn snapshot_happy_path() {
	let (tc, space) = common::cluster(3, 3);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let coordinator = SnapshotCoordinator::new(tc.catalog.clone(), tc.jobs.clone());
	let created = coordinator.create_snapshot(tc.cluster.as_ref()).await.unwrap();

	// Exactly one VALID record listing all three hosts
	let records = coordinator.list_snapshots().unwrap();
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].name, created.name);
	assert_eq!(records[0].status, SnapshotStatus::Valid);
	let mut hosts: Vec<String> = tc.nodes.iter().map(|n| n.addr.clone()).collect();
	hosts.sort();
	assert_eq!(records[0].hosts, hosts);

	// Each participating partition has a checkpoint directory
	for node in &tc.nodes {
		for part in node.engine(space.id).unwrap().part_ids() {
			let dir = node.checkpoint_dir(space.id, part).join(&created.name);
			assert!(dir.exists(), "missing checkpoint at {dir:?}");
		}
		// Writes are unblocked again
		assert!(!node.engine(space.id).unwrap().is_blocked());
	}

	// The response reports per-partition log positions for the space
	let backups = &created.spaces[&space.id];
	let parts: usize = backups.iter().flat_map(|b| &b.checkpoints).map(|c| c.parts.len()).sum();
	assert_eq!(parts, 3);

	// Dropping removes the record and the checkpoint directories
	coordinator.drop_snapshot(&created.name, tc.cluster.as_ref()).await.unwrap();
	assert!(coordinator.list_snapshots().unwrap().is_empty());
	for node in &tc.nodes {
		for part in node.engine(space.id).unwrap().part_ids() {
			assert!(!node.checkpoint_dir(space.id, part).join(&created.name).exists());
		}
	}
}

#[tokio::test]
async fn checkpoint_failure_unblocks_and_leaves_invalid_record() {
	let (tc, space) = common::cluster(3, 3);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let coordinator = SnapshotCoordinator::new(tc.catalog.clone(), tc.jobs.clone());
	let admin = FaultyAdmin {
		inner: tc.cluster.as_ref(),
		fail_checkpoint_on: Some(tc.nodes[2].addr.clone()),
		fail_block_on: None,
	};
	let err = coordinator.create_snapshot(&admin).await.unwrap_err();
	assert!(matches!(err, Error::SnapshotFailure(..)));

	// No partition is left blocking writes
	for node in &tc.nodes {
		assert!(!node.engine(space.id).unwrap().is_blocked());
	}
	// The record survives as INVALID and a drop cleans it up
	let records = coordinator.list_snapshots().unwrap();
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].status, SnapshotStatus::Invalid);
	let name = records[0].name.clone();
	coordinator.drop_snapshot(&name, tc.cluster.as_ref()).await.unwrap();
	assert!(coordinator.list_snapshots().unwrap().is_empty());
}

#[tokio::test]
async fn blocking_failure_rolls_back() {
	let (tc, space) = common::cluster(3, 3);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let coordinator = SnapshotCoordinator::new(tc.catalog.clone(), tc.jobs.clone());
	let admin = FaultyAdmin {
		inner: tc.cluster.as_ref(),
		fail_checkpoint_on: None,
		fail_block_on: Some(tc.nodes[1].addr.clone()),
	};
	let err = coordinator.create_snapshot(&admin).await.unwrap_err();
	assert!(matches!(err, Error::SnapshotFailure(..)));
	for node in &tc.nodes {
		assert!(!node.engine(space.id).unwrap().is_blocked());
	}
	// No checkpoint directory was ever created
	for node in &tc.nodes {
		for part in node.engine(space.id).unwrap().part_ids() {
			let dir = node.checkpoint_dir(space.id, part);
			let children = std::fs::read_dir(&dir)
				.map(|entries| entries.count())
				.unwrap_or(0);
			assert_eq!(children, 0, "unexpected checkpoint under {dir:?}");
		}
	}
}

#[tokio::test]
async fn index_rebuild_blocks_snapshots() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);
	common::seed_people(&tc, &space, person, like).await;

	let coordinator = SnapshotCoordinator::new(tc.catalog.clone(), tc.jobs.clone());
	let job = tc.jobs.start(JobKind::RebuildTagIndex, space.id);
	let err = coordinator.create_snapshot(tc.cluster.as_ref()).await.unwrap_err();
	assert!(matches!(err, Error::IndexRebuilding));
	assert!(coordinator.list_snapshots().unwrap().is_empty());

	tc.jobs.finish(job);
	assert!(coordinator.create_snapshot(tc.cluster.as_ref()).await.is_ok());
}

#[tokio::test]
async fn writes_fail_while_blocked() {
	let (tc, space) = common::cluster(1, 1);
	let (person, like) = common::person_like(&tc, space.id);

	tc.cluster
		.blocking_writes(&tc.nodes[0].addr.clone(), &[space.id], BlockSign::BlockOn)
		.await
		.unwrap();
	let resp = tc
		.cluster
		.add_vertices(common::vertices_request(&space, person, &[(9, "Ann", 1)], false))
		.await
		.unwrap();
	assert!(!resp.common.ok());
	assert_eq!(
		resp.common.failed_parts[0].code,
		quasar_core::rpc::ErrorCode::WriteBlocked
	);

	tc.cluster
		.blocking_writes(&tc.nodes[0].addr.clone(), &[space.id], BlockSign::BlockOff)
		.await
		.unwrap();
	let resp = tc
		.cluster
		.add_edges(common::edges_request(&space, like, &[]))
		.await
		.unwrap();
	assert!(resp.common.ok());
}

#[tokio::test]
async fn backup_rejects_unknown_spaces() {
	let (tc, _space) = common::cluster(1, 1);
	let coordinator = SnapshotCoordinator::new(tc.catalog.clone(), tc.jobs.clone());
	let err = coordinator.create_backup(Some(vec![999]), tc.cluster.as_ref()).await.unwrap_err();
	assert!(matches!(err, Error::BackupSpaceNotFound(999)));
}
