//! A minimal job registry: enough to refuse snapshots while an index
//! rebuild is running.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::ids::SpaceId;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobKind {
	RebuildTagIndex,
	RebuildEdgeIndex,
	Compact,
	Flush,
}

#[derive(Clone, Debug)]
pub struct JobDesc {
	pub id: i64,
	pub kind: JobKind,
	pub space: SpaceId,
}

#[derive(Default)]
pub struct JobManager {
	jobs: DashMap<i64, JobDesc>,
	next: AtomicI64,
}

impl JobManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn start(&self, kind: JobKind, space: SpaceId) -> i64 {
		let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
		self.jobs.insert(
			id,
			JobDesc {
				id,
				kind,
				space,
			},
		);
		id
	}

	pub fn finish(&self, id: i64) {
		self.jobs.remove(&id);
	}

	/// Is a tag or edge index rebuild currently running?
	pub fn index_job_running(&self) -> bool {
		self.jobs.iter().any(|j| {
			matches!(j.kind, JobKind::RebuildTagIndex | JobKind::RebuildEdgeIndex)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn index_jobs_block_snapshots() {
		let jobs = JobManager::new();
		assert!(!jobs.index_job_running());
		let compact = jobs.start(JobKind::Compact, 1);
		assert!(!jobs.index_job_running());
		let rebuild = jobs.start(JobKind::RebuildTagIndex, 1);
		assert!(jobs.index_job_running());
		jobs.finish(rebuild);
		assert!(!jobs.index_job_running());
		jobs.finish(compact);
	}
}
