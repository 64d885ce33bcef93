//! The process-wide processor metrics registry.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Upper bounds of the latency buckets, in microseconds.
const BUCKETS: [u64; 5] = [1_000, 10_000, 100_000, 1_000_000, u64::MAX];

#[derive(Default)]
pub struct ProcessorStats {
	pub calls: AtomicU64,
	pub errors: AtomicU64,
	pub latency_sum_us: AtomicU64,
	buckets: [AtomicU64; 5],
}

impl ProcessorStats {
	/// The count in each latency bucket: <1ms, <10ms, <100ms, <1s, rest.
	pub fn histogram(&self) -> [u64; 5] {
		[
			self.buckets[0].load(Ordering::Relaxed),
			self.buckets[1].load(Ordering::Relaxed),
			self.buckets[2].load(Ordering::Relaxed),
			self.buckets[3].load(Ordering::Relaxed),
			self.buckets[4].load(Ordering::Relaxed),
		]
	}
}

static REGISTRY: Lazy<DashMap<&'static str, ProcessorStats>> = Lazy::new(DashMap::new);

/// Record one processor invocation.
pub fn record(name: &'static str, elapsed: Duration, ok: bool) {
	let stats = REGISTRY.entry(name).or_default();
	stats.calls.fetch_add(1, Ordering::Relaxed);
	if !ok {
		stats.errors.fetch_add(1, Ordering::Relaxed);
	}
	let us = elapsed.as_micros() as u64;
	stats.latency_sum_us.fetch_add(us, Ordering::Relaxed);
	let idx = BUCKETS.iter().position(|&b| us < b).unwrap_or(BUCKETS.len() - 1);
	stats.buckets[idx].fetch_add(1, Ordering::Relaxed);
}

/// Read a processor's counters: `(calls, errors)`.
pub fn snapshot(name: &str) -> Option<(u64, u64)> {
	REGISTRY.get(name).map(|s| {
		(s.calls.load(Ordering::Relaxed), s.errors.load(Ordering::Relaxed))
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counters_accumulate() {
		record("test_proc", Duration::from_micros(10), true);
		record("test_proc", Duration::from_millis(50), false);
		let (calls, errors) = snapshot("test_proc").unwrap();
		assert_eq!(calls, 2);
		assert_eq!(errors, 1);
		let hist = REGISTRY.get("test_proc").unwrap().histogram();
		assert_eq!(hist[0], 1);
		assert_eq!(hist[2], 1);
	}
}
