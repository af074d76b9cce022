//! Near-duplicate clustering
//!
//! Greedy single-link clustering seeded from perceptual-hash buckets:
//!
//! 1. Candidates are grouped by a fixed-length prefix of their pHash.
//! 2. Buckets are walked in ascending prefix order, members in scroll order.
//! 3. Each unvisited member becomes a seed; its vector neighbors at or above
//!    the threshold that are still unvisited join its cluster.
//! 4. Clusters with fewer than two members are dropped.
//!
//! Buckets only choose seeds. Neighbors come from the whole tenant through the
//! index, so a near-duplicate in another bucket can still be found. The result
//! is not transitive: `a~b` and `b~c` never forces `a` and `c` together, and an
//! asset claimed by an earlier seed is never re-examined as a seed itself.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{
	Settings, DEFAULT_BUCKET_PREFIX, DEFAULT_DEDUP_LIMIT, DEFAULT_DEDUP_THRESHOLD, DEFAULT_NEIGHBOR_LIMIT,
};
use crate::core::{AssetId, ClusterMember, ClusterResult, DedupReport, Error, Result, TenantId};
use crate::index::{Filter, ScrollPoint, SearchParams, SimilarityIndex};
use crate::metrics::{self, SharedMetrics};
use crate::processing::context::CallContext;
use crate::ui;

#[derive(Debug, Clone, PartialEq)]
pub struct DedupOptions {
	/// Hard cap on candidates read for one interactive call
	pub limit: usize,
	pub similarity_threshold: f32,
	pub neighbor_limit: usize,
	/// Hex digits of the pHash used as bucket key
	pub prefix_len: usize,
}

impl Default for DedupOptions {
	fn default() -> Self {
		Self {
			limit: DEFAULT_DEDUP_LIMIT,
			similarity_threshold: DEFAULT_DEDUP_THRESHOLD,
			neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
			prefix_len: DEFAULT_BUCKET_PREFIX,
		}
	}
}

impl DedupOptions {
	pub fn from_settings(settings: &Settings) -> Self {
		Self {
			neighbor_limit: settings.neighbor_limit,
			prefix_len: settings.bucket_prefix_len,
			..Self::default()
		}
	}

	pub fn validate(&self) -> Result<()> {
		if self.limit == 0 {
			return Err(Error::Validation("dedup limit must be positive".into()));
		}
		if self.neighbor_limit == 0 {
			return Err(Error::Validation("neighbor limit must be positive".into()));
		}
		if !(-1.0..=1.0).contains(&self.similarity_threshold) {
			return Err(Error::Validation(format!(
				"similarity threshold {} outside [-1, 1]",
				self.similarity_threshold
			)));
		}
		if self.prefix_len == 0 || self.prefix_len > 16 {
			return Err(Error::Validation("bucket prefix must be 1..=16 hex digits".into()));
		}
		Ok(())
	}
}

/// Clustering state shared by the interactive call and the background job.
///
/// Candidates are collected first (cheap payload-only pages), then `run`
/// issues one neighbor query per seed.
pub struct DedupScan {
	filter: Filter,
	options: DedupOptions,
	call_timeout: Duration,
	buckets: BTreeMap<String, Vec<AssetId>>,
	scanned: usize,
}

impl DedupScan {
	pub fn new(tenant: TenantId, options: DedupOptions) -> Result<Self> {
		options.validate()?;
		Ok(Self {
			filter: Filter::tenant(tenant),
			options,
			call_timeout: Settings::default().index_timeout(),
			buckets: BTreeMap::new(),
			scanned: 0,
		})
	}

	pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
		self.call_timeout = timeout;
		self
	}

	pub fn filter(&self) -> &Filter {
		&self.filter
	}

	pub fn candidates(&self) -> usize {
		self.scanned
	}

	/// Add one scrolled page to the candidate set.
	pub fn feed(&mut self, points: &[ScrollPoint]) {
		for point in points {
			let key = point.payload.perceptual_hash.bucket_key(self.options.prefix_len);
			self.buckets.entry(key).or_default().push(point.asset_id);
		}
		self.scanned += points.len();
	}

	/// Walk the buckets and build clusters. `on_seed` receives the number of
	/// seeds processed so far.
	pub fn run(
		self,
		ctx: &CallContext,
		index: &dyn SimilarityIndex,
		metrics: &SharedMetrics,
		mut on_seed: impl FnMut(usize),
	) -> Result<DedupReport> {
		let params = SearchParams::new(&self.filter, self.options.neighbor_limit)
			.threshold(Some(self.options.similarity_threshold));

		let mut visited: HashSet<AssetId> = HashSet::new();
		let mut clusters = Vec::new();
		let mut skipped = 0;
		let mut seeds = 0;

		ui::debug(&format!(
			"Dedup: {} candidates in {} buckets",
			self.scanned,
			self.buckets.len()
		));

		for members in self.buckets.values() {
			for seed in members {
				if !visited.insert(*seed) {
					continue;
				}
				ctx.check("dedup")?;
				seeds += 1;

				let neighbors = match index.search_by_existing(&ctx.child(self.call_timeout), seed, &params) {
					Ok(n) => n,
					Err(e) => {
						// A per-call failure skips the seed; a dead caller ends the scan.
						ctx.check("dedup")?;
						ui::warn(&format!("Skipping dedup seed {}: {}", seed, e));
						metrics.incr(metrics::DEDUP_SKIPPED, 1);
						skipped += 1;
						on_seed(seeds);
						continue;
					}
				};

				let mut images = vec![ClusterMember {
					asset_id: *seed,
					score: 1.0,
				}];
				for n in neighbors {
					if n.asset_id != *seed && visited.insert(n.asset_id) {
						images.push(ClusterMember {
							asset_id: n.asset_id,
							score: n.score,
						});
					}
				}
				if images.len() >= 2 {
					clusters.push(ClusterResult { seed: *seed, images });
				}
				on_seed(seeds);
			}
		}

		Ok(DedupReport {
			clusters,
			scanned: self.scanned,
			skipped,
		})
	}
}

pub struct DeduplicationEngine {
	index: Arc<dyn SimilarityIndex>,
	metrics: SharedMetrics,
	settings: Settings,
}

impl DeduplicationEngine {
	pub fn new(index: Arc<dyn SimilarityIndex>) -> Self {
		Self {
			index,
			metrics: metrics::noop(),
			settings: Settings::default(),
		}
	}

	pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
		self.metrics = metrics;
		self
	}

	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = settings;
		self
	}

	/// Interactive clustering over at most `options.limit` candidates.
	pub fn deduplicate(&self, ctx: &CallContext, tenant: &TenantId, options: DedupOptions) -> Result<DedupReport> {
		let limit = options.limit;
		let mut scan = DedupScan::new(tenant.clone(), options)?.with_call_timeout(self.settings.index_timeout());

		let mut offset = None;
		while scan.candidates() < limit {
			ctx.check("dedup")?;
			let want = (limit - scan.candidates()).min(self.settings.page_size);
			let page = self.index.scroll(
				&ctx.child(self.settings.index_timeout()),
				scan.filter(),
				want,
				offset,
				false,
			)?;
			scan.feed(&page.points);
			match page.next_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		scan.run(ctx, self.index.as_ref(), &self.metrics, |_| {})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_options_are_valid() {
		assert!(DedupOptions::default().validate().is_ok());
	}

	#[test]
	fn rejects_out_of_range_options() {
		let bad = [
			DedupOptions { limit: 0, ..Default::default() },
			DedupOptions { neighbor_limit: 0, ..Default::default() },
			DedupOptions { similarity_threshold: 1.5, ..Default::default() },
			DedupOptions { prefix_len: 17, ..Default::default() },
		];
		for options in bad {
			assert!(matches!(options.validate(), Err(Error::Validation(_))), "{:?}", options);
		}
	}

	#[test]
	fn settings_override_bucket_and_neighbor_limits() {
		let settings = Settings {
			bucket_prefix_len: 4,
			neighbor_limit: 3,
			..Settings::default()
		};
		let options = DedupOptions::from_settings(&settings);
		assert_eq!(options.prefix_len, 4);
		assert_eq!(options.neighbor_limit, 3);
		assert_eq!(options.similarity_threshold, DEFAULT_DEDUP_THRESHOLD);
	}
}
