//! Isolation ranking
//!
//! An asset's anomaly score is `1 - s`, where `s` is its similarity to the
//! nearest asset other than itself. With no other asset in reach the score
//! is 1.0.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Settings, DEFAULT_ANOMALY_LIMIT};
use crate::core::{AnomalyRecord, AnomalyReport, Result, TenantId};
use crate::index::{Filter, ScrollPoint, SearchParams, SimilarityIndex};
use crate::metrics::{self, SharedMetrics};
use crate::processing::context::CallContext;
use crate::ui;

/// Self plus the nearest other point.
const NEIGHBORS: usize = 2;

pub struct AnomalyScan {
	filter: Filter,
	call_timeout: Duration,
	records: Vec<AnomalyRecord>,
	scanned: usize,
	skipped: usize,
}

impl AnomalyScan {
	pub fn new(tenant: TenantId) -> Self {
		Self {
			filter: Filter::tenant(tenant),
			call_timeout: Settings::default().index_timeout(),
			records: Vec::new(),
			scanned: 0,
			skipped: 0,
		}
	}

	pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
		self.call_timeout = timeout;
		self
	}

	pub fn filter(&self) -> &Filter {
		&self.filter
	}

	pub fn scanned(&self) -> usize {
		self.scanned
	}

	/// Score every point of one scrolled page.
	pub fn feed(
		&mut self,
		ctx: &CallContext,
		index: &dyn SimilarityIndex,
		metrics: &SharedMetrics,
		points: Vec<ScrollPoint>,
	) -> Result<()> {
		let params = SearchParams::new(&self.filter, NEIGHBORS);

		for point in points {
			ctx.check("anomaly scan")?;
			self.scanned += 1;

			let neighbors = match index.search_by_existing(&ctx.child(self.call_timeout), &point.asset_id, &params) {
				Ok(n) => n,
				Err(e) => {
					ctx.check("anomaly scan")?;
					ui::warn(&format!("Skipping anomaly score for {}: {}", point.asset_id, e));
					metrics.incr(metrics::ANOMALY_SKIPPED, 1);
					self.skipped += 1;
					continue;
				}
			};

			let nearest_other = neighbors
				.iter()
				.filter(|n| n.asset_id != point.asset_id)
				.map(|n| n.score)
				.fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))));

			self.records.push(AnomalyRecord {
				asset_id: point.asset_id,
				anomaly_score: anomaly_score(nearest_other),
				payload: point.payload,
			});
		}
		Ok(())
	}

	/// Most isolated first; equal scores fall back to asset id order.
	pub fn finish(mut self) -> AnomalyReport {
		self.records.sort_by(|a, b| {
			b.anomaly_score
				.partial_cmp(&a.anomaly_score)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.asset_id.cmp(&b.asset_id))
		});
		AnomalyReport {
			records: self.records,
			scanned: self.scanned,
			skipped: self.skipped,
		}
	}
}

fn anomaly_score(nearest_other: Option<f32>) -> f32 {
	match nearest_other {
		Some(s) => (1.0 - s).clamp(0.0, 1.0),
		None => 1.0,
	}
}

pub struct AnomalyScorer {
	index: Arc<dyn SimilarityIndex>,
	metrics: SharedMetrics,
	settings: Settings,
}

impl AnomalyScorer {
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

	/// Score at most `limit` assets of the tenant (0 uses the default).
	pub fn rank_anomalies(&self, ctx: &CallContext, tenant: &TenantId, limit: usize) -> Result<AnomalyReport> {
		let limit = if limit == 0 { DEFAULT_ANOMALY_LIMIT } else { limit };
		let mut scan = AnomalyScan::new(tenant.clone()).with_call_timeout(self.settings.index_timeout());

		let mut offset = None;
		while scan.scanned() < limit {
			ctx.check("anomaly scan")?;
			let want = (limit - scan.scanned()).min(self.settings.page_size);
			let page = self.index.scroll(
				&ctx.child(self.settings.index_timeout()),
				scan.filter(),
				want,
				offset,
				false,
			)?;
			let next = page.next_offset;
			scan.feed(ctx, self.index.as_ref(), &self.metrics, page.points)?;
			match next {
				Some(n) => offset = Some(n),
				None => break,
			}
		}

		Ok(scan.finish())
	}
}
