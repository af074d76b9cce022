//! Background scans
//!
//! Dedup and anomaly scans over large tenants run on a worker thread that
//! pages through the index with scroll cursors. The caller keeps a
//! `JobHandle` to poll progress, wait for the report, or cancel.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

use crate::config::Settings;
use crate::core::{AnomalyReport, DedupReport, Error, Result, TenantId};
use crate::index::{Filter, ScrollPage, SimilarityIndex};
use crate::metrics::{self, SharedMetrics};
use crate::processing::anomaly::AnomalyScan;
use crate::processing::context::{CallContext, CancelToken};
use crate::processing::dedup::{DedupOptions, DedupScan};
use crate::ui;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobOutput {
	Dedup(DedupReport),
	Anomalies(AnomalyReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
	Running { scanned: usize },
	Done,
	Failed(String),
	Cancelled,
}

impl JobStatus {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, JobStatus::Running { .. })
	}
}

enum JobEvent {
	Progress(usize),
	Finished(Result<JobOutput>),
}

pub struct JobHandle {
	id: Uuid,
	kind: &'static str,
	events: Receiver<JobEvent>,
	cancel: CancelToken,
	status: JobStatus,
	outcome: Option<Result<JobOutput>>,
	worker: Option<JoinHandle<()>>,
}

impl JobHandle {
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Drain pending events and return the latest status without blocking.
	pub fn poll(&mut self) -> &JobStatus {
		while let Ok(event) = self.events.try_recv() {
			self.apply(event);
		}
		if !self.status.is_terminal() && self.events.is_empty() && self.worker_gone() {
			self.status = JobStatus::Failed("worker exited without a result".into());
		}
		&self.status
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Block until the worker finishes.
	pub fn wait(mut self) -> Result<JobOutput> {
		while self.outcome.is_none() {
			match self.events.recv() {
				Ok(event) => self.apply(event),
				Err(_) => break,
			}
		}
		if let Some(worker) = self.worker.take() {
			if worker.join().is_err() {
				return Err(Error::Job(format!("{} job {} panicked", self.kind, self.id)));
			}
		}
		self.outcome
			.take()
			.unwrap_or_else(|| Err(Error::Job(format!("{} job {} exited without a result", self.kind, self.id))))
	}

	fn apply(&mut self, event: JobEvent) {
		match event {
			JobEvent::Progress(scanned) => {
				if !self.status.is_terminal() {
					self.status = JobStatus::Running { scanned };
				}
			}
			JobEvent::Finished(result) => {
				self.status = match &result {
					Ok(_) => JobStatus::Done,
					Err(Error::Cancelled(_)) => JobStatus::Cancelled,
					Err(e) => JobStatus::Failed(e.to_string()),
				};
				self.outcome = Some(result);
			}
		}
	}

	fn worker_gone(&self) -> bool {
		self.worker.as_ref().map_or(true, |w| w.is_finished())
	}
}

impl Drop for JobHandle {
	fn drop(&mut self) {
		if !self.status.is_terminal() {
			self.cancel.cancel();
		}
	}
}

/// Spawns scans against a shared index.
#[derive(Clone)]
pub struct JobRunner {
	index: Arc<dyn SimilarityIndex>,
	metrics: SharedMetrics,
	settings: Settings,
}

impl JobRunner {
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

	/// Cluster the whole tenant, or the first `settings.max_scan_candidates`.
	/// `options.limit` is ignored here; the settings cap applies instead.
	pub fn spawn_dedup(&self, tenant: TenantId, options: DedupOptions) -> Result<JobHandle> {
		let scan = DedupScan::new(tenant, options)?.with_call_timeout(self.settings.index_timeout());
		let runner = self.clone();

		self.spawn("dedup", move |ctx, tx| {
			let mut scan = scan;
			runner.pages(ctx, scan.filter().clone(), |page| {
				scan.feed(&page.points);
				let _ = tx.send(JobEvent::Progress(scan.candidates()));
				Ok(scan.candidates())
			})?;
			let candidates = scan.candidates();
			let report = scan.run(ctx, runner.index.as_ref(), &runner.metrics, |seeds| {
				if seeds % 64 == 0 {
					let _ = tx.send(JobEvent::Progress(candidates));
				}
			})?;
			Ok(JobOutput::Dedup(report))
		})
	}

	pub fn spawn_anomalies(&self, tenant: TenantId) -> Result<JobHandle> {
		let scan = AnomalyScan::new(tenant).with_call_timeout(self.settings.index_timeout());
		let runner = self.clone();

		self.spawn("anomalies", move |ctx, tx| {
			let mut scan = scan;
			runner.pages(ctx, scan.filter().clone(), |page| {
				scan.feed(ctx, runner.index.as_ref(), &runner.metrics, page.points)?;
				let _ = tx.send(JobEvent::Progress(scan.scanned()));
				Ok(scan.scanned())
			})?;
			Ok(JobOutput::Anomalies(scan.finish()))
		})
	}

	fn spawn<F>(&self, kind: &'static str, work: F) -> Result<JobHandle>
	where
		F: FnOnce(&CallContext, &Sender<JobEvent>) -> Result<JobOutput> + Send + 'static,
	{
		let id = Uuid::new_v4();
		let cancel = CancelToken::new();
		let ctx = CallContext::background().with_cancel(cancel.clone());
		let (tx, rx) = unbounded();

		let worker = thread::Builder::new()
			.name(format!("glimpse-{}-{}", kind, &id.simple().to_string()[..8]))
			.spawn(move || {
				ui::log::timed(kind, &format!("job {} started", id));
				let result = work(&ctx, &tx);
				match &result {
					Ok(_) => ui::log::timed(kind, &format!("job {} finished", id)),
					Err(e) => ui::log::timed(kind, &format!("job {} stopped: {}", id, e)),
				}
				let _ = tx.send(JobEvent::Finished(result));
			})
			.map_err(|e| Error::Job(format!("failed to start {} worker: {}", kind, e)))?;

		Ok(JobHandle {
			id,
			kind,
			events: rx,
			cancel,
			status: JobStatus::Running { scanned: 0 },
			outcome: None,
			worker: Some(worker),
		})
	}

	/// Scroll the tenant page by page until exhausted or the candidate cap
	/// is reached. `visit` returns the running candidate count.
	fn pages(
		&self,
		ctx: &CallContext,
		filter: Filter,
		mut visit: impl FnMut(ScrollPage) -> Result<usize>,
	) -> Result<()> {
		let cap = self.settings.max_scan_candidates;
		let mut seen = 0;
		let mut offset = None;

		loop {
			ctx.check("background scan")?;
			let want = match cap {
				Some(cap) if seen >= cap => break,
				Some(cap) => (cap - seen).min(self.settings.page_size),
				None => self.settings.page_size,
			};
			let page = self.index.scroll(
				&ctx.child(self.settings.index_timeout()),
				&filter,
				want,
				offset,
				false,
			)?;
			let next = page.next_offset;
			seen = visit(page)?;
			match next {
				Some(n) => offset = Some(n),
				None => break,
			}
		}
		Ok(())
	}
}
