//! Injected metrics sink
//!
//! Components take an `Arc<dyn MetricsSink>` at construction instead of
//! reaching for a process-wide registry. `CounterMetrics` registers its
//! vectors on a `prometheus::Registry` owned by the caller.

use std::sync::Arc;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

pub const INGEST_TOTAL: &str = "ingest_total";
pub const INGEST_DEDUPLICATED: &str = "ingest_deduplicated_total";
pub const AUDIT_FAILURES: &str = "audit_write_failures_total";
pub const EMBED_SECONDS: &str = "embed_seconds";
pub const SEARCH_SECONDS: &str = "search_seconds";
pub const DEDUP_SKIPPED: &str = "dedup_skipped_total";
pub const ANOMALY_SKIPPED: &str = "anomaly_skipped_total";

pub trait MetricsSink: Send + Sync {
	fn incr(&self, name: &'static str, by: u64);
	fn observe(&self, name: &'static str, seconds: f64);
}

pub type SharedMetrics = Arc<dyn MetricsSink>;

pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
	fn incr(&self, _name: &'static str, _by: u64) {}
	fn observe(&self, _name: &'static str, _seconds: f64) {}
}

pub fn noop() -> SharedMetrics {
	Arc::new(NoopMetrics)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Histogram {
	pub count: u64,
	pub sum: f64,
}

/// Event counters and durations, one label value per metric name.
pub struct CounterMetrics {
	registry: Registry,
	events: IntCounterVec,
	durations: HistogramVec,
}

impl CounterMetrics {
	/// Sink on a fresh registry of its own.
	pub fn new() -> prometheus::Result<Self> {
		Self::with_registry(Registry::new())
	}

	pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
		let events = IntCounterVec::new(
			Opts::new("glimpse_events_total", "count of ingest and scan events"),
			&["metric"],
		)?;
		let durations = HistogramVec::new(
			HistogramOpts::new("glimpse_duration_seconds", "duration of embedding and search calls"),
			&["metric"],
		)?;
		registry.register(Box::new(events.clone()))?;
		registry.register(Box::new(durations.clone()))?;

		Ok(Self {
			registry,
			events,
			durations,
		})
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn counter(&self, name: &str) -> u64 {
		self.events
			.get_metric_with_label_values(&[name])
			.map(|c| c.get())
			.unwrap_or(0)
	}

	pub fn histogram(&self, name: &str) -> Histogram {
		self.durations
			.get_metric_with_label_values(&[name])
			.map(|h| Histogram {
				count: h.get_sample_count(),
				sum: h.get_sample_sum(),
			})
			.unwrap_or_default()
	}

	/// Text exposition of everything on the registry.
	pub fn render(&self) -> prometheus::Result<String> {
		let mut buffer = Vec::new();
		TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
		Ok(String::from_utf8_lossy(&buffer).into_owned())
	}
}

impl MetricsSink for CounterMetrics {
	fn incr(&self, name: &'static str, by: u64) {
		self.events.with_label_values(&[name]).inc_by(by);
	}

	fn observe(&self, name: &'static str, seconds: f64) {
		self.durations.with_label_values(&[name]).observe(seconds);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counters_accumulate() {
		let m = CounterMetrics::new().unwrap();
		m.incr(INGEST_TOTAL, 1);
		m.incr(INGEST_TOTAL, 2);
		m.observe(SEARCH_SECONDS, 0.5);
		m.observe(SEARCH_SECONDS, 1.5);
		assert_eq!(m.counter(INGEST_TOTAL), 3);
		assert_eq!(m.counter(DEDUP_SKIPPED), 0);
		assert_eq!(m.histogram(SEARCH_SECONDS), Histogram { count: 2, sum: 2.0 });
	}

	#[test]
	fn sinks_on_separate_registries_do_not_share_state() {
		let a = CounterMetrics::new().unwrap();
		let b = CounterMetrics::new().unwrap();
		a.incr(DEDUP_SKIPPED, 4);
		assert_eq!(a.counter(DEDUP_SKIPPED), 4);
		assert_eq!(b.counter(DEDUP_SKIPPED), 0);
	}

	#[test]
	fn injected_registry_exposes_the_vectors() {
		let registry = Registry::new();
		let m = CounterMetrics::with_registry(registry.clone()).unwrap();
		m.incr(INGEST_TOTAL, 1);

		let text = m.render().unwrap();
		assert!(text.contains("glimpse_events_total{metric=\"ingest_total\"} 1"));
	}

	#[test]
	fn registering_twice_on_one_registry_fails() {
		let registry = Registry::new();
		let _first = CounterMetrics::with_registry(registry.clone()).unwrap();
		assert!(CounterMetrics::with_registry(registry).is_err());
	}
}
