//! # Command Implementations
//!
//! Each submodule handles one CLI command. `Workspace` wires the library
//! services to the on-disk state under the data directory.

pub mod anomalies;
pub mod dedup;
pub mod feedback;
pub mod ingest;
pub mod manage;
pub mod search;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, Settings, AUDIT_FILE, FEEDBACK_FILE, INDEX_FILE, OBJECTS_DIR};
use crate::core::{AssetId, TenantId};
use crate::index::{CollectionSchema, Filter, MemoryIndex, SimilarityIndex};
use crate::metrics::CounterMetrics;
use crate::models::{EmbeddingProvider, OnnxEmbedder};
use crate::processing::{CallContext, CancelToken, IngestionCoordinator};
use crate::storage::{FsObjectStore, JsonlLog};
use crate::ui;

pub struct Workspace {
	pub root: PathBuf,
	pub tenant: TenantId,
	pub settings: Settings,
	pub index: Arc<MemoryIndex>,
	pub objects: Arc<FsObjectStore>,
	pub audit: Arc<JsonlLog>,
	pub feedback: Arc<JsonlLog>,
	pub metrics: Arc<CounterMetrics>,
	/// Shared by every call this run makes; Ctrl-C trips it.
	pub cancel: CancelToken,
}

impl Workspace {
	pub fn open(tenant: &str, settings: Settings) -> Result<Self> {
		Self::at(config::data_dir(), tenant, settings)
	}

	pub fn at(root: PathBuf, tenant: &str, settings: Settings) -> Result<Self> {
		let tenant = TenantId::new(tenant).context("Invalid --tenant")?;
		let index = MemoryIndex::open(&root.join(INDEX_FILE), CollectionSchema::default())?;

		ui::debug(&format!(
			"Workspace {} ({} points, tenant {})",
			root.display(),
			index.len(),
			tenant
		));

		let metrics = CounterMetrics::new().context("Failed to set up metrics")?;

		Ok(Self {
			objects: Arc::new(FsObjectStore::new(root.join(OBJECTS_DIR))),
			audit: Arc::new(JsonlLog::new(root.join(AUDIT_FILE))),
			feedback: Arc::new(JsonlLog::new(root.join(FEEDBACK_FILE))),
			index: Arc::new(index),
			metrics: Arc::new(metrics),
			cancel: CancelToken::new(),
			root,
			tenant,
			settings,
		})
	}

	/// Persist the index snapshot.
	pub fn save(&self) -> Result<()> {
		self.index.save(&self.root.join(INDEX_FILE))
	}

	/// Loaded lazily: commands that never embed never touch the models.
	pub fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
		Ok(Arc::new(OnnxEmbedder::new()?))
	}

	pub fn coordinator(&self) -> IngestionCoordinator {
		IngestionCoordinator::new(self.objects.clone(), self.index.clone(), self.audit.clone())
			.with_metrics(self.metrics.clone())
			.with_settings(self.settings.clone())
	}

	pub fn context(&self) -> CallContext {
		CallContext::background().with_cancel(self.cancel.clone())
	}

	/// First Ctrl-C cancels in-flight calls, a second one exits.
	pub fn cancel_on_interrupt(&self) -> Result<()> {
		let cancel = self.cancel.clone();
		ctrlc::set_handler(move || {
			if cancel.is_cancelled() {
				std::process::exit(130);
			}
			ui::warn("Interrupted, stopping after the current item");
			cancel.cancel();
		})
		.context("Failed to set Ctrl+C handler")
	}

	/// Source locator of a tenant asset, empty when it is gone.
	pub fn locator(&self, id: &AssetId) -> String {
		self.index
			.get(&self.context(), &Filter::tenant(self.tenant.clone()), id)
			.ok()
			.flatten()
			.map(|p| p.payload.source_locator)
			.unwrap_or_default()
	}

	pub fn log_metrics(&self) {
		match self.metrics.render() {
			Ok(text) => text
				.lines()
				.filter(|l| !l.starts_with('#') && !l.ends_with(" 0"))
				.for_each(ui::debug),
			Err(e) => ui::debug(&format!("Metrics unavailable: {}", e)),
		}
	}
}

pub fn parse_asset_id(raw: &str) -> Result<AssetId> {
	raw.parse::<AssetId>().with_context(|| format!("'{}' is not an asset id", raw))
}

fn is_stdout(export_path: &Path) -> bool {
	export_path.to_str() == Some("-") || export_path.as_os_str().is_empty()
}

/// Progress lines would corrupt JSON written to stdout.
pub fn quiet(export: Option<&PathBuf>) -> bool {
	export.is_some_and(|p| is_stdout(p))
}

/// Pretty JSON to a file, or stdout for "-"
pub fn export_json<T: Serialize>(value: &T, export_path: &Path) -> Result<()> {
	let json = serde_json::to_string_pretty(value)?;
	if is_stdout(export_path) {
		println!("{}", json);
	} else {
		std::fs::write(export_path, json)?;
		ui::success(&format!("Exported to {}", export_path.display()));
	}
	Ok(())
}
