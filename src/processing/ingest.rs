//! Ingestion: fetch → hash → embed → upsert → audit

use std::sync::Arc;
use std::time::Instant;

use crate::config::{Settings, VECTOR_NAME};
use crate::core::{
	single_slot, AssetId, AssetPayload, AssetSummary, ContentHasher, Error, Fingerprint, Result, Tags, TenantId,
};
use crate::index::{Condition, Filter, IndexedPoint, SimilarityIndex};
use crate::metrics::{self, SharedMetrics};
use crate::models::EmbeddingProvider;
use crate::processing::context::CallContext;
use crate::storage::{AuditEvent, AuditRecord, AuditSink, ObjectStore};
use crate::ui;

#[derive(Debug, Clone)]
pub struct IngestRequest {
	pub tenant_id: TenantId,
	pub source_locator: String,
	pub tags: Tags,
}

pub struct IngestionCoordinator {
	objects: Arc<dyn ObjectStore>,
	embedder: Option<Arc<dyn EmbeddingProvider>>,
	index: Arc<dyn SimilarityIndex>,
	audit: Arc<dyn AuditSink>,
	metrics: SharedMetrics,
	settings: Settings,
}

impl IngestionCoordinator {
	/// Ingest and reindex need a provider from `with_embedder`; delete does not.
	pub fn new(objects: Arc<dyn ObjectStore>, index: Arc<dyn SimilarityIndex>, audit: Arc<dyn AuditSink>) -> Self {
		Self {
			objects,
			embedder: None,
			index,
			audit,
			metrics: metrics::noop(),
			settings: Settings::default(),
		}
	}

	pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
		self.embedder = Some(embedder);
		self
	}

	pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
		self.metrics = metrics;
		self
	}

	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = settings;
		self
	}

	/// Index one stored object for a tenant.
	///
	/// Identical bytes already indexed for the same tenant return the existing
	/// asset with `deduplicated = true`; nothing is re-embedded or rewritten.
	pub fn ingest(&self, ctx: &CallContext, request: IngestRequest) -> Result<AssetSummary> {
		ctx.check("ingest")?;
		let embedder = self.embedder()?;

		let bytes = self
			.objects
			.fetch(&ctx.child(self.settings.object_timeout()), &request.source_locator)?;
		let fingerprint = ContentHasher::hash(&bytes)?;

		if let Some(existing) = self.find_by_content(ctx, &request.tenant_id, &fingerprint)? {
			ui::debug(&format!(
				"{} already indexed as {} for tenant {}",
				fingerprint.content_hash.short(),
				existing.asset_id,
				request.tenant_id
			));
			self.metrics.incr(metrics::INGEST_DEDUPLICATED, 1);
			return Ok(existing.summary(true));
		}

		let payload = AssetPayload::new(
			AssetId::generate(),
			request.tenant_id,
			&fingerprint,
			request.tags,
			request.source_locator,
			embedder.model_name().to_string(),
		);
		self.embed_and_upsert(ctx, &bytes, payload.clone())?;
		self.record_audit(AuditEvent::Upload, &payload);

		self.metrics.incr(metrics::INGEST_TOTAL, 1);
		Ok(payload.summary(false))
	}

	/// Re-fetch, re-hash and re-embed an existing asset under the same id.
	pub fn reindex(&self, ctx: &CallContext, tenant: &TenantId, asset_id: &AssetId) -> Result<AssetSummary> {
		ctx.check("reindex")?;
		let embedder = self.embedder()?;
		let current = self.lookup(ctx, tenant, asset_id)?;

		let bytes = self
			.objects
			.fetch(&ctx.child(self.settings.object_timeout()), &current.source_locator)?;
		let fingerprint = ContentHasher::hash(&bytes)?;

		let payload = AssetPayload {
			content_hash: fingerprint.content_hash.clone(),
			perceptual_hash: fingerprint.perceptual_hash,
			width: fingerprint.width,
			height: fingerprint.height,
			format: fingerprint.format,
			model_name: embedder.model_name().to_string(),
			..current
		};
		self.embed_and_upsert(ctx, &bytes, payload.clone())?;
		self.record_audit(AuditEvent::Reindex, &payload);

		Ok(payload.summary(false))
	}

	/// Remove the index point, then the stored object. The object delete is
	/// best-effort: once the point is gone the asset is unreachable anyway.
	pub fn delete(&self, ctx: &CallContext, tenant: &TenantId, asset_id: &AssetId) -> Result<AssetPayload> {
		ctx.check("delete")?;
		let payload = self.lookup(ctx, tenant, asset_id)?;

		let removed = self.index.delete(
			&ctx.child(self.settings.index_timeout()),
			&Filter::tenant(tenant.clone()),
			asset_id,
		)?;
		if !removed {
			return Err(Error::NotFound(format!("asset {}", asset_id)));
		}

		if let Err(e) = self
			.objects
			.delete(&ctx.child(self.settings.object_timeout()), &payload.source_locator)
		{
			ui::warn(&format!("Object {} was not removed: {}", payload.source_locator, e));
		}
		self.record_audit(AuditEvent::Delete, &payload);

		Ok(payload)
	}

	fn embedder(&self) -> Result<&dyn EmbeddingProvider> {
		self.embedder
			.as_deref()
			.ok_or_else(|| Error::Embedding("no embedding provider configured".into()))
	}

	fn lookup(&self, ctx: &CallContext, tenant: &TenantId, asset_id: &AssetId) -> Result<AssetPayload> {
		self.index
			.get(
				&ctx.child(self.settings.index_timeout()),
				&Filter::tenant(tenant.clone()),
				asset_id,
			)?
			.map(|p| p.payload)
			.ok_or_else(|| Error::NotFound(format!("asset {}", asset_id)))
	}

	fn find_by_content(
		&self,
		ctx: &CallContext,
		tenant: &TenantId,
		fingerprint: &Fingerprint,
	) -> Result<Option<AssetPayload>> {
		let filter = Filter::tenant(tenant.clone()).with(Condition::ContentHash(fingerprint.content_hash.clone()));
		let page = self
			.index
			.scroll(&ctx.child(self.settings.index_timeout()), &filter, 1, None, false)?;
		Ok(page.points.into_iter().next().map(|p| p.payload))
	}

	fn embed_and_upsert(&self, ctx: &CallContext, bytes: &[u8], payload: AssetPayload) -> Result<()> {
		let start = Instant::now();
		let embedding = self
			.embedder()?
			.embed_image(&ctx.child(self.settings.embed_timeout()), bytes)?;
		self.metrics.observe(metrics::EMBED_SECONDS, start.elapsed().as_secs_f64());

		let expected = self.index.schema().slot(VECTOR_NAME).map(|s| s.dim);
		if expected != Some(embedding.dim()) {
			return Err(Error::Embedding(format!(
				"provider returned {} dimensions, index slot '{}' expects {:?}",
				embedding.dim(),
				VECTOR_NAME,
				expected
			)));
		}

		let point = IndexedPoint {
			id: payload.asset_id,
			vectors: single_slot(VECTOR_NAME, embedding),
			payload,
		};
		self.index.upsert(&ctx.child(self.settings.index_timeout()), point)
	}

	/// Best-effort: a failed audit write is logged and counted, never returned.
	fn record_audit(&self, event: AuditEvent, payload: &AssetPayload) {
		if let Err(e) = self.audit.record(&AuditRecord::from_payload(event, payload)) {
			ui::warn(&format!("Audit write for {} failed: {}", payload.asset_id, e));
			self.metrics.incr(metrics::AUDIT_FAILURES, 1);
		}
	}
}
