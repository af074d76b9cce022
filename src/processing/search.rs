//! Similarity search by asset, text or raw image bytes

use std::sync::Arc;
use std::time::Instant;

use crate::config::{Settings, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use crate::core::{AssetId, Error, Result, TenantId};
use crate::index::{Condition, Filter, ScoredPoint, ScrollPage, SearchParams, SimilarityIndex};
use crate::metrics::{self, SharedMetrics};
use crate::models::EmbeddingProvider;
use crate::processing::context::CallContext;

#[derive(Debug, Clone)]
pub enum SearchQuery {
	/// Neighbors of an indexed asset; the asset itself is left out.
	Asset(AssetId),
	Text(String),
	Image(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
	pub tenant_id: TenantId,
	pub query: SearchQuery,
	pub limit: Option<usize>,
	pub score_threshold: Option<f32>,
	pub conditions: Vec<Condition>,
	pub include_payload: bool,
}

impl SearchRequest {
	pub fn new(tenant_id: TenantId, query: SearchQuery) -> Self {
		Self {
			tenant_id,
			query,
			limit: None,
			score_threshold: None,
			conditions: Vec::new(),
			include_payload: true,
		}
	}

	/// Unset or zero falls back to the default; anything above the cap is clamped.
	pub fn effective_limit(&self) -> usize {
		match self.limit {
			None | Some(0) => DEFAULT_SEARCH_LIMIT,
			Some(n) => n.min(MAX_SEARCH_LIMIT),
		}
	}
}

pub struct SearchService {
	index: Arc<dyn SimilarityIndex>,
	embedder: Option<Arc<dyn EmbeddingProvider>>,
	metrics: SharedMetrics,
	settings: Settings,
}

impl SearchService {
	/// Asset queries only need the index; text and image queries also need
	/// `with_embedder`.
	pub fn new(index: Arc<dyn SimilarityIndex>) -> Self {
		Self {
			index,
			embedder: None,
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

	pub fn search(&self, ctx: &CallContext, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
		ctx.check("search")?;
		if let Some(t) = request.score_threshold {
			if !(-1.0..=1.0).contains(&t) {
				return Err(Error::Validation(format!("score threshold {} outside [-1, 1]", t)));
			}
		}

		let start = Instant::now();
		let limit = request.effective_limit();
		let filter = Filter::tenant(request.tenant_id.clone()).with_all(request.conditions.iter().cloned());
		let index_ctx = ctx.child(self.settings.index_timeout());

		let hits = match &request.query {
			SearchQuery::Asset(id) => {
				// One extra slot so dropping the query asset still fills the page.
				let params = SearchParams::new(&filter, limit + 1)
					.threshold(request.score_threshold)
					.with_payload(request.include_payload);
				let mut hits = self.index.search_by_existing(&index_ctx, id, &params)?;
				hits.retain(|h| &h.asset_id != id);
				hits.truncate(limit);
				hits
			}
			SearchQuery::Text(text) => {
				let vector = self
					.embedder()?
					.embed_text(&ctx.child(self.settings.embed_timeout()), text)?;
				let params = SearchParams::new(&filter, limit)
					.threshold(request.score_threshold)
					.with_payload(request.include_payload);
				self.index.search(&index_ctx, &vector, &params)?
			}
			SearchQuery::Image(bytes) => {
				let vector = self
					.embedder()?
					.embed_image(&ctx.child(self.settings.embed_timeout()), bytes)?;
				let params = SearchParams::new(&filter, limit)
					.threshold(request.score_threshold)
					.with_payload(request.include_payload);
				self.index.search(&index_ctx, &vector, &params)?
			}
		};

		self.metrics.observe(metrics::SEARCH_SECONDS, start.elapsed().as_secs_f64());
		Ok(hits)
	}

	fn embedder(&self) -> Result<&dyn EmbeddingProvider> {
		self.embedder
			.as_deref()
			.ok_or_else(|| Error::Embedding("no embedding provider configured".into()))
	}

	/// Page through a tenant's assets in index order.
	pub fn list(
		&self,
		ctx: &CallContext,
		tenant: &TenantId,
		limit: Option<usize>,
		offset: Option<AssetId>,
	) -> Result<ScrollPage> {
		let limit = match limit {
			None | Some(0) => DEFAULT_SEARCH_LIMIT,
			Some(n) => n.min(MAX_SEARCH_LIMIT),
		};
		self.index.scroll(
			&ctx.child(self.settings.index_timeout()),
			&Filter::tenant(tenant.clone()),
			limit,
			offset,
			false,
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(None, DEFAULT_SEARCH_LIMIT)]
	#[case(Some(0), DEFAULT_SEARCH_LIMIT)]
	#[case(Some(25), 25)]
	#[case(Some(5000), MAX_SEARCH_LIMIT)]
	fn limit_defaults_and_clamps(#[case] limit: Option<usize>, #[case] expected: usize) {
		let mut request = SearchRequest::new(TenantId::new("acme").unwrap(), SearchQuery::Text("cat".into()));
		request.limit = limit;
		assert_eq!(request.effective_limit(), expected);
	}
}
