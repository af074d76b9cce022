// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glimpse::config::EMBEDDING_DIM;
use glimpse::core::{AssetId, ContentHash, Embedding, Error, Result, TenantId};
use glimpse::index::{
	CollectionSchema, Filter, IndexedPoint, MemoryIndex, ScoredPoint, ScrollPage, SearchParams, SimilarityIndex,
};
use glimpse::metrics::CounterMetrics;
use glimpse::models::EmbeddingProvider;
use glimpse::processing::{CallContext, IngestRequest, IngestionCoordinator};
use glimpse::storage::{AuditRecord, AuditSink, ObjectStore};
use image::{ImageBuffer, Rgb, RgbImage};

/// A small PNG whose bytes differ for every `seed`.
pub fn png(seed: u8) -> Vec<u8> {
	let img: RgbImage = ImageBuffer::from_fn(24, 24, |x, y| {
		Rgb([seed, (x * 10) as u8, (y * 10).wrapping_add(seed as u32) as u8])
	});
	let mut out = Cursor::new(Vec::new());
	img.write_to(&mut out, image::ImageFormat::Png).unwrap();
	out.into_inner()
}

/// Unit vector `cos * e_a + sin * e_b`; cosine between two such vectors
/// sharing `e_a` with the plain `e_a` axis is exactly `cos`.
pub fn blend(a: usize, b: usize, cos: f32) -> Embedding {
	let mut v = vec![0.0; EMBEDDING_DIM];
	v[a] = cos;
	v[b] = (1.0 - cos * cos).max(0.0).sqrt();
	Embedding::new(v)
}

pub fn axis(a: usize) -> Embedding {
	blend(a, a + 1, 1.0)
}

/// Embedding provider that returns a scripted vector per content hash.
#[derive(Default)]
pub struct ScriptedEmbedder {
	vectors: Mutex<HashMap<String, Embedding>>,
	texts: Mutex<HashMap<String, Embedding>>,
	pub calls: AtomicUsize,
}

impl ScriptedEmbedder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn script(&self, bytes: &[u8], vector: Embedding) {
		self.vectors
			.lock()
			.unwrap()
			.insert(ContentHash::compute(bytes).as_str().to_string(), vector);
	}

	pub fn script_text(&self, text: &str, vector: Embedding) {
		self.texts.lock().unwrap().insert(text.to_string(), vector);
	}
}

impl EmbeddingProvider for ScriptedEmbedder {
	fn model_name(&self) -> &str {
		"scripted"
	}

	fn dim(&self) -> usize {
		EMBEDDING_DIM
	}

	fn embed_image(&self, ctx: &CallContext, bytes: &[u8]) -> Result<Embedding> {
		ctx.check("embedding")?;
		self.calls.fetch_add(1, Ordering::SeqCst);
		glimpse::core::hash::decode(bytes)?;
		let key = ContentHash::compute(bytes);
		self.vectors
			.lock()
			.unwrap()
			.get(key.as_str())
			.cloned()
			.ok_or_else(|| Error::Embedding(format!("no vector scripted for {}", key.short())))
	}

	fn embed_text(&self, ctx: &CallContext, text: &str) -> Result<Embedding> {
		ctx.check("embedding")?;
		self.texts
			.lock()
			.unwrap()
			.get(text)
			.cloned()
			.ok_or_else(|| Error::Embedding(format!("no vector scripted for '{}'", text)))
	}
}

#[derive(Default)]
pub struct MemoryObjects {
	objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjects {
	pub fn contains(&self, locator: &str) -> bool {
		self.objects.lock().unwrap().contains_key(locator)
	}
}

impl ObjectStore for MemoryObjects {
	fn fetch(&self, ctx: &CallContext, locator: &str) -> Result<Vec<u8>> {
		ctx.check("object fetch")?;
		self.objects
			.lock()
			.unwrap()
			.get(locator)
			.cloned()
			.ok_or_else(|| Error::Retrieval(format!("no object at {}", locator)))
	}

	fn put(&self, ctx: &CallContext, locator: &str, bytes: &[u8]) -> Result<()> {
		ctx.check("object put")?;
		self.objects.lock().unwrap().insert(locator.to_string(), bytes.to_vec());
		Ok(())
	}

	fn delete(&self, ctx: &CallContext, locator: &str) -> Result<()> {
		ctx.check("object delete")?;
		self.objects.lock().unwrap().remove(locator);
		Ok(())
	}
}

/// Audit sink that keeps records, or rejects every write when `failing`.
#[derive(Default)]
pub struct RecordingAudit {
	pub records: Mutex<Vec<AuditRecord>>,
	pub failing: bool,
}

impl RecordingAudit {
	pub fn failing() -> Self {
		Self {
			failing: true,
			..Self::default()
		}
	}
}

impl AuditSink for RecordingAudit {
	fn record(&self, record: &AuditRecord) -> Result<()> {
		if self.failing {
			return Err(Error::AuditWrite("audit store offline".into()));
		}
		self.records.lock().unwrap().push(record.clone());
		Ok(())
	}
}

/// Wraps a real index; neighbor queries for the listed ids fail, and every
/// scroll can be slowed down.
pub struct FlakyIndex {
	inner: Arc<MemoryIndex>,
	failing: Mutex<Vec<AssetId>>,
	scroll_delay: Option<Duration>,
}

impl FlakyIndex {
	pub fn new(inner: Arc<MemoryIndex>) -> Self {
		Self {
			inner,
			failing: Mutex::new(Vec::new()),
			scroll_delay: None,
		}
	}

	pub fn fail_for(self, id: AssetId) -> Self {
		self.failing.lock().unwrap().push(id);
		self
	}

	pub fn slow_scroll(mut self, delay: Duration) -> Self {
		self.scroll_delay = Some(delay);
		self
	}
}

impl SimilarityIndex for FlakyIndex {
	fn schema(&self) -> &CollectionSchema {
		self.inner.schema()
	}

	fn upsert(&self, ctx: &CallContext, point: IndexedPoint) -> Result<()> {
		self.inner.upsert(ctx, point)
	}

	fn search(&self, ctx: &CallContext, vector: &Embedding, params: &SearchParams) -> Result<Vec<ScoredPoint>> {
		self.inner.search(ctx, vector, params)
	}

	fn search_by_existing(&self, ctx: &CallContext, id: &AssetId, params: &SearchParams) -> Result<Vec<ScoredPoint>> {
		if self.failing.lock().unwrap().contains(id) {
			return Err(Error::IndexQuery("shard unavailable".into()));
		}
		self.inner.search_by_existing(ctx, id, params)
	}

	fn scroll(
		&self,
		ctx: &CallContext,
		filter: &Filter,
		limit: usize,
		offset: Option<AssetId>,
		with_vectors: bool,
	) -> Result<ScrollPage> {
		if let Some(delay) = self.scroll_delay {
			std::thread::sleep(delay);
		}
		self.inner.scroll(ctx, filter, limit, offset, with_vectors)
	}

	fn get(&self, ctx: &CallContext, filter: &Filter, id: &AssetId) -> Result<Option<IndexedPoint>> {
		self.inner.get(ctx, filter, id)
	}

	fn delete(&self, ctx: &CallContext, filter: &Filter, id: &AssetId) -> Result<bool> {
		self.inner.delete(ctx, filter, id)
	}

	fn count(&self, ctx: &CallContext, filter: &Filter) -> Result<usize> {
		self.inner.count(ctx, filter)
	}
}

/// Coordinator over in-memory collaborators.
pub struct Harness {
	pub index: Arc<MemoryIndex>,
	pub objects: Arc<MemoryObjects>,
	pub embedder: Arc<ScriptedEmbedder>,
	pub audit: Arc<RecordingAudit>,
	pub metrics: Arc<CounterMetrics>,
	pub coordinator: IngestionCoordinator,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_audit(RecordingAudit::default())
	}

	pub fn with_audit(audit: RecordingAudit) -> Self {
		let index = Arc::new(MemoryIndex::new(CollectionSchema::default()));
		let objects = Arc::new(MemoryObjects::default());
		let embedder = Arc::new(ScriptedEmbedder::new());
		let audit = Arc::new(audit);
		let metrics = Arc::new(CounterMetrics::new().unwrap());
		let coordinator = IngestionCoordinator::new(objects.clone(), index.clone(), audit.clone())
			.with_embedder(embedder.clone())
			.with_metrics(metrics.clone());
		Self {
			index,
			objects,
			embedder,
			audit,
			metrics,
			coordinator,
		}
	}

	/// Store `bytes`, script their vector, and ingest them for `tenant`.
	pub fn add(&self, tenant: &TenantId, name: &str, bytes: &[u8], vector: Embedding) -> AssetId {
		let locator = format!("{}/{}", tenant, name);
		self.objects.put(&CallContext::background(), &locator, bytes).unwrap();
		self.embedder.script(bytes, vector);
		self.coordinator
			.ingest(
				&CallContext::background(),
				IngestRequest {
					tenant_id: tenant.clone(),
					source_locator: locator,
					tags: Default::default(),
				},
			)
			.unwrap()
			.asset_id
	}
}

pub fn tenant(name: &str) -> TenantId {
	TenantId::new(name).unwrap()
}

/// Five assets: two tight pairs and one loner, all orthogonal across groups.
pub struct Scenario {
	pub harness: Harness,
	pub tenant: TenantId,
	pub ids: [AssetId; 5],
}

impl Scenario {
	pub fn build() -> Self {
		let harness = Harness::new();
		let tenant = tenant("acme");
		let vectors = [axis(0), blend(0, 1, 0.97), axis(2), blend(2, 3, 0.93), axis(4)];
		let ids: Vec<AssetId> = vectors
			.into_iter()
			.enumerate()
			.map(|(i, v)| harness.add(&tenant, &format!("img{}.png", i + 1), &png(i as u8 * 40 + 1), v))
			.collect();
		Self {
			harness,
			tenant,
			ids: [ids[0], ids[1], ids[2], ids[3], ids[4]],
		}
	}
}
