//! Exact in-process similarity index with MessagePack snapshots

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{CollectionSchema, Filter, IndexedPoint, ScoredPoint, ScrollPage, ScrollPoint, SearchParams, SimilarityIndex};
use crate::core::{AssetId, Embedding, Error, Result};
use crate::processing::context::CallContext;
use crate::ui;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize, Deserialize)]
struct Snapshot {
	version: String,
	schema: CollectionSchema,
	points: Vec<IndexedPoint>,
}

/// Brute-force cosine search over an ordered map of points.
///
/// Exact rather than approximate, which makes it the reference behavior for
/// tests; results for identical inputs are deterministic (ties break by id).
pub struct MemoryIndex {
	schema: CollectionSchema,
	points: RwLock<BTreeMap<AssetId, IndexedPoint>>,
}

impl Default for MemoryIndex {
	fn default() -> Self {
		Self::new(CollectionSchema::default())
	}
}

impl MemoryIndex {
	pub fn new(schema: CollectionSchema) -> Self {
		Self {
			schema,
			points: RwLock::new(BTreeMap::new()),
		}
	}

	/// Load a snapshot if one exists, otherwise start empty with `schema`.
	/// A snapshot created with different vector slots is rejected: slot
	/// dimensions are fixed for the lifetime of a collection.
	pub fn open(path: &Path, schema: CollectionSchema) -> anyhow::Result<Self> {
		if !path.exists() {
			ui::debug(&format!("No index snapshot at {}, starting empty", path.display()));
			return Ok(Self::new(schema));
		}

		let bytes = fs::read(path).context("Failed to read index snapshot")?;
		let snapshot: Snapshot = rmp_serde::from_slice(&bytes).context("Failed to deserialize index snapshot")?;

		if snapshot.schema.slots != schema.slots {
			anyhow::bail!(
				"Index snapshot {} was created with different vector slots",
				path.display()
			);
		}
		if snapshot.version != VERSION {
			ui::debug(&format!("Index snapshot written by v{}", snapshot.version));
		}

		let points = snapshot.points.into_iter().map(|p| (p.id, p)).collect();
		ui::debug(&format!("Loaded index snapshot from {}", path.display()));
		Ok(Self {
			schema: snapshot.schema,
			points: RwLock::new(points),
		})
	}

	/// Write the snapshot next to `path` and rename it into place.
	pub fn save(&self, path: &Path) -> anyhow::Result<()> {
		let points: Vec<IndexedPoint> = self.read()?.values().cloned().collect();
		let snapshot = Snapshot {
			version: VERSION.to_string(),
			schema: self.schema.clone(),
			points,
		};

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).context("Failed to create data directory")?;
		}

		let bytes = rmp_serde::to_vec(&snapshot).context("Failed to serialize index snapshot")?;
		let tmp = path.with_extension("msgpack.tmp");
		fs::write(&tmp, bytes).context("Failed to write index snapshot")?;
		fs::rename(&tmp, path).context("Failed to move index snapshot into place")?;
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.read().map(|p| p.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<AssetId, IndexedPoint>>> {
		self.points
			.read()
			.map_err(|_| Error::IndexQuery("index lock poisoned".into()))
	}

	fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<AssetId, IndexedPoint>>> {
		self.points
			.write()
			.map_err(|_| Error::IndexWrite("index lock poisoned".into()))
	}

	fn validate_point(&self, point: &IndexedPoint) -> Result<()> {
		if point.payload.asset_id != point.id {
			return Err(Error::IndexWrite(format!(
				"payload asset id {} does not match point id {}",
				point.payload.asset_id, point.id
			)));
		}
		if point.vectors.is_empty() {
			return Err(Error::IndexWrite(format!("point {} has no vectors", point.id)));
		}
		for (name, vector) in &point.vectors {
			let slot = self
				.schema
				.slot(name)
				.ok_or_else(|| Error::IndexWrite(format!("unknown vector slot '{}'", name)))?;
			if vector.dim() != slot.dim {
				return Err(Error::IndexWrite(format!(
					"vector '{}' has {} dimensions, collection expects {}",
					name,
					vector.dim(),
					slot.dim
				)));
			}
			if !vector.is_finite() {
				return Err(Error::IndexWrite(format!("vector '{}' contains non-finite values", name)));
			}
		}
		Ok(())
	}

	fn validate_filter(&self, filter: &Filter) -> Result<()> {
		for condition in filter.conditions() {
			if !self.schema.is_indexed(condition.field()) {
				return Err(Error::IndexQuery(format!(
					"payload field {:?} is not indexed",
					condition.field()
				)));
			}
		}
		Ok(())
	}

	fn validate_query(&self, vector: &Embedding, params: &SearchParams) -> Result<()> {
		let slot = self
			.schema
			.slot(params.vector_name)
			.ok_or_else(|| Error::IndexQuery(format!("unknown vector slot '{}'", params.vector_name)))?;
		if vector.dim() != slot.dim {
			return Err(Error::IndexQuery(format!(
				"query has {} dimensions, slot '{}' expects {}",
				vector.dim(),
				slot.name,
				slot.dim
			)));
		}
		if params.limit == 0 {
			return Err(Error::Validation("search limit must be positive".into()));
		}
		self.validate_filter(params.filter)
	}

	fn rank(points: &BTreeMap<AssetId, IndexedPoint>, query: &Embedding, params: &SearchParams) -> Vec<ScoredPoint> {
		let candidates: Vec<&IndexedPoint> = points
			.values()
			.filter(|p| params.filter.matches(&p.payload))
			.collect();

		let mut scored: Vec<(&IndexedPoint, f32)> = candidates
			.par_iter()
			.filter_map(|p| p.vectors.get(params.vector_name).map(|v| (*p, query.similarity(v))))
			.filter(|(_, score)| params.score_threshold.map_or(true, |t| *score >= t))
			.collect();

		scored.sort_by(|a, b| {
			b.1.partial_cmp(&a.1)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.0.id.cmp(&b.0.id))
		});
		scored.truncate(params.limit);

		scored
			.into_iter()
			.map(|(p, score)| ScoredPoint {
				asset_id: p.id,
				score,
				payload: params.with_payload.then(|| p.payload.clone()),
			})
			.collect()
	}
}

impl SimilarityIndex for MemoryIndex {
	fn schema(&self) -> &CollectionSchema {
		&self.schema
	}

	fn upsert(&self, ctx: &CallContext, point: IndexedPoint) -> Result<()> {
		ctx.check("index upsert")?;
		self.validate_point(&point)?;

		let mut points = self.write()?;
		if let Some(existing) = points.get(&point.id) {
			if existing.payload.tenant_id != point.payload.tenant_id {
				return Err(Error::Authz(format!("point {} belongs to another tenant", point.id)));
			}
		}
		points.insert(point.id, point);
		Ok(())
	}

	fn search(&self, ctx: &CallContext, vector: &Embedding, params: &SearchParams) -> Result<Vec<ScoredPoint>> {
		ctx.check("index search")?;
		self.validate_query(vector, params)?;
		let points = self.read()?;
		Ok(Self::rank(&points, vector, params))
	}

	fn search_by_existing(&self, ctx: &CallContext, id: &AssetId, params: &SearchParams) -> Result<Vec<ScoredPoint>> {
		ctx.check("index search")?;
		let points = self.read()?;

		let point = points
			.get(id)
			.ok_or_else(|| Error::NotFound(format!("asset {}", id)))?;
		if &point.payload.tenant_id != params.filter.tenant_id() {
			return Err(Error::Authz(format!("asset {} is not visible to this tenant", id)));
		}
		let vector = point
			.vectors
			.get(params.vector_name)
			.ok_or_else(|| Error::IndexQuery(format!("asset {} has no '{}' vector", id, params.vector_name)))?;

		self.validate_query(vector, params)?;
		Ok(Self::rank(&points, vector, params))
	}

	fn scroll(
		&self,
		ctx: &CallContext,
		filter: &Filter,
		limit: usize,
		offset: Option<AssetId>,
		with_vectors: bool,
	) -> Result<ScrollPage> {
		ctx.check("index scroll")?;
		if limit == 0 {
			return Err(Error::Validation("scroll limit must be positive".into()));
		}
		self.validate_filter(filter)?;

		let points = self.read()?;
		let ordered: Box<dyn Iterator<Item = (&AssetId, &IndexedPoint)> + '_> = match offset {
			Some(start) => Box::new(points.range(start..)),
			None => Box::new(points.iter()),
		};
		let mut matching = ordered.map(|(_, p)| p).filter(|p| filter.matches(&p.payload));

		let page: Vec<ScrollPoint> = matching
			.by_ref()
			.take(limit)
			.map(|p| ScrollPoint {
				asset_id: p.id,
				payload: p.payload.clone(),
				vectors: with_vectors.then(|| p.vectors.clone()),
			})
			.collect();
		let next_offset = matching.next().map(|p| p.id);

		Ok(ScrollPage {
			points: page,
			next_offset,
		})
	}

	fn get(&self, ctx: &CallContext, filter: &Filter, id: &AssetId) -> Result<Option<IndexedPoint>> {
		ctx.check("index get")?;
		let points = self.read()?;
		Ok(points.get(id).filter(|p| filter.matches(&p.payload)).cloned())
	}

	fn delete(&self, ctx: &CallContext, filter: &Filter, id: &AssetId) -> Result<bool> {
		ctx.check("index delete")?;
		let mut points = self.write()?;
		match points.get(id) {
			Some(p) if filter.matches(&p.payload) => {
				points.remove(id);
				Ok(true)
			}
			_ => Ok(false),
		}
	}

	fn count(&self, ctx: &CallContext, filter: &Filter) -> Result<usize> {
		ctx.check("index count")?;
		self.validate_filter(filter)?;
		Ok(self.read()?.values().filter(|p| filter.matches(&p.payload)).count())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::{single_slot, AssetPayload, ContentHash, Fingerprint, ImageFormat, PerceptualHash, Tags, TenantId};
	use crate::index::{Condition, VectorSlot};

	const DIM: usize = 4;

	fn schema() -> CollectionSchema {
		CollectionSchema {
			slots: vec![VectorSlot { name: "clip_global".into(), dim: DIM }],
			..CollectionSchema::default()
		}
	}

	fn point(tenant: &str, values: [f32; DIM]) -> IndexedPoint {
		let id = AssetId::generate();
		let fp = Fingerprint {
			content_hash: ContentHash::compute(id.to_string().as_bytes()),
			perceptual_hash: PerceptualHash::from_bits(1),
			width: 1,
			height: 1,
			format: ImageFormat::Png,
		};
		IndexedPoint {
			id,
			vectors: single_slot("clip_global", Embedding::new(values.to_vec())),
			payload: AssetPayload::new(id, TenantId::new(tenant).unwrap(), &fp, Tags::new(), "x".into(), "test".into()),
		}
	}

	fn tenant(name: &str) -> Filter {
		Filter::tenant(TenantId::new(name).unwrap())
	}

	#[test]
	fn search_by_existing_includes_self_first() {
		let index = MemoryIndex::new(schema());
		let ctx = CallContext::background();
		let a = point("t", [1.0, 0.0, 0.0, 0.0]);
		let b = point("t", [0.9, 0.1, 0.0, 0.0]);
		let (a_id, b_id) = (a.id, b.id);
		index.upsert(&ctx, a).unwrap();
		index.upsert(&ctx, b).unwrap();

		let filter = tenant("t");
		let hits = index.search_by_existing(&ctx, &a_id, &SearchParams::new(&filter, 2)).unwrap();
		assert_eq!(hits[0].asset_id, a_id);
		assert_eq!(hits[1].asset_id, b_id);
		assert!(hits[0].score >= hits[1].score);
	}

	#[test]
	fn threshold_truncates_results() {
		let index = MemoryIndex::new(schema());
		let ctx = CallContext::background();
		index.upsert(&ctx, point("t", [1.0, 0.0, 0.0, 0.0])).unwrap();
		index.upsert(&ctx, point("t", [0.0, 1.0, 0.0, 0.0])).unwrap();

		let filter = tenant("t");
		let query = Embedding::new(vec![1.0, 0.0, 0.0, 0.0]);
		let hits = index
			.search(&ctx, &query, &SearchParams::new(&filter, 10).threshold(Some(0.5)))
			.unwrap();
		assert_eq!(hits.len(), 1);
		assert!(hits[0].payload.is_none());
	}

	#[test]
	fn unknown_vector_slot_is_a_query_error() {
		let index = MemoryIndex::new(schema());
		let ctx = CallContext::background();
		index.upsert(&ctx, point("t", [1.0, 0.0, 0.0, 0.0])).unwrap();

		let filter = tenant("t");
		let query = Embedding::new(vec![1.0, 0.0, 0.0, 0.0]);
		let hits = index
			.search(&ctx, &query, &SearchParams::new(&filter, 1).vector("clip_global"))
			.unwrap();
		assert_eq!(hits.len(), 1);

		let err = index
			.search(&ctx, &query, &SearchParams::new(&filter, 1).vector("clip_patches"))
			.unwrap_err();
		assert!(matches!(err, Error::IndexQuery(_)));
	}

	#[test]
	fn other_tenants_are_invisible() {
		let index = MemoryIndex::new(schema());
		let ctx = CallContext::background();
		let mine = point("a", [1.0, 0.0, 0.0, 0.0]);
		let theirs = point("b", [1.0, 0.0, 0.0, 0.0]);
		let theirs_id = theirs.id;
		index.upsert(&ctx, mine).unwrap();
		index.upsert(&ctx, theirs).unwrap();

		let filter = tenant("a");
		let query = Embedding::new(vec![1.0, 0.0, 0.0, 0.0]);
		let hits = index.search(&ctx, &query, &SearchParams::new(&filter, 10)).unwrap();
		assert_eq!(hits.len(), 1);
		assert!(hits.iter().all(|h| h.asset_id != theirs_id));

		let err = index
			.search_by_existing(&ctx, &theirs_id, &SearchParams::new(&filter, 10))
			.unwrap_err();
		assert!(matches!(err, Error::Authz(_)));
		assert!(index.get(&ctx, &filter, &theirs_id).unwrap().is_none());
		assert!(!index.delete(&ctx, &filter, &theirs_id).unwrap());
	}

	#[test]
	fn upsert_rejects_wrong_dimension() {
		let index = MemoryIndex::new(schema());
		let mut p = point("t", [1.0, 0.0, 0.0, 0.0]);
		p.vectors = single_slot("clip_global", Embedding::new(vec![1.0; DIM + 1]));
		let err = index.upsert(&CallContext::background(), p).unwrap_err();
		assert!(matches!(err, Error::IndexWrite(_)));
	}

	#[test]
	fn upsert_cannot_take_over_another_tenants_point() {
		let index = MemoryIndex::new(schema());
		let ctx = CallContext::background();
		let original = point("a", [1.0, 0.0, 0.0, 0.0]);
		let mut hijack = point("b", [0.0, 1.0, 0.0, 0.0]);
		hijack.id = original.id;
		hijack.payload.asset_id = original.id;
		index.upsert(&ctx, original).unwrap();
		assert!(matches!(index.upsert(&ctx, hijack), Err(Error::Authz(_))));
	}

	#[test]
	fn scroll_pages_cover_everything_once() {
		let index = MemoryIndex::new(schema());
		let ctx = CallContext::background();
		for _ in 0..7 {
			index.upsert(&ctx, point("t", [1.0, 1.0, 0.0, 0.0])).unwrap();
		}
		index.upsert(&ctx, point("other", [1.0, 1.0, 0.0, 0.0])).unwrap();

		let filter = tenant("t");
		let mut seen = Vec::new();
		let mut offset = None;
		loop {
			let page = index.scroll(&ctx, &filter, 3, offset, false).unwrap();
			seen.extend(page.points.iter().map(|p| p.asset_id));
			match page.next_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}
		seen.sort();
		seen.dedup();
		assert_eq!(seen.len(), 7);
	}

	#[test]
	fn filter_on_unindexed_field_is_rejected() {
		let mut s = schema();
		s.indexed_fields.retain(|f| *f != crate::index::PayloadField::Tags);
		let index = MemoryIndex::new(s);
		let filter = tenant("t").with(Condition::Tag("cat".into()));
		let err = index.count(&CallContext::background(), &filter).unwrap_err();
		assert!(matches!(err, Error::IndexQuery(_)));
	}

	#[test]
	fn snapshot_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("index.msgpack");
		let ctx = CallContext::background();

		let index = MemoryIndex::new(schema());
		let p = point("t", [0.0, 0.0, 1.0, 0.0]);
		let id = p.id;
		index.upsert(&ctx, p).unwrap();
		index.save(&path).unwrap();

		let reopened = MemoryIndex::open(&path, schema()).unwrap();
		let restored = reopened.get(&ctx, &tenant("t"), &id).unwrap().unwrap();
		assert_eq!(restored.id, id);

		let mut wider = schema();
		wider.slots[0].dim = DIM * 2;
		assert!(MemoryIndex::open(&path, wider).is_err());
	}
}
