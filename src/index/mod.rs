//! # Similarity Index
//!
//! The contract the orchestration layer depends on, plus `MemoryIndex`, an
//! exact-search implementation persisted as a MessagePack snapshot.
//!
//! Approximate implementations may return slightly different neighbor sets
//! for identical calls under concurrent writes. Callers compare scores
//! against thresholds rather than expecting byte-identical results.

pub mod filter;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::config::{EMBEDDING_DIM, VECTOR_NAME};
use crate::core::{AssetId, AssetPayload, Embedding, NamedVectors, Result};
use crate::processing::context::CallContext;

pub use filter::{Condition, Filter, PayloadField};
pub use memory::MemoryIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
	Cosine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSlot {
	pub name: String,
	pub dim: usize,
}

/// Named vector slots with fixed dimensions, plus the filterable payload fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
	pub slots: Vec<VectorSlot>,
	pub distance: Distance,
	pub indexed_fields: Vec<PayloadField>,
}

impl CollectionSchema {
	pub fn slot(&self, name: &str) -> Option<&VectorSlot> {
		self.slots.iter().find(|s| s.name == name)
	}

	pub fn is_indexed(&self, field: PayloadField) -> bool {
		self.indexed_fields.contains(&field)
	}
}

impl Default for CollectionSchema {
	fn default() -> Self {
		Self {
			slots: vec![VectorSlot {
				name: VECTOR_NAME.to_string(),
				dim: EMBEDDING_DIM,
			}],
			distance: Distance::Cosine,
			indexed_fields: vec![
				PayloadField::TenantId,
				PayloadField::ContentHash,
				PayloadField::PerceptualHash,
				PayloadField::Tags,
				PayloadField::Format,
				PayloadField::CreatedAt,
			],
		}
	}
}

/// One stored record: id, vectors, typed payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPoint {
	pub id: AssetId,
	pub vectors: NamedVectors,
	pub payload: AssetPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
	pub asset_id: AssetId,
	pub score: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payload: Option<AssetPayload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollPoint {
	pub asset_id: AssetId,
	pub payload: AssetPayload,
	pub vectors: Option<NamedVectors>,
}

/// One page of an unordered bulk read; `next_offset` resumes the scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
	pub points: Vec<ScrollPoint>,
	pub next_offset: Option<AssetId>,
}

#[derive(Debug, Clone)]
pub struct SearchParams<'a> {
	pub vector_name: &'a str,
	pub filter: &'a Filter,
	pub limit: usize,
	pub score_threshold: Option<f32>,
	pub with_payload: bool,
}

impl<'a> SearchParams<'a> {
	pub fn new(filter: &'a Filter, limit: usize) -> Self {
		Self {
			vector_name: VECTOR_NAME,
			filter,
			limit,
			score_threshold: None,
			with_payload: false,
		}
	}

	pub fn threshold(mut self, threshold: Option<f32>) -> Self {
		self.score_threshold = threshold;
		self
	}

	pub fn with_payload(mut self, with_payload: bool) -> Self {
		self.with_payload = with_payload;
		self
	}

	pub fn vector(mut self, name: &'a str) -> Self {
		self.vector_name = name;
		self
	}
}

pub trait SimilarityIndex: Send + Sync {
	fn schema(&self) -> &CollectionSchema;

	/// Insert or overwrite by id; vectors and payload replace atomically.
	fn upsert(&self, ctx: &CallContext, point: IndexedPoint) -> Result<()>;

	/// Ranked by descending cosine similarity, at most `limit` results.
	fn search(&self, ctx: &CallContext, vector: &Embedding, params: &SearchParams) -> Result<Vec<ScoredPoint>>;

	/// Like `search`, with the query vector taken from an indexed point.
	/// The point itself is part of the candidate set.
	fn search_by_existing(&self, ctx: &CallContext, id: &AssetId, params: &SearchParams) -> Result<Vec<ScoredPoint>>;

	fn scroll(
		&self,
		ctx: &CallContext,
		filter: &Filter,
		limit: usize,
		offset: Option<AssetId>,
		with_vectors: bool,
	) -> Result<ScrollPage>;

	fn get(&self, ctx: &CallContext, filter: &Filter, id: &AssetId) -> Result<Option<IndexedPoint>>;

	/// Returns whether a point was removed.
	fn delete(&self, ctx: &CallContext, filter: &Filter, id: &AssetId) -> Result<bool>;

	fn count(&self, ctx: &CallContext, filter: &Filter) -> Result<usize>;
}
