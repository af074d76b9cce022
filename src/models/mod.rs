//! # Embedding Provider
//!
//! The contract ingestion and search depend on, plus the lazily loaded
//! CLIP ONNX encoders that implement it.

pub mod manager;
pub mod text;
pub mod vision;

use crate::core::{Embedding, Result};
use crate::processing::context::CallContext;

pub use manager::OnnxEmbedder;

/// Maps image bytes or text into one fixed-length, L2-normalized vector space.
pub trait EmbeddingProvider: Send + Sync {
	fn model_name(&self) -> &str;

	fn dim(&self) -> usize;

	fn embed_image(&self, ctx: &CallContext, bytes: &[u8]) -> Result<Embedding>;

	fn embed_text(&self, ctx: &CallContext, text: &str) -> Result<Embedding>;
}
