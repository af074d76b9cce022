//! Lazy model loading coordinator

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use super::text::TextModel;
use super::vision::VisionModel;
use super::EmbeddingProvider;
use crate::config;
use crate::core::{hash, Embedding, Error, Result};
use crate::processing::context::CallContext;

pub struct OnnxEmbedder {
	vision: Mutex<Option<VisionModel>>,
	text: Mutex<Option<TextModel>>,
	vision_path: PathBuf,
	text_path: PathBuf,
	tokenizer_path: PathBuf,
}

impl OnnxEmbedder {
	/// Resolve model files; sessions are created on first use.
	pub fn new() -> anyhow::Result<Self> {
		let vision_path = config::get_vision_model_path()
			.with_context(|| format!("Vision model not found. Ensure {} exists", config::VISION_MODEL))?;
		let text_path = config::get_text_model_path()
			.with_context(|| format!("Text model not found. Ensure {} exists", config::TEXT_MODEL))?;
		let tokenizer_path = config::get_tokenizer_path()
			.with_context(|| format!("Tokenizer not found. Ensure {} exists", config::TOKENIZER))?;

		for path in [&vision_path, &text_path, &tokenizer_path] {
			if !path.exists() {
				anyhow::bail!("Model file does not exist: {}", path.display());
			}
		}

		Ok(Self {
			vision: Mutex::new(None),
			text: Mutex::new(None),
			vision_path,
			text_path,
			tokenizer_path,
		})
	}
}

fn embedding_err(e: impl std::fmt::Display) -> Error {
	Error::Embedding(e.to_string())
}

impl EmbeddingProvider for OnnxEmbedder {
	fn model_name(&self) -> &str {
		config::MODEL_NAME
	}

	fn dim(&self) -> usize {
		config::EMBEDDING_DIM
	}

	fn embed_image(&self, ctx: &CallContext, bytes: &[u8]) -> Result<Embedding> {
		ctx.check("embedding")?;
		let (img, _) = hash::decode(bytes)?;

		let mut guard = self
			.vision
			.lock()
			.map_err(|_| Error::Embedding("vision model lock poisoned".into()))?;
		if guard.is_none() {
			crate::ui::debug(&format!("Loading vision model: {}", self.vision_path.display()));
			*guard = Some(VisionModel::load(&self.vision_path).map_err(embedding_err)?);
			crate::ui::debug("Vision model loaded");
		}
		let model = guard
			.as_mut()
			.ok_or_else(|| Error::Embedding("vision model unavailable".into()))?;

		let start = Instant::now();
		let embedding = model.encode(&img).map_err(embedding_err)?;
		crate::ui::debug(&format!("Image embedded in {:.0?}", start.elapsed()));

		// ONNX inference cannot be interrupted; a late result is still a timeout.
		ctx.check("embedding")?;
		Ok(embedding)
	}

	fn embed_text(&self, ctx: &CallContext, text: &str) -> Result<Embedding> {
		ctx.check("embedding")?;
		if text.trim().is_empty() {
			return Err(Error::Validation("text query is empty".into()));
		}

		let mut guard = self
			.text
			.lock()
			.map_err(|_| Error::Embedding("text model lock poisoned".into()))?;
		if guard.is_none() {
			crate::ui::debug(&format!("Loading text model: {}", self.text_path.display()));
			*guard = Some(TextModel::load(&self.text_path, &self.tokenizer_path).map_err(embedding_err)?);
			crate::ui::debug("Text model loaded");
		}
		let model = guard
			.as_mut()
			.ok_or_else(|| Error::Embedding("text model unavailable".into()))?;

		let embedding = model.encode(text).map_err(embedding_err)?;
		ctx.check("embedding")?;
		Ok(embedding)
	}
}
