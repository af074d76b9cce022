//! Text tower (CLIP) for query embeddings

use anyhow::{Context, Result};
use ort::session::Session;
use std::path::Path;
use tokenizers::Tokenizer;

use crate::core::Embedding;

pub struct TextModel {
	session: Session,
	tokenizer: Tokenizer,
}

impl TextModel {
	pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
		let session = crate::runtime::create_session(model_path).context("Failed to load text model")?;

		let tokenizer = Tokenizer::from_file(tokenizer_path)
			.map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

		Ok(Self { session, tokenizer })
	}

	pub fn encode(&mut self, text: &str) -> Result<Embedding> {
		let encoding = self
			.tokenizer
			.encode(text, true)
			.map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

		let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
		let shape = vec![1, input_ids.len()];
		let input = ort::value::Value::from_array((shape, input_ids))?;

		let outputs = self.session.run(ort::inputs!["input_ids" => input])?;
		let output = outputs
			.get("text_embeds")
			.or_else(|| outputs.get("pooler_output"))
			.context("Text model produced no text_embeds or pooler_output")?;

		let (shape, data) = output.try_extract_tensor::<f32>()?;
		let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
		Ok(Embedding::new(super::vision::pool(&dims, data)))
	}
}
