//! Application configuration and constants

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

static CUSTOM_MODEL_DIR: OnceLock<PathBuf> = OnceLock::new();
static CUSTOM_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

// === Model Files ===
pub const VISION_MODEL: &str = "vision_model_q4f16.onnx";
pub const TEXT_MODEL: &str = "text_model_q4f16.onnx";
pub const TOKENIZER: &str = "tokenizer.json";
pub const MODEL_NAME: &str = "clip-vit-b-32";

// === Model Parameters ===
pub const INPUT_SIZE: u32 = 224;
pub const EMBEDDING_DIM: usize = 512;

// === Vector Collection ===
pub const VECTOR_NAME: &str = "clip_global";

// === Perceptual Hash ===
pub const PHASH_GRID: usize = 32;
pub const PHASH_LOW_FREQ: usize = 8;

// === Storage ===
pub const INDEX_FILE: &str = "index.msgpack";
pub const AUDIT_FILE: &str = "audit.jsonl";
pub const FEEDBACK_FILE: &str = "feedback.jsonl";
pub const OBJECTS_DIR: &str = "objects";

// === File Extensions ===
pub const IMAGE_EXTENSIONS: &[&str] = &[
	"jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif", "ico", "avif",
];

// === Search Defaults ===
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 100;

// === Deduplication Defaults ===
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.85;
pub const DEFAULT_DEDUP_LIMIT: usize = 200;
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 10;
pub const DEFAULT_BUCKET_PREFIX: usize = 8;

// === Anomaly Defaults ===
pub const DEFAULT_ANOMALY_LIMIT: usize = 100;

// === Background Scans ===
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Tunables that a deployment may override from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub embed_timeout_secs: u64,
	pub index_timeout_secs: u64,
	pub object_timeout_secs: u64,
	pub bucket_prefix_len: usize,
	pub neighbor_limit: usize,
	pub page_size: usize,
	/// Upper bound on candidates a background scan reads; `None` scans everything.
	pub max_scan_candidates: Option<usize>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			embed_timeout_secs: 30,
			index_timeout_secs: 5,
			object_timeout_secs: 5,
			bucket_prefix_len: DEFAULT_BUCKET_PREFIX,
			neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
			page_size: DEFAULT_PAGE_SIZE,
			max_scan_candidates: None,
		}
	}
}

impl Settings {
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read settings: {}", path.display()))?;
		let settings: Self = serde_json::from_str(&text)
			.with_context(|| format!("Invalid settings file: {}", path.display()))?;
		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<()> {
		if self.bucket_prefix_len == 0 || self.bucket_prefix_len > 16 {
			anyhow::bail!("bucket_prefix_len must be within 1..=16");
		}
		if self.neighbor_limit == 0 {
			anyhow::bail!("neighbor_limit must be positive");
		}
		if self.page_size == 0 {
			anyhow::bail!("page_size must be positive");
		}
		Ok(())
	}

	pub fn embed_timeout(&self) -> Duration {
		Duration::from_secs(self.embed_timeout_secs)
	}

	pub fn index_timeout(&self) -> Duration {
		Duration::from_secs(self.index_timeout_secs)
	}

	pub fn object_timeout(&self) -> Duration {
		Duration::from_secs(self.object_timeout_secs)
	}
}

pub fn set_model_dir(path: PathBuf) {
	let _ = CUSTOM_MODEL_DIR.set(path);
}

pub fn set_data_dir(path: PathBuf) {
	let _ = CUSTOM_DATA_DIR.set(path);
}

/// Get models directory (custom, GLIMPSE_MODELS_DIR, or next to the executable)
pub fn models_dir() -> Option<PathBuf> {
	if let Some(custom) = CUSTOM_MODEL_DIR.get() {
		crate::ui::debug(&format!("Using custom model dir: {}", custom.display()));
		return Some(custom.clone());
	}

	if let Ok(env_path) = std::env::var("GLIMPSE_MODELS_DIR") {
		let path = PathBuf::from(&env_path);
		if path.is_dir() {
			crate::ui::debug(&format!("Using GLIMPSE_MODELS_DIR: {}", env_path));
			return Some(path);
		}
	}

	if let Ok(exe) = std::env::current_exe() {
		if let Some(dir) = exe.parent() {
			let models = dir.join("models");
			if models.is_dir() {
				crate::ui::debug(&format!("Found models at: {}", models.display()));
				return Some(models);
			}
		}
	}

	None
}

/// Get data directory (custom, GLIMPSE_DATA_DIR, or ./.glimpse)
pub fn data_dir() -> PathBuf {
	if let Some(custom) = CUSTOM_DATA_DIR.get() {
		return custom.clone();
	}
	if let Ok(env_path) = std::env::var("GLIMPSE_DATA_DIR") {
		return PathBuf::from(env_path);
	}
	PathBuf::from(".glimpse")
}

pub fn get_vision_model_path() -> Option<PathBuf> {
	models_dir().map(|d| d.join(VISION_MODEL))
}

pub fn get_text_model_path() -> Option<PathBuf> {
	models_dir().map(|d| d.join(TEXT_MODEL))
}

pub fn get_tokenizer_path() -> Option<PathBuf> {
	models_dir().map(|d| d.join(TOKENIZER))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		Settings::default().validate().unwrap();
	}

	#[test]
	fn partial_settings_fill_in_defaults() {
		let settings: Settings = serde_json::from_str(r#"{"neighbor_limit": 25}"#).unwrap();
		assert_eq!(settings.neighbor_limit, 25);
		assert_eq!(settings.bucket_prefix_len, DEFAULT_BUCKET_PREFIX);
		assert_eq!(settings.embed_timeout(), Duration::from_secs(30));
	}

	#[test]
	fn load_rejects_bad_prefix() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("settings.json");
		std::fs::write(&path, r#"{"bucket_prefix_len": 0}"#).unwrap();
		assert!(Settings::load(&path).is_err());
	}
}
