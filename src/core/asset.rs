//! Asset identity, tenancy and the typed payload stored next to each vector

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{Error, Result};
use crate::core::hash::{ContentHash, Fingerprint, PerceptualHash};
use crate::core::media::ImageFormat;

/// The one identifier for an asset: index key, payload field and API value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}
}

impl std::fmt::Display for AssetId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for AssetId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Uuid::parse_str(s.trim())
			.map(Self)
			.map_err(|e| Error::Validation(format!("invalid asset id '{}': {}", s, e)))
	}
}

/// Owning principal; every read and write is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
	pub fn new(id: impl Into<String>) -> Result<Self> {
		let id = id.into();
		let trimmed = id.trim();
		if trimmed.is_empty() {
			return Err(Error::Validation("tenant id must not be empty".into()));
		}
		if trimmed.len() > 128 {
			return Err(Error::Validation("tenant id longer than 128 characters".into()));
		}
		Ok(Self(trimmed.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl TryFrom<String> for TenantId {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::new(value)
	}
}

impl From<TenantId> for String {
	fn from(value: TenantId) -> Self {
		value.0
	}
}

impl std::fmt::Display for TenantId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

pub type Tags = BTreeSet<String>;

/// Normalize free-form tags: trimmed, non-empty, deduplicated.
pub fn normalize_tags<I, S>(tags: I) -> Tags
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	tags.into_iter()
		.map(|t| t.as_ref().trim().to_string())
		.filter(|t| !t.is_empty())
		.collect()
}

/// Everything the index keeps alongside an asset's vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPayload {
	pub asset_id: AssetId,
	pub tenant_id: TenantId,
	pub content_hash: ContentHash,
	pub perceptual_hash: PerceptualHash,
	pub width: u32,
	pub height: u32,
	pub format: ImageFormat,
	pub tags: Tags,
	pub created_at: DateTime<Utc>,
	pub source_locator: String,
	pub model_name: String,
}

impl AssetPayload {
	pub fn new(
		asset_id: AssetId,
		tenant_id: TenantId,
		fingerprint: &Fingerprint,
		tags: Tags,
		source_locator: String,
		model_name: String,
	) -> Self {
		Self {
			asset_id,
			tenant_id,
			content_hash: fingerprint.content_hash.clone(),
			perceptual_hash: fingerprint.perceptual_hash,
			width: fingerprint.width,
			height: fingerprint.height,
			format: fingerprint.format,
			tags,
			created_at: Utc::now(),
			source_locator,
			model_name,
		}
	}

	pub fn summary(&self, deduplicated: bool) -> AssetSummary {
		AssetSummary {
			asset_id: self.asset_id,
			content_hash: self.content_hash.clone(),
			perceptual_hash: self.perceptual_hash,
			width: self.width,
			height: self.height,
			format: self.format,
			deduplicated,
		}
	}
}

/// Ingest output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
	pub asset_id: AssetId,
	pub content_hash: ContentHash,
	pub perceptual_hash: PerceptualHash,
	pub width: u32,
	pub height: u32,
	pub format: ImageFormat,
	/// True when identical bytes were already indexed for this tenant and
	/// the existing asset was returned instead of re-embedding.
	pub deduplicated: bool,
}
