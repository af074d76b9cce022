//! Tenant-scoped payload filters

use serde::{Deserialize, Serialize};

use crate::core::{AssetPayload, ContentHash, ImageFormat, PerceptualHash, TenantId};

/// Payload fields a collection can index for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadField {
	TenantId,
	ContentHash,
	PerceptualHash,
	Tags,
	Format,
	CreatedAt,
}

/// Exact-match predicate on one payload field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum Condition {
	ContentHash(ContentHash),
	PerceptualHash(PerceptualHash),
	/// Matches when the asset carries this tag
	Tag(String),
	Format(ImageFormat),
}

impl Condition {
	pub fn field(&self) -> PayloadField {
		match self {
			Condition::ContentHash(_) => PayloadField::ContentHash,
			Condition::PerceptualHash(_) => PayloadField::PerceptualHash,
			Condition::Tag(_) => PayloadField::Tags,
			Condition::Format(_) => PayloadField::Format,
		}
	}

	fn matches(&self, payload: &AssetPayload) -> bool {
		match self {
			Condition::ContentHash(h) => &payload.content_hash == h,
			Condition::PerceptualHash(h) => &payload.perceptual_hash == h,
			Condition::Tag(t) => payload.tags.contains(t),
			Condition::Format(f) => &payload.format == f,
		}
	}
}

/// Conjunction of conditions, always anchored to one tenant.
///
/// There is no constructor without a tenant, so every index query carries
/// the tenant predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
	tenant_id: TenantId,
	conditions: Vec<Condition>,
}

impl Filter {
	pub fn tenant(tenant_id: TenantId) -> Self {
		Self {
			tenant_id,
			conditions: Vec::new(),
		}
	}

	pub fn with(mut self, condition: Condition) -> Self {
		self.conditions.push(condition);
		self
	}

	pub fn with_all(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
		self.conditions.extend(conditions);
		self
	}

	pub fn tenant_id(&self) -> &TenantId {
		&self.tenant_id
	}

	pub fn conditions(&self) -> &[Condition] {
		&self.conditions
	}

	pub fn matches(&self, payload: &AssetPayload) -> bool {
		payload.tenant_id == self.tenant_id && self.conditions.iter().all(|c| c.matches(payload))
	}
}
