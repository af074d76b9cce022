//! Core domain types

pub mod asset;
pub mod cluster;
pub mod embedding;
pub mod error;
pub mod hash;
pub mod media;

pub use asset::{normalize_tags, AssetId, AssetPayload, AssetSummary, Tags, TenantId};
pub use cluster::{AnomalyRecord, AnomalyReport, ClusterMember, ClusterResult, DedupReport};
pub use embedding::{single_slot, Embedding, NamedVectors};
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher, Fingerprint, PerceptualHash};
pub use media::ImageFormat;
