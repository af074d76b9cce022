//! Derived, per-request result sets: near-duplicate clusters and anomaly rankings

use serde::{Deserialize, Serialize};

use crate::core::asset::{AssetId, AssetPayload};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
	pub asset_id: AssetId,
	/// Similarity to the cluster seed (the seed itself carries 1.0)
	pub score: f32,
}

/// A group of near-duplicates discovered from a single seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
	pub seed: AssetId,
	/// Seed first, then neighbors in descending score order
	pub images: Vec<ClusterMember>,
}

impl ClusterResult {
	pub fn len(&self) -> usize {
		self.images.len()
	}

	pub fn is_empty(&self) -> bool {
		self.images.is_empty()
	}

	pub fn contains(&self, id: &AssetId) -> bool {
		self.images.iter().any(|m| &m.asset_id == id)
	}

	/// Average seed-relative similarity of the non-seed members
	pub fn cohesion(&self) -> f32 {
		let others: Vec<f32> = self
			.images
			.iter()
			.filter(|m| m.asset_id != self.seed)
			.map(|m| m.score)
			.collect();
		if others.is_empty() {
			1.0
		} else {
			others.iter().sum::<f32>() / others.len() as f32
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupReport {
	pub clusters: Vec<ClusterResult>,
	/// Candidates read from the index
	pub scanned: usize,
	/// Seeds whose neighbor query failed and were passed over
	pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
	pub asset_id: AssetId,
	/// `1 - similarity to the nearest other asset`, in `[0, 1]`
	pub anomaly_score: f32,
	pub payload: AssetPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyReport {
	/// Sorted by descending anomaly score
	pub records: Vec<AnomalyRecord>,
	pub scanned: usize,
	pub skipped: usize,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cohesion_ignores_the_seed() {
		let seed = AssetId::generate();
		let cluster = ClusterResult {
			seed,
			images: vec![
				ClusterMember { asset_id: seed, score: 1.0 },
				ClusterMember { asset_id: AssetId::generate(), score: 0.9 },
				ClusterMember { asset_id: AssetId::generate(), score: 0.8 },
			],
		};
		assert!((cluster.cohesion() - 0.85).abs() < 1e-6);
		assert!(cluster.contains(&seed));
		assert_eq!(cluster.len(), 3);
	}
}
