//! Normalized embedding vectors for semantic similarity

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
	/// Create normalized embedding from raw data
	pub fn new(data: Vec<f32>) -> Self {
		Self(normalize(&data))
	}

	/// Create from pre-normalized data (deserialization)
	pub fn raw(data: Vec<f32>) -> Self {
		Self(data)
	}

	pub fn as_slice(&self) -> &[f32] {
		&self.0
	}

	pub fn dim(&self) -> usize {
		self.0.len()
	}

	/// Cosine similarity, assuming both sides are unit length
	pub fn similarity(&self, other: &Self) -> f32 {
		self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
	}

	pub fn is_finite(&self) -> bool {
		self.0.iter().all(|v| v.is_finite())
	}
}

fn normalize(v: &[f32]) -> Vec<f32> {
	let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
	if norm > 0.0 {
		v.iter().map(|x| x / norm).collect()
	} else {
		v.to_vec()
	}
}

/// Embeddings keyed by vector slot name (e.g. `clip_global`)
pub type NamedVectors = BTreeMap<String, Embedding>;

/// Convenience for the common single-slot case.
pub fn single_slot(name: &str, embedding: Embedding) -> NamedVectors {
	let mut vectors = NamedVectors::new();
	vectors.insert(name.to_string(), embedding);
	vectors
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_normalizes_to_unit_length() {
		let e = Embedding::new(vec![3.0, 4.0]);
		assert!((e.similarity(&e) - 1.0).abs() < 1e-6);
		assert!((e.as_slice()[0] - 0.6).abs() < 1e-6);
	}

	#[test]
	fn zero_vector_is_left_alone() {
		let e = Embedding::new(vec![0.0; 4]);
		assert_eq!(e.as_slice(), &[0.0; 4]);
	}

	#[test]
	fn orthogonal_vectors_have_zero_similarity() {
		let a = Embedding::new(vec![1.0, 0.0, 0.0]);
		let b = Embedding::new(vec![0.0, 1.0, 0.0]);
		assert_eq!(a.similarity(&b), 0.0);
	}
}
