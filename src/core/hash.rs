//! Content and perceptual hashing of raw image bytes

use std::io::Cursor;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::config::{PHASH_GRID, PHASH_LOW_FREQ};
use crate::core::error::{Error, Result};
use crate::core::media::ImageFormat;

const PHASH_TAG: &str = "p:";

/// blake3 digest of the exact byte sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
	pub fn compute(bytes: &[u8]) -> Self {
		Self(blake3::hash(bytes).to_hex().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn short(&self) -> &str {
		&self.0[..8]
	}
}

impl std::fmt::Display for ContentHash {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// 64-bit DCT hash. Visually similar images tend to land a small Hamming
/// distance apart; this is a heuristic, not a guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(u64);

impl PerceptualHash {
	pub fn from_bits(bits: u64) -> Self {
		Self(bits)
	}

	pub fn bits(&self) -> u64 {
		self.0
	}

	pub fn hamming(&self, other: &Self) -> u32 {
		(self.0 ^ other.0).count_ones()
	}

	/// First `prefix_len` hex digits (after the tag), used as a coarse bucket.
	pub fn bucket_key(&self, prefix_len: usize) -> String {
		let hex = format!("{:016x}", self.0);
		hex[..prefix_len.min(hex.len())].to_string()
	}

	/// Resize to a fixed grid, run a 2-D DCT-II and threshold the
	/// low-frequency block against its median.
	pub fn compute(img: &DynamicImage) -> Self {
		let gray = img
			.resize_exact(PHASH_GRID as u32, PHASH_GRID as u32, FilterType::Triangle)
			.to_luma8();

		let pixels = Array2::from_shape_fn((PHASH_GRID, PHASH_GRID), |(y, x)| {
			gray.get_pixel(x as u32, y as u32)[0] as f64
		});

		let basis = dct_basis(PHASH_GRID);
		let coefficients = basis.dot(&pixels).dot(&basis.t());
		let low = coefficients.slice(s![0..PHASH_LOW_FREQ, 0..PHASH_LOW_FREQ]);

		let mut sorted: Vec<f64> = low.iter().copied().collect();
		sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
		let mid = sorted.len() / 2;
		let median = (sorted[mid - 1] + sorted[mid]) / 2.0;

		let bits = low
			.iter()
			.fold(0u64, |acc, &c| (acc << 1) | u64::from(c > median));
		Self(bits)
	}
}

/// Orthonormal DCT-II basis; row `k` holds frequency `k`.
fn dct_basis(n: usize) -> Array2<f64> {
	let scale0 = (1.0 / n as f64).sqrt();
	let scale = (2.0 / n as f64).sqrt();
	Array2::from_shape_fn((n, n), |(k, i)| {
		let c = if k == 0 { scale0 } else { scale };
		c * (std::f64::consts::PI * (2 * i + 1) as f64 * k as f64 / (2 * n) as f64).cos()
	})
}

impl std::fmt::Display for PerceptualHash {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}{:016x}", PHASH_TAG, self.0)
	}
}

impl FromStr for PerceptualHash {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		let hex = s
			.strip_prefix(PHASH_TAG)
			.ok_or_else(|| Error::Validation(format!("perceptual hash missing tag: {}", s)))?;
		u64::from_str_radix(hex, 16)
			.map(Self)
			.map_err(|e| Error::Validation(format!("bad perceptual hash {}: {}", s, e)))
	}
}

impl Serialize for PerceptualHash {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for PerceptualHash {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// Everything learned from a single decode of the uploaded bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
	pub content_hash: ContentHash,
	pub perceptual_hash: PerceptualHash,
	pub width: u32,
	pub height: u32,
	pub format: ImageFormat,
}

pub struct ContentHasher;

impl ContentHasher {
	/// Decode once, then derive both hashes. Unreadable bytes are a
	/// `Decode` error so callers reject the upload instead of indexing it.
	pub fn hash(bytes: &[u8]) -> Result<Fingerprint> {
		let (img, format) = decode(bytes)?;
		Ok(Fingerprint {
			content_hash: ContentHash::compute(bytes),
			perceptual_hash: PerceptualHash::compute(&img),
			width: img.width(),
			height: img.height(),
			format,
		})
	}
}

/// Decode bytes, returning the image and its detected format.
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
	if bytes.is_empty() {
		return Err(Error::Decode("empty input".into()));
	}

	let reader = ImageReader::new(Cursor::new(bytes))
		.with_guessed_format()
		.map_err(|e| Error::Decode(e.to_string()))?;
	let detected = reader
		.format()
		.ok_or_else(|| Error::Decode("unrecognized image signature".into()))?;
	let format = ImageFormat::from_detected(detected)?;

	let img = reader.decode().map_err(|e| Error::Decode(e.to_string()))?;
	if img.width() == 0 || img.height() == 0 {
		return Err(Error::Decode("image has zero area".into()));
	}
	Ok((img, format))
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{ImageBuffer, Rgb, RgbImage};

	fn encode_png(img: &RgbImage) -> Vec<u8> {
		let mut out = Cursor::new(Vec::new());
		img.write_to(&mut out, image::ImageFormat::Png).unwrap();
		out.into_inner()
	}

	fn gradient(w: u32, h: u32) -> RgbImage {
		ImageBuffer::from_fn(w, h, |x, y| Rgb([(x * 255 / w) as u8, (y * 255 / h) as u8, 128]))
	}

	/// 4x4 grid of flat blocks with pseudo-random intensities; dense in the
	/// low-frequency DCT block, so the median threshold is well separated.
	fn blocks(size: u32, seed: u32) -> RgbImage {
		let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
		let mut shades = [0u8; 16];
		for shade in shades.iter_mut() {
			state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
			*shade = (state >> 16) as u8;
		}
		let cell = size / 4;
		ImageBuffer::from_fn(size, size, |x, y| {
			let v = shades[((y / cell).min(3) * 4 + (x / cell).min(3)) as usize];
			Rgb([v, v, v])
		})
	}

	#[test]
	fn hashing_is_deterministic() {
		let bytes = encode_png(&gradient(64, 48));
		let a = ContentHasher::hash(&bytes).unwrap();
		let b = ContentHasher::hash(&bytes).unwrap();
		assert_eq!(a, b);
		assert_eq!(a.width, 64);
		assert_eq!(a.height, 48);
		assert_eq!(a.format, ImageFormat::Png);
		assert_eq!(a.content_hash.as_str().len(), 64);
	}

	#[test]
	fn distinct_images_hash_differently() {
		let a = ContentHasher::hash(&encode_png(&blocks(64, 1))).unwrap();
		let b = ContentHasher::hash(&encode_png(&blocks(64, 2))).unwrap();
		assert_ne!(a.content_hash, b.content_hash);
		assert_ne!(a.perceptual_hash, b.perceptual_hash);
	}

	#[test]
	fn resized_copy_stays_perceptually_close() {
		let original = blocks(128, 7);
		let smaller = image::imageops::resize(&original, 96, 96, FilterType::Triangle);
		let a = ContentHasher::hash(&encode_png(&original)).unwrap();
		let b = ContentHasher::hash(&encode_png(&smaller)).unwrap();
		assert_ne!(a.content_hash, b.content_hash);
		assert!(a.perceptual_hash.hamming(&b.perceptual_hash) <= 12);
	}

	#[test]
	fn garbage_bytes_are_a_decode_error() {
		let err = ContentHasher::hash(b"definitely not an image").unwrap_err();
		assert!(matches!(err, Error::Decode(_)));
		assert!(matches!(ContentHasher::hash(&[]).unwrap_err(), Error::Decode(_)));
	}

	#[test]
	fn truncated_png_is_a_decode_error() {
		let bytes = encode_png(&gradient(32, 32));
		let err = ContentHasher::hash(&bytes[..bytes.len() / 2]).unwrap_err();
		assert!(matches!(err, Error::Decode(_)));
	}

	#[test]
	fn perceptual_hash_string_round_trips() {
		let hash = PerceptualHash::from_bits(0xdead_beef_0123_4567);
		let rendered = hash.to_string();
		assert_eq!(rendered, "p:deadbeef01234567");
		assert_eq!(rendered.parse::<PerceptualHash>().unwrap(), hash);
		assert!("deadbeef".parse::<PerceptualHash>().is_err());
	}

	#[test]
	fn bucket_key_skips_the_tag() {
		let hash = PerceptualHash::from_bits(0xabcd_ef01_2345_6789);
		assert_eq!(hash.bucket_key(8), "abcdef01");
		assert_eq!(hash.bucket_key(64), "abcdef0123456789");
	}

	#[test]
	fn dct_basis_is_orthonormal() {
		let d = dct_basis(8);
		let identity = d.dot(&d.t());
		for ((i, j), v) in identity.indexed_iter() {
			let expected = if i == j { 1.0 } else { 0.0 };
			assert!((v - expected).abs() < 1e-9, "({}, {}) = {}", i, j, v);
		}
	}
}
