//! Vision tower (CLIP) for image embeddings

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use ort::session::Session;
use std::path::Path;

use crate::config::{EMBEDDING_DIM, INPUT_SIZE};
use crate::core::Embedding;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

pub struct VisionModel {
	session: Session,
}

impl VisionModel {
	pub fn load(model_path: &Path) -> Result<Self> {
		let session = crate::runtime::create_session(model_path).context("Failed to load vision model")?;
		Ok(Self { session })
	}

	pub fn encode(&mut self, image: &DynamicImage) -> Result<Embedding> {
		let pixels = preprocess(image);
		let input = ort::value::Value::from_array(pixels)?;

		let outputs = self.session.run(ort::inputs!["pixel_values" => input])?;
		let output = outputs
			.get("image_embeds")
			.or_else(|| outputs.get("pooler_output"))
			.context("Vision model produced no image_embeds or pooler_output")?;

		let (shape, data) = output.try_extract_tensor::<f32>()?;
		let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
		Ok(Embedding::new(pool(&dims, data)))
	}
}

/// Flatten transparency onto white, then shortest-side resize + center crop,
/// then CLIP mean/std normalization into NCHW layout.
fn preprocess(img: &DynamicImage) -> (Vec<usize>, Vec<f32>) {
	let rgb = flatten_alpha(img);
	let (w, h) = rgb.dimensions();
	let scale = INPUT_SIZE as f32 / w.min(h) as f32;
	let (rw, rh) = (
		((w as f32 * scale).round() as u32).max(INPUT_SIZE),
		((h as f32 * scale).round() as u32).max(INPUT_SIZE),
	);
	let resized = image::imageops::resize(&rgb, rw, rh, FilterType::CatmullRom);
	let (left, top) = ((rw - INPUT_SIZE) / 2, (rh - INPUT_SIZE) / 2);
	let cropped = image::imageops::crop_imm(&resized, left, top, INPUT_SIZE, INPUT_SIZE).to_image();

	let size = INPUT_SIZE as usize;
	let mut data = vec![0.0f32; 3 * size * size];
	for (x, y, px) in cropped.enumerate_pixels() {
		let idx = y as usize * size + x as usize;
		for c in 0..3 {
			data[c * size * size + idx] = (px[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
		}
	}

	(vec![1, 3, size, size], data)
}

fn flatten_alpha(img: &DynamicImage) -> RgbImage {
	if !img.color().has_alpha() {
		return img.to_rgb8();
	}
	let rgba = img.to_rgba8();
	RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
		let p = rgba.get_pixel(x, y);
		let a = p[3] as f32 / 255.0;
		let blend = |c: u8| (c as f32 * a + 255.0 * (1.0 - a)).round() as u8;
		Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
	})
}

/// Accept `[1, dim]` directly, mean-pool `[1, tokens, dim]`.
pub(crate) fn pool(dims: &[usize], data: &[f32]) -> Vec<f32> {
	match dims {
		[1, dim] if *dim == EMBEDDING_DIM => data.to_vec(),
		[1, n, dim] if *dim == EMBEDDING_DIM => {
			let mut pooled = vec![0.0; *dim];
			for i in 0..*n {
				for j in 0..*dim {
					pooled[j] += data[i * dim + j];
				}
			}
			pooled.iter_mut().for_each(|v| *v /= *n as f32);
			pooled
		}
		_ => data.iter().take(EMBEDDING_DIM).copied().collect(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{Rgba, RgbaImage};

	#[test]
	fn preprocess_produces_nchw_tensor() {
		let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, Rgb([255, 0, 0])));
		let (shape, data) = preprocess(&img);
		let size = INPUT_SIZE as usize;
		assert_eq!(shape, vec![1, 3, size, size]);
		assert_eq!(data.len(), 3 * size * size);
		let red = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
		assert!((data[0] - red).abs() < 1e-4);
	}

	#[test]
	fn transparent_pixels_become_white() {
		let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
		let flat = flatten_alpha(&img);
		assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
	}

	#[test]
	fn mean_pools_token_outputs() {
		let mut data = vec![0.0; 2 * EMBEDDING_DIM];
		data[0] = 2.0;
		data[EMBEDDING_DIM] = 4.0;
		let pooled = pool(&[1, 2, EMBEDDING_DIM], &data);
		assert_eq!(pooled.len(), EMBEDDING_DIM);
		assert_eq!(pooled[0], 3.0);
	}
}
