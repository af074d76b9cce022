//! Raster format detection

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
	Png,
	Jpeg,
	Gif,
	Webp,
	Bmp,
	Tiff,
	Ico,
	Avif,
}

impl ImageFormat {
	/// Map a decoder-detected format onto the set we index.
	pub fn from_detected(format: image::ImageFormat) -> Result<Self> {
		match format {
			image::ImageFormat::Png => Ok(Self::Png),
			image::ImageFormat::Jpeg => Ok(Self::Jpeg),
			image::ImageFormat::Gif => Ok(Self::Gif),
			image::ImageFormat::WebP => Ok(Self::Webp),
			image::ImageFormat::Bmp => Ok(Self::Bmp),
			image::ImageFormat::Tiff => Ok(Self::Tiff),
			image::ImageFormat::Ico => Ok(Self::Ico),
			image::ImageFormat::Avif => Ok(Self::Avif),
			other => Err(Error::InvalidFormat(format!("{:?}", other).to_lowercase())),
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Png => "png",
			Self::Jpeg => "jpeg",
			Self::Gif => "gif",
			Self::Webp => "webp",
			Self::Bmp => "bmp",
			Self::Tiff => "tiff",
			Self::Ico => "ico",
			Self::Avif => "avif",
		}
	}

	/// File extensions picked up when walking a directory for ingestion
	pub fn is_image_extension(ext: &str) -> bool {
		crate::config::IMAGE_EXTENSIONS
			.iter()
			.any(|e| e.eq_ignore_ascii_case(ext))
	}
}

impl std::fmt::Display for ImageFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_supported_formats() {
		assert_eq!(ImageFormat::from_detected(image::ImageFormat::Png).unwrap(), ImageFormat::Png);
		assert_eq!(ImageFormat::from_detected(image::ImageFormat::WebP).unwrap().as_str(), "webp");
	}

	#[test]
	fn rejects_unindexed_formats() {
		let err = ImageFormat::from_detected(image::ImageFormat::Hdr).unwrap_err();
		assert!(matches!(err, Error::InvalidFormat(_)));
	}

	#[test]
	fn extension_check_is_case_insensitive() {
		assert!(ImageFormat::is_image_extension("JPG"));
		assert!(!ImageFormat::is_image_extension("txt"));
	}
}
