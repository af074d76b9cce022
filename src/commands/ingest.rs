//! Ingest command - store and index images

use anyhow::{Context, Result};
use colored::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use super::Workspace;
use crate::core::{normalize_tags, ContentHash, ImageFormat};
use crate::processing::IngestRequest;
use crate::storage::ObjectStore;
use crate::ui;

/// Image files under `paths`, deduplicated by canonical path.
pub fn collect_images(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
	let mut seen = HashSet::new();
	let mut images = Vec::new();

	let mut add = |p: &Path| {
		if !is_image(p) {
			return;
		}
		let canonical = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
		if seen.insert(canonical.clone()) {
			images.push(canonical);
		}
	};

	for path in paths {
		if path.is_file() {
			add(path);
		} else if path.is_dir() {
			let walker = if recursive { WalkDir::new(path) } else { WalkDir::new(path).max_depth(1) };
			for entry in walker.into_iter().filter_map(|e| e.ok()) {
				if entry.file_type().is_file() {
					add(entry.path());
				}
			}
		} else {
			ui::warn(&format!("Skipping {}: not a file or directory", path.display()));
		}
	}

	images.sort();
	images
}

fn is_image(path: &Path) -> bool {
	path.extension()
		.and_then(|e| e.to_str())
		.is_some_and(ImageFormat::is_image_extension)
}

pub fn run(ws: &Workspace, paths: &[PathBuf], recursive: bool, tags: &[String]) -> Result<()> {
	let start = Instant::now();
	let images = collect_images(paths, recursive);

	if images.is_empty() {
		ui::warn("No images found");
		return Ok(());
	}
	ui::info(&format!("Ingesting {} images for tenant {}", images.len(), ws.tenant));

	let coordinator = ws.coordinator().with_embedder(ws.embedder()?);
	let tags = normalize_tags(tags);
	let ctx = ws.context();

	let (mut indexed, mut existing, mut errors) = (0, 0, 0);
	let total = images.len();

	for (i, path) in images.iter().enumerate() {
		if ctx.cancel_token().is_cancelled() {
			ui::warn(&format!("Stopped after {} of {} images", i, total));
			break;
		}
		let queue = format!("[{}/{}]", i + 1, total).bright_blue().bold();
		let file_start = Instant::now();

		let result = store(ws, path).and_then(|locator| {
			coordinator
				.ingest(
					&ctx,
					IngestRequest {
						tenant_id: ws.tenant.clone(),
						source_locator: locator,
						tags: tags.clone(),
					},
				)
				.map_err(anyhow::Error::from)
		});

		match result {
			Ok(summary) if summary.deduplicated => {
				ui::debug(&format!("{} {} already indexed as {}", queue, path.display(), summary.asset_id));
				existing += 1;
			}
			Ok(summary) => {
				ui::file_ingested(path, &summary.asset_id.to_string(), file_start.elapsed().as_millis());
				indexed += 1;
			}
			Err(e) => {
				ui::error(&format!("{} {}: {:#}", queue, ui::path_link(path, 60), e));
				errors += 1;
			}
		}
	}

	ws.save().context("Failed to save index")?;
	ws.log_metrics();

	println!();
	ui::success(&format!(
		"Indexed {} images in {:.1}s ({} already present)",
		indexed,
		start.elapsed().as_secs_f32(),
		existing
	));
	if errors > 0 {
		ui::warn(&format!("{} errors", errors));
	}
	Ok(())
}

/// Copy the file into the object store under `<tenant>/<content hash>.<ext>`.
fn store(ws: &Workspace, path: &Path) -> Result<String> {
	let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
	let ext = path
		.extension()
		.and_then(|e| e.to_str())
		.map(|e| e.to_ascii_lowercase())
		.unwrap_or_else(|| "bin".into());
	let locator = format!("{}/{}.{}", ws.tenant, ContentHash::compute(&bytes), ext);

	ws.objects.put(&ws.context().child(ws.settings.object_timeout()), &locator, &bytes)?;
	Ok(locator)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn collects_images_only() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("a.png"), b"x").unwrap();
		std::fs::write(dir.path().join("b.JPG"), b"x").unwrap();
		std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
		std::fs::create_dir(dir.path().join("sub")).unwrap();
		std::fs::write(dir.path().join("sub/c.webp"), b"x").unwrap();

		let flat = collect_images(&[dir.path().to_path_buf()], false);
		assert_eq!(flat.len(), 2);

		let deep = collect_images(&[dir.path().to_path_buf(), dir.path().join("a.png")], true);
		assert_eq!(deep.len(), 3);
	}
}
