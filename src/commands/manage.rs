//! Asset management commands: delete, reindex, list

use anyhow::{Context, Result};
use colored::*;

use super::{parse_asset_id, Workspace};
use crate::processing::SearchService;
use crate::ui;

pub fn delete(ws: &Workspace, asset: &str) -> Result<()> {
	let asset_id = parse_asset_id(asset)?;
	let payload = ws.coordinator().delete(&ws.context(), &ws.tenant, &asset_id)?;

	ws.save().context("Failed to save index")?;
	ui::success(&format!("Deleted {} ({})", asset_id, payload.source_locator));
	Ok(())
}

pub fn reindex(ws: &Workspace, asset: &str) -> Result<()> {
	let asset_id = parse_asset_id(asset)?;
	let summary = ws.coordinator().with_embedder(ws.embedder()?).reindex(&ws.context(), &ws.tenant, &asset_id)?;

	ws.save().context("Failed to save index")?;
	ui::success(&format!(
		"Reindexed {} ({}x{} {}, {})",
		summary.asset_id, summary.width, summary.height, summary.format, summary.perceptual_hash
	));
	Ok(())
}

pub fn list(ws: &Workspace, limit: usize, from: Option<&str>) -> Result<()> {
	let offset = from.map(parse_asset_id).transpose()?;
	let page = SearchService::new(ws.index.clone())
		.with_settings(ws.settings.clone())
		.list(&ws.context(), &ws.tenant, Some(limit), offset)?;

	if page.points.is_empty() {
		ui::warn(&format!("No assets for tenant {}", ws.tenant));
		return Ok(());
	}

	ui::header(&format!("Assets ({})", ws.tenant));
	for point in &page.points {
		let p = &point.payload;
		let tags = if p.tags.is_empty() {
			String::new()
		} else {
			format!("[{}]", p.tags.iter().cloned().collect::<Vec<_>>().join(", "))
		};
		println!(
			"  {} {} {} {} {}",
			point.asset_id.to_string().bright_white(),
			format!("{}x{} {}", p.width, p.height, p.format).dimmed(),
			p.perceptual_hash.to_string().bright_black(),
			p.source_locator,
			tags.yellow()
		);
	}

	if let Some(next) = page.next_offset {
		println!();
		ui::info(&format!("More assets: --from {}", next));
	}
	Ok(())
}
