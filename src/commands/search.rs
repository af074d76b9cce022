//! Search command - find similar images

use anyhow::{anyhow, Context, Result};
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{export_json, parse_asset_id, quiet, Workspace};
use crate::index::{Condition, ScoredPoint};
use crate::processing::{SearchQuery, SearchRequest, SearchService};
use crate::ui;

#[derive(Serialize)]
struct SearchExport<'a> {
	tenant: &'a str,
	results: &'a [ScoredPoint],
}

#[allow(clippy::too_many_arguments)]
pub fn run(
	ws: &Workspace,
	query_text: Option<&str>,
	query_image: Option<&Path>,
	query_asset: Option<&str>,
	tag: Option<&str>,
	limit: usize,
	min_score: Option<f32>,
	export: Option<&PathBuf>,
) -> Result<()> {
	let search_start = std::time::Instant::now();

	let (query, label) = match (query_text, query_image, query_asset) {
		(Some(text), None, None) => (SearchQuery::Text(text.to_string()), format!("Searching for: \"{}\"", text)),
		(None, Some(path), None) => {
			let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
			(SearchQuery::Image(bytes), format!("Searching by image: {}", path.display()))
		}
		(None, None, Some(raw)) => {
			let id = parse_asset_id(raw)?;
			(SearchQuery::Asset(id), format!("Searching near asset {}", id))
		}
		_ => return Err(anyhow!("Provide exactly one of QUERY, --image or --asset")),
	};
	if !quiet(export) {
		ui::info(&label);
	}

	let mut service = SearchService::new(ws.index.clone())
		.with_metrics(ws.metrics.clone())
		.with_settings(ws.settings.clone());
	if !matches!(query, SearchQuery::Asset(_)) {
		service = service.with_embedder(ws.embedder()?);
	}

	let mut request = SearchRequest::new(ws.tenant.clone(), query);
	request.limit = Some(limit);
	request.score_threshold = min_score;
	if let Some(tag) = tag {
		request.conditions.push(Condition::Tag(tag.to_string()));
	}

	let results = service.search(&ws.context(), &request)?;

	if let Some(export_path) = export {
		return export_json(
			&SearchExport {
				tenant: ws.tenant.as_str(),
				results: &results,
			},
			export_path,
		);
	}

	if results.is_empty() {
		ui::warn("No matches found");
		return Ok(());
	}

	ui::header("Results");
	for (i, hit) in results.iter().enumerate() {
		let rank = format!("{:2}", i + 1).bright_blue().bold();
		let score = format!("{:.0}%", hit.score * 100.0).dimmed();
		let detail = hit
			.payload
			.as_ref()
			.map(|p| format!("{}x{} {} {}", p.width, p.height, p.format, p.source_locator))
			.unwrap_or_default();
		println!("{}. {} {} {}", rank, hit.asset_id.to_string().bright_white(), score, detail.dimmed());
	}

	println!();
	ui::success(&format!(
		"Found {} matches in {:.2}s",
		results.len(),
		search_start.elapsed().as_secs_f32()
	));
	ws.log_metrics();
	Ok(())
}
