//! Dedup command - group near-duplicate images

use anyhow::Result;
use colored::*;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::{export_json, quiet, Workspace};
use crate::core::DedupReport;
use crate::processing::{DedupOptions, DeduplicationEngine, JobOutput, JobRunner, JobStatus};
use crate::ui;

pub fn run(ws: &Workspace, limit: usize, threshold: f32, all: bool, export: Option<&PathBuf>) -> Result<()> {
	let start = Instant::now();
	let options = DedupOptions {
		limit,
		similarity_threshold: threshold,
		..DedupOptions::from_settings(&ws.settings)
	};

	let quiet = quiet(export);

	let report = if all {
		run_job(ws, options, quiet)?
	} else {
		if !quiet {
			ui::info(&format!("Clustering up to {} images (threshold {:.2})", limit, threshold));
		}
		DeduplicationEngine::new(ws.index.clone())
			.with_metrics(ws.metrics.clone())
			.with_settings(ws.settings.clone())
			.deduplicate(&ws.context(), &ws.tenant, options)?
	};

	if let Some(export_path) = export {
		return export_json(&report, export_path);
	}

	print_report(ws, &report);
	ui::success(&format!(
		"{} clusters from {} images in {:.1}s",
		report.clusters.len(),
		report.scanned,
		start.elapsed().as_secs_f32()
	));
	if report.skipped > 0 {
		ui::warn(&format!("{} seeds skipped after query errors", report.skipped));
	}
	ws.log_metrics();
	Ok(())
}

fn run_job(ws: &Workspace, options: DedupOptions, quiet: bool) -> Result<DedupReport> {
	ws.context().check("dedup job")?;
	let runner = JobRunner::new(ws.index.clone())
		.with_metrics(ws.metrics.clone())
		.with_settings(ws.settings.clone());
	let mut handle = runner.spawn_dedup(ws.tenant.clone(), options)?;
	if !quiet {
		ui::info(&format!("Background dedup job {}", handle.id()));
	}

	let mut last = 0;
	while let JobStatus::Running { scanned } = handle.poll().clone() {
		if ws.cancel.is_cancelled() {
			handle.cancel();
		}
		if scanned != last {
			ui::debug(&format!("{} candidates read", scanned));
			last = scanned;
		}
		std::thread::sleep(Duration::from_millis(100));
	}

	match handle.wait()? {
		JobOutput::Dedup(report) => Ok(report),
		JobOutput::Anomalies(_) => anyhow::bail!("dedup job returned an anomaly report"),
	}
}

fn print_report(ws: &Workspace, report: &DedupReport) {
	if report.clusters.is_empty() {
		ui::info("No near-duplicates found");
		return;
	}

	for (i, cluster) in report.clusters.iter().enumerate() {
		ui::header(&format!(
			"Cluster {} ({} images, cohesion {:.0}%)",
			i + 1,
			cluster.len(),
			cluster.cohesion() * 100.0
		));
		for member in &cluster.images {
			let marker = if member.asset_id == cluster.seed { "●".bright_green() } else { "○".dimmed() };
			let locator = ws.locator(&member.asset_id);
			println!(
				"  {} {} {} {}",
				marker,
				member.asset_id.to_string().bright_white(),
				format!("{:.0}%", member.score * 100.0).dimmed(),
				locator.dimmed()
			);
		}
	}
	println!();
}
