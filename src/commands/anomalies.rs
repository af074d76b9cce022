//! Anomalies command - rank images by isolation

use anyhow::Result;
use colored::*;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::{export_json, quiet, Workspace};
use crate::core::AnomalyReport;
use crate::processing::{AnomalyScorer, JobOutput, JobRunner, JobStatus};
use crate::ui;

pub fn run(ws: &Workspace, limit: usize, top: usize, all: bool, export: Option<&PathBuf>) -> Result<()> {
	let start = Instant::now();

	let quiet = quiet(export);

	let report = if all {
		run_job(ws, quiet)?
	} else {
		if !quiet {
			ui::info(&format!("Scoring up to {} images", limit));
		}
		AnomalyScorer::new(ws.index.clone())
			.with_metrics(ws.metrics.clone())
			.with_settings(ws.settings.clone())
			.rank_anomalies(&ws.context(), &ws.tenant, limit)?
	};

	if let Some(export_path) = export {
		return export_json(&report, export_path);
	}

	if report.records.is_empty() {
		ui::warn("No indexed images for this tenant");
		return Ok(());
	}

	ui::header("Most isolated");
	for (i, record) in report.records.iter().take(top).enumerate() {
		let score = record.anomaly_score;
		let colored_score = match score {
			s if s >= 0.5 => format!("{:.3}", s).bright_red(),
			s if s >= 0.2 => format!("{:.3}", s).bright_yellow(),
			s => format!("{:.3}", s).bright_green(),
		};
		println!(
			"{}. {} {} {}",
			format!("{:2}", i + 1).bright_blue().bold(),
			record.asset_id.to_string().bright_white(),
			colored_score,
			record.payload.source_locator.dimmed()
		);
	}

	println!();
	ui::success(&format!(
		"Scored {} images in {:.1}s",
		report.scanned,
		start.elapsed().as_secs_f32()
	));
	if report.skipped > 0 {
		ui::warn(&format!("{} images skipped after query errors", report.skipped));
	}
	ui::debug("Score is 1 - similarity to the nearest other image");
	ws.log_metrics();
	Ok(())
}

fn run_job(ws: &Workspace, quiet: bool) -> Result<AnomalyReport> {
	ws.context().check("anomaly job")?;
	let runner = JobRunner::new(ws.index.clone())
		.with_metrics(ws.metrics.clone())
		.with_settings(ws.settings.clone());
	let mut handle = runner.spawn_anomalies(ws.tenant.clone())?;
	if !quiet {
		ui::info(&format!("Background anomaly job {}", handle.id()));
	}

	while let JobStatus::Running { scanned } = handle.poll().clone() {
		if ws.cancel.is_cancelled() {
			handle.cancel();
		}
		ui::debug(&format!("{} images scored", scanned));
		std::thread::sleep(Duration::from_millis(250));
	}

	match handle.wait()? {
		JobOutput::Anomalies(report) => Ok(report),
		JobOutput::Dedup(_) => anyhow::bail!("anomaly job returned a dedup report"),
	}
}
