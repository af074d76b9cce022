//! glimpse - tenant-scoped image similarity index
//!
//! Ingests images into a CLIP vector index and answers similarity,
//! near-duplicate and anomaly queries over one tenant at a time.

use anyhow::Result;
use clap::Parser;

use glimpse::cli::{Cli, Command};
use glimpse::commands::{self, Workspace};
use glimpse::config::{self, Settings};
use glimpse::runtime::set_provider;
use glimpse::ui::{self, Log};

fn main() -> Result<()> {
	let cli = Cli::parse();

	Log::set_verbose(cli.verbose);
	set_provider(cli.provider);
	if let Some(dir) = cli.data_dir {
		config::set_data_dir(dir);
	}
	if let Some(dir) = cli.models_dir {
		config::set_model_dir(dir);
	}

	let settings = match &cli.config {
		Some(path) => Settings::load(path)?,
		None => Settings::default(),
	};

	if Log::is_verbose() {
		ui::print_logo();
	}

	let ws = Workspace::open(&cli.tenant, settings)?;
	ws.cancel_on_interrupt()?;

	match cli.command {
		Command::Ingest { paths, recursive, tags } => commands::ingest::run(&ws, &paths, recursive, &tags),
		Command::Search {
			query,
			image,
			asset,
			tag,
			limit,
			min_score,
			export,
		} => commands::search::run(
			&ws,
			query.as_deref(),
			image.as_deref(),
			asset.as_deref(),
			tag.as_deref(),
			limit,
			min_score,
			export.as_ref(),
		),
		Command::Dedup {
			limit,
			threshold,
			all,
			export,
		} => commands::dedup::run(&ws, limit, threshold, all, export.as_ref()),
		Command::Anomalies { limit, top, all, export } => {
			commands::anomalies::run(&ws, limit, top, all, export.as_ref())
		}
		Command::Feedback { asset, action, note } => commands::feedback::run(&ws, &asset, &action, note),
		Command::Delete { asset } => commands::manage::delete(&ws, &asset),
		Command::Reindex { asset } => commands::manage::reindex(&ws, &asset),
		Command::List { limit, from } => commands::manage::list(&ws, limit, from.as_deref()),
	}
}
