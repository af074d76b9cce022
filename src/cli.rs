use clap::builder::styling::{AnsiColor, Styles};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::runtime::Provider;

fn parse_score(s: &str) -> Result<f32, String> {
	let val: f32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
	if !(-1.0..=1.0).contains(&val) {
		Err(format!("score must be between -1.0 and 1.0, got {}", val))
	} else {
		Ok(val)
	}
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Blue.on_default().bold())
		.usage(AnsiColor::Blue.on_default().bold())
		.literal(AnsiColor::Blue.on_default())
		.placeholder(AnsiColor::Yellow.on_default())
		.valid(AnsiColor::Blue.on_default())
		.invalid(AnsiColor::Red.on_default())
}

#[derive(Parser, Debug)]
#[command(
	name = "glimpse",
	author,
	version,
	about = "Tenant-scoped image index with near-duplicate clustering and anomaly ranking",
	styles = styles(),
	after_help = format!(
		"{title}
  {bin} {ingest}     {ingest_args}   {ingest_desc}
  {bin} {search}     {search_args}            {search_desc}
  {bin} {dedup}      {dedup_args}       {dedup_desc}
  {bin} {anomalies}  {anomalies_args}              {anomalies_desc}",
		title = "Examples:".bright_blue().bold(),
		bin = "glimpse".bright_blue(),
		ingest = "ingest".yellow(),
		ingest_args = "-t acme ./photos/ --tag trip",
		ingest_desc = "Index a folder for tenant acme".dimmed(),
		search = "search".yellow(),
		search_args = "-t acme \"red car\"",
		search_desc = "Search by description".dimmed(),
		dedup = "dedup".yellow(),
		dedup_args = "-t acme --threshold 0.9",
		dedup_desc = "Group near-duplicates".dimmed(),
		anomalies = "anomalies".yellow(),
		anomalies_args = "-t acme -n 20",
		anomalies_desc = "Most isolated images".dimmed(),
	),
)]
pub struct Cli {
	/// Enable verbose debug output
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	/// Execution provider: auto, cpu, cuda, tensorrt, coreml, xnnpack
	#[arg(short = 'p', long = "provider", global = true, default_value = "auto")]
	pub provider: Provider,

	/// Where the index, logs and stored objects live
	#[arg(long = "data-dir", global = true)]
	pub data_dir: Option<PathBuf>,

	/// Directory holding the ONNX models and tokenizer
	#[arg(long = "models-dir", global = true)]
	pub models_dir: Option<PathBuf>,

	/// Tenant every read and write is scoped to
	#[arg(short = 't', long = "tenant", global = true, env = "GLIMPSE_TENANT", default_value = "default")]
	pub tenant: String,

	/// JSON settings file (timeouts, bucket prefix, page size)
	#[arg(short = 'c', long = "config", global = true)]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Store and index images (files or directories)
	Ingest {
		/// Image files or directories
		#[arg(required = true, value_name = "PATH")]
		paths: Vec<PathBuf>,

		/// Walk directories recursively
		#[arg(short = 'r', long = "recursive")]
		recursive: bool,

		/// Tags attached to every ingested image
		#[arg(long = "tag", value_delimiter = ',')]
		tags: Vec<String>,
	},

	/// Find similar images by text, reference image, or indexed asset
	Search {
		/// Text description
		#[arg(value_name = "QUERY")]
		query: Option<String>,

		/// Reference image file
		#[arg(short = 'i', long = "image", value_name = "PATH", conflicts_with_all = ["query", "asset"])]
		image: Option<PathBuf>,

		/// Indexed asset id
		#[arg(short = 'a', long = "asset", value_name = "ID", conflicts_with = "query")]
		asset: Option<String>,

		/// Only return images carrying this tag
		#[arg(long = "tag")]
		tag: Option<String>,

		/// Number of results (capped at 100)
		#[arg(short = 'n', long = "limit", default_value_t = 10)]
		limit: usize,

		/// Minimum similarity score
		#[arg(short = 's', long = "score", value_parser = parse_score)]
		min_score: Option<f32>,

		/// Write results as JSON ("-" for stdout)
		#[arg(short = 'e', long = "export", value_name = "FILE")]
		export: Option<PathBuf>,
	},

	/// Group near-duplicate images
	Dedup {
		/// Maximum candidates scanned
		#[arg(short = 'n', long = "limit", default_value_t = 200)]
		limit: usize,

		/// Minimum cosine similarity to the seed
		#[arg(short = 's', long = "threshold", default_value_t = 0.85, value_parser = parse_score)]
		threshold: f32,

		/// Scan the whole tenant on a background worker instead
		#[arg(long = "all")]
		all: bool,

		/// Write clusters as JSON ("-" for stdout)
		#[arg(short = 'e', long = "export", value_name = "FILE")]
		export: Option<PathBuf>,
	},

	/// Rank images by isolation from their nearest neighbor
	Anomalies {
		/// Maximum assets scanned
		#[arg(short = 'n', long = "limit", default_value_t = 100)]
		limit: usize,

		/// Number of records shown
		#[arg(long = "top", default_value_t = 20)]
		top: usize,

		/// Scan the whole tenant on a background worker instead
		#[arg(long = "all")]
		all: bool,

		/// Write records as JSON ("-" for stdout)
		#[arg(short = 'e', long = "export", value_name = "FILE")]
		export: Option<PathBuf>,
	},

	/// Record feedback on an asset (relevant, irrelevant, duplicate, anomaly)
	Feedback {
		#[arg(value_name = "ID")]
		asset: String,

		#[arg(value_name = "ACTION")]
		action: String,

		#[arg(long = "note")]
		note: Option<String>,
	},

	/// Remove an asset from the index and object store
	Delete {
		#[arg(value_name = "ID")]
		asset: String,
	},

	/// Re-hash and re-embed an asset from its stored bytes
	Reindex {
		#[arg(value_name = "ID")]
		asset: String,
	},

	/// List indexed assets
	List {
		#[arg(short = 'n', long = "limit", default_value_t = 50)]
		limit: usize,

		/// Start at this asset id (the `next` value of a previous page)
		#[arg(long = "from", value_name = "ID")]
		from: Option<String>,
	},
}
