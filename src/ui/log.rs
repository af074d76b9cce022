//! Unified logging system

use chrono::Local;
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

const LOGO: &str = r#"
        ___
  ___ _/ (_)_ _  ___  ___ ___
 / _ `/ / /  ' \/ _ \(_-</ -_)
 \_, /_/_/_/_/_/ .__/___/\__/
/___/         /_/                    "#;

pub fn print_logo() {
	println!("{}", LOGO.bright_blue().bold());
	println!("{}", "near-duplicates and outliers, per tenant".dimmed().italic());
}

pub struct Log;

impl Log {
	pub fn set_verbose(enabled: bool) {
		VERBOSE.store(enabled, Ordering::Relaxed);
	}

	pub fn is_verbose() -> bool {
		VERBOSE.load(Ordering::Relaxed)
	}
}

pub fn info(msg: &str) {
	println!("{} {}", "ℹ".bright_blue().bold(), msg.bright_white());
}

pub fn success(msg: &str) {
	println!("{} {}", "✓".bright_green().bold(), msg.bright_white());
}

pub fn warn(msg: &str) {
	println!("{} {}", "⚠".bright_yellow().bold(), msg.bright_white());
}

pub fn error(msg: &str) {
	println!("{} {}", "✗".bright_red().bold(), msg.bright_white());
}

pub fn debug(msg: &str) {
	if Log::is_verbose() {
		println!("{} {}", "⚙".bright_black().bold(), msg.dimmed());
	}
}

pub fn header(text: &str) {
	println!("\n{}", text.bright_blue().bold());
}

/// Timestamped stderr line for output coming from background jobs
pub fn timed(job: &str, msg: &str) {
	let stamp = Local::now().format("%H:%M:%S");
	eprintln!(
		"{} {} {}",
		stamp.to_string().dimmed(),
		format!("[{}]", job).bright_magenta(),
		msg.bright_white()
	);
}

/// Clickable file path (OSC 8 terminal hyperlink)
pub fn path_link(path: &std::path::Path, max_len: usize) -> String {
	let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

	let uri = if cfg!(windows) {
		let path_str = absolute.to_string_lossy();
		let cleaned = path_str.strip_prefix(r"\\?\").unwrap_or(&path_str);
		format!("file:///{}", cleaned.replace('\\', "/"))
	} else {
		format!("file://{}", absolute.display())
	};

	let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown");

	format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", uri, shorten(filename, max_len))
}

/// Middle-elide long names, keeping both ends readable.
pub fn shorten(name: &str, max_len: usize) -> String {
	let chars: Vec<char> = name.chars().collect();
	if chars.len() <= max_len || max_len < 8 {
		return name.to_string();
	}
	let head = max_len / 2;
	let tail = max_len - head - 3;
	let start: String = chars[..head].iter().collect();
	let end: String = chars[chars.len() - tail..].iter().collect();
	format!("{}...{}", start, end)
}

/// Log an ingested file with its asset id and dimmed time
pub fn file_ingested(path: &std::path::Path, asset: &str, duration_ms: u128) {
	let link = path_link(path, 60);
	info(&format!(
		"{} {} {}",
		link.bright_white(),
		asset.bright_cyan(),
		format!("{}ms", duration_ms).dimmed()
	));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn shorten_keeps_short_names() {
		assert_eq!(shorten("cat.png", 20), "cat.png");
	}

	#[test]
	fn shorten_elides_middle() {
		let s = shorten("a_very_long_file_name_for_testing.png", 16);
		assert_eq!(s.chars().count(), 16);
		assert!(s.starts_with("a_very_l"));
		assert!(s.ends_with("g.png"));
		assert!(s.contains("..."));
	}
}
