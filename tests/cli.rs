// Binary smoke tests; none of these need the ONNX models.

use std::path::Path;
use std::process::{Command, Output};

fn glimpse(data_dir: &Path, args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_glimpse"))
		.arg("--data-dir")
		.arg(data_dir)
		.args(args)
		.env_remove("GLIMPSE_TENANT")
		.output()
		.expect("Failed to run glimpse")
}

#[test]
fn help_lists_commands() {
	let dir = tempfile::tempdir().unwrap();
	let output = glimpse(dir.path(), &["--help"]);
	assert!(output.status.success());

	let stdout = String::from_utf8_lossy(&output.stdout);
	for command in ["ingest", "search", "dedup", "anomalies", "feedback", "delete", "reindex", "list"] {
		assert!(stdout.contains(command), "missing {} in help output", command);
	}
}

#[test]
fn version_display() {
	let dir = tempfile::tempdir().unwrap();
	let output = glimpse(dir.path(), &["--version"]);
	assert!(output.status.success());
	assert!(String::from_utf8_lossy(&output.stdout).contains("glimpse"));
}

#[test]
fn empty_workspace_lists_nothing() {
	let dir = tempfile::tempdir().unwrap();
	let output = glimpse(dir.path(), &["-t", "acme", "list"]);
	assert!(output.status.success());
}

#[test]
fn empty_workspace_dedup_exports_empty_report() {
	let dir = tempfile::tempdir().unwrap();
	let output = glimpse(dir.path(), &["-t", "acme", "dedup", "--export", "-"]);
	assert!(output.status.success());

	let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
	assert_eq!(report["scanned"], 0);
	assert_eq!(report["clusters"].as_array().map(|c| c.len()), Some(0));
}

#[test]
fn unknown_asset_cannot_be_deleted() {
	let dir = tempfile::tempdir().unwrap();
	let output = glimpse(
		dir.path(),
		&["-t", "acme", "delete", "5f0c6a7e-3b1d-4c2a-9e8f-0a1b2c3d4e5f"],
	);
	assert!(!output.status.success());
}

#[test]
fn malformed_asset_id_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let output = glimpse(dir.path(), &["-t", "acme", "feedback", "not-an-id", "relevant"]);
	assert!(!output.status.success());
}
