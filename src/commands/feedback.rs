//! Feedback command - annotate an asset

use anyhow::Result;

use super::{parse_asset_id, Workspace};
use crate::processing::FeedbackService;
use crate::storage::FeedbackAction;
use crate::ui;

pub fn run(ws: &Workspace, asset: &str, action: &str, note: Option<String>) -> Result<()> {
	let asset_id = parse_asset_id(asset)?;
	let action: FeedbackAction = action.parse()?;

	let feedback = FeedbackService::new(ws.index.clone(), ws.feedback.clone())
		.with_settings(ws.settings.clone())
		.submit(&ws.context(), &ws.tenant, asset_id, action, note)?;

	ui::success(&format!("Recorded {:?} for {}", feedback.action, feedback.asset_id));
	ui::debug(&format!("Appended to {}", ws.feedback.path().display()));
	Ok(())
}
