//! User feedback on search, dedup and anomaly results

use chrono::Utc;
use std::sync::Arc;

use crate::config::Settings;
use crate::core::{AssetId, Error, Result, TenantId};
use crate::index::{Filter, SimilarityIndex};
use crate::processing::context::CallContext;
use crate::storage::{Feedback, FeedbackAction, FeedbackSink};

const MAX_NOTE_LEN: usize = 2000;

pub struct FeedbackService {
	index: Arc<dyn SimilarityIndex>,
	sink: Arc<dyn FeedbackSink>,
	settings: Settings,
}

impl FeedbackService {
	pub fn new(index: Arc<dyn SimilarityIndex>, sink: Arc<dyn FeedbackSink>) -> Self {
		Self {
			index,
			sink,
			settings: Settings::default(),
		}
	}

	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = settings;
		self
	}

	/// Record feedback for an asset the tenant can see. Unlike audit
	/// writes, a failed sink write fails the call.
	pub fn submit(
		&self,
		ctx: &CallContext,
		tenant: &TenantId,
		asset_id: AssetId,
		action: FeedbackAction,
		note: Option<String>,
	) -> Result<Feedback> {
		ctx.check("feedback")?;

		let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
		if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
			return Err(Error::Validation(format!("note longer than {} characters", MAX_NOTE_LEN)));
		}

		let visible = self.index.get(
			&ctx.child(self.settings.index_timeout()),
			&Filter::tenant(tenant.clone()),
			&asset_id,
		)?;
		if visible.is_none() {
			return Err(Error::NotFound(format!("asset {}", asset_id)));
		}

		let feedback = Feedback {
			asset_id,
			tenant_id: tenant.clone(),
			action,
			note,
			created_at: Utc::now(),
		};
		self.sink.record_feedback(&feedback)?;
		Ok(feedback)
	}
}
