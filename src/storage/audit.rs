//! Audit and feedback logs
//!
//! Both are append-only side channels. The index never reads them back, so
//! a line here may lag or be missing relative to the index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use crate::core::{AssetId, AssetPayload, ContentHash, Error, ImageFormat, PerceptualHash, Result, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEvent {
	Upload,
	Reindex,
	Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
	pub event: AuditEvent,
	pub asset_id: AssetId,
	pub tenant_id: TenantId,
	pub content_hash: ContentHash,
	pub perceptual_hash: PerceptualHash,
	pub width: u32,
	pub height: u32,
	pub format: ImageFormat,
	pub source_locator: String,
	pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
	pub fn from_payload(event: AuditEvent, payload: &AssetPayload) -> Self {
		Self {
			event,
			asset_id: payload.asset_id,
			tenant_id: payload.tenant_id.clone(),
			content_hash: payload.content_hash.clone(),
			perceptual_hash: payload.perceptual_hash,
			width: payload.width,
			height: payload.height,
			format: payload.format,
			source_locator: payload.source_locator.clone(),
			recorded_at: Utc::now(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
	Relevant,
	Irrelevant,
	Duplicate,
	Anomaly,
}

impl FromStr for FeedbackAction {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"relevant" => Ok(Self::Relevant),
			"irrelevant" => Ok(Self::Irrelevant),
			"duplicate" => Ok(Self::Duplicate),
			"anomaly" => Ok(Self::Anomaly),
			other => Err(Error::Validation(format!("unknown feedback action: {}", other))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
	pub asset_id: AssetId,
	pub tenant_id: TenantId,
	pub action: FeedbackAction,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub note: Option<String>,
	pub created_at: DateTime<Utc>,
}

pub trait AuditSink: Send + Sync {
	fn record(&self, record: &AuditRecord) -> Result<()>;
}

pub trait FeedbackSink: Send + Sync {
	fn record_feedback(&self, feedback: &Feedback) -> Result<()>;
}

/// Discards everything.
pub struct NullAudit;

impl AuditSink for NullAudit {
	fn record(&self, _record: &AuditRecord) -> Result<()> {
		Ok(())
	}
}

impl FeedbackSink for NullAudit {
	fn record_feedback(&self, _feedback: &Feedback) -> Result<()> {
		Ok(())
	}
}

/// One JSON object per line, appended under a lock.
pub struct JsonlLog {
	path: PathBuf,
	lock: Mutex<()>,
}

impl JsonlLog {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn append<T: Serialize>(&self, value: &T) -> std::io::Result<()> {
		let mut line = serde_json::to_string(value)?;
		line.push('\n');

		let _guard = self.lock.lock().map_err(|_| std::io::Error::other("log lock poisoned"))?;
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}
		let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
		file.write_all(line.as_bytes())
	}

	/// Read every line back; malformed lines are skipped.
	pub fn read_all<T: for<'de> Deserialize<'de>>(&self) -> Result<Vec<T>> {
		let content = match fs::read_to_string(&self.path) {
			Ok(c) => c,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(Error::Retrieval(format!("{}: {}", self.path.display(), e))),
		};
		Ok(content
			.lines()
			.filter(|l| !l.trim().is_empty())
			.filter_map(|l| serde_json::from_str(l).ok())
			.collect())
	}
}

impl AuditSink for JsonlLog {
	fn record(&self, record: &AuditRecord) -> Result<()> {
		self.append(record)
			.map_err(|e| Error::AuditWrite(format!("{}: {}", self.path.display(), e)))
	}
}

impl FeedbackSink for JsonlLog {
	fn record_feedback(&self, feedback: &Feedback) -> Result<()> {
		self.append(feedback)
			.map_err(|e| Error::FeedbackWrite(format!("{}: {}", self.path.display(), e)))
	}
}
