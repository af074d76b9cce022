//! Error taxonomy shared by every component

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	/// Malformed request (empty tenant, bad limit, threshold out of range)
	#[error("Invalid request: {0}")]
	Validation(String),

	/// Asset unknown, or not visible to the requesting tenant
	#[error("Not found: {0}")]
	NotFound(String),

	/// Bytes are not a raster format the hasher can read
	#[error("Failed to decode image: {0}")]
	Decode(String),

	/// Decoded, but the format is not one we index
	#[error("Unsupported image format: {0}")]
	InvalidFormat(String),

	#[error("Failed to retrieve object: {0}")]
	Retrieval(String),

	#[error("Embedding provider failed: {0}")]
	Embedding(String),

	#[error("Index write failed: {0}")]
	IndexWrite(String),

	#[error("Index query failed: {0}")]
	IndexQuery(String),

	/// Best-effort side effect; callers log it and move on
	#[error("Audit write failed: {0}")]
	AuditWrite(String),

	/// Feedback is the primary effect of its operation, so this is fatal
	#[error("Feedback write failed: {0}")]
	FeedbackWrite(String),

	#[error("Cross-tenant access denied: {0}")]
	Authz(String),

	#[error("Deadline exceeded during {0}")]
	DeadlineExceeded(&'static str),

	#[error("Operation cancelled during {0}")]
	Cancelled(&'static str),

	#[error("Background job failed: {0}")]
	Job(String),
}

impl Error {
	/// Whether the operation that raised this error must abort.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Error::AuditWrite(_))
	}

	/// Stable machine-readable kind, used in exported reports and metrics.
	pub fn kind(&self) -> &'static str {
		match self {
			Error::Validation(_) => "validation",
			Error::NotFound(_) => "not_found",
			Error::Decode(_) => "decode",
			Error::InvalidFormat(_) => "invalid_format",
			Error::Retrieval(_) => "retrieval",
			Error::Embedding(_) => "embedding",
			Error::IndexWrite(_) => "index_write",
			Error::IndexQuery(_) => "index_query",
			Error::AuditWrite(_) => "audit_write",
			Error::FeedbackWrite(_) => "feedback_write",
			Error::Authz(_) => "authz",
			Error::DeadlineExceeded(_) => "deadline_exceeded",
			Error::Cancelled(_) => "cancelled",
			Error::Job(_) => "job",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_audit_failures_are_non_fatal() {
		assert!(!Error::AuditWrite("disk full".into()).is_fatal());
		assert!(Error::IndexWrite("timeout".into()).is_fatal());
		assert!(Error::Embedding("502".into()).is_fatal());
		assert!(Error::DeadlineExceeded("embed").is_fatal());
	}

	#[test]
	fn display_includes_context() {
		let err = Error::NotFound("asset 42".into());
		assert_eq!(err.to_string(), "Not found: asset 42");
		assert_eq!(err.kind(), "not_found");
	}
}
