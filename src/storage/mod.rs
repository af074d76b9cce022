//! Object bytes, audit trail and feedback

pub mod audit;
pub mod object;

pub use audit::{AuditEvent, AuditRecord, AuditSink, Feedback, FeedbackAction, FeedbackSink, JsonlLog, NullAudit};
pub use object::{FsObjectStore, ObjectStore};
