//! # Orchestration
//!
//! Ingestion, search, near-duplicate clustering, anomaly ranking and the
//! background jobs that run the scans over whole tenants.

pub mod anomaly;
pub mod context;
pub mod dedup;
pub mod feedback;
pub mod ingest;
pub mod jobs;
pub mod search;

pub use anomaly::{AnomalyScan, AnomalyScorer};
pub use context::{CallContext, CancelToken};
pub use dedup::{DedupOptions, DedupScan, DeduplicationEngine};
pub use feedback::FeedbackService;
pub use ingest::{IngestRequest, IngestionCoordinator};
pub use jobs::{JobHandle, JobOutput, JobRunner, JobStatus};
pub use search::{SearchQuery, SearchRequest, SearchService};
