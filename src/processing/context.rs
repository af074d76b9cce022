//! Request-scoped deadlines and cancellation
//!
//! Every external call (object store, embedding provider, index) receives a
//! `CallContext`. Implementations check it before doing work and again
//! before returning, so a cancelled caller stops issuing new calls instead
//! of leaking them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::{Error, Result};

/// Shared cancellation flag; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Clone, Default)]
pub struct CallContext {
	deadline: Option<Instant>,
	cancel: CancelToken,
}

impl CallContext {
	/// No deadline, fresh cancel token.
	pub fn background() -> Self {
		Self::default()
	}

	pub fn with_timeout(timeout: Duration) -> Self {
		Self {
			deadline: Some(Instant::now() + timeout),
			cancel: CancelToken::new(),
		}
	}

	pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn cancel_token(&self) -> &CancelToken {
		&self.cancel
	}

	pub fn remaining(&self) -> Option<Duration> {
		self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
	}

	/// Narrow the deadline for a single downstream call. Never extends it.
	pub fn child(&self, timeout: Duration) -> Self {
		let candidate = Instant::now() + timeout;
		let deadline = match self.deadline {
			Some(parent) if parent < candidate => parent,
			_ => candidate,
		};
		Self {
			deadline: Some(deadline),
			cancel: self.cancel.clone(),
		}
	}

	/// Fail fast when the caller is gone or out of time.
	pub fn check(&self, stage: &'static str) -> Result<()> {
		if self.cancel.is_cancelled() {
			return Err(Error::Cancelled(stage));
		}
		if let Some(deadline) = self.deadline {
			if Instant::now() >= deadline {
				return Err(Error::DeadlineExceeded(stage));
			}
		}
		Ok(())
	}
}
