//! Async Subdivider
//!
//! Non-blocking wrapper around [`run_pipeline`] on rayon's thread pool.
//!
//! ```text
//! Caller                            Async (rayon)
//! ┌────────────────┐
//! │ start(request) │──── moves triangles, context, config ───┐
//! └───────┬────────┘                                         ▼
//!         │                                       ┌───────────────────┐
//!         │ poll() each frame                     │ subdivide → dedup │
//!         │ (or wait())                           │ → reconstruct     │
//!         ▼                                       │ → gather          │
//! ┌────────────────┐                              └─────────┬─────────┘
//! │ receiver       │◄──────── bounded(1) channel ───────────┘
//! └────────────────┘
//! ```
//!
//! The task owns its inputs until it finishes. Cancelling drops the receiver;
//! the task still runs to completion and its buffers are freed when it ends.
//!
//! # Usage
//!
//! ```ignore
//! let mut subdivider = AsyncSubdivider::new();
//! subdivider.start(SubdivisionRequest { triangles, context, config });
//!
//! // Each frame
//! if let Some(result) = subdivider.poll() {
//!     let (mesh, timings) = result?;
//!     // Upload mesh
//! }
//! ```

use crossbeam_channel::{self as channel, Receiver, TryRecvError};

use super::context::RunContext;
use super::process::run_pipeline;
use crate::error::PipelineError;
use crate::subdivide::SubdivisionContext;
use crate::types::{StageTimings, SubdividedMesh, SubdivisionConfig, Triangle};

/// Inputs for one background run.
pub struct SubdivisionRequest {
	/// Source triangles (object space).
	pub triangles: Vec<Triangle>,
	/// Target, transform and frustum.
	pub context: SubdivisionContext,
	/// Run configuration.
	pub config: SubdivisionConfig,
}

/// What a background run hands back.
pub type SubdivisionResult = Result<(SubdividedMesh, StageTimings), PipelineError>;

/// Non-blocking subdivision runner.
///
/// At most one run is in flight at a time.
pub struct AsyncSubdivider {
	/// Receiver for the pending result.
	receiver: Option<Receiver<SubdivisionResult>>,
}

impl AsyncSubdivider {
	pub fn new() -> Self {
		Self { receiver: None }
	}

	/// Check if a run is in flight.
	pub fn is_busy(&self) -> bool {
		self.receiver.is_some()
	}

	/// Start a run on the rayon pool.
	///
	/// Returns `true` if started, `false` if already busy.
	pub fn start(&mut self, request: SubdivisionRequest) -> bool {
		if self.is_busy() {
			return false;
		}

		let (sender, receiver) = channel::bounded(1);
		self.receiver = Some(receiver);

		rayon::spawn(move || {
			let SubdivisionRequest {
				triangles,
				context,
				config,
			} = request;
			let mut run = RunContext::new(&config);
			let result = run_pipeline(&mut run, &triangles, &context, &config);
			// Receiver dropped means cancelled
			let _ = sender.send(result);
		});

		true
	}

	/// Poll for the result (non-blocking).
	///
	/// Returns `Some(result)` once the run finished, `None` while it is still
	/// running or when nothing was started.
	pub fn poll(&mut self) -> Option<SubdivisionResult> {
		let receiver = self.receiver.as_ref()?;

		match receiver.try_recv() {
			Ok(result) => {
				self.receiver = None;
				Some(result)
			}
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Disconnected) => {
				self.receiver = None;
				None
			}
		}
	}

	/// Block until the pending run finishes.
	///
	/// Returns `None` when nothing was started.
	pub fn wait(&mut self) -> Option<SubdivisionResult> {
		let receiver = self.receiver.take()?;
		receiver.recv().ok()
	}

	/// Drop the pending run's result.
	pub fn cancel(&mut self) {
		self.receiver = None;
	}
}

impl Default for AsyncSubdivider {
	fn default() -> Self {
		Self::new()
	}
}
