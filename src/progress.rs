//! Engine event types and the callback surface subscribers implement.
//!
//! Grounded on the teacher's `progress/mod.rs` (`SyncProgressCallback`
//! trait dispatching an event enum) and `sync_impl::SyncCallbackEvent`,
//! re-targeted to this engine's event surface (§6).

use crate::conflict::ConflictAnalysis;
use crate::strategies::{ConflictVerdict, EngineOperation, TransferDirection};
use crate::types::RelPath;
use std::sync::Mutex;

/// A `progress_changed` snapshot: the current operation plus the counters
/// accumulated so far this run.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
	pub operation: EngineOperation,
	pub files_synchronized: u64,
	pub files_skipped: u64,
	pub files_conflicted: u64,
	pub files_deleted: u64,
}

/// A `file_progress_changed` event: per-byte progress for one in-flight
/// transfer.
#[derive(Debug, Clone)]
pub struct FileProgress {
	pub path: RelPath,
	pub bytes_transferred: u64,
	pub total_bytes: u64,
	pub direction: TransferDirection,
}

/// A `conflict_detected` event, raised before the resolver runs. Subscribers
/// may override the recommended verdict by calling `set_verdict`; if none do,
/// the resolver's own recommendation is used.
pub struct FileConflict {
	pub analysis: ConflictAnalysis,
	override_verdict: Mutex<Option<ConflictVerdict>>,
}

impl FileConflict {
	pub fn new(analysis: ConflictAnalysis) -> Self {
		FileConflict { analysis, override_verdict: Mutex::new(None) }
	}

	pub fn set_verdict(&self, verdict: ConflictVerdict) {
		*self.override_verdict.lock().unwrap() = Some(verdict);
	}

	pub fn take_override(&self) -> Option<ConflictVerdict> {
		self.override_verdict.lock().unwrap().take()
	}
}

/// Subscriber surface for engine events. All methods default to no-ops so
/// callers only override what they need.
pub trait EngineEventSink: Send + Sync {
	fn on_progress(&self, _progress: &ProgressSnapshot) {}
	fn on_file_progress(&self, _progress: &FileProgress) {}
	fn on_conflict_detected(&self, _conflict: &FileConflict) {}
}

/// The default sink used when the engine is constructed without one.
pub struct NullEventSink;

impl EngineEventSink for NullEventSink {}


// vim: ts=4
