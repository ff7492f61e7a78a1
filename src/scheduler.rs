//! Scheduler: executes an `ActionGroups` in the three-phase model of §4.7,
//! honouring pause/cancellation and emitting progress events as it goes.

use crate::config::SyncOptions;
use crate::conflict::{analyze, ConflictResolver};
use crate::delete::DeleteProtection;
use crate::progress::{EngineEventSink, FileConflict, ProgressSnapshot};
use crate::reconciler::ActionGroups;
use crate::storage::Storage;
use crate::strategies::{ConflictVerdict, EngineOperation};
use crate::throttle::{throttled_copy, RateLimiter};
use crate::types::{Action, ActionType, RelPath, Side, SyncItem, Timestamp};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

fn now_ms() -> Timestamp {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as Timestamp).unwrap_or(0)
}

/// Cooperative cancellation signal shared between the engine facade and a
/// running Scheduler. Cheap to clone; every clone observes the same flag.
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		CancellationToken(Arc::new(AtomicBool::new(false)))
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

impl Default for CancellationToken {
	fn default() -> Self {
		Self::new()
	}
}

/// A manual-reset gate the scheduler waits on between Action executions.
/// Backed by a `watch` channel rather than a bare `Notify` so a `resume()`
/// that races a not-yet-waiting `wait_if_paused()` can never be missed.
pub struct PauseGate {
	tx: watch::Sender<bool>,
}

impl PauseGate {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(false);
		PauseGate { tx }
	}

	pub fn pause(&self) {
		let _ = self.tx.send(true);
	}

	pub fn resume(&self) {
		let _ = self.tx.send(false);
	}

	pub fn is_paused(&self) -> bool {
		*self.tx.borrow()
	}

	/// Blocks the caller while the gate is paused. Released immediately if
	/// the gate is disposed (sender dropped) so a torn-down engine never
	/// leaves a scheduler loop stuck.
	pub async fn wait_if_paused(&self) {
		let mut rx = self.tx.subscribe();
		while *rx.borrow() {
			if rx.changed().await.is_err() {
				return;
			}
		}
	}
}

impl Default for PauseGate {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug, Default)]
struct SchedulerCounters {
	files_synchronized: AtomicU64,
	files_skipped: AtomicU64,
	files_conflicted: AtomicU64,
	files_deleted: AtomicU64,
}

impl SchedulerCounters {
	fn snapshot(&self, operation: EngineOperation) -> ProgressSnapshot {
		ProgressSnapshot {
			operation,
			files_synchronized: self.files_synchronized.load(Ordering::SeqCst),
			files_skipped: self.files_skipped.load(Ordering::SeqCst),
			files_conflicted: self.files_conflicted.load(Ordering::SeqCst),
			files_deleted: self.files_deleted.load(Ordering::SeqCst),
		}
	}
}

/// The outcome of one executed Action, carrying everything the engine facade
/// needs to build the final commit transaction and the operation-history
/// entry, without depending on the state-store types directly.
#[derive(Debug, Clone)]
pub struct ExecutedAction {
	pub path: RelPath,
	pub action_type: ActionType,
	pub is_dir: bool,
	pub size: u64,
	pub source: Side,
	pub started_at: Timestamp,
	pub completed_at: Timestamp,
	pub success: bool,
	pub error_message: Option<String>,
	pub renamed_from: Option<RelPath>,
	pub renamed_to: Option<RelPath>,
	pub deleted: bool,
	/// Metadata of the item as it now stands on the write side, when known.
	pub resulting_item: Option<SyncItem>,
	pub final_verdict: Option<ConflictVerdict>,
}

fn operation_for(action_type: ActionType) -> EngineOperation {
	match action_type {
		ActionType::Upload => EngineOperation::Uploading,
		ActionType::Download => EngineOperation::Downloading,
		ActionType::DeleteLocal | ActionType::DeleteRemote => EngineOperation::Deleting,
		ActionType::Conflict => EngineOperation::ResolvingConflict,
	}
}

pub struct Scheduler {
	local: Arc<dyn Storage>,
	remote: Arc<dyn Storage>,
	resolver: Arc<dyn ConflictResolver>,
	sink: Arc<dyn EngineEventSink>,
	options: SyncOptions,
	cancellation: CancellationToken,
	pause_gate: Arc<PauseGate>,
	upload_limiter: Option<Arc<RateLimiter>>,
	download_limiter: Option<Arc<RateLimiter>>,
	delete_protection: DeleteProtection,
}

impl Scheduler {
	pub fn new(
		local: Arc<dyn Storage>,
		remote: Arc<dyn Storage>,
		resolver: Arc<dyn ConflictResolver>,
		sink: Arc<dyn EngineEventSink>,
		options: SyncOptions,
		cancellation: CancellationToken,
		pause_gate: Arc<PauseGate>,
	) -> Self {
		let (upload_limiter, download_limiter) = match options.max_bytes_per_second {
			Some(bps) => (Some(Arc::new(RateLimiter::new(bps))), Some(Arc::new(RateLimiter::new(bps)))),
			None => (None, None),
		};
		Scheduler {
			local,
			remote,
			resolver,
			sink,
			options,
			cancellation,
			pause_gate,
			upload_limiter,
			download_limiter,
			delete_protection: DeleteProtection::disabled(),
		}
	}

	/// Runs all three phases to completion or until cancelled, returning the
	/// per-Action outcomes for every Action that was actually attempted.
	pub async fn run(&self, groups: ActionGroups) -> Vec<ExecutedAction> {
		let counters = SchedulerCounters::default();
		let mut results = Vec::new();
		let parallelism = self.options.max_parallelism.max(1);
		let total_actions = groups.directories.len()
			+ groups.small_files.len()
			+ groups.large_files.len()
			+ groups.conflicts.len()
			+ groups.deletes.len();

		let mut phase1 = groups.directories;
		phase1.extend(groups.small_files);
		let phase1_limit = (2 * parallelism).max(1);
		results.extend(self.run_throttled_phase(phase1, phase1_limit, &counters, 10).await);
		if self.cancellation.is_cancelled() {
			return results;
		}

		let phase2_limit = (parallelism / 2).max(1);
		results.extend(self.run_large_file_phase(groups.large_files, phase2_limit, &counters).await);
		if self.cancellation.is_cancelled() {
			return results;
		}

		for action in groups.conflicts {
			self.pause_gate.wait_if_paused().await;
			if self.cancellation.is_cancelled() {
				break;
			}
			let outcome = self.execute_conflict(action, &counters).await;
			self.sink.on_progress(&counters.snapshot(EngineOperation::ResolvingConflict));
			results.push(outcome);
		}
		if self.cancellation.is_cancelled() {
			return results;
		}

		if let Err(reason) = self.delete_protection.check_allowed(groups.deletes.len(), total_actions) {
			tracing::warn!(reason = %reason, count = groups.deletes.len(), "delete phase blocked by delete protection, all deletes skipped");
			for action in groups.deletes {
				let started_at = now_ms();
				let source = match action.action_type {
					ActionType::DeleteLocal => Side::Remote,
					ActionType::DeleteRemote => Side::Local,
					_ => Side::Local,
				};
				counters.files_skipped.fetch_add(1, Ordering::SeqCst);
				results.push(self.failed_outcome(action, started_at, source, reason.clone()));
			}
			return results;
		}

		for action in groups.deletes {
			self.pause_gate.wait_if_paused().await;
			if self.cancellation.is_cancelled() {
				break;
			}
			let outcome = self.execute_delete(action, &counters).await;
			self.sink.on_progress(&counters.snapshot(EngineOperation::Deleting));
			results.push(outcome);
		}
		results
	}

	/// Phase 1: directories and small files, executed in chunks of at most
	/// `limit` concurrent Actions, with a progress event every `throttle_every`
	/// completions (and on every failure, regardless of the throttle).
	async fn run_throttled_phase(
		&self,
		actions: Vec<Action>,
		limit: usize,
		counters: &SchedulerCounters,
		throttle_every: usize,
	) -> Vec<ExecutedAction> {
		let mut results = Vec::with_capacity(actions.len());
		let mut completed = 0usize;
		for chunk in actions.chunks(limit.max(1)) {
			if self.cancellation.is_cancelled() {
				break;
			}
			self.pause_gate.wait_if_paused().await;
			if self.cancellation.is_cancelled() {
				break;
			}
			let outcomes = futures::future::join_all(chunk.iter().cloned().map(|a| self.execute_transfer(a))).await;
			for outcome in outcomes {
				completed += 1;
				self.record_counters(counters, &outcome);
				if !outcome.success || completed % throttle_every.max(1) == 0 {
					self.sink.on_progress(&counters.snapshot(operation_for(outcome.action_type)));
				}
				results.push(outcome);
			}
		}
		results
	}

	/// Phase 2: large files, one progress event on start and one on
	/// completion of each chunk (chunks run concurrently up to `limit`).
	async fn run_large_file_phase(
		&self,
		actions: Vec<Action>,
		limit: usize,
		counters: &SchedulerCounters,
	) -> Vec<ExecutedAction> {
		let mut results = Vec::with_capacity(actions.len());
		for chunk in actions.chunks(limit.max(1)) {
			if self.cancellation.is_cancelled() {
				break;
			}
			self.pause_gate.wait_if_paused().await;
			if self.cancellation.is_cancelled() {
				break;
			}
			for action in chunk {
				self.sink.on_progress(&counters.snapshot(operation_for(action.action_type)));
			}
			let outcomes = futures::future::join_all(chunk.iter().cloned().map(|a| self.execute_transfer(a))).await;
			for outcome in outcomes {
				self.record_counters(counters, &outcome);
				self.sink.on_progress(&counters.snapshot(operation_for(outcome.action_type)));
				results.push(outcome);
			}
		}
		results
	}

	fn record_counters(&self, counters: &SchedulerCounters, outcome: &ExecutedAction) {
		if !outcome.success {
			counters.files_skipped.fetch_add(1, Ordering::SeqCst);
			return;
		}
		match outcome.action_type {
			ActionType::Upload | ActionType::Download => {
				counters.files_synchronized.fetch_add(1, Ordering::SeqCst);
			}
			ActionType::DeleteLocal | ActionType::DeleteRemote => {
				counters.files_deleted.fetch_add(1, Ordering::SeqCst);
			}
			ActionType::Conflict => {}
		}
	}

	/// Executes one Upload or Download Action (directory or file).
	async fn execute_transfer(&self, action: Action) -> ExecutedAction {
		let started_at = now_ms();
		if self.options.dry_run {
			return self.dry_run_outcome(action, started_at);
		}

		let is_dir = action.is_directory();
		let size = action.size();
		let source_side = match action.action_type {
			ActionType::Upload => Side::Local,
			ActionType::Download => Side::Remote,
			_ => {
				return self.failed_outcome(
					action,
					started_at,
					Side::Local,
					"scheduler received a non-transfer action outside of conflict resolution".to_string(),
				);
			}
		};
		let (source, target) = match action.action_type {
			ActionType::Upload => (&self.local, &self.remote),
			ActionType::Download => (&self.remote, &self.local),
			_ => unreachable!("checked above"),
		};

		let result = if is_dir {
			target.create_directory(&action.path).await.map(|_| None)
		} else {
			self.transfer_file(source, target, &action, source_side).await
		};

		match result {
			Ok(resulting_item) => {
				if !is_dir && action.action_type == ActionType::Download && self.options.create_virtual_file_placeholders {
					self.invoke_virtual_file_callback(&action.path);
				}
				ExecutedAction {
					path: action.path,
					action_type: action.action_type,
					is_dir,
					size,
					source: source_side,
					started_at,
					completed_at: now_ms(),
					success: true,
					error_message: None,
					renamed_from: None,
					renamed_to: None,
					deleted: false,
					resulting_item,
					final_verdict: None,
				}
			}
			Err(e) => {
				tracing::warn!(path = %action.path, error = %e, "transfer failed, counted as skipped");
				self.failed_outcome(action, started_at, source_side, e.to_string())
			}
		}
	}

	async fn transfer_file(
		&self,
		source: &Arc<dyn Storage>,
		target: &Arc<dyn Storage>,
		action: &Action,
		source_side: Side,
	) -> crate::storage::StorageResult<Option<SyncItem>> {
		let mut reader = source.read(&action.path).await?;
		let limiter = match action.action_type {
			ActionType::Upload => self.upload_limiter.as_ref(),
			ActionType::Download => self.download_limiter.as_ref(),
			_ => None,
		};
		let mut buf: Vec<u8> = Vec::new();
		let io_result = match limiter {
			Some(limiter) => throttled_copy(&mut reader, &mut buf, limiter).await,
			None => tokio::io::copy(&mut reader, &mut buf).await,
		};
		io_result.map_err(|e| crate::error::StorageError::Other {
			path: action.path.to_string(),
			source: Box::new(e),
		})?;
		target.write(&action.path, Box::pin(std::io::Cursor::new(buf))).await?;

		let source_item = match source_side {
			Side::Local => action.local_item.as_ref(),
			Side::Remote => action.remote_item.as_ref(),
		};
		if self.options.preserve_timestamps {
			if let Some(item) = source_item {
				if let Err(e) = target.set_last_modified(&action.path, item.last_modified).await {
					tracing::warn!(path = %action.path, error = %e, "failed to preserve modification time");
				}
			}
		}
		if self.options.preserve_permissions {
			if let Some(permissions) = source_item.and_then(|i| i.permissions.as_deref()) {
				if let Err(e) = target.set_permissions(&action.path, permissions).await {
					tracing::warn!(path = %action.path, error = %e, "failed to preserve permissions");
				}
			}
		}
		target.get(&action.path).await
	}

	fn invoke_virtual_file_callback(&self, path: &RelPath) {
		if let Some(handle) = &self.options.virtual_file_callback {
			let callback = handle.0.clone();
			let path = path.clone();
			let outcome =
				std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback.on_materialized(&path)));
			if outcome.is_err() {
				tracing::warn!(path = %path, "virtual file callback panicked; file stays fully materialised");
			}
		}
	}

	async fn execute_conflict(&self, action: Action, counters: &SchedulerCounters) -> ExecutedAction {
		let started_at = now_ms();
		let analysis = analyze(&action);
		let mut verdict = self.resolver.resolve(&analysis).await;
		if let Some(configured) = self.options.conflict_resolution {
			if configured != ConflictVerdict::Ask {
				verdict = configured;
			}
		}
		let conflict_event = FileConflict::new(analysis);
		self.sink.on_conflict_detected(&conflict_event);
		if let Some(overridden) = conflict_event.take_override() {
			verdict = overridden;
		}
		if verdict == ConflictVerdict::Ask {
			// No callback supplied an override; the spec falls back to Skip.
			verdict = ConflictVerdict::Skip;
		}
		counters.files_conflicted.fetch_add(1, Ordering::SeqCst);

		match verdict {
			ConflictVerdict::UseLocal => {
				let mut outcome =
					self.execute_transfer(Action { action_type: ActionType::Upload, ..action }).await;
				outcome.final_verdict = Some(verdict);
				outcome
			}
			ConflictVerdict::UseRemote => {
				let mut outcome =
					self.execute_transfer(Action { action_type: ActionType::Download, ..action }).await;
				outcome.final_verdict = Some(verdict);
				outcome
			}
			ConflictVerdict::Skip => {
				counters.files_skipped.fetch_add(1, Ordering::SeqCst);
				self.skipped_outcome(action, started_at, Some(verdict))
			}
			// Reserved for a future coalesced-rename Scheduler path; for now
			// a reserved verdict is treated like Skip but tagged so callers
			// can tell the two apart.
			ConflictVerdict::RenameLocal | ConflictVerdict::RenameRemote => {
				self.skipped_outcome(action, started_at, Some(verdict))
			}
			ConflictVerdict::Ask => unreachable!("resolved to Skip above"),
		}
	}

	async fn execute_delete(&self, action: Action, counters: &SchedulerCounters) -> ExecutedAction {
		let started_at = now_ms();
		let is_dir = action.is_directory();
		let size = action.size();
		// The "source" of a delete is the side whose state is authoritative,
		// i.e. the side that was *not* deleted from.
		let source = match action.action_type {
			ActionType::DeleteLocal => Side::Remote,
			ActionType::DeleteRemote => Side::Local,
			_ => Side::Local,
		};

		if self.options.dry_run {
			counters.files_deleted.fetch_add(1, Ordering::SeqCst);
			return ExecutedAction {
				path: action.path,
				action_type: action.action_type,
				is_dir,
				size,
				source,
				started_at,
				completed_at: started_at,
				success: true,
				error_message: None,
				renamed_from: None,
				renamed_to: None,
				deleted: true,
				resulting_item: None,
				final_verdict: None,
			};
		}

		let target = match action.action_type {
			ActionType::DeleteLocal => &self.local,
			ActionType::DeleteRemote => &self.remote,
			_ => {
				return self.failed_outcome(
					action,
					started_at,
					source,
					"scheduler received a non-delete action in the delete phase".to_string(),
				);
			}
		};

		match target.delete(&action.path).await {
			Ok(()) => {
				counters.files_deleted.fetch_add(1, Ordering::SeqCst);
				ExecutedAction {
					path: action.path,
					action_type: action.action_type,
					is_dir,
					size,
					source,
					started_at,
					completed_at: now_ms(),
					success: true,
					error_message: None,
					renamed_from: None,
					renamed_to: None,
					deleted: true,
					resulting_item: None,
					final_verdict: None,
				}
			}
			Err(e) => {
				tracing::warn!(path = %action.path, error = %e, "delete failed, counted as skipped");
				counters.files_skipped.fetch_add(1, Ordering::SeqCst);
				ExecutedAction {
					path: action.path,
					action_type: action.action_type,
					is_dir,
					size,
					source,
					started_at,
					completed_at: now_ms(),
					success: false,
					error_message: Some(e.to_string()),
					renamed_from: None,
					renamed_to: None,
					deleted: false,
					resulting_item: None,
					final_verdict: None,
				}
			}
		}
	}

	fn dry_run_outcome(&self, action: Action, started_at: Timestamp) -> ExecutedAction {
		let is_dir = action.is_directory();
		let size = action.size();
		let source_side = match action.action_type {
			ActionType::Download => Side::Remote,
			_ => Side::Local,
		};
		let resulting_item = match source_side {
			Side::Local => action.local_item.clone(),
			Side::Remote => action.remote_item.clone(),
		};
		ExecutedAction {
			path: action.path,
			action_type: action.action_type,
			is_dir,
			size,
			source: source_side,
			started_at,
			completed_at: started_at,
			success: true,
			error_message: None,
			renamed_from: None,
			renamed_to: None,
			deleted: false,
			resulting_item,
			final_verdict: None,
		}
	}

	fn failed_outcome(&self, action: Action, started_at: Timestamp, source: Side, message: String) -> ExecutedAction {
		ExecutedAction {
			is_dir: action.is_directory(),
			size: action.size(),
			path: action.path,
			action_type: action.action_type,
			source,
			started_at,
			completed_at: now_ms(),
			success: false,
			error_message: Some(message),
			renamed_from: None,
			renamed_to: None,
			deleted: false,
			resulting_item: None,
			final_verdict: None,
		}
	}

	fn skipped_outcome(&self, action: Action, started_at: Timestamp, verdict: Option<ConflictVerdict>) -> ExecutedAction {
		ExecutedAction {
			is_dir: action.is_directory(),
			size: action.size(),
			path: action.path,
			action_type: ActionType::Conflict,
			source: Side::Local,
			started_at,
			completed_at: now_ms(),
			success: false,
			error_message: None,
			renamed_from: None,
			renamed_to: None,
			deleted: false,
			resulting_item: None,
			final_verdict: verdict,
		}
	}
}


// vim: ts=4
