//! `SyncEngine`: the facade tying the Change Detector, Reconciler, and
//! Scheduler into the operations callers actually invoke.
//!
//! The single-run invariant and lifecycle bookkeeping are grounded on the
//! teacher's `utils/lock.rs` (`FileLock::acquire`, released on every exit
//! path including error) but the mechanism itself is swapped from a
//! cross-process lock file to an in-process `Semaphore` + `Mutex`, since
//! this engine has no multi-node protocol requiring a filesystem-visible
//! lock.

use crate::config::SyncOptions;
use crate::conflict::{ConflictResolver, SmartResolver};
use crate::detector::ChangeDetector;
use crate::error::SyncError;
use crate::filter::Filter;
use crate::pending::{PendingChangeTracker, PendingOperation};
use crate::progress::{EngineEventSink, NullEventSink, ProgressSnapshot};
use crate::reconciler::{ActionGroups, Reconciler};
use crate::scheduler::{CancellationToken, ExecutedAction, PauseGate, Scheduler};
use crate::state_store::{StateStore, StateStoreStats};
use crate::storage::Storage;
use crate::strategies::{EngineOperation, LifecycleState};
use crate::types::{ActionType, CompletedOperation, RelPath, Side, SyncState, SyncStatus, Timestamp};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, Semaphore};

fn now_ms() -> Timestamp {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Aggregate outcome of one `synchronize`/`preview`/`sync_folder`/`sync_files`
/// call.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
	pub files_synchronized: u64,
	pub files_skipped: u64,
	pub files_conflicted: u64,
	pub files_deleted: u64,
	pub cancelled: bool,
	pub actions: Vec<ExecutedAction>,
}

impl SyncResult {
	fn from_outcomes(actions: Vec<ExecutedAction>, cancelled: bool) -> Self {
		let mut result = SyncResult { cancelled, ..Default::default() };
		for outcome in &actions {
			if !outcome.success {
				if outcome.action_type != ActionType::Conflict {
					result.files_skipped += 1;
				}
				continue;
			}
			match outcome.action_type {
				ActionType::Upload | ActionType::Download if outcome.final_verdict.is_none() => {
					result.files_synchronized += 1;
				}
				ActionType::Upload | ActionType::Download => {}
				ActionType::DeleteLocal | ActionType::DeleteRemote => result.files_deleted += 1,
				ActionType::Conflict => {}
			}
			if outcome.final_verdict.is_some() {
				result.files_conflicted += 1;
			}
		}
		result.actions = actions;
		result
	}

	fn cancelled_empty() -> Self {
		SyncResult { cancelled: true, ..Default::default() }
	}
}

/// A dry plan: the Actions the Scheduler would execute, grouped the way
/// `reconciler.rs` groups them, without touching either Storage or the
/// State Store.
#[derive(Debug)]
pub struct SyncPlan {
	pub groups: ActionGroups,
}

/// Which paths a run's change detection is scoped to.
enum RunScope {
	Full,
	Prefix(RelPath),
	Paths(Vec<RelPath>),
}

/// The bidirectional sync engine. Cheap to clone (everything inside is an
/// `Arc`); typically constructed once per pair of storage roots and reused
/// across runs.
pub struct SyncEngine {
	local: Arc<dyn Storage>,
	remote: Arc<dyn Storage>,
	state: Arc<dyn StateStore>,
	filter: Filter,
	resolver: Arc<dyn ConflictResolver>,
	sink: Arc<dyn EngineEventSink>,
	pending: PendingChangeTracker,
	run_guard: Semaphore,
	lifecycle: Mutex<LifecycleState>,
	pause_gate: Arc<PauseGate>,
	active_cancellation: StdMutex<Option<CancellationToken>>,
}

impl SyncEngine {
	pub fn new(local: Arc<dyn Storage>, remote: Arc<dyn Storage>, state: Arc<dyn StateStore>) -> Self {
		let filter = Filter::with_defaults();
		SyncEngine {
			local,
			remote,
			state,
			pending: PendingChangeTracker::new(filter.clone()),
			filter,
			resolver: Arc::new(SmartResolver::new()),
			sink: Arc::new(NullEventSink),
			run_guard: Semaphore::new(1),
			lifecycle: Mutex::new(LifecycleState::Idle),
			pause_gate: Arc::new(PauseGate::new()),
			active_cancellation: StdMutex::new(None),
		}
	}

	pub fn with_filter(mut self, filter: Filter) -> Self {
		self.pending = PendingChangeTracker::new(filter.clone());
		self.filter = filter;
		self
	}

	pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
		self.resolver = resolver;
		self
	}

	pub fn with_event_sink(mut self, sink: Arc<dyn EngineEventSink>) -> Self {
		self.sink = sink;
		self
	}

	/// Queue a filesystem-watch notification for the next run. See
	/// `PendingChangeTracker` for the coalescing rules.
	pub fn notify_pending_change(&self, path: RelPath, change_type: crate::types::PendingChangeType) {
		self.pending.notify(path, change_type, now_ms());
	}

	pub fn get_pending_operations(&self) -> Vec<PendingOperation> {
		self.pending.get_pending()
	}

	pub fn clear_pending_changes(&self) {
		self.pending.clear();
	}

	/// Full bidirectional sync of the whole tree.
	pub async fn synchronize(&self, options: SyncOptions) -> Result<SyncResult, SyncError> {
		self.run(RunScope::Full, options, false).await
	}

	/// Same as `synchronize`, forced into `dry_run`; no Storage writes and
	/// no State Store commit occur.
	pub async fn preview(&self, options: SyncOptions) -> Result<SyncResult, SyncError> {
		self.run(RunScope::Full, options, true).await
	}

	/// Detects and reconciles, but never schedules or executes: returns the
	/// grouped Actions a `synchronize` call with the same options would run.
	pub async fn sync_plan(&self, options: SyncOptions) -> Result<SyncPlan, SyncError> {
		let _permit = self.run_guard.try_acquire().map_err(|_| SyncError::Busy)?;
		let effective_filter = self.filter.extended_with(&options.exclude_patterns);
		let detector =
			ChangeDetector::new(self.local.clone(), self.remote.clone(), self.state.clone(), effective_filter);
		let change_set = detector.detect(&RelPath::new(""), &options).await?;
		let pending = self.pending.drain();
		let reconciler = Reconciler::new(&options);
		let groups = reconciler.reconcile(&change_set, &pending, now_ms());
		Ok(SyncPlan { groups })
	}

	/// Scopes change detection and reconciliation to one subtree, otherwise
	/// identical to `synchronize`.
	pub async fn sync_folder(&self, path: RelPath, options: SyncOptions) -> Result<SyncResult, SyncError> {
		self.run(RunScope::Prefix(path), options, false).await
	}

	/// Skips scanning entirely: synthesizes Actions directly from the
	/// current Storage view of the named paths.
	pub async fn sync_files(&self, paths: Vec<RelPath>, options: SyncOptions) -> Result<SyncResult, SyncError> {
		self.run(RunScope::Paths(paths), options, false).await
	}

	/// Suspends in-flight Actions at their next yield point. Resumable via
	/// `resume`.
	pub async fn pause(&self) {
		let mut lifecycle = self.lifecycle.lock().await;
		if *lifecycle == LifecycleState::Running {
			*lifecycle = LifecycleState::Paused;
			self.pause_gate.pause();
		}
	}

	pub async fn resume(&self) {
		let mut lifecycle = self.lifecycle.lock().await;
		if *lifecycle == LifecycleState::Paused {
			*lifecycle = LifecycleState::Running;
			self.pause_gate.resume();
		}
	}

	/// Cancels the currently active run, if any. A no-op when idle.
	pub fn cancel(&self) {
		if let Some(token) = self.active_cancellation.lock().unwrap().as_ref() {
			token.cancel();
		}
	}

	pub async fn lifecycle_state(&self) -> LifecycleState {
		*self.lifecycle.lock().await
	}

	/// Drops every persisted `SyncState` row; the next run re-mirrors the
	/// whole tree from scratch.
	pub async fn reset_state(&self) -> Result<(), SyncError> {
		self.state.clear().await.map_err(SyncError::from)
	}

	pub async fn stats(&self) -> Result<StateStoreStats, SyncError> {
		self.state.stats().await.map_err(SyncError::from)
	}

	pub async fn recent_operations(
		&self,
		limit: usize,
		since: Option<Timestamp>,
	) -> Result<Vec<CompletedOperation>, SyncError> {
		self.state.recent_operations(limit, since).await.map_err(SyncError::from)
	}

	pub async fn prune_operations(&self, older_than: Timestamp) -> Result<(), SyncError> {
		self.state.prune_operations(older_than).await.map_err(SyncError::from)
	}

	async fn run(&self, scope: RunScope, mut options: SyncOptions, force_dry_run: bool) -> Result<SyncResult, SyncError> {
		let _permit = self.run_guard.try_acquire().map_err(|_| SyncError::Busy)?;
		if force_dry_run {
			options.dry_run = true;
		}

		*self.lifecycle.lock().await = LifecycleState::Running;
		let token = CancellationToken::new();
		*self.active_cancellation.lock().unwrap() = Some(token.clone());

		let timeout_handle = (options.timeout_seconds > 0).then(|| {
			let token = token.clone();
			let duration = std::time::Duration::from_secs(options.timeout_seconds);
			tokio::spawn(async move {
				tokio::time::sleep(duration).await;
				token.cancel();
			})
		});

		let outcome = self.run_phases(scope, &options, token).await;

		if let Some(handle) = timeout_handle {
			handle.abort();
		}
		*self.active_cancellation.lock().unwrap() = None;
		*self.lifecycle.lock().await = LifecycleState::Idle;
		outcome
	}

	async fn run_phases(
		&self,
		scope: RunScope,
		options: &SyncOptions,
		token: CancellationToken,
	) -> Result<SyncResult, SyncError> {
		self.sink.on_progress(&ProgressSnapshot {
			operation: EngineOperation::Scanning,
			files_synchronized: 0,
			files_skipped: 0,
			files_conflicted: 0,
			files_deleted: 0,
		});

		let effective_filter = self.filter.extended_with(&options.exclude_patterns);
		let detector =
			ChangeDetector::new(self.local.clone(), self.remote.clone(), self.state.clone(), effective_filter);

		let (change_set, pending) = match &scope {
			RunScope::Full => (detector.detect(&RelPath::new(""), options).await?, self.pending.drain()),
			RunScope::Prefix(prefix) => {
				(detector.detect_under_prefix(prefix, options).await?, self.pending.drain())
			}
			RunScope::Paths(paths) => (self.change_set_for_paths(paths).await?, Vec::new()),
		};

		if token.is_cancelled() {
			return Ok(SyncResult::cancelled_empty());
		}

		let reconciler = Reconciler::new(options);
		let groups = reconciler.reconcile(&change_set, &pending, now_ms());

		let scheduler = Scheduler::new(
			self.local.clone(),
			self.remote.clone(),
			self.resolver.clone(),
			self.sink.clone(),
			options.clone(),
			token.clone(),
			self.pause_gate.clone(),
		);
		let outcomes = scheduler.run(groups).await;
		let cancelled = token.is_cancelled();

		if !options.dry_run && !cancelled {
			let vanished = change_set
				.deletions
				.iter()
				.filter(|d| d.deleted_locally && d.deleted_remotely)
				.map(|d| d.path.clone());
			self.commit(&outcomes, vanished).await?;
		}

		Ok(SyncResult::from_outcomes(outcomes, cancelled))
	}

	/// Builds a minimal `ChangeSet` covering only `paths`, by comparing
	/// each side's current item directly rather than walking the tree.
	/// Paths present on only one side become an Addition from that side;
	/// paths whose content differs on both sides become a `BothModified`
	/// conflict, since this path bypasses the usual tracked-state history
	/// that would otherwise tell the Reconciler which side changed.
	async fn change_set_for_paths(&self, paths: &[RelPath]) -> Result<crate::types::ChangeSet, SyncError> {
		let mut change_set = crate::types::ChangeSet::new();
		for path in paths {
			let local_item = self.local.get(path).await?;
			let remote_item = self.remote.get(path).await?;
			match (local_item, remote_item) {
				(Some(item), None) => {
					change_set.additions.push(crate::types::Addition { path: path.clone(), item, side: Side::Local });
				}
				(None, Some(item)) => {
					change_set.additions.push(crate::types::Addition {
						path: path.clone(),
						item,
						side: Side::Remote,
					});
				}
				(None, None) => {}
				(Some(local), Some(remote)) => {
					let differs = match (local.content_id(), remote.content_id()) {
						(Some(l), Some(r)) => l != r,
						_ => local.size != remote.size || local.last_modified != remote.last_modified,
					};
					if differs {
						let tracked = self
							.state
							.get(path)
							.await?
							.unwrap_or_else(|| SyncState::new_synced(path.clone(), local.is_dir));
						change_set.modifications.push(crate::types::Modification {
							path: path.clone(),
							item: local,
							side: Side::Local,
							tracked: tracked.clone(),
						});
						change_set.modifications.push(crate::types::Modification {
							path: path.clone(),
							item: remote,
							side: Side::Remote,
							tracked,
						});
					}
				}
			}
		}
		Ok(change_set)
	}

	/// Translates one run's executed Actions into a single committed
	/// `StateStore` transaction, plus an append-only `CompletedOperation`
	/// row per Action. `vanished` carries paths the detector found deleted on
	/// both sides, which never became an Action but whose tracked row must
	/// still be dropped. Never called for a cancelled or dry-run result.
	async fn commit(
		&self,
		outcomes: &[ExecutedAction],
		vanished: impl Iterator<Item = RelPath>,
	) -> Result<(), SyncError> {
		let mut txn = self.state.begin_transaction();
		for path in vanished {
			txn.delete(path);
		}
		for outcome in outcomes {
			if outcome.success && outcome.deleted {
				txn.delete(outcome.path.clone());
			} else if outcome.success && matches!(outcome.action_type, ActionType::Upload | ActionType::Download) {
				let existing = self.state.get(&outcome.path).await?;
				txn.upsert(synced_state(outcome, existing));
			} else if !outcome.success && outcome.action_type == ActionType::Conflict {
				let existing = self.state.get(&outcome.path).await?;
				txn.upsert(conflicted_state(outcome, existing));
			} else if !outcome.success {
				let existing = self.state.get(&outcome.path).await?;
				txn.upsert(error_state(outcome, existing));
			}
			self.state.append_operation(completed_operation(outcome)).await?;
		}
		self.state.commit(txn).await.map_err(SyncError::from)
	}
}

fn synced_state(outcome: &ExecutedAction, existing: Option<SyncState>) -> SyncState {
	let mut state = existing.unwrap_or_else(|| SyncState::new_synced(outcome.path.clone(), outcome.is_dir));
	let item = outcome.resulting_item.as_ref();
	state.is_dir = outcome.is_dir;
	state.local_hash = item.and_then(|i| i.hash.clone()).or_else(|| state.local_hash.clone());
	state.remote_hash = state.local_hash.clone();
	state.local_modified = item.map(|i| i.last_modified).or(state.local_modified);
	state.remote_modified = state.local_modified;
	state.local_size = item.map(|i| i.size).unwrap_or(outcome.size);
	state.remote_size = state.local_size;
	state.etag = item.and_then(|i| i.etag.clone());
	state.status = SyncStatus::Synced;
	state.last_sync_time = Some(outcome.completed_at);
	state.error_message = None;
	state.sync_attempts = 0;
	state
}

fn conflicted_state(outcome: &ExecutedAction, existing: Option<SyncState>) -> SyncState {
	let mut state = existing.unwrap_or_else(|| SyncState::new_synced(outcome.path.clone(), outcome.is_dir));
	state.status = SyncStatus::Conflict;
	state.sync_attempts += 1;
	state
}

fn error_state(outcome: &ExecutedAction, existing: Option<SyncState>) -> SyncState {
	let mut state = existing.unwrap_or_else(|| SyncState::new_synced(outcome.path.clone(), outcome.is_dir));
	state.status = SyncStatus::Error;
	state.error_message = outcome.error_message.clone();
	state.sync_attempts += 1;
	state
}

fn completed_operation(outcome: &ExecutedAction) -> CompletedOperation {
	CompletedOperation {
		id: uuid::Uuid::new_v4(),
		path: outcome.path.clone(),
		action_type: outcome.action_type,
		is_dir: outcome.is_dir,
		size: outcome.size,
		source: outcome.source,
		started_at: outcome.started_at,
		completed_at: outcome.completed_at,
		success: outcome.success,
		error_message: outcome.error_message.clone(),
		renamed_from: outcome.renamed_from.clone(),
		renamed_to: outcome.renamed_to.clone(),
	}
}


// vim: ts=4
