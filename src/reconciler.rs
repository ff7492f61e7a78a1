//! Reconciler: turns a ChangeSet plus drained pending changes into five
//! prioritized Action groups ready for the Scheduler.

use crate::config::SyncOptions;
use crate::types::{
	Action, ActionType, ChangeSet, ConflictKind, PendingChange, PendingChangeType, RelPath, SyncItem,
};
use std::collections::{HashMap, HashSet};

const CONFLICT_BASE_PRIORITY: i64 = 1000;
const DELETE_BASE_PRIORITY: i64 = 500;
const DIRECTORY_BONUS: i64 = 50;
const RECENT_BONUS: i64 = 25;
const RECENT_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Default)]
pub struct ActionGroups {
	pub directories: Vec<Action>,
	pub small_files: Vec<Action>,
	pub large_files: Vec<Action>,
	pub conflicts: Vec<Action>,
	pub deletes: Vec<Action>,
}

pub struct Reconciler {
	large_file_threshold_bytes: u64,
	delete_extraneous: bool,
}

impl Reconciler {
	pub fn new(options: &SyncOptions) -> Self {
		Reconciler {
			large_file_threshold_bytes: options.large_file_threshold_bytes,
			delete_extraneous: options.delete_extraneous,
		}
	}

	pub fn reconcile(&self, change_set: &ChangeSet, pending: &[PendingChange], now: i64) -> ActionGroups {
		let mut groups = ActionGroups::default();
		let mut claimed: HashSet<RelPath> = HashSet::new();

		for action in self.pending_actions(change_set, pending, now) {
			claimed.insert(action.path.clone());
			self.file_action(action, &mut groups);
		}

		for addition in &change_set.additions {
			if claimed.contains(&addition.path) {
				continue;
			}
			let action_type = match addition.side {
				crate::types::Side::Local => ActionType::Upload,
				crate::types::Side::Remote => ActionType::Download,
			};
			let action = self.build_action(
				action_type,
				addition.path.clone(),
				addition.side,
				Some(&addition.item),
				now,
				None,
			);
			self.file_action(action, &mut groups);
		}

		let mut modifications_by_path: HashMap<RelPath, Vec<&crate::types::Modification>> = HashMap::new();
		for modification in &change_set.modifications {
			modifications_by_path.entry(modification.path.clone()).or_default().push(modification);
		}
		for (path, entries) in modifications_by_path {
			if claimed.contains(&path) {
				continue;
			}
			if entries.len() > 1 {
				let local_item = entries.iter().find(|m| m.side == crate::types::Side::Local).map(|m| &m.item);
				let remote_item = entries.iter().find(|m| m.side == crate::types::Side::Remote).map(|m| &m.item);
				let action = self.conflict_action(path, local_item, remote_item, ConflictKind::BothModified, now);
				groups.conflicts.push(action);
				continue;
			}
			let modification = entries[0];
			let action_type = match modification.side {
				crate::types::Side::Local => ActionType::Upload,
				crate::types::Side::Remote => ActionType::Download,
			};
			let action =
				self.build_action(action_type, path, modification.side, Some(&modification.item), now, None);
			self.file_action(action, &mut groups);
		}

		for deletion in &change_set.deletions {
			if claimed.contains(&deletion.path) {
				continue;
			}
			if !self.delete_extraneous && !(deletion.deleted_locally && deletion.deleted_remotely) {
				continue;
			}
			match (deletion.deleted_locally, deletion.deleted_remotely) {
				(true, true) => continue,
				(true, false) => {
					let remote_newer = match (deletion.tracked.remote_modified, deletion.tracked.local_modified) {
						(Some(remote), Some(local)) => remote > local,
						(Some(_), None) => true,
						_ => false,
					};
					if remote_newer {
						groups.conflicts.push(self.conflict_action(
							deletion.path.clone(),
							None,
							None,
							ConflictKind::DeletedLocallyModifiedRemotely,
							now,
						));
					} else {
						groups.deletes.push(self.delete_action(ActionType::DeleteRemote, deletion.path.clone(), deletion.tracked.is_dir));
					}
				}
				(false, true) => {
					let local_newer = match (deletion.tracked.local_modified, deletion.tracked.remote_modified) {
						(Some(local), Some(remote)) => local > remote,
						(Some(_), None) => true,
						_ => false,
					};
					if local_newer {
						groups.conflicts.push(self.conflict_action(
							deletion.path.clone(),
							None,
							None,
							ConflictKind::ModifiedLocallyDeletedRemotely,
							now,
						));
					} else {
						groups.deletes.push(self.delete_action(ActionType::DeleteLocal, deletion.path.clone(), deletion.tracked.is_dir));
					}
				}
				(false, false) => {}
			}
		}

		groups.directories.sort_by(|a, b| b.priority.cmp(&a.priority));
		groups.small_files.sort_by(|a, b| b.priority.cmp(&a.priority));
		groups.large_files.sort_by(|a, b| b.priority.cmp(&a.priority));
		groups.conflicts.sort_by(|a, b| b.priority.cmp(&a.priority));
		groups.deletes.sort_by(|a, b| depth_of(&b.path).cmp(&depth_of(&a.path)));
		groups
	}

	/// Synthesizes Actions from pending notifications, looking up item data
	/// from the ChangeSet's scan results when available.
	fn pending_actions(&self, change_set: &ChangeSet, pending: &[PendingChange], now: i64) -> Vec<Action> {
		let mut actions = Vec::new();
		let known_items = self.known_items(change_set);

		for change in pending {
			match change.change_type {
				PendingChangeType::Deleted => {
					if !self.delete_extraneous {
						continue;
					}
					let is_dir = known_items.get(&change.path).map(|i| i.is_dir).unwrap_or(false);
					actions.push(self.delete_action(ActionType::DeleteRemote, change.path.clone(), is_dir));
				}
				PendingChangeType::Created | PendingChangeType::Changed => {
					let item = known_items.get(&change.path);
					actions.push(self.build_action(
						ActionType::Upload,
						change.path.clone(),
						crate::types::Side::Local,
						item,
						now,
						None,
					));
				}
				PendingChangeType::Renamed => {
					if let (Some(from), Some(to)) = (&change.renamed_from, &change.renamed_to) {
						let from_is_dir = known_items.get(from).map(|i| i.is_dir).unwrap_or(false);
						let mut delete_action = self.delete_action(ActionType::DeleteRemote, from.clone(), from_is_dir);
						delete_action.from_pending_rename = true;
						actions.push(delete_action);
						let item = known_items.get(to);
						actions.push(self.build_action(
							ActionType::Upload,
							to.clone(),
							crate::types::Side::Local,
							item,
							now,
							Some(true),
						));
					}
				}
			}
		}
		actions
	}

	fn known_items(&self, change_set: &ChangeSet) -> HashMap<RelPath, SyncItem> {
		let mut map = HashMap::new();
		for addition in &change_set.additions {
			map.insert(addition.path.clone(), addition.item.clone());
		}
		for modification in &change_set.modifications {
			map.insert(modification.path.clone(), modification.item.clone());
		}
		map
	}

	fn build_action(
		&self,
		action_type: ActionType,
		path: RelPath,
		side: crate::types::Side,
		item: Option<&SyncItem>,
		now: i64,
		from_pending_rename: Option<bool>,
	) -> Action {
		let priority = self.file_priority(item, now);
		let (local_item, remote_item) = match side {
			crate::types::Side::Local => (item.cloned(), None),
			crate::types::Side::Remote => (None, item.cloned()),
		};
		Action {
			action_type,
			path,
			local_item,
			remote_item,
			conflict_kind: None,
			priority,
			from_pending_rename: from_pending_rename.unwrap_or(false),
		}
	}

	fn conflict_action(
		&self,
		path: RelPath,
		local_item: Option<&SyncItem>,
		remote_item: Option<&SyncItem>,
		kind: ConflictKind,
		_now: i64,
	) -> Action {
		Action {
			action_type: ActionType::Conflict,
			path,
			local_item: local_item.cloned(),
			remote_item: remote_item.cloned(),
			conflict_kind: Some(kind),
			priority: CONFLICT_BASE_PRIORITY,
			from_pending_rename: false,
		}
	}

	fn delete_action(&self, action_type: ActionType, path: RelPath, is_dir: bool) -> Action {
		let priority = DELETE_BASE_PRIORITY + if is_dir { DIRECTORY_BONUS } else { 0 };
		Action {
			action_type,
			path,
			local_item: None,
			remote_item: None,
			conflict_kind: None,
			priority,
			from_pending_rename: false,
		}
	}

	fn file_priority(&self, item: Option<&SyncItem>, now: i64) -> i64 {
		let size = item.map(|i| i.size).unwrap_or(0);
		let mut priority = 1_000_000 - (size / 1024).min(999_999) as i64;
		if item.map(|i| i.is_dir).unwrap_or(false) {
			priority += DIRECTORY_BONUS;
		}
		if let Some(item) = item {
			if (now - item.last_modified).abs() <= RECENT_WINDOW_MS {
				priority += RECENT_BONUS;
			}
		}
		priority
	}

	/// Routes a built Action into the directories/small_files/large_files
	/// group implied by its item.
	fn file_action(&self, action: Action, groups: &mut ActionGroups) {
		if action.action_type == ActionType::Conflict {
			groups.conflicts.push(action);
			return;
		}
		if matches!(action.action_type, ActionType::DeleteLocal | ActionType::DeleteRemote) {
			groups.deletes.push(action);
			return;
		}
		if action.is_directory() {
			groups.directories.push(action);
		} else if action.size() >= self.large_file_threshold_bytes {
			groups.large_files.push(action);
		} else {
			groups.small_files.push(action);
		}
	}
}

fn depth_of(path: &RelPath) -> usize {
	path.depth()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Addition, Deletion, Modification, Side, SyncState, SyncStatus};

	fn item(path: &str, size: u64, is_dir: bool) -> SyncItem {
		SyncItem {
			path: RelPath::new(path),
			is_dir,
			size,
			last_modified: 0,
			hash: None,
			etag: None,
			is_symlink: false,
			permissions: None,
		}
	}

	fn options() -> SyncOptions {
		SyncOptions::default()
	}

	#[test]
	fn test_local_addition_produces_upload() {
		let reconciler = Reconciler::new(&options());
		let mut cs = ChangeSet::new();
		cs.additions.push(Addition { path: RelPath::new("a.txt"), item: item("a.txt", 10, false), side: Side::Local });
		let groups = reconciler.reconcile(&cs, &[], 0);
		assert_eq!(groups.small_files.len(), 1);
		assert_eq!(groups.small_files[0].action_type, ActionType::Upload);
	}

	#[test]
	fn test_large_file_goes_to_large_files_group() {
		let reconciler = Reconciler::new(&options());
		let mut cs = ChangeSet::new();
		cs.additions.push(Addition {
			path: RelPath::new("big.bin"),
			item: item("big.bin", 20 * 1024 * 1024, false),
			side: Side::Remote,
		});
		let groups = reconciler.reconcile(&cs, &[], 0);
		assert_eq!(groups.large_files.len(), 1);
		assert_eq!(groups.large_files[0].action_type, ActionType::Download);
	}

	#[test]
	fn test_both_sides_modified_produces_conflict() {
		let reconciler = Reconciler::new(&options());
		let mut cs = ChangeSet::new();
		let tracked = SyncState {
			path: RelPath::new("a.txt"),
			is_dir: false,
			local_hash: None,
			remote_hash: None,
			local_modified: Some(0),
			remote_modified: Some(0),
			local_size: 1,
			remote_size: 1,
			status: SyncStatus::Synced,
			last_sync_time: None,
			etag: None,
			error_message: None,
			sync_attempts: 0,
		};
		cs.modifications.push(Modification { path: RelPath::new("a.txt"), item: item("a.txt", 1, false), side: Side::Local, tracked: tracked.clone() });
		cs.modifications.push(Modification { path: RelPath::new("a.txt"), item: item("a.txt", 2, false), side: Side::Remote, tracked });
		let groups = reconciler.reconcile(&cs, &[], 0);
		assert_eq!(groups.conflicts.len(), 1);
		assert_eq!(groups.conflicts[0].conflict_kind, Some(ConflictKind::BothModified));
	}

	#[test]
	fn test_deleted_locally_modified_remotely_is_conflict() {
		let reconciler = Reconciler::new(&options());
		let mut cs = ChangeSet::new();
		let tracked = SyncState {
			path: RelPath::new("a.txt"),
			is_dir: false,
			local_hash: None,
			remote_hash: None,
			local_modified: Some(100),
			remote_modified: Some(200),
			local_size: 1,
			remote_size: 1,
			status: SyncStatus::Synced,
			last_sync_time: None,
			etag: None,
			error_message: None,
			sync_attempts: 0,
		};
		cs.deletions.push(Deletion { path: RelPath::new("a.txt"), deleted_locally: true, deleted_remotely: false, tracked });
		let groups = reconciler.reconcile(&cs, &[], 0);
		assert_eq!(groups.conflicts.len(), 1);
		assert_eq!(groups.conflicts[0].conflict_kind, Some(ConflictKind::DeletedLocallyModifiedRemotely));
	}

	#[test]
	fn test_delete_extraneous_false_suppresses_one_sided_deletes() {
		let mut opts = options();
		opts.delete_extraneous = false;
		let reconciler = Reconciler::new(&opts);
		let mut cs = ChangeSet::new();
		let tracked = SyncState {
			path: RelPath::new("a.txt"),
			is_dir: false,
			local_hash: None,
			remote_hash: None,
			local_modified: Some(100),
			remote_modified: None,
			local_size: 1,
			remote_size: 0,
			status: SyncStatus::Synced,
			last_sync_time: None,
			etag: None,
			error_message: None,
			sync_attempts: 0,
		};
		cs.deletions.push(Deletion { path: RelPath::new("a.txt"), deleted_locally: true, deleted_remotely: false, tracked });
		let groups = reconciler.reconcile(&cs, &[], 0);
		assert!(groups.deletes.is_empty());
		assert!(groups.conflicts.is_empty());
	}

	#[test]
	fn test_delete_extraneous_false_still_drops_both_sides_deleted() {
		let mut opts = options();
		opts.delete_extraneous = false;
		let reconciler = Reconciler::new(&opts);
		let mut cs = ChangeSet::new();
		let tracked = SyncState {
			path: RelPath::new("a.txt"),
			is_dir: false,
			local_hash: None,
			remote_hash: None,
			local_modified: Some(100),
			remote_modified: Some(100),
			local_size: 1,
			remote_size: 1,
			status: SyncStatus::Synced,
			last_sync_time: None,
			etag: None,
			error_message: None,
			sync_attempts: 0,
		};
		cs.deletions.push(Deletion { path: RelPath::new("a.txt"), deleted_locally: true, deleted_remotely: true, tracked });
		let groups = reconciler.reconcile(&cs, &[], 0);
		assert!(groups.deletes.is_empty());
		assert!(groups.conflicts.is_empty());
	}

	#[test]
	fn test_deleted_both_sides_produces_no_action() {
		let reconciler = Reconciler::new(&options());
		let mut cs = ChangeSet::new();
		let tracked = SyncState {
			path: RelPath::new("a.txt"),
			is_dir: false,
			local_hash: None,
			remote_hash: None,
			local_modified: Some(100),
			remote_modified: Some(100),
			local_size: 1,
			remote_size: 1,
			status: SyncStatus::Synced,
			last_sync_time: None,
			etag: None,
			error_message: None,
			sync_attempts: 0,
		};
		cs.deletions.push(Deletion { path: RelPath::new("a.txt"), deleted_locally: true, deleted_remotely: true, tracked });
		let groups = reconciler.reconcile(&cs, &[], 0);
		assert!(groups.deletes.is_empty());
		assert!(groups.conflicts.is_empty());
	}

	#[test]
	fn test_deletes_sorted_by_descending_depth() {
		let reconciler = Reconciler::new(&options());
		let mut cs = ChangeSet::new();
		for p in ["a.txt", "a/b/c.txt", "a/b.txt"] {
			let tracked = SyncState {
				path: RelPath::new(p),
				is_dir: false,
				local_hash: None,
				remote_hash: None,
				local_modified: Some(100),
				remote_modified: None,
				local_size: 1,
				remote_size: 0,
				status: SyncStatus::Synced,
				last_sync_time: None,
				etag: None,
				error_message: None,
				sync_attempts: 0,
			};
			cs.deletions.push(Deletion { path: RelPath::new(p), deleted_locally: true, deleted_remotely: false, tracked });
		}
		let groups = reconciler.reconcile(&cs, &[], 0);
		let depths: Vec<usize> = groups.deletes.iter().map(|a| depth_of(&a.path)).collect();
		assert!(depths.windows(2).all(|w| w[0] >= w[1]));
	}

	#[test]
	fn test_pending_takes_precedence_over_scan_addition() {
		let reconciler = Reconciler::new(&options());
		let mut cs = ChangeSet::new();
		cs.additions.push(Addition { path: RelPath::new("a.txt"), item: item("a.txt", 10, false), side: Side::Remote });
		let pending =
			vec![PendingChange { path: RelPath::new("a.txt"), change_type: PendingChangeType::Created, detected_at: 0, renamed_from: None, renamed_to: None }];
		let groups = reconciler.reconcile(&cs, &pending, 0);
		assert_eq!(groups.small_files.len(), 1);
		assert_eq!(groups.small_files[0].action_type, ActionType::Upload);
	}

	#[test]
	fn test_pending_rename_produces_delete_and_upload_pair() {
		let reconciler = Reconciler::new(&options());
		let cs = ChangeSet::new();
		let pending = vec![PendingChange {
			path: RelPath::new("new.txt"),
			change_type: PendingChangeType::Renamed,
			detected_at: 0,
			renamed_from: Some(RelPath::new("old.txt")),
			renamed_to: Some(RelPath::new("new.txt")),
		}];
		let groups = reconciler.reconcile(&cs, &pending, 0);
		assert_eq!(groups.deletes.len(), 1);
		assert_eq!(groups.small_files.len(), 1);
		assert!(groups.small_files[0].from_pending_rename);
	}
}

// vim: ts=4
