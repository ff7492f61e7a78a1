//! Pending-Change Tracker: a process-wide, mutex-protected map of
//! filesystem-watch notifications awaiting the next sync run.

use crate::filter::Filter;
use crate::types::{ActionType, PendingChange, PendingChangeType, RelPath, Timestamp};
use std::collections::HashMap;
use std::sync::Mutex;

/// A pending entry as surfaced to UI callers via `get_pending`.
#[derive(Debug, Clone)]
pub struct PendingOperation {
	pub path: RelPath,
	pub change_type: PendingChangeType,
	pub action_type: ActionType,
	pub detected_at: Timestamp,
}

pub struct PendingChangeTracker {
	entries: Mutex<HashMap<RelPath, PendingChange>>,
	filter: Filter,
}

impl PendingChangeTracker {
	pub fn new(filter: Filter) -> Self {
		PendingChangeTracker { entries: Mutex::new(HashMap::new()), filter }
	}

	/// Records a single change, applying the §4.8 coalescing rules against
	/// whatever entry is already queued for `path`.
	pub fn notify(&self, path: RelPath, change_type: PendingChangeType, detected_at: Timestamp) {
		if !self.filter.should_sync(&path) {
			return;
		}
		let mut entries = self.entries.lock().unwrap();
		self.apply(&mut entries, path, change_type, detected_at);
	}

	pub fn notify_batch(&self, changes: Vec<(RelPath, PendingChangeType, Timestamp)>) {
		let mut entries = self.entries.lock().unwrap();
		for (path, change_type, detected_at) in changes {
			if !self.filter.should_sync(&path) {
				continue;
			}
			self.apply(&mut entries, path, change_type, detected_at);
		}
	}

	pub fn notify_rename(&self, old: RelPath, new: RelPath, detected_at: Timestamp) {
		if !self.filter.should_sync(&old) && !self.filter.should_sync(&new) {
			return;
		}
		let mut entries = self.entries.lock().unwrap();
		entries.insert(
			old.clone(),
			PendingChange {
				path: old,
				change_type: PendingChangeType::Deleted,
				detected_at,
				renamed_from: None,
				renamed_to: Some(new.clone()),
			},
		);
		entries.insert(
			new.clone(),
			PendingChange {
				path: new,
				change_type: PendingChangeType::Created,
				detected_at,
				renamed_from: Some(old),
				renamed_to: None,
			},
		);
	}

	fn apply(
		&self,
		entries: &mut HashMap<RelPath, PendingChange>,
		path: RelPath,
		change_type: PendingChangeType,
		detected_at: Timestamp,
	) {
		match entries.get(&path) {
			None => {
				entries.insert(
					path.clone(),
					PendingChange { path, change_type, detected_at, renamed_from: None, renamed_to: None },
				);
			}
			Some(existing) => match (existing.change_type, change_type) {
				(PendingChangeType::Created, PendingChangeType::Changed) => {}
				(PendingChangeType::Created, PendingChangeType::Deleted) => {
					entries.remove(&path);
				}
				(PendingChangeType::Changed, PendingChangeType::Deleted) => {
					if let Some(entry) = entries.get_mut(&path) {
						entry.change_type = PendingChangeType::Deleted;
						entry.detected_at = detected_at;
					}
				}
				(existing_type, PendingChangeType::Created) if existing_type != PendingChangeType::Deleted => {}
				_ => {
					entries.insert(
						path.clone(),
						PendingChange { path, change_type, detected_at, renamed_from: None, renamed_to: None },
					);
				}
			},
		}
	}

	/// Snapshot for UI display; does not drain the queue.
	pub fn get_pending(&self) -> Vec<PendingOperation> {
		let entries = self.entries.lock().unwrap();
		entries
			.values()
			.map(|change| PendingOperation {
				path: change.path.clone(),
				change_type: change.change_type,
				action_type: match change.change_type {
					PendingChangeType::Deleted => ActionType::DeleteRemote,
					_ => ActionType::Upload,
				},
				detected_at: change.detected_at,
			})
			.collect()
	}

	/// Atomically returns and clears all pending entries.
	pub fn drain(&self) -> Vec<PendingChange> {
		let mut entries = self.entries.lock().unwrap();
		entries.drain().map(|(_, change)| change).collect()
	}

	pub fn clear(&self) {
		self.entries.lock().unwrap().clear();
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tracker() -> PendingChangeTracker {
		PendingChangeTracker::new(Filter::new(&[], &[]))
	}

	#[test]
	fn test_created_then_changed_stays_created() {
		let tracker = tracker();
		let path = RelPath::new("a.txt");
		tracker.notify(path.clone(), PendingChangeType::Created, 0);
		tracker.notify(path.clone(), PendingChangeType::Changed, 1);
		let pending = tracker.get_pending();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].change_type, PendingChangeType::Created);
	}

	#[test]
	fn test_created_then_deleted_is_net_no_op() {
		let tracker = tracker();
		let path = RelPath::new("a.txt");
		tracker.notify(path.clone(), PendingChangeType::Created, 0);
		tracker.notify(path, PendingChangeType::Deleted, 1);
		assert!(tracker.is_empty());
	}

	#[test]
	fn test_changed_then_deleted_becomes_deleted() {
		let tracker = tracker();
		let path = RelPath::new("a.txt");
		tracker.notify(path.clone(), PendingChangeType::Changed, 0);
		tracker.notify(path.clone(), PendingChangeType::Deleted, 1);
		let pending = tracker.get_pending();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].change_type, PendingChangeType::Deleted);
		assert_eq!(pending[0].action_type, ActionType::DeleteRemote);
	}

	#[test]
	fn test_rename_produces_paired_entries() {
		let tracker = tracker();
		tracker.notify_rename(RelPath::new("old.txt"), RelPath::new("new.txt"), 0);
		let pending = tracker.get_pending();
		assert_eq!(pending.len(), 2);
		assert!(pending.iter().any(|p| p.path.as_str() == "old.txt" && p.change_type == PendingChangeType::Deleted));
		assert!(pending.iter().any(|p| p.path.as_str() == "new.txt" && p.change_type == PendingChangeType::Created));
	}

	#[test]
	fn test_drain_clears_queue() {
		let tracker = tracker();
		tracker.notify(RelPath::new("a.txt"), PendingChangeType::Created, 0);
		let drained = tracker.drain();
		assert_eq!(drained.len(), 1);
		assert!(tracker.is_empty());
	}

	#[test]
	fn test_excluded_path_is_dropped() {
		let tracker = PendingChangeTracker::new(Filter::new(&["*.tmp".to_string()], &[]));
		tracker.notify(RelPath::new("scratch.tmp"), PendingChangeType::Created, 0);
		assert!(tracker.is_empty());
	}

	#[test]
	fn test_clear_discards_without_returning() {
		let tracker = tracker();
		tracker.notify(RelPath::new("a.txt"), PendingChangeType::Created, 0);
		tracker.clear();
		assert!(tracker.is_empty());
	}
}

// vim: ts=4
