//! Change Detector: walks both storages concurrently and diffs against the
//! last-known State Store rows to produce a ChangeSet.

use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::filter::Filter;
use crate::state_store::StateStore;
use crate::storage::Storage;
use crate::strategies::ComparisonMode;
use crate::types::{Addition, ChangeSet, Deletion, Modification, RelPath, Side, SyncItem, SyncState};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::warn;

pub struct ChangeDetector {
	local: Arc<dyn Storage>,
	remote: Arc<dyn Storage>,
	state: Arc<dyn StateStore>,
	filter: Filter,
}

impl ChangeDetector {
	pub fn new(local: Arc<dyn Storage>, remote: Arc<dyn Storage>, state: Arc<dyn StateStore>, filter: Filter) -> Self {
		ChangeDetector { local, remote, state, filter }
	}

	/// Runs the full detection algorithm against every tracked row
	/// (`state.all()`), walking both storages from the given root.
	pub async fn detect(&self, root: &RelPath, options: &SyncOptions) -> Result<ChangeSet, SyncError> {
		let tracked_rows = self.state.all().await?;
		self.detect_with_tracked(root, options, tracked_rows).await
	}

	/// Same algorithm scoped to a path prefix, used by `sync_folder`.
	pub async fn detect_under_prefix(
		&self,
		root: &RelPath,
		options: &SyncOptions,
	) -> Result<ChangeSet, SyncError> {
		let tracked_rows = self.state.by_prefix(root).await?;
		self.detect_with_tracked(root, options, tracked_rows).await
	}

	async fn detect_with_tracked(
		&self,
		root: &RelPath,
		options: &SyncOptions,
		tracked_rows: Vec<SyncState>,
	) -> Result<ChangeSet, SyncError> {
		let tracked: HashMap<RelPath, SyncState> =
			tracked_rows.into_iter().map(|row| (row.path.clone(), row)).collect();

		let change_set = Mutex::new(ChangeSet::new());

		let comparison_mode = options.comparison_mode();
		let local_walk = self.walk_side(Side::Local, root, &tracked, &change_set, comparison_mode, options);
		let remote_walk = self.walk_side(Side::Remote, root, &tracked, &change_set, comparison_mode, options);
		let (local_result, remote_result) = tokio::join!(local_walk, remote_walk);
		local_result?;
		remote_result?;

		let mut change_set = change_set.into_inner().unwrap();
		self.detect_deletions(&tracked, &mut change_set).await?;
		Ok(change_set)
	}

	async fn walk_side(
		&self,
		side: Side,
		dir: &RelPath,
		tracked: &HashMap<RelPath, SyncState>,
		change_set: &Mutex<ChangeSet>,
		comparison_mode: ComparisonMode,
		options: &SyncOptions,
	) -> Result<(), SyncError> {
		let storage = self.storage_for(side);
		let items = match storage.list(dir).await {
			Ok(items) => items,
			Err(e) => {
				warn!(path = %dir, side = %side, error = %e, "directory listing failed, skipping");
				return Ok(());
			}
		};

		let mut children = Vec::new();
		for item in items {
			if !self.filter.should_sync(&item.path) {
				continue;
			}
			if item.is_symlink && !options.follow_symlinks {
				continue;
			}

			{
				let mut cs = change_set.lock().unwrap();
				cs.processed_paths.insert(item.path.clone());
				match side {
					Side::Local => cs.local_paths.insert(item.path.clone()),
					Side::Remote => cs.remote_paths.insert(item.path.clone()),
				};
			}

			match tracked.get(&item.path) {
				Some(row) => {
					if has_changed(side, &item, row, comparison_mode, storage.as_ref(), options).await? {
						let mut cs = change_set.lock().unwrap();
						cs.modifications.push(Modification {
							path: item.path.clone(),
							item: item.clone(),
							side,
							tracked: row.clone(),
						});
					}
				}
				None => {
					let mut cs = change_set.lock().unwrap();
					cs.additions.push(Addition { path: item.path.clone(), item: item.clone(), side });
				}
			}

			if item.is_dir {
				children.push(item.path.clone());
			}
		}

		for child in children {
			Box::pin(self.walk_side(side, &child, tracked, change_set, comparison_mode, options)).await?;
		}
		Ok(())
	}

	async fn detect_deletions(
		&self,
		tracked: &HashMap<RelPath, SyncState>,
		change_set: &mut ChangeSet,
	) -> Result<(), SyncError> {
		for (path, row) in tracked.iter() {
			if change_set.processed_paths.contains(path) {
				continue;
			}
			let deleted_locally = !self.local.exists(path).await.unwrap_or(false);
			let deleted_remotely = !self.remote.exists(path).await.unwrap_or(false);
			if !deleted_locally && !deleted_remotely {
				continue;
			}
			change_set.deletions.push(Deletion { path: path.clone(), deleted_locally, deleted_remotely, tracked: row.clone() });
		}
		Ok(())
	}

	fn storage_for(&self, side: Side) -> &Arc<dyn Storage> {
		match side {
			Side::Local => &self.local,
			Side::Remote => &self.remote,
		}
	}
}

/// §4.5.1: whether `item` has changed relative to `row` on `side`.
async fn has_changed(
	side: Side,
	item: &SyncItem,
	row: &SyncState,
	mode: ComparisonMode,
	storage: &dyn Storage,
	options: &SyncOptions,
) -> Result<bool, SyncError> {
	let (recorded_modified, recorded_size, recorded_hash) = match side {
		Side::Local => (row.local_modified, row.local_size, row.local_hash.as_ref()),
		Side::Remote => (row.remote_modified, row.remote_size, row.remote_hash.as_ref()),
	};

	if recorded_modified.is_none() {
		return Ok(true);
	}

	if let (Some(item_hash), Some(row_hash)) = (item.hash.as_ref(), recorded_hash) {
		if item_hash != row_hash {
			return Ok(true);
		}
	}

	if mode == ComparisonMode::SizeOnly {
		return Ok(item.size != recorded_size);
	}

	if item.size != recorded_size {
		return Ok(true);
	}

	if mode != ComparisonMode::ChecksumOnly {
		let window = options.change_detection_window_ms;
		if let Some(recorded) = recorded_modified {
			if (item.last_modified - recorded).abs() > window {
				return Ok(true);
			}
		}
	}

	if mode == ComparisonMode::ChecksumOnly && !item.is_dir {
		let hash = storage.compute_hash(&item.path).await?;
		if let Some(row_hash) = recorded_hash {
			return Ok(&hash != row_hash);
		}
		return Ok(true);
	}

	Ok(false)
}


// vim: ts=4
