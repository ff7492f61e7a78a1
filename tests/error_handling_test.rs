//! Error Handling Tests - validates graceful failure behavior:
//! - State store errors (corrupted/missing database file)
//! - Filesystem edge cases (permissions, broken symlinks, deep nesting)
//! - Error type classification and display

use std::fs;
use std::path::Path;
use sync_engine::state_store::redb_store::RedbStateStore;
use sync_engine::{ConflictError, FilterError, StateError, StorageError, SyncError};
use tempfile::TempDir;

// ===================================================================
// STATE STORE ERROR TESTS
// ===================================================================

#[test]
fn test_corrupted_state_file_fails_to_open() {
	let state_dir = TempDir::new().unwrap();
	let db_path = state_dir.path().join("state.redb");
	fs::write(&db_path, b"not a valid redb database").unwrap();

	let result = RedbStateStore::open(&db_path);
	assert!(result.is_err(), "opening a corrupted database file should fail, not panic");
}

#[test]
fn test_missing_parent_directory_fails_gracefully() {
	let nonexistent = Path::new("/tmp/definitely_does_not_exist_for_sync_engine_test_12345/state.redb");

	let result = RedbStateStore::open(nonexistent);
	assert!(result.is_err(), "a missing parent directory should produce an error, not panic");
}

#[tokio::test]
async fn test_fresh_state_store_opens_and_reports_empty_stats() {
	use sync_engine::StateStore;

	let state_dir = TempDir::new().unwrap();
	let db_path = state_dir.path().join("state.redb");

	let store = RedbStateStore::open(&db_path).expect("fresh database should open");
	let stats = store.stats().await.expect("stats should succeed on an empty store");
	assert_eq!(stats.total, 0);
}

#[tokio::test]
async fn test_reopening_existing_state_store_preserves_committed_rows() {
	use sync_engine::{RelPath, StateStore, SyncState, SyncStatus};

	let state_dir = TempDir::new().unwrap();
	let db_path = state_dir.path().join("state.redb");

	{
		let store = RedbStateStore::open(&db_path).unwrap();
		let mut txn = store.begin_transaction();
		txn.upsert(SyncState {
			path: RelPath::new("a.txt"),
			is_dir: false,
			local_hash: None,
			remote_hash: None,
			local_modified: None,
			remote_modified: None,
			local_size: 0,
			remote_size: 0,
			status: SyncStatus::Synced,
			last_sync_time: None,
			etag: None,
			error_message: None,
			sync_attempts: 0,
		});
		store.commit(txn).await.unwrap();
	}

	let store = RedbStateStore::open(&db_path).unwrap();
	let stats = store.stats().await.unwrap();
	assert_eq!(stats.total, 1, "row committed in a prior session should still be there");
}

// ===================================================================
// ERROR TYPE CLASSIFICATION AND DISPLAY
// ===================================================================

#[test]
fn test_storage_error_display() {
	let err = StorageError::NotFound { path: "missing.txt".to_string() };
	assert_eq!(err.to_string(), "not found: missing.txt");

	let err = StorageError::PermissionDenied { path: "locked.txt".to_string() };
	assert_eq!(err.to_string(), "permission denied: locked.txt");
}

#[test]
fn test_sync_error_wraps_storage_error() {
	let storage_err = StorageError::NotFound { path: "a.txt".to_string() };
	let sync_err: SyncError = storage_err.into();
	assert!(matches!(sync_err, SyncError::Storage(_)));
	assert!(sync_err.to_string().contains("storage error"));
}

#[test]
fn test_sync_error_wraps_state_error() {
	let state_err = StateError::Corrupted { message: "bad row".to_string() };
	let sync_err: SyncError = state_err.into();
	assert!(matches!(sync_err, SyncError::State(_)));
	assert!(sync_err.to_string().contains("state store error"));
}

#[test]
fn test_filter_error_display() {
	let err = FilterError::InvalidPattern {
		pattern: "[".to_string(),
		message: "unterminated character class".to_string(),
	};
	let message = err.to_string();
	assert!(message.contains('['));
	assert!(message.contains("unterminated character class"));
}

#[test]
fn test_conflict_error_no_callback_for_ask() {
	let err = ConflictError::NoCallbackForAsk;
	assert_eq!(err.to_string(), "resolver returned Ask but no callback was supplied");
}

#[test]
fn test_sync_error_from_io_error() {
	let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
	let sync_err: SyncError = io_err.into();
	assert!(matches!(sync_err, SyncError::Io(_)));
}

// ===================================================================
// FILESYSTEM EDGE CASES
// ===================================================================

#[test]
fn test_file_deleted_during_listing() {
	let dir = TempDir::new().unwrap();
	let file = dir.path().join("test.txt");
	fs::write(&file, "content").unwrap();
	assert!(file.exists());

	fs::remove_file(&file).unwrap();
	assert!(!file.exists());
}

#[test]
#[cfg(unix)]
fn test_permission_denied_on_file() {
	use std::os::unix::fs::PermissionsExt;

	let dir = TempDir::new().unwrap();
	let file = dir.path().join("restricted.txt");
	fs::write(&file, "secret").unwrap();

	let perms = fs::Permissions::from_mode(0o000);
	fs::set_permissions(&file, perms).unwrap();

	assert!(fs::read_to_string(&file).is_err());

	let perms = fs::Permissions::from_mode(0o644);
	fs::set_permissions(&file, perms).ok();
}

#[test]
#[cfg(unix)]
fn test_permission_denied_on_directory() {
	use std::os::unix::fs::PermissionsExt;

	let dir = TempDir::new().unwrap();
	let subdir = dir.path().join("locked");
	fs::create_dir(&subdir).unwrap();

	let perms = fs::Permissions::from_mode(0o000);
	fs::set_permissions(&subdir, perms).unwrap();

	assert!(fs::read_dir(&subdir).is_err());

	let perms = fs::Permissions::from_mode(0o755);
	fs::set_permissions(&subdir, perms).ok();
}

#[test]
#[cfg(unix)]
fn test_symlink_to_nonexistent_target() {
	use std::os::unix::fs as unix_fs;

	let dir = TempDir::new().unwrap();
	let link = dir.path().join("broken_link");
	unix_fs::symlink("/nonexistent/path", &link).unwrap();

	assert!(!link.exists()); // exists() follows the link and reports false
	assert!(link.symlink_metadata().is_ok()); // but the link itself is there
}

#[test]
fn test_directory_deleted_during_operation() {
	let dir = TempDir::new().unwrap();
	let subdir = dir.path().join("temp");
	fs::create_dir(&subdir).unwrap();
	fs::write(subdir.join("file.txt"), "data").unwrap();

	fs::remove_dir_all(&subdir).unwrap();
	assert!(!subdir.exists());
}

#[test]
fn test_very_long_filename() {
	let dir = TempDir::new().unwrap();
	let long_name = "a".repeat(200);
	let file = dir.path().join(&long_name);

	fs::write(&file, "content").unwrap();
	assert!(file.exists());
}

#[test]
fn test_very_deep_directory_nesting() {
	let dir = TempDir::new().unwrap();
	let mut path = dir.path().to_path_buf();

	for i in 0..20 {
		path.push(format!("level_{}", i));
		fs::create_dir(&path).ok();
	}

	assert!(path.exists());
}

// ===================================================================
// SYNCOPTIONS CONFIGURATION EDGE CASES
// ===================================================================

#[test]
fn test_sync_options_defaults_are_sane() {
	use sync_engine::SyncOptions;

	let options = SyncOptions::default();
	assert!(!options.dry_run);
	assert!(options.delete_extraneous);
	assert!(options.conflict_resolution.is_none());
	assert_eq!(options.max_parallelism, 4);
}

#[test]
fn test_sync_options_dry_run_override() {
	use sync_engine::SyncOptions;

	let options = SyncOptions { dry_run: true, ..Default::default() };
	assert!(options.dry_run);
}

#[test]
fn test_sync_options_conflict_resolution_override() {
	use sync_engine::{ConflictVerdict, SyncOptions};

	let options = SyncOptions { conflict_resolution: Some(ConflictVerdict::Skip), ..Default::default() };
	assert_eq!(options.conflict_resolution, Some(ConflictVerdict::Skip));
}

#[test]
fn test_sync_options_exclude_patterns_stored() {
	use sync_engine::SyncOptions;

	let options = SyncOptions {
		exclude_patterns: vec!["*.tmp".to_string(), ".git/*".to_string(), ".DS_Store".to_string()],
		..Default::default()
	};
	assert_eq!(options.exclude_patterns.len(), 3);
}
