//! Core data types for the sync engine

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A normalized, root-relative path. Separator is always `/`; never empty;
/// never starts or ends with `/`. Equality and hashing are case-insensitive;
/// `Display` preserves the original case.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
pub struct RelPath(String);

impl RelPath {
	/// Normalize an arbitrary path string into a RelPath: backslashes become
	/// forward slashes, leading/trailing slashes are trimmed, and repeated
	/// slashes are collapsed.
	pub fn new(raw: impl AsRef<str>) -> Self {
		let raw = raw.as_ref().replace('\\', "/");
		let normalized = raw
			.split('/')
			.filter(|segment| !segment.is_empty())
			.collect::<Vec<_>>()
			.join("/");
		RelPath(normalized)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Number of `/`-separated components, used by the Scheduler's
	/// descending-depth delete ordering.
	pub fn depth(&self) -> usize {
		if self.0.is_empty() {
			0
		} else {
			self.0.matches('/').count() + 1
		}
	}

	/// True if `self` is `other` or lives under `other` on a `/` boundary.
	pub fn is_under(&self, other: &RelPath) -> bool {
		if self.0.eq_ignore_ascii_case(&other.0) {
			return true;
		}
		let prefix = format!("{}/", other.0);
		self.0.len() > prefix.len() && self.0[..prefix.len()].eq_ignore_ascii_case(&prefix)
	}

	pub fn file_name(&self) -> &str {
		self.0.rsplit('/').next().unwrap_or(&self.0)
	}

	pub fn extension(&self) -> Option<&str> {
		self.file_name().rsplit_once('.').map(|(_, ext)| ext)
	}

	fn lower_key(&self) -> String {
		self.0.to_lowercase()
	}
}

impl PartialEq for RelPath {
	fn eq(&self, other: &Self) -> bool {
		self.0.eq_ignore_ascii_case(&other.0)
	}
}

impl std::hash::Hash for RelPath {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.lower_key().hash(state);
	}
}

impl fmt::Display for RelPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl AsRef<str> for RelPath {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for RelPath {
	fn from(s: &str) -> Self {
		RelPath::new(s)
	}
}

impl From<String> for RelPath {
	fn from(s: String) -> Self {
		RelPath::new(s)
	}
}

/// Millisecond-resolvable UTC timestamp, stored as milliseconds since the
/// Unix epoch.
pub type Timestamp = i64;

/// One node in a storage tree, as reported by a `Storage` backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncItem {
	pub path: RelPath,
	pub is_dir: bool,
	pub size: u64,
	pub last_modified: Timestamp,
	pub hash: Option<Vec<u8>>,
	pub etag: Option<Vec<u8>>,
	pub is_symlink: bool,
	pub permissions: Option<String>,
}

impl SyncItem {
	/// The identifier used for change detection: `hash` if set, else `etag`.
	pub fn content_id(&self) -> Option<&[u8]> {
		self.hash.as_deref().or(self.etag.as_deref())
	}
}

/// Which side of the sync an item or action refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
	Local,
	Remote,
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Side::Local => write!(f, "local"),
			Side::Remote => write!(f, "remote"),
		}
	}
}

/// Status of a persisted `SyncState` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
	Synced,
	LocalNew,
	RemoteNew,
	LocalModified,
	RemoteModified,
	LocalDeleted,
	RemoteDeleted,
	Conflict,
	Error,
	Ignored,
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncStatus::Synced => write!(f, "synced"),
			SyncStatus::LocalNew => write!(f, "local-new"),
			SyncStatus::RemoteNew => write!(f, "remote-new"),
			SyncStatus::LocalModified => write!(f, "local-modified"),
			SyncStatus::RemoteModified => write!(f, "remote-modified"),
			SyncStatus::LocalDeleted => write!(f, "local-deleted"),
			SyncStatus::RemoteDeleted => write!(f, "remote-deleted"),
			SyncStatus::Conflict => write!(f, "conflict"),
			SyncStatus::Error => write!(f, "error"),
			SyncStatus::Ignored => write!(f, "ignored"),
		}
	}
}

/// Persisted per-path record of the last successful reconciliation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncState {
	pub path: RelPath,
	pub is_dir: bool,
	pub local_hash: Option<Vec<u8>>,
	pub remote_hash: Option<Vec<u8>>,
	pub local_modified: Option<Timestamp>,
	pub remote_modified: Option<Timestamp>,
	pub local_size: u64,
	pub remote_size: u64,
	pub status: SyncStatus,
	pub last_sync_time: Option<Timestamp>,
	pub etag: Option<Vec<u8>>,
	pub error_message: Option<String>,
	pub sync_attempts: u32,
}

impl SyncState {
	pub fn new_synced(path: RelPath, is_dir: bool) -> Self {
		SyncState {
			path,
			is_dir,
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
		}
	}
}

/// One queued notification from an external watcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingChangeType {
	Created,
	Changed,
	Deleted,
	Renamed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingChange {
	pub path: RelPath,
	pub change_type: PendingChangeType,
	pub detected_at: Timestamp,
	pub renamed_from: Option<RelPath>,
	pub renamed_to: Option<RelPath>,
}

/// Kind of conflict detected by the Reconciler, used to pick a resolution
/// strategy and to report the conflict to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
	BothModified,
	DeletedLocallyModifiedRemotely,
	ModifiedLocallyDeletedRemotely,
	TypeConflict,
	BothCreated,
}

/// The type of a scheduled Action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
	Upload,
	Download,
	DeleteLocal,
	DeleteRemote,
	Conflict,
}

/// One scheduled unit of work produced by the Reconciler.
#[derive(Clone, Debug)]
pub struct Action {
	pub action_type: ActionType,
	pub path: RelPath,
	pub local_item: Option<SyncItem>,
	pub remote_item: Option<SyncItem>,
	pub conflict_kind: Option<ConflictKind>,
	pub priority: i64,
	/// Set when this Action originated from a pending-change notification
	/// rather than a scan, so the Scheduler may attempt move-coalescing.
	pub from_pending_rename: bool,
}

impl Action {
	pub fn is_directory(&self) -> bool {
		self.local_item.as_ref().map(|i| i.is_dir).unwrap_or(false)
			|| self.remote_item.as_ref().map(|i| i.is_dir).unwrap_or(false)
	}

	pub fn size(&self) -> u64 {
		self.local_item
			.as_ref()
			.map(|i| i.size)
			.or_else(|| self.remote_item.as_ref().map(|i| i.size))
			.unwrap_or(0)
	}
}

/// One row of the append-only operation-history log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedOperation {
	pub id: uuid::Uuid,
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
}

/// The run-local tri-partition produced by the Change Detector.
#[derive(Debug, Default)]
pub struct ChangeSet {
	pub additions: Vec<Addition>,
	pub modifications: Vec<Modification>,
	pub deletions: Vec<Deletion>,
	pub processed_paths: HashSet<RelPath>,
	pub local_paths: HashSet<RelPath>,
	pub remote_paths: HashSet<RelPath>,
}

impl ChangeSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn total(&self) -> usize {
		self.additions.len() + self.modifications.len() + self.deletions.len()
	}
}

#[derive(Debug, Clone)]
pub struct Addition {
	pub path: RelPath,
	pub item: SyncItem,
	pub side: Side,
}

#[derive(Debug, Clone)]
pub struct Modification {
	pub path: RelPath,
	pub item: SyncItem,
	pub side: Side,
	pub tracked: SyncState,
}

#[derive(Debug, Clone)]
pub struct Deletion {
	pub path: RelPath,
	pub deleted_locally: bool,
	pub deleted_remotely: bool,
	pub tracked: SyncState,
}


// vim: ts=4
