//! Small shared enums used across conflict resolution and comparison modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a file comparison during change detection treats metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
	/// Compare timestamps and sizes (default).
	#[default]
	Standard,

	/// Only compare file size.
	SizeOnly,

	/// Require a content hash comparison; skip the timestamp check.
	ChecksumOnly,
}

/// A verdict returned by a `ConflictResolver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictVerdict {
	UseLocal,
	UseRemote,
	Skip,
	RenameLocal,
	RenameRemote,
	/// Only valid as a resolver's configured default; the engine resolves it
	/// via a user callback, or falls back to `Skip` if none is supplied.
	Ask,
}

impl fmt::Display for ConflictVerdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConflictVerdict::UseLocal => write!(f, "use-local"),
			ConflictVerdict::UseRemote => write!(f, "use-remote"),
			ConflictVerdict::Skip => write!(f, "skip"),
			ConflictVerdict::RenameLocal => write!(f, "rename-local"),
			ConflictVerdict::RenameRemote => write!(f, "rename-remote"),
			ConflictVerdict::Ask => write!(f, "ask"),
		}
	}
}

/// Lifecycle state of a `SyncEngine` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Idle,
	Running,
	Paused,
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LifecycleState::Idle => write!(f, "idle"),
			LifecycleState::Running => write!(f, "running"),
			LifecycleState::Paused => write!(f, "paused"),
		}
	}
}

/// Which storage operation an engine event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOperation {
	Scanning,
	Downloading,
	Uploading,
	Deleting,
	CreatingDirectory,
	ResolvingConflict,
	Paused,
	Unknown,
}

impl fmt::Display for EngineOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EngineOperation::Scanning => write!(f, "scanning"),
			EngineOperation::Downloading => write!(f, "downloading"),
			EngineOperation::Uploading => write!(f, "uploading"),
			EngineOperation::Deleting => write!(f, "deleting"),
			EngineOperation::CreatingDirectory => write!(f, "creating-directory"),
			EngineOperation::ResolvingConflict => write!(f, "resolving-conflict"),
			EngineOperation::Paused => write!(f, "paused"),
			EngineOperation::Unknown => write!(f, "unknown"),
		}
	}
}

/// Direction of a file transfer, used by file-progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
	Upload,
	Download,
}


// vim: ts=4
