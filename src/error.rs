//! Error types for sync engine operations

use std::error::Error;
use std::fmt;
use std::io;

/// Helper function to reduce `Box::new()` boilerplate when wrapping errors
/// into `Box<dyn Error + Send + Sync>` for error variant fields.
#[inline]
pub fn boxed_error<E: Error + Send + Sync + 'static>(e: E) -> Box<dyn Error + Send + Sync> {
	Box::new(e)
}

/// Unified error type returned by the engine facade and its collaborators.
#[derive(Debug)]
pub enum SyncError {
	/// A sync is already running on this engine instance.
	Busy,

	/// The engine has been torn down and can no longer accept runs.
	Disposed,

	/// The run was cancelled by token or timeout.
	Cancelled,

	/// A per-action storage failure; normally caught and counted as skipped
	/// rather than surfaced to the caller.
	Storage(StorageError),

	/// State store error; fatal to the current run, the commit transaction
	/// rolls back.
	State(StateError),

	/// Bad filter pattern; non-fatal, the pattern is downgraded to a
	/// wildcard and the occurrence is logged.
	Filter(FilterError),

	/// Conflict resolution failure.
	Conflict(ConflictError),

	/// I/O error not otherwise classified.
	Io(io::Error),

	/// Invalid engine configuration.
	InvalidConfig { message: String },

	/// Generic error message.
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Busy => write!(f, "a sync is already running on this engine"),
			SyncError::Disposed => write!(f, "engine has been disposed"),
			SyncError::Cancelled => write!(f, "sync run was cancelled"),
			SyncError::Storage(e) => write!(f, "storage error: {}", e),
			SyncError::State(e) => write!(f, "state store error: {}", e),
			SyncError::Filter(e) => write!(f, "filter error: {}", e),
			SyncError::Conflict(e) => write!(f, "conflict resolution error: {}", e),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => write!(f, "invalid configuration: {}", message),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<StorageError> for SyncError {
	fn from(e: StorageError) -> Self {
		SyncError::Storage(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<FilterError> for SyncError {
	fn from(e: FilterError) -> Self {
		SyncError::Filter(e)
	}
}

impl From<ConflictError> for SyncError {
	fn from(e: ConflictError) -> Self {
		SyncError::Conflict(e)
	}
}

/// Errors returned by a `Storage` backend, classified per §6/§7 of the
/// contract so the scheduler can decide whether a failure is recoverable
/// per-path or must abort the run.
#[derive(Debug)]
pub enum StorageError {
	NotFound { path: String },
	PermissionDenied { path: String },
	Conflict { path: String },
	Connection { source: Box<dyn Error + Send + Sync> },
	Other { path: String, source: Box<dyn Error + Send + Sync> },
}

impl fmt::Display for StorageError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StorageError::NotFound { path } => write!(f, "not found: {}", path),
			StorageError::PermissionDenied { path } => write!(f, "permission denied: {}", path),
			StorageError::Conflict { path } => write!(f, "conflicting write: {}", path),
			StorageError::Connection { source } => write!(f, "connection failed: {}", source),
			StorageError::Other { path, source } => write!(f, "{}: {}", path, source),
		}
	}
}

impl Error for StorageError {}

/// State store errors. Any of these abort the enclosing transaction.
#[derive(Debug)]
pub enum StateError {
	Io(io::Error),
	Corrupted { message: String },
	TransactionFailed { message: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::Io(e) => write!(f, "I/O error: {}", e),
			StateError::Corrupted { message } => write!(f, "state corrupted: {}", message),
			StateError::TransactionFailed { message } => {
				write!(f, "transaction failed: {}", message)
			}
		}
	}
}

impl Error for StateError {}

impl From<io::Error> for StateError {
	fn from(e: io::Error) -> Self {
		StateError::Io(e)
	}
}

/// Filter pattern-compilation errors. Always non-fatal to the caller; the
/// Filter itself downgrades the offending pattern to a wildcard match.
#[derive(Debug)]
pub enum FilterError {
	InvalidPattern { pattern: String, message: String },
}

impl fmt::Display for FilterError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FilterError::InvalidPattern { pattern, message } => {
				write!(f, "invalid pattern '{}': {}", pattern, message)
			}
		}
	}
}

impl Error for FilterError {}

/// Conflict-resolution errors.
#[derive(Debug)]
pub enum ConflictError {
	NoCallbackForAsk,
}

impl fmt::Display for ConflictError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConflictError::NoCallbackForAsk => {
				write!(f, "resolver returned Ask but no callback was supplied")
			}
		}
	}
}

impl Error for ConflictError {}

// vim: ts=4
