//! # sync-engine - bidirectional filesystem synchronization library
//!
//! `sync-engine` reconciles changes between two content stores (typically a
//! local directory and a remote one reachable through some `Storage`
//! backend) and converges them through a scan → reconcile → schedule
//! pipeline, persisting sync state across runs so only actual changes are
//! re-transferred.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sync_engine::{SyncEngine, SyncOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SyncEngine::new(local_storage, remote_storage, state_store);
//!     let result = engine.synchronize(SyncOptions::default()).await?;
//!     println!("synced {} files", result.files_synchronized);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod config;
pub mod conflict;
pub mod delete;
pub mod detector;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod pending;
pub mod progress;
pub mod reconciler;
pub mod scheduler;
pub mod state_store;
pub mod storage;
pub mod strategies; // Consolidated strategy/mode enums - declared early to avoid circular deps
pub mod throttle;
pub mod types;
pub mod util;

// Re-export the facade and the types callers need to drive it.
pub use config::SyncOptions;
pub use conflict::{ConflictResolver, DefaultResolver, SmartResolver};
pub use delete::DeleteProtection;
pub use engine::{SyncEngine, SyncPlan, SyncResult};
pub use error::{ConflictError, FilterError, StateError, StorageError, SyncError};
pub use filter::Filter;
pub use progress::{EngineEventSink, FileConflict, FileProgress, NullEventSink, ProgressSnapshot};
pub use state_store::{StateStore, StateStoreStats};
pub use storage::Storage;
pub use strategies::{ComparisonMode, ConflictVerdict, EngineOperation, LifecycleState, TransferDirection};
pub use types::{
	Action, ActionType, ChangeSet, CompletedOperation, ConflictKind, PendingChange, PendingChangeType,
	RelPath, Side, SyncItem, SyncState, SyncStatus, Timestamp,
};

// vim: ts=4
