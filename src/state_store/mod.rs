//! Transactional per-path state store contract.

pub mod redb_store;

use crate::error::StateError;
use crate::types::{CompletedOperation, RelPath, SyncState, Timestamp};
use async_trait::async_trait;

pub type StateResult<T> = Result<T, StateError>;

/// Aggregate counts returned by `StateStore::stats`.
#[derive(Debug, Clone, Default)]
pub struct StateStoreStats {
	pub total: usize,
	pub synced: usize,
	pub pending: usize,
	pub conflicts: usize,
	pub errors: usize,
	pub last_sync_time: Option<Timestamp>,
}

/// One queued mutation inside an open `Transaction`.
enum TxnOp {
	Upsert(SyncState),
	Delete(RelPath),
}

/// A batch of row mutations applied atomically by `StateStore::commit`.
/// Mutations are only buffered here; nothing touches the backing store
/// until the transaction is committed, so `rollback` is simply dropping it.
#[derive(Default)]
pub struct Transaction {
	ops: Vec<TxnOp>,
}

impl Transaction {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn upsert(&mut self, state: SyncState) {
		self.ops.push(TxnOp::Upsert(state));
	}

	pub fn delete(&mut self, path: RelPath) {
		self.ops.push(TxnOp::Delete(path));
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}
}

/// Transactional key/value store keyed by `RelPath`, plus a prefix query
/// and an append-only operation-history log. The path index is unique
/// under case-insensitive comparison (guaranteed by `RelPath`'s `Eq`/`Hash`
/// impl).
#[async_trait]
pub trait StateStore: Send + Sync {
	async fn get(&self, path: &RelPath) -> StateResult<Option<SyncState>>;
	async fn upsert(&self, state: SyncState) -> StateResult<()>;
	async fn delete(&self, path: &RelPath) -> StateResult<()>;

	/// Every row; used for full-sync change detection.
	async fn all(&self) -> StateResult<Vec<SyncState>>;

	/// Rows whose path is under `prefix`; used for folder-scoped sync.
	async fn by_prefix(&self, prefix: &RelPath) -> StateResult<Vec<SyncState>>;

	/// Rows whose status is not `Synced`.
	async fn pending(&self) -> StateResult<Vec<SyncState>>;

	fn begin_transaction(&self) -> Transaction {
		Transaction::new()
	}

	/// Applies every mutation buffered in `txn` atomically. A failure on
	/// any mutation aborts the whole transaction; none of its mutations
	/// are visible afterward.
	async fn commit(&self, txn: Transaction) -> StateResult<()>;

	/// Discards a transaction's buffered mutations without applying them.
	fn rollback(&self, txn: Transaction) {
		drop(txn);
	}

	/// Removes all rows; the next sync becomes a full re-mirror.
	async fn clear(&self) -> StateResult<()>;

	async fn stats(&self) -> StateResult<StateStoreStats>;

	async fn append_operation(&self, op: CompletedOperation) -> StateResult<()>;

	/// Most recent operations, optionally restricted to those completed at
	/// or after `since`.
	async fn recent_operations(
		&self,
		limit: usize,
		since: Option<Timestamp>,
	) -> StateResult<Vec<CompletedOperation>>;

	async fn prune_operations(&self, older_than: Timestamp) -> StateResult<()>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transaction_buffers_without_applying() {
		let mut txn = Transaction::new();
		assert!(txn.is_empty());
		txn.upsert(SyncState::new_synced(RelPath::new("a"), false));
		txn.delete(RelPath::new("b"));
		assert!(!txn.is_empty());
		assert_eq!(txn.ops.len(), 2);
	}
}

// vim: ts=4
