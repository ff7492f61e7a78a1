//! `redb`-backed `StateStore` implementation, grounded on the teacher's
//! `cache.rs` (`ChildCache`): one table per concern, opened once at
//! construction, mutated through `begin_write`/`commit`. Serialization uses
//! `serde_json` rather than the teacher's (undeclared) `bincode`.

use super::{StateResult, StateStore, StateStoreStats, Transaction};
use crate::error::StateError;
use crate::types::{CompletedOperation, RelPath, SyncState, SyncStatus, Timestamp};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_state");
const OPERATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("operations");

fn to_state_error(e: impl std::error::Error) -> StateError {
	StateError::TransactionFailed { message: e.to_string() }
}

/// Key a `SyncState` row by the path's lower-cased form, so the table's
/// natural ordering and lookups are case-insensitive like `RelPath` itself.
fn state_key(path: &RelPath) -> String {
	path.as_str().to_lowercase()
}

/// Key an operation-history row so iteration order is by completion time.
fn operation_key(op: &CompletedOperation) -> String {
	format!("{:020}_{}", op.completed_at.max(0) as u64, op.id)
}

pub struct RedbStateStore {
	db: Arc<Database>,
}

impl RedbStateStore {
	pub fn open(db_path: &Path) -> StateResult<Self> {
		let db = Database::create(db_path).map_err(to_state_error)?;
		{
			let write_txn = db.begin_write().map_err(to_state_error)?;
			let _ = write_txn.open_table(STATE_TABLE).map_err(to_state_error)?;
			let _ = write_txn.open_table(OPERATIONS_TABLE).map_err(to_state_error)?;
			write_txn.commit().map_err(to_state_error)?;
		}
		Ok(RedbStateStore { db: Arc::new(db) })
	}

	async fn blocking<F, T>(&self, f: F) -> StateResult<T>
	where
		F: FnOnce(&Database) -> StateResult<T> + Send + 'static,
		T: Send + 'static,
	{
		let db = Arc::clone(&self.db);
		tokio::task::spawn_blocking(move || f(&db))
			.await
			.map_err(|e| StateError::TransactionFailed { message: e.to_string() })?
	}
}

#[async_trait]
impl StateStore for RedbStateStore {
	async fn get(&self, path: &RelPath) -> StateResult<Option<SyncState>> {
		let key = state_key(path);
		self.blocking(move |db| {
			let read_txn = db.begin_read().map_err(to_state_error)?;
			let table = read_txn.open_table(STATE_TABLE).map_err(to_state_error)?;
			match table.get(key.as_str()).map_err(to_state_error)? {
				Some(value) => {
					let state: SyncState =
						serde_json::from_slice(value.value()).map_err(|e| {
							StateError::Corrupted { message: e.to_string() }
						})?;
					Ok(Some(state))
				}
				None => Ok(None),
			}
		})
		.await
	}

	async fn upsert(&self, state: SyncState) -> StateResult<()> {
		let key = state_key(&state.path);
		let bytes =
			serde_json::to_vec(&state).map_err(|e| StateError::Corrupted { message: e.to_string() })?;
		self.blocking(move |db| {
			let write_txn = db.begin_write().map_err(to_state_error)?;
			{
				let mut table = write_txn.open_table(STATE_TABLE).map_err(to_state_error)?;
				table.insert(key.as_str(), bytes.as_slice()).map_err(to_state_error)?;
			}
			write_txn.commit().map_err(to_state_error)
		})
		.await
	}

	async fn delete(&self, path: &RelPath) -> StateResult<()> {
		let key = state_key(path);
		self.blocking(move |db| {
			let write_txn = db.begin_write().map_err(to_state_error)?;
			{
				let mut table = write_txn.open_table(STATE_TABLE).map_err(to_state_error)?;
				table.remove(key.as_str()).map_err(to_state_error)?;
			}
			write_txn.commit().map_err(to_state_error)
		})
		.await
	}

	async fn all(&self) -> StateResult<Vec<SyncState>> {
		self.blocking(|db| {
			let read_txn = db.begin_read().map_err(to_state_error)?;
			let table = read_txn.open_table(STATE_TABLE).map_err(to_state_error)?;
			let mut rows = Vec::new();
			for entry in table.iter().map_err(to_state_error)? {
				let (_, value) = entry.map_err(to_state_error)?;
				let state: SyncState = serde_json::from_slice(value.value())
					.map_err(|e| StateError::Corrupted { message: e.to_string() })?;
				rows.push(state);
			}
			Ok(rows)
		})
		.await
	}

	async fn by_prefix(&self, prefix: &RelPath) -> StateResult<Vec<SyncState>> {
		let prefix = prefix.clone();
		let rows = self.all().await?;
		Ok(rows.into_iter().filter(|row| row.path.is_under(&prefix)).collect())
	}

	async fn pending(&self) -> StateResult<Vec<SyncState>> {
		let rows = self.all().await?;
		Ok(rows.into_iter().filter(|row| row.status != SyncStatus::Synced).collect())
	}

	async fn commit(&self, txn: Transaction) -> StateResult<()> {
		if txn.is_empty() {
			return Ok(());
		}
		let encoded = encode_transaction(txn)?;
		self.blocking(move |db| {
			let write_txn = db.begin_write().map_err(to_state_error)?;
			{
				let mut table = write_txn.open_table(STATE_TABLE).map_err(to_state_error)?;
				for (key, value) in &encoded.upserts {
					table.insert(key.as_str(), value.as_slice()).map_err(to_state_error)?;
				}
				for key in &encoded.deletes {
					table.remove(key.as_str()).map_err(to_state_error)?;
				}
			}
			write_txn.commit().map_err(to_state_error)
		})
		.await
	}

	async fn clear(&self) -> StateResult<()> {
		self.blocking(|db| {
			let write_txn = db.begin_write().map_err(to_state_error)?;
			{
				let mut table = write_txn.open_table(STATE_TABLE).map_err(to_state_error)?;
				let keys: Vec<String> = table
					.iter()
					.map_err(to_state_error)?
					.filter_map(|r| r.ok().map(|(k, _)| k.value().to_string()))
					.collect();
				for key in keys {
					table.remove(key.as_str()).map_err(to_state_error)?;
				}
			}
			write_txn.commit().map_err(to_state_error)
		})
		.await
	}

	async fn stats(&self) -> StateResult<StateStoreStats> {
		let rows = self.all().await?;
		let mut stats = StateStoreStats { total: rows.len(), ..Default::default() };
		for row in &rows {
			match row.status {
				SyncStatus::Synced => stats.synced += 1,
				SyncStatus::Conflict => stats.conflicts += 1,
				SyncStatus::Error => stats.errors += 1,
				_ => stats.pending += 1,
			}
			if row.last_sync_time > stats.last_sync_time {
				stats.last_sync_time = row.last_sync_time;
			}
		}
		Ok(stats)
	}

	async fn append_operation(&self, op: CompletedOperation) -> StateResult<()> {
		let key = operation_key(&op);
		let bytes =
			serde_json::to_vec(&op).map_err(|e| StateError::Corrupted { message: e.to_string() })?;
		self.blocking(move |db| {
			let write_txn = db.begin_write().map_err(to_state_error)?;
			{
				let mut table = write_txn.open_table(OPERATIONS_TABLE).map_err(to_state_error)?;
				table.insert(key.as_str(), bytes.as_slice()).map_err(to_state_error)?;
			}
			write_txn.commit().map_err(to_state_error)
		})
		.await
	}

	async fn recent_operations(
		&self,
		limit: usize,
		since: Option<Timestamp>,
	) -> StateResult<Vec<CompletedOperation>> {
		self.blocking(move |db| {
			let read_txn = db.begin_read().map_err(to_state_error)?;
			let table = read_txn.open_table(OPERATIONS_TABLE).map_err(to_state_error)?;
			let mut rows = Vec::new();
			for entry in table.iter().map_err(to_state_error)?.rev() {
				let (_, value) = entry.map_err(to_state_error)?;
				let op: CompletedOperation = serde_json::from_slice(value.value())
					.map_err(|e| StateError::Corrupted { message: e.to_string() })?;
				if let Some(since) = since {
					if op.completed_at < since {
						continue;
					}
				}
				rows.push(op);
				if rows.len() >= limit {
					break;
				}
			}
			Ok(rows)
		})
		.await
	}

	async fn prune_operations(&self, older_than: Timestamp) -> StateResult<()> {
		self.blocking(move |db| {
			let write_txn = db.begin_write().map_err(to_state_error)?;
			{
				let mut table = write_txn.open_table(OPERATIONS_TABLE).map_err(to_state_error)?;
				let stale: Vec<String> = table
					.iter()
					.map_err(to_state_error)?
					.filter_map(|r| r.ok())
					.filter(|(_, v)| {
						serde_json::from_slice::<CompletedOperation>(v.value())
							.map(|op| op.completed_at < older_than)
							.unwrap_or(false)
					})
					.map(|(k, _)| k.value().to_string())
					.collect();
				for key in stale {
					table.remove(key.as_str()).map_err(to_state_error)?;
				}
			}
			write_txn.commit().map_err(to_state_error)
		})
		.await
	}
}

struct EncodedTransaction {
	upserts: Vec<(String, Vec<u8>)>,
	deletes: Vec<String>,
}

fn encode_transaction(txn: Transaction) -> StateResult<EncodedTransaction> {
	let mut upserts = Vec::new();
	let mut deletes = Vec::new();
	for op in txn.ops {
		match op {
			super::TxnOp::Upsert(state) => {
				let key = state_key(&state.path);
				let bytes = serde_json::to_vec(&state)
					.map_err(|e| StateError::Corrupted { message: e.to_string() })?;
				upserts.push((key, bytes));
			}
			super::TxnOp::Delete(path) => deletes.push(state_key(&path)),
		}
	}
	Ok(EncodedTransaction { upserts, deletes })
}


// vim: ts=4
