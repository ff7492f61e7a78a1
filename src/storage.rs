//! The abstract Storage contract consumed by the engine.
//!
//! Concrete backends (local filesystem, WebDAV, SFTP, FTP, S3) implement
//! this trait outside this crate; the engine only ever holds a
//! `Arc<dyn Storage>` for each side of a sync.

use crate::error::StorageError;
use crate::types::{RelPath, Timestamp};
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

pub type StorageResult<T> = Result<T, StorageError>;

/// A boxed, owned async byte stream returned by `Storage::read`.
pub type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send>>;

/// A boxed, owned async byte sink consumed by `Storage::write`.
pub type BoxedAsyncWrite = Pin<Box<dyn AsyncWrite + Send>>;

/// Metadata about a backend change, returned by the optional
/// `get_remote_changes` capability.
#[derive(Debug, Clone)]
pub struct ChangeInfo {
	pub path: RelPath,
	pub changed_at: Timestamp,
	pub deleted: bool,
}

/// Abstract list/read/write/delete/move/hash/exists contract over a tree of
/// items. Object-safe so the engine can hold it behind `Arc<dyn Storage>`
/// for each side of a sync.
#[async_trait]
pub trait Storage: Send + Sync {
	/// Immediate children of a directory; empty for non-directories.
	async fn list(&self, path: &RelPath) -> StorageResult<Vec<crate::types::SyncItem>>;

	/// Metadata for one path, or `None` if absent.
	async fn get(&self, path: &RelPath) -> StorageResult<Option<crate::types::SyncItem>>;

	/// A streaming read of the item's content.
	async fn read(&self, path: &RelPath) -> StorageResult<BoxedAsyncRead>;

	/// A streaming, effectively-atomic write: readers never observe a torn
	/// write of this path.
	async fn write(&self, path: &RelPath, content: BoxedAsyncRead) -> StorageResult<()>;

	/// Idempotent directory creation.
	async fn create_directory(&self, path: &RelPath) -> StorageResult<()>;

	/// Idempotent delete; recursive for directories.
	async fn delete(&self, path: &RelPath) -> StorageResult<()>;

	/// Move/rename, emulated as read+write+delete when the backend has no
	/// native support.
	async fn move_item(&self, src: &RelPath, dst: &RelPath) -> StorageResult<()> {
		let mut reader = self.read(src).await?;
		let mut buf = Vec::new();
		use tokio::io::AsyncReadExt;
		reader.read_to_end(&mut buf).await.map_err(|e| StorageError::Other {
			path: src.to_string(),
			source: Box::new(e),
		})?;
		self.write(dst, Box::pin(std::io::Cursor::new(buf))).await?;
		self.delete(src).await
	}

	async fn exists(&self, path: &RelPath) -> StorageResult<bool>;

	/// Returns a real content hash when available, or the item's etag
	/// unchanged when a real hash is unavailable.
	async fn compute_hash(&self, path: &RelPath) -> StorageResult<Vec<u8>>;

	async fn test_connection(&self) -> StorageResult<bool>;

	/// Best-effort; backends that cannot set modification time return Ok
	/// without doing anything.
	async fn set_last_modified(&self, _path: &RelPath, _when: Timestamp) -> StorageResult<()> {
		Ok(())
	}

	/// Best-effort; backends that cannot set permissions return Ok without
	/// doing anything.
	async fn set_permissions(&self, _path: &RelPath, _permissions: &str) -> StorageResult<()> {
		Ok(())
	}

	/// Backends that can report changes cheaply (e.g. a remote change feed)
	/// may override this instead of relying solely on full tree walks.
	async fn get_remote_changes(&self, _since: Timestamp) -> StorageResult<Vec<ChangeInfo>> {
		Ok(Vec::new())
	}
}


// vim: ts=4
