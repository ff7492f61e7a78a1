//! Token-bucket bandwidth limiter shared across every concurrent transfer of
//! one direction.
//!
//! Grounded on the teacher's `progress/mod.rs` throttle-by-`Instant` pattern
//! (a mutex-protected timestamp checked before an update is allowed),
//! generalized here from "UI refresh rate" to "bytes released per second".

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CHUNK_SIZE: usize = 64 * 1024;

struct Bucket {
	capacity: u64,
	tokens: f64,
	last_refill: Instant,
}

impl Bucket {
	fn new(capacity: u64) -> Self {
		Bucket { capacity, tokens: capacity as f64, last_refill: Instant::now() }
	}

	fn refill(&mut self) {
		let now = Instant::now();
		let elapsed = now.duration_since(self.last_refill).as_secs_f64();
		self.tokens = (self.tokens + elapsed * self.capacity as f64).min(self.capacity as f64);
		self.last_refill = now;
	}

	/// Consumes up to `want` tokens. Returns the amount granted (possibly
	/// zero) and, when zero, how long the caller should sleep before
	/// retrying.
	fn take(&mut self, want: u64) -> (u64, Duration) {
		self.refill();
		if self.tokens >= 1.0 {
			let granted = want.min(self.tokens as u64).max(1);
			self.tokens -= granted as f64;
			(granted, Duration::ZERO)
		} else {
			let deficit = 1.0 - self.tokens;
			(0, Duration::from_secs_f64(deficit / self.capacity as f64))
		}
	}
}

/// A rate limiter shared (via `Arc`) across every concurrent transfer in one
/// direction; the same bucket bounds the aggregate throughput.
pub struct RateLimiter {
	bucket: Mutex<Bucket>,
}

impl RateLimiter {
	pub fn new(bytes_per_second: u64) -> Self {
		RateLimiter { bucket: Mutex::new(Bucket::new(bytes_per_second.max(1))) }
	}

	/// Blocks (asynchronously) until at least one byte, and at most `want`
	/// bytes, may be transferred.
	pub async fn acquire(&self, want: usize) -> usize {
		loop {
			let (granted, wait) = self.bucket.lock().unwrap().take(want as u64);
			if granted > 0 {
				return granted as usize;
			}
			tokio::time::sleep(wait).await;
		}
	}
}

/// Copies `reader` into `writer` in chunks gated by `limiter`, returning the
/// total bytes copied. Used by the Scheduler's file-transfer executor in
/// place of a bare `tokio::io::copy` when `max_bytes_per_second` is set.
pub async fn throttled_copy<R, W>(
	reader: &mut R,
	writer: &mut W,
	limiter: &RateLimiter,
) -> std::io::Result<u64>
where
	R: AsyncRead + Unpin + ?Sized,
	W: AsyncWrite + Unpin + ?Sized,
{
	let mut buf = vec![0u8; CHUNK_SIZE];
	let mut total = 0u64;
	loop {
		let allowance = limiter.acquire(buf.len()).await;
		let read = reader.read(&mut buf[..allowance]).await?;
		if read == 0 {
			break;
		}
		writer.write_all(&buf[..read]).await?;
		total += read as u64;
	}
	writer.flush().await?;
	Ok(total)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_throttled_copy_preserves_content() {
		let limiter = RateLimiter::new(1024 * 1024);
		let data = b"hello throttled world".to_vec();
		let mut reader = std::io::Cursor::new(data.clone());
		let mut writer = Vec::new();
		let copied = throttled_copy(&mut reader, &mut writer, &limiter).await.unwrap();
		assert_eq!(copied, data.len() as u64);
		assert_eq!(writer, data);
	}

	#[tokio::test]
	async fn test_throttled_copy_handles_empty_input() {
		let limiter = RateLimiter::new(1024);
		let mut reader = std::io::Cursor::new(Vec::<u8>::new());
		let mut writer = Vec::new();
		let copied = throttled_copy(&mut reader, &mut writer, &limiter).await.unwrap();
		assert_eq!(copied, 0);
		assert!(writer.is_empty());
	}

	#[test]
	fn test_bucket_grants_up_to_capacity() {
		let mut bucket = Bucket::new(100);
		let (granted, wait) = bucket.take(50);
		assert_eq!(granted, 50);
		assert_eq!(wait, Duration::ZERO);
	}

	#[test]
	fn test_bucket_denies_when_exhausted() {
		let mut bucket = Bucket::new(10);
		let (first, _) = bucket.take(10);
		assert_eq!(first, 10);
		let (second, wait) = bucket.take(10);
		assert_eq!(second, 0);
		assert!(wait > Duration::ZERO);
	}

	#[tokio::test]
	async fn test_rate_limiter_acquire_never_returns_zero() {
		let limiter = RateLimiter::new(1);
		let granted = limiter.acquire(10).await;
		assert!(granted >= 1);
	}
}

// vim: ts=4
