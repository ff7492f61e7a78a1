//! Small standalone helpers shared across modules: content hashing and
//! base64 transcoding for hashes that cross a storage/state boundary.
#![allow(dead_code)]

use base64::engine::Engine;

/// Hash a buffer using BLAKE3 and return base64-encoded result
pub fn hash(buf: &[u8]) -> String {
	let hash = blake3::hash(buf);
	hash_to_base64(hash.as_bytes())
}

/// Hash a buffer using BLAKE3 and return binary result
pub fn hash_binary(buf: &[u8]) -> [u8; 32] {
	*blake3::hash(buf).as_bytes()
}

/// Convert binary hash to base64 string (for state-store persistence)
pub fn hash_to_base64(hash: &[u8; 32]) -> String {
	base64::engine::general_purpose::URL_SAFE.encode(hash)
}

/// Convert base64 string to binary hash
pub fn base64_to_hash(b64: &str) -> Result<[u8; 32], Box<dyn std::error::Error>> {
	let bytes = base64::engine::general_purpose::URL_SAFE.decode(b64)?;
	if bytes.len() != 32 {
		return Err(format!("Hash must be 32 bytes, got {}", bytes.len()).into());
	}
	let mut hash = [0u8; 32];
	hash.copy_from_slice(&bytes);
	Ok(hash)
}


// vim: ts=4
