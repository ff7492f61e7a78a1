//! Constant-verdict resolver: the simplest of the two built-ins.

use super::{ConflictAnalysis, ConflictResolver};
use crate::strategies::ConflictVerdict;
use async_trait::async_trait;

/// Always returns the verdict it was constructed with, ignoring the
/// analysis entirely.
pub struct DefaultResolver {
	verdict: ConflictVerdict,
}

impl DefaultResolver {
	pub fn new(verdict: ConflictVerdict) -> Self {
		DefaultResolver { verdict }
	}
}

#[async_trait]
impl ConflictResolver for DefaultResolver {
	async fn resolve(&self, _analysis: &ConflictAnalysis) -> ConflictVerdict {
		self.verdict
	}
}


// vim: ts=4
