//! Heuristic resolver: recommends a verdict from each side's size,
//! modification-time delta and an extension-based binary/text guess.

use super::{ConflictAnalysis, ConflictResolver};
use crate::strategies::ConflictVerdict;
use async_trait::async_trait;

/// Returns `ConflictAnalysis::recommendation` as-is. `TypeConflict` always
/// recommends `Ask`; the engine falls back to `Skip` if no callback is
/// registered to answer it.
pub struct SmartResolver;

impl SmartResolver {
	pub fn new() -> Self {
		SmartResolver
	}
}

impl Default for SmartResolver {
	fn default() -> Self {
		SmartResolver::new()
	}
}

#[async_trait]
impl ConflictResolver for SmartResolver {
	async fn resolve(&self, analysis: &ConflictAnalysis) -> ConflictVerdict {
		analysis.recommendation
	}
}


// vim: ts=4
