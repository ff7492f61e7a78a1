//! Conflict analysis and resolution.

pub mod default_resolver;
pub mod smart_resolver;

pub use default_resolver::DefaultResolver;
pub use smart_resolver::SmartResolver;

use crate::strategies::ConflictVerdict;
use crate::types::{Action, ConflictKind, SyncItem, Timestamp};
use async_trait::async_trait;
use std::time::Duration;

/// Everything known about a conflicting path, handed to a resolver and to
/// any user-supplied callback so it can explain a recommendation.
#[derive(Debug, Clone)]
pub struct ConflictAnalysis {
	pub path: crate::types::RelPath,
	pub kind: ConflictKind,
	pub local_item: Option<SyncItem>,
	pub remote_item: Option<SyncItem>,
	/// Absolute difference between local and remote modification times, when
	/// both sides have one.
	pub modified_delta: Option<Duration>,
	/// `true` once `local_modified` is strictly newer than `remote_modified`.
	pub local_is_newer: Option<bool>,
	/// Heuristic binary/text guess from the path's extension, used only to
	/// annotate the analysis record handed to callbacks.
	pub looks_binary: bool,
	pub recommendation: ConflictVerdict,
}

impl ConflictAnalysis {
	fn modified_pair(local: Option<Timestamp>, remote: Option<Timestamp>) -> (Option<Duration>, Option<bool>) {
		match (local, remote) {
			(Some(l), Some(r)) => {
				let delta = Duration::from_millis(l.abs_diff(r) as u64);
				(Some(delta), Some(l > r))
			}
			_ => (None, None),
		}
	}
}

/// Contract implemented by the engine's conflict-resolution strategies.
///
/// `resolve` receives a full analysis of the conflicting path and returns a
/// verdict. `Ask` is only valid as a resolver's own configured default — the
/// engine is responsible for turning an `Ask` verdict into a callback
/// invocation, falling back to `Skip` when no callback is registered.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
	async fn resolve(&self, analysis: &ConflictAnalysis) -> ConflictVerdict;
}

/// Builds the `ConflictAnalysis` record for a conflicting Action, ready to
/// hand to a `ConflictResolver` or a user callback.
pub fn analyze(action: &Action) -> ConflictAnalysis {
	let kind = action.conflict_kind.unwrap_or(ConflictKind::BothModified);
	let local_modified = action.local_item.as_ref().map(|i| i.last_modified);
	let remote_modified = action.remote_item.as_ref().map(|i| i.last_modified);
	let (modified_delta, local_is_newer) = ConflictAnalysis::modified_pair(local_modified, remote_modified);
	let looks_binary = looks_like_binary(action.path.as_str());
	let recommendation = recommend(kind, local_is_newer);
	ConflictAnalysis {
		path: action.path.clone(),
		kind,
		local_item: action.local_item.clone(),
		remote_item: action.remote_item.clone(),
		modified_delta,
		local_is_newer,
		looks_binary,
		recommendation,
	}
}

fn recommend(kind: ConflictKind, local_is_newer: Option<bool>) -> ConflictVerdict {
	match kind {
		ConflictKind::DeletedLocallyModifiedRemotely => ConflictVerdict::UseRemote,
		ConflictKind::ModifiedLocallyDeletedRemotely => ConflictVerdict::UseLocal,
		ConflictKind::BothModified | ConflictKind::BothCreated => match local_is_newer {
			Some(true) => ConflictVerdict::UseLocal,
			Some(false) => ConflictVerdict::UseRemote,
			None => ConflictVerdict::Ask,
		},
		ConflictKind::TypeConflict => ConflictVerdict::Ask,
	}
}

const TEXT_EXTENSIONS: &[&str] =
	&["txt", "md", "rs", "toml", "json", "yaml", "yml", "xml", "html", "css", "js", "ts", "csv", "log"];

fn looks_like_binary(path: &str) -> bool {
	match path.rsplit('.').next() {
		Some(ext) if ext != path => !TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
		_ => true,
	}
}


// vim: ts=4
