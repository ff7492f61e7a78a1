//! Per-path inclusion/exclusion filter consumed by the Change Detector.

pub mod defaults;
pub mod patterns;

use crate::types::RelPath;
use patterns::Pattern;

/// Decides, per relative path, whether it participates in sync.
///
/// Decision order: if any inclusion pattern is configured, a path is kept
/// only if it matches at least one inclusion; afterwards, if it matches any
/// exclusion pattern, it is dropped.
#[derive(Debug, Clone)]
pub struct Filter {
	exclude: Vec<Pattern>,
	include: Vec<Pattern>,
}

impl Filter {
	pub fn new(exclude_patterns: &[String], include_patterns: &[String]) -> Self {
		Filter {
			exclude: exclude_patterns.iter().map(|p| Pattern::compile(p)).collect(),
			include: include_patterns.iter().map(|p| Pattern::compile(p)).collect(),
		}
	}

	/// A filter seeded with the default exclusion preset (§4.1), with no
	/// inclusion patterns.
	pub fn with_defaults() -> Self {
		Filter::new(&defaults::default_exclusion_patterns(), &[])
	}

	/// Returns a new filter with `extra` exclusion patterns appended; used
	/// by the engine to merge a run's `exclude_patterns` option with the
	/// engine-wide configured filter without mutating the latter.
	pub fn extended_with(&self, extra: &[String]) -> Self {
		let mut exclude = self.exclude.clone();
		exclude.extend(extra.iter().map(|p| Pattern::compile(p)));
		Filter { exclude, include: self.include.clone() }
	}

	pub fn should_sync(&self, path: &RelPath) -> bool {
		let path_str = path.as_str();
		if !self.include.is_empty() && !self.include.iter().any(|p| p.is_match(path_str)) {
			return false;
		}
		!self.exclude.iter().any(|p| p.is_match(path_str))
	}
}

impl Default for Filter {
	fn default() -> Self {
		Filter::with_defaults()
	}
}


// vim: ts=4
