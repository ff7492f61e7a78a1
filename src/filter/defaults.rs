//! Default exclusion preset: VCS, build-output, IDE, OS and temp-file
//! patterns that nearly every sync should skip. Grounded on the teacher's
//! `PatternMatcher::build_always_excluded` list, generalized away from
//! anything product-specific.

/// Patterns excluded by `Filter::with_defaults` unless a caller overrides
/// them explicitly via their own exclusion list.
pub fn default_exclusion_patterns() -> Vec<String> {
	vec![
		// Version control
		".git/".to_string(),
		".hg/".to_string(),
		".svn/".to_string(),
		// Build output / dependency caches
		"node_modules/".to_string(),
		"target/".to_string(),
		"dist/".to_string(),
		"build/".to_string(),
		// IDE/editor
		".idea/".to_string(),
		".vscode/".to_string(),
		"*.swp".to_string(),
		"*.swo".to_string(),
		"*~".to_string(),
		// OS metadata
		"*.DS_Store".to_string(),
		"Thumbs.db".to_string(),
		"desktop.ini".to_string(),
		// Temp / lock files
		"*.tmp".to_string(),
		"*.lock".to_string(),
		".nfs*".to_string(),
	]
}


// vim: ts=4
