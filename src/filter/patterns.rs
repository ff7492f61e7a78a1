//! Pattern compilation: glob-style exclusion patterns translated to a
//! non-backtracking regex, with a raw-regex escape hatch for patterns that
//! look like they already are one.

use regex::Regex;

/// Characters whose presence in a pattern source signals the author meant
/// a regular expression rather than a glob.
const REGEX_METACHARS: &[char] = &['^', '$', '[', ']', '(', ')', '+', '{', '|', '\\'];

fn looks_like_regex(source: &str) -> bool {
	source.chars().any(|c| REGEX_METACHARS.contains(&c))
}

/// A single compiled exclusion/inclusion pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
	source: String,
	regex: Regex,
}

impl Pattern {
	/// Compile a pattern per the matching rules: trailing `/` patterns match
	/// a directory and everything beneath it; wildcard-free patterns match
	/// as a `/`-bounded prefix; `?`/`*`/`**` are glob wildcards; a leading
	/// `*` not already part of `**/` is implicitly prefixed with `**/`;
	/// patterns containing regex metacharacters are compiled directly as a
	/// regex, falling back to a glob compile (logged, non-fatal) if that
	/// fails.
	pub fn compile(source: &str) -> Self {
		if looks_like_regex(source) {
			match Regex::new(source) {
				Ok(regex) => return Pattern { source: source.to_string(), regex },
				Err(err) => {
					tracing::warn!(
						pattern = source,
						error = %err,
						"pattern looked like a regex but failed to compile, falling back to a wildcard match"
					);
				}
			}
		}
		Pattern { source: source.to_string(), regex: compile_glob(source) }
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn is_match(&self, path: &str) -> bool {
		self.regex.is_match(path)
	}
}

fn compile_glob(source: &str) -> Regex {
	let is_dir_pattern = source.ends_with('/');
	let core = if is_dir_pattern { &source[..source.len() - 1] } else { source };
	let has_wildcard = core.contains('*') || core.contains('?');

	let core = if has_wildcard && !core.starts_with("**/") && core.starts_with('*') {
		// A leading `*` not already part of `**/` acts as if it were.
		format!("**/{}", &core[1..])
	} else {
		core.to_string()
	};

	let translated = translate_glob(&core);
	let pattern = if is_dir_pattern || !has_wildcard {
		format!("^{}(?:/.*)?$", translated)
	} else {
		format!("^{}$", translated)
	};

	// The pattern is built exclusively from escaped literals and the
	// bounded constructs below, so compilation cannot fail here; `regex`
	// guarantees linear-time matching regardless of input, which is what
	// keeps pathological patterns from becoming a denial-of-service vector.
	Regex::new(&pattern).unwrap_or_else(|_| Regex::new(&regex::escape(source)).unwrap())
}

/// Translate one glob fragment (no leading/trailing directory slash) into
/// an *unanchored* regex fragment. `**` is handled according to its
/// position relative to `/` boundaries: `**/` at the start or in the
/// middle of the pattern matches zero or more whole path components;
/// `/**` at the end matches the preceding path or anything beneath it;
/// a `**` not on a component boundary degrades to `.*`.
fn translate_glob(core: &str) -> String {
	let chars: Vec<char> = core.chars().collect();
	let n = chars.len();
	let mut out = String::new();
	let mut i = 0;
	while i < n {
		if chars[i] == '*' && i + 1 < n && chars[i + 1] == '*' {
			let start_boundary = i == 0 || chars[i - 1] == '/';
			let end_boundary = i + 2 == n || chars[i + 2] == '/';
			if start_boundary && end_boundary {
				if i == 0 && i + 2 == n {
					out.push_str(".*");
					i += 2;
				} else if i == 0 {
					out.push_str("(?:.*/)?");
					i += 3;
				} else if i + 2 == n {
					if out.ends_with('/') {
						out.pop();
					}
					out.push_str("(?:/.*)?");
					i += 2;
				} else {
					out.push_str("(?:.*/)?");
					i += 3;
				}
				continue;
			}
			out.push_str(".*");
			i += 2;
			continue;
		}
		match chars[i] {
			'*' => {
				out.push_str("[^/]*");
				i += 1;
			}
			'?' => {
				out.push_str("[^/]");
				i += 1;
			}
			c => {
				out.push_str(&regex::escape(&c.to_string()));
				i += 1;
			}
		}
	}
	out
}


// vim: ts=4
