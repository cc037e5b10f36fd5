//! Dotted key paths.
//!
//! `a.b.c` addresses `{"a": {"b": {"c": ..}}}`. A literal dot inside a
//! segment is written `\.` and a literal backslash `\\`; any other backslash
//! is kept as is.

/// Splits a dotted path into segments. The empty path has no segments and
/// addresses the document root.
pub fn split(path: &str) -> Vec<String> {
	if path.is_empty() {
		return Vec::new();
	}

	let mut segments = Vec::new();
	let mut current = String::new();
	let mut chars = path.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'\\' => match chars.peek() {
				Some(&next @ ('.' | '\\')) => {
					current.push(next);
					chars.next();
				}
				_ => current.push('\\'),
			},
			'.' => segments.push(std::mem::take(&mut current)),
			other => current.push(other),
		}
	}
	segments.push(current);
	segments
}

/// Escapes a single segment so that [`split`] returns it unchanged.
pub fn escape(segment: &str) -> String {
	let mut out = String::with_capacity(segment.len());
	for c in segment.chars() {
		if matches!(c, '.' | '\\') {
			out.push('\\');
		}
		out.push(c);
	}
	out
}

/// Joins raw segments into a dotted path, escaping each one.
pub fn join<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
	segments.into_iter().map(escape).collect::<Vec<_>>().join(".")
}
