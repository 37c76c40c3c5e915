// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Source location tracking.
//!
//! Every handler, middleware and call site carries a location so diagnostics
//! can point at the exact declaration or invocation, and so interceptors can
//! be bound to one specific call expression.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A span of source code, represented as a byte offset range.
///
/// # Examples
///
/// ```
/// use switchboard_core::symbols::Span;
///
/// let span = Span::new(0, 10);
/// assert_eq!(span.start(), 0);
/// assert_eq!(span.end(), 10);
/// assert_eq!(span.len(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    start: u32,
    end: u32,
}

impl Span {
    /// Creates a new span from start and end byte offsets.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns the start byte offset.
    #[must_use]
    pub const fn start(self) -> u32 {
        self.start
    }

    /// Returns the end byte offset (exclusive).
    #[must_use]
    pub const fn end(self) -> u32 {
        self.end
    }

    /// Returns the length of the span in bytes.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    /// Returns true if the span is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start as usize, span.len() as usize).into()
    }
}

/// A position in a specific source file.
///
/// `line` and `column` are 1-based and only used for display and for the
/// path/line/column form of the interception attribute. Identity is the
/// `(path, span)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: Utf8PathBuf,
    pub span: Span,
    #[serde(default = "one")]
    pub line: u32,
    #[serde(default = "one")]
    pub column: u32,
}

fn one() -> u32 {
    1
}

impl SourceLocation {
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, span: Span, line: u32, column: u32) -> Self {
        Self {
            path: path.into(),
            span,
            line,
            column,
        }
    }

    /// Stable fingerprint for this location.
    ///
    /// Derived only from the file path and the span, so edits elsewhere in
    /// the file that do not move this expression keep the same value.
    #[must_use]
    pub fn fingerprint(&self) -> LocationFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.path.as_str().replace('\\', "/").as_bytes());
        hasher.update(b":");
        hasher.update(self.span.start().to_le_bytes());
        hasher.update(b":");
        hasher.update(self.span.end().to_le_bytes());
        let digest = hasher.finalize();
        LocationFingerprint(hex_prefix(&digest, 8))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.path, self.line, self.column)
    }
}

/// Short hex digest identifying one call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationFingerprint(String);

impl LocationFingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case hex of the first `bytes` bytes of a digest.
pub(crate) fn hex_prefix(digest: &[u8], bytes: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes * 2);
    for byte in digest.iter().take(bytes) {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_new_and_accessors() {
        let span = Span::new(5, 15);
        assert_eq!(span.start(), 5);
        assert_eq!(span.end(), 15);
        assert_eq!(span.len(), 10);
        assert!(!span.is_empty());
    }

    #[test]
    fn span_into_source_span() {
        let source: miette::SourceSpan = Span::new(4, 9).into();
        assert_eq!(source.offset(), 4);
        assert_eq!(source.len(), 5);
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = SourceLocation::new("src/Program.cs", Span::new(10, 42), 3, 5);
        let b = SourceLocation::new("src/Program.cs", Span::new(10, 42), 99, 1);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str().len(), 16);
    }

    #[test]
    fn fingerprint_differs_per_span_and_path() {
        let a = SourceLocation::new("src/Program.cs", Span::new(10, 42), 1, 1);
        let b = SourceLocation::new("src/Program.cs", Span::new(11, 42), 1, 1);
        let c = SourceLocation::new("src/Other.cs", Span::new(10, 42), 1, 1);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_path_separator_style() {
        let unix = SourceLocation::new("src/Orders/Api.cs", Span::new(1, 2), 1, 1);
        let windows = SourceLocation::new("src\\Orders\\Api.cs", Span::new(1, 2), 1, 1);
        assert_eq!(unix.fingerprint(), windows.fingerprint());
    }

    #[test]
    fn display_uses_line_and_column() {
        let loc = SourceLocation::new("Api.cs", Span::new(0, 1), 12, 8);
        assert_eq!(loc.to_string(), "Api.cs(12,8)");
    }
}
