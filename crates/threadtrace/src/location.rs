//! Source-location values attached to lock and thread operations.
//!
//! Every acquire/release/spawn call accepts a plain (file, line) pair so
//! diagnostics can point at the call site. The [`here!`] macro captures the
//! current location.

use core::fmt;

/// A (file, line) pair identifying a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file path, as produced by `file!()`.
    pub file: &'static str,
    /// 1-based line number.
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Capture the current source location.
#[macro_export]
macro_rules! here {
    () => {
        $crate::SourceLocation {
            file: file!(),
            line: line!(),
        }
    };
}
