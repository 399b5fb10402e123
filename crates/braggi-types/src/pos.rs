//! Source positions as reported by the external lexer.

use serde::{Deserialize, Serialize};

/// A half-open byte range in a source file, with the line/column of its
/// first byte. Lines and columns are 0-based; the line-map utility that
/// resolves file ids to paths lives outside the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
    pub length: u32,
}

impl SourcePos {
    pub fn new(file_id: u32, line: u32, column: u32, offset: u32, length: u32) -> Self {
        Self {
            file_id,
            line,
            column,
            offset,
            length,
        }
    }

    /// Position of the byte immediately past this range, on the same line.
    pub fn end(self) -> Self {
        Self {
            column: self.column + self.length,
            offset: self.offset + self.length,
            length: 0,
            ..self
        }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file_id, self.line + 1, self.column + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_one_based() {
        let pos = SourcePos::new(0, 4, 2, 40, 3);
        assert_eq!(pos.to_string(), "0:5:3");
    }

    #[test]
    fn end_advances_within_line() {
        let pos = SourcePos::new(1, 0, 5, 5, 6);
        let end = pos.end();
        assert_eq!(end.column, 11);
        assert_eq!(end.offset, 11);
        assert_eq!(end.length, 0);
        assert_eq!(end.line, 0);
    }
}
