//! User-visible diagnostics emitted by the entropy field and periscope.

use serde::{Deserialize, Serialize};

use braggi_error::{ErrorCategory, Severity};

use crate::CellId;
use crate::pos::SourcePos;

/// One diagnostic bound to a source position. These are what the external
/// error handler receives; formatting them is out of scope for the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub cell: Option<CellId>,
    pub pos: SourcePos,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(
        category: ErrorCategory,
        severity: Severity,
        pos: SourcePos,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            cell: None,
            pos,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_cell(mut self, cell: CellId) -> Self {
        self.cell = Some(cell);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: [{}] {} at {}",
            self.severity, self.category, self.message, self.pos
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compact() {
        let diag = Diagnostic::new(
            ErrorCategory::Contradiction,
            Severity::Error,
            SourcePos::new(0, 0, 12, 12, 1),
            "cell 4 reached zero states",
        )
        .with_cell(CellId::new(4));
        assert_eq!(
            diag.to_string(),
            "error: [contradiction] cell 4 reached zero states at 0:1:13"
        );
    }
}
