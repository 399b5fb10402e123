//! Machine-readable parse reports.

use serde::Serialize;

use braggi_entropy::EntropyField;
use braggi_error::{BraggiError, Result};
use braggi_region::RegionStats;
use braggi_solver::{CollapseOutcome, CollapseStats};
use braggi_types::{CellId, Diagnostic, PatternId, SourcePos};

/// The surviving interpretation of one cell after a collapse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSummary {
    pub cell: CellId,
    pub pos: SourcePos,
    /// Derivation label of the surviving state, when the cell settled.
    pub label: Option<String>,
    /// Pattern the cell collapsed to, when it settled.
    pub pattern: Option<PatternId>,
    pub live_states: usize,
}

/// Everything a caller learns from one parse.
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub outcome: CollapseOutcome,
    pub stats: CollapseStats,
    pub diagnostics: Vec<Diagnostic>,
    pub cells: Vec<CellSummary>,
    pub region: Option<RegionStats>,
}

impl ParseReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, CollapseOutcome::Collapsed)
    }

    /// Summarise the field's cells after a collapse run.
    pub fn cell_summaries(field: &EntropyField) -> Vec<CellSummary> {
        field
            .grid()
            .iter()
            .map(|cell| {
                let survivor = cell.sole_live();
                CellSummary {
                    cell: cell.id(),
                    pos: cell.pos(),
                    label: survivor.and_then(|s| s.label.clone()),
                    pattern: survivor.map(|s| s.state_type),
                    live_states: cell.live_state_count(),
                }
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BraggiError::internal(format!("report serialisation failed: {e}")))
    }
}
