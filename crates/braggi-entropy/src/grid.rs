//! The cell half of a field, mutable by validators.
//!
//! Constraint metadata and cell storage live in separate structs so a
//! validator can eliminate states through `&mut CellGrid` while the field
//! still borrows the constraint being applied.

use braggi_error::{ErrorCategory, Severity};
use braggi_types::{CellId, Diagnostic, SourcePos};
use smallvec::SmallVec;
use tracing::debug;

use crate::cell::EntropyCell;
use crate::state::EntropyState;

/// A copy of every cell's state list, used by the solver to rewind a
/// decision. Propagation eliminates states field-wide, so a decision
/// snapshot must cover the whole grid, not just the decided cell.
pub type GridSnapshot = Vec<SmallVec<[EntropyState; 4]>>;

/// Callback invoked for every user-visible diagnostic the field emits.
pub type DiagnosticSink = Box<dyn FnMut(Diagnostic) + Send>;

/// Dense cell storage plus contradiction bookkeeping and the sink.
#[derive(Default)]
pub struct CellGrid {
    cells: Vec<EntropyCell>,
    contradiction_cell: Option<CellId>,
    sink: Option<DiagnosticSink>,
}

impl CellGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cell(&mut self, pos: SourcePos) -> CellId {
        let id = CellId::new(self.cells.len() as u32);
        self.cells.push(EntropyCell::new(id, pos));
        id
    }

    pub fn cell(&self, id: CellId) -> Option<&EntropyCell> {
        self.cells.get(id.index())
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut EntropyCell> {
        self.cells.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntropyCell> {
        self.cells.iter()
    }

    pub fn live_count(&self, id: CellId) -> usize {
        self.cell(id).map_or(0, EntropyCell::live_state_count)
    }

    pub fn set_sink(&mut self, sink: DiagnosticSink) {
        self.sink = Some(sink);
    }

    /// Hand a diagnostic to the sink, if one is installed.
    pub fn emit(&mut self, diag: Diagnostic) {
        if let Some(sink) = self.sink.as_mut() {
            sink(diag);
        }
    }

    pub fn has_contradiction(&self) -> bool {
        self.contradiction_cell.is_some()
    }

    pub fn contradiction_cell(&self) -> Option<CellId> {
        self.contradiction_cell
    }

    /// Record that `cell` reached zero states and emit a diagnostic. Only
    /// the first contradiction per propagation episode is recorded; the
    /// solver clears it when it backtracks.
    pub fn note_contradiction(&mut self, cell: CellId) {
        if self.contradiction_cell.is_some() {
            return;
        }
        self.contradiction_cell = Some(cell);
        let pos = self.cell(cell).map(EntropyCell::pos).unwrap_or_default();
        debug!(cell = %cell, %pos, "contradiction");
        self.emit(
            Diagnostic::new(
                ErrorCategory::Contradiction,
                Severity::Error,
                pos,
                format!("cell {cell} reached zero states"),
            )
            .with_cell(cell),
        );
    }

    pub fn clear_contradiction(&mut self) {
        self.contradiction_cell = None;
    }

    /// Copy every cell's state list.
    pub fn snapshot(&self) -> GridSnapshot {
        self.cells.iter().map(EntropyCell::snapshot_states).collect()
    }

    /// Rewind every cell to a snapshot taken on this grid and clear the
    /// contradiction flag. Cells added after the snapshot keep their
    /// current states.
    pub fn restore(&mut self, snapshot: &GridSnapshot) {
        for (cell, states) in self.cells.iter_mut().zip(snapshot.iter()) {
            cell.replace_states(states.clone());
        }
        self.contradiction_cell = None;
    }

    /// Every cell that holds states is down to exactly one.
    pub fn is_fully_collapsed(&self) -> bool {
        self.cells
            .iter()
            .filter(|c| c.has_states())
            .all(EntropyCell::is_collapsed)
    }

    /// The lowest-id cell among those of minimum positive entropy.
    /// Collapsed and contradicted cells are skipped.
    pub fn find_lowest_entropy_cell(&self) -> Option<CellId> {
        let mut best: Option<(CellId, f64)> = None;
        for cell in &self.cells {
            if cell.live_state_count() <= 1 {
                continue;
            }
            let entropy = cell.entropy();
            if entropy <= 0.0 {
                continue;
            }
            match best {
                Some((_, lowest)) if entropy >= lowest => {}
                _ => best = Some((cell.id(), entropy)),
            }
        }
        best.map(|(id, _)| id)
    }
}

impl std::fmt::Debug for CellGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellGrid")
            .field("cells", &self.cells.len())
            .field("contradiction_cell", &self.contradiction_cell)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
