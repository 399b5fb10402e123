//! The entropy field: cells + constraints + propagation.

use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashSet;
use rand::Rng;
use smallvec::SmallVec;
use tracing::{debug, trace};

use braggi_error::{BraggiError, Result};
use braggi_types::{CellId, ConstraintId, ConstraintKind, FieldId, SourcePos};

use crate::cell::EntropyCell;
use crate::constraint::{Application, ConstraintValidator, EntropyConstraint};
use crate::grid::{CellGrid, DiagnosticSink};

/// One field per parse: the cells for a token stream and the constraints
/// seeded over them by the grammar compiler.
pub struct EntropyField {
    id: FieldId,
    source_id: u32,
    grid: CellGrid,
    constraints: Vec<EntropyConstraint>,
    /// When set, every constraint check routes through this dispatcher
    /// (the periscope) instead of the constraint's own validator.
    dispatch: Option<Arc<dyn ConstraintValidator>>,
    torn_down: bool,
}

impl EntropyField {
    pub fn new(id: FieldId, source_id: u32) -> Self {
        Self {
            id,
            source_id,
            grid: CellGrid::new(),
            constraints: Vec::new(),
            dispatch: None,
            torn_down: false,
        }
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut CellGrid {
        &mut self.grid
    }

    pub fn add_cell(&mut self, pos: SourcePos) -> CellId {
        self.grid.add_cell(pos)
    }

    pub fn cell(&self, id: CellId) -> Option<&EntropyCell> {
        self.grid.cell(id)
    }

    /// Install a constraint. Its cell list is deduplicated and each
    /// mentioned cell gets a back-reference for propagation.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        cells: impl IntoIterator<Item = CellId>,
        validator: Arc<dyn ConstraintValidator>,
        description: impl Into<String>,
    ) -> ConstraintId {
        let id = ConstraintId::new(self.constraints.len() as u32);
        let constraint = EntropyConstraint::new(id, kind, cells, validator, description);
        for &cid in constraint.cells() {
            if let Some(cell) = self.grid.cell_mut(cid) {
                cell.add_constraint_ref(id);
            }
        }
        trace!(field = %self.id, constraint = %id, kind = %constraint.kind(), "constraint added");
        self.constraints.push(constraint);
        id
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&EntropyConstraint> {
        self.constraints.get(id.index())
    }

    pub fn constraints(&self) -> &[EntropyConstraint] {
        &self.constraints
    }

    /// Route all constraint checks through a dispatcher (the periscope).
    pub fn set_dispatch(&mut self, dispatch: Arc<dyn ConstraintValidator>) {
        self.dispatch = Some(dispatch);
    }

    pub fn set_sink(&mut self, sink: DiagnosticSink) {
        self.grid.set_sink(sink);
    }

    /// Apply one constraint: snapshot live-state counts, run the validator
    /// (through the dispatcher when installed), then report whether any
    /// count changed. Cells that reached zero states mark the field
    /// contradicted.
    pub fn apply_constraint(&mut self, id: ConstraintId) -> Application {
        let Some(constraint) = self.constraints.get(id.index()) else {
            return Application::UNCHANGED;
        };
        let ctx = constraint.ctx();
        let before: SmallVec<[usize; 8]> = ctx
            .cells
            .iter()
            .map(|&cid| self.grid.live_count(cid))
            .collect();

        let ok = match self.dispatch.as_deref() {
            Some(dispatch) => dispatch.validate(&ctx, &mut self.grid),
            None => ctx.validator.validate(&ctx, &mut self.grid),
        };

        let cells: SmallVec<[CellId; 8]> = ctx.cells.iter().copied().collect();
        let mut changed = false;
        for (i, &cid) in cells.iter().enumerate() {
            let now = self.grid.live_count(cid);
            if now != before[i] {
                changed = true;
            }
            if now == 0 && self.grid.cell(cid).is_some_and(EntropyCell::has_states) {
                self.grid.note_contradiction(cid);
            }
        }
        Application { changed, ok }
    }

    /// One enforcement sweep: apply every constraint once, in the order
    /// they were added. Stops early on contradiction. Returns true iff any
    /// application changed a state count.
    pub fn enforce_all(&mut self) -> bool {
        let mut changed = false;
        for idx in 0..self.constraints.len() {
            let app = self.apply_constraint(ConstraintId::new(idx as u32));
            changed |= app.changed;
            if self.grid.has_contradiction() {
                break;
            }
        }
        changed
    }

    /// FIFO propagation from one cell: re-apply every constraint that
    /// mentions the popped cell; when an application changes counts,
    /// enqueue the constraint's other cells (deduplicated). Terminates
    /// when the queue drains or a contradiction is found. Returns true
    /// iff anything changed.
    pub fn propagate(&mut self, from: CellId) -> bool {
        let mut queue: VecDeque<CellId> = VecDeque::new();
        let mut enqueued: HashSet<CellId> = HashSet::new();
        queue.push_back(from);
        enqueued.insert(from);
        let mut changed_any = false;

        while let Some(cid) = queue.pop_front() {
            enqueued.remove(&cid);
            let constraint_ids: SmallVec<[ConstraintId; 8]> = match self.grid.cell(cid) {
                Some(cell) => cell.constraint_refs().iter().copied().collect(),
                None => continue,
            };
            for constraint_id in constraint_ids {
                let app = self.apply_constraint(constraint_id);
                if app.changed {
                    changed_any = true;
                    let affected: SmallVec<[CellId; 8]> = self
                        .constraints
                        .get(constraint_id.index())
                        .map(|c| c.cells().iter().copied().collect())
                        .unwrap_or_default();
                    for other in affected {
                        if other != cid && enqueued.insert(other) {
                            queue.push_back(other);
                        }
                    }
                }
                if self.grid.has_contradiction() {
                    trace!(field = %self.id, cell = %cid, "propagation stopped on contradiction");
                    return changed_any;
                }
            }
        }
        changed_any
    }

    pub fn has_contradiction(&self) -> bool {
        self.grid.has_contradiction()
    }

    pub fn contradiction_cell(&self) -> Option<CellId> {
        self.grid.contradiction_cell()
    }

    pub fn is_fully_collapsed(&self) -> bool {
        self.grid.is_fully_collapsed()
    }

    pub fn find_lowest_entropy_cell(&self) -> Option<CellId> {
        self.grid.find_lowest_entropy_cell()
    }

    /// Collapse a cell to one of its live states. `choice` indexes the
    /// live subsequence; `None` picks uniformly at random. Returns the
    /// surviving state id.
    pub fn collapse_cell(
        &mut self,
        cell: CellId,
        choice: Option<usize>,
        rng: &mut dyn rand::RngCore,
    ) -> Result<u32> {
        let cell_ref = self
            .grid
            .cell_mut(cell)
            .ok_or_else(|| BraggiError::OutOfRange {
                what: "cell id".to_owned(),
                value: cell.to_string(),
            })?;
        let live = cell_ref.live_state_count();
        if live == 0 {
            return Err(BraggiError::Contradiction { cell: cell.get() });
        }
        let index = match choice {
            Some(i) => i,
            None => rng.gen_range(0..live),
        };
        let survivor = cell_ref.collapse_to_live_index(index)?;
        trace!(field = %self.id, cell = %cell, state = survivor, "cell collapsed");
        Ok(survivor)
    }

    /// Tear the field down: drop all cells and constraints. Idempotent;
    /// repeated calls log and return.
    pub fn teardown(&mut self) {
        if self.torn_down {
            debug!(field = %self.id, "teardown called twice, ignoring");
            return;
        }
        self.torn_down = true;
        self.constraints.clear();
        self.grid = CellGrid::new();
        debug!(field = %self.id, "field torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl std::fmt::Debug for EntropyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyField")
            .field("id", &self.id)
            .field("cells", &self.grid.len())
            .field("constraints", &self.constraints.len())
            .field("has_dispatch", &self.dispatch.is_some())
            .finish()
    }
}
