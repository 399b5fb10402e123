//! Constraints and their validators.

use std::sync::Arc;

use smallvec::SmallVec;

use braggi_types::{CellId, ConstraintId, ConstraintKind};

use crate::grid::CellGrid;

/// Borrowed view of a constraint handed to validators. Carries the
/// constraint's own validator so a dispatcher (the periscope) can defer
/// to it after contract checks.
pub struct ConstraintCtx<'a> {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub cells: &'a [CellId],
    pub description: &'a str,
    pub validator: &'a dyn ConstraintValidator,
}

/// Validates one constraint against the cells of a field, eliminating
/// states as a side effect. Returns false when the constraint cannot be
/// satisfied by the remaining states.
pub trait ConstraintValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool;
}

/// Result of one constraint application.
#[derive(Debug, Clone, Copy)]
pub struct Application {
    /// Some cell's live-state count changed.
    pub changed: bool,
    /// The validator's verdict.
    pub ok: bool,
}

impl Application {
    pub const UNCHANGED: Self = Self {
        changed: false,
        ok: true,
    };
}

/// A constraint: a kind, the cells it relates, and a validator.
pub struct EntropyConstraint {
    id: ConstraintId,
    kind: ConstraintKind,
    cells: SmallVec<[CellId; 4]>,
    validator: Arc<dyn ConstraintValidator>,
    description: String,
}

impl EntropyConstraint {
    pub fn new(
        id: ConstraintId,
        kind: ConstraintKind,
        cells: impl IntoIterator<Item = CellId>,
        validator: Arc<dyn ConstraintValidator>,
        description: impl Into<String>,
    ) -> Self {
        let mut constraint = Self {
            id,
            kind,
            cells: SmallVec::new(),
            validator,
            description: description.into(),
        };
        for cell in cells {
            constraint.add_cell_id(cell);
        }
        constraint
    }

    pub fn id(&self) -> ConstraintId {
        self.id
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn validator(&self) -> &dyn ConstraintValidator {
        self.validator.as_ref()
    }

    /// Append a cell id, keeping the list an ordered set.
    pub fn add_cell_id(&mut self, cell: CellId) {
        if !self.cells.contains(&cell) {
            self.cells.push(cell);
        }
    }

    /// Borrowed view for validator dispatch.
    pub fn ctx(&self) -> ConstraintCtx<'_> {
        ConstraintCtx {
            id: self.id,
            kind: self.kind,
            cells: &self.cells,
            description: &self.description,
            validator: self.validator.as_ref(),
        }
    }
}

impl std::fmt::Debug for EntropyConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyConstraint")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("cells", &self.cells)
            .field("validator", &self.validator.name())
            .field("description", &self.description)
            .finish()
    }
}
