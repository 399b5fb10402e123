//! Built-in structural validators.
//!
//! The grammar compiler bakes everything a validator needs to know about
//! the grammar into the validator instance at emission time, so validation
//! never consults the pattern library. Each validator eliminates states
//! through the grid and returns false when its constraint has become
//! unsatisfiable.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use braggi_types::{CellId, PatternId};

use crate::cell::EntropyCell;
use crate::constraint::{ConstraintCtx, ConstraintValidator};
use crate::grid::CellGrid;

/// Restricts one cell to an explicit set of state ids. The compiler uses
/// this as the per-cell token-match constraint: the keep list holds the
/// states whose pattern actually matches the token at that position.
pub struct KeepStatesValidator {
    cell: CellId,
    keep: SmallVec<[u32; 8]>,
}

impl KeepStatesValidator {
    pub fn new(cell: CellId, keep: impl IntoIterator<Item = u32>) -> Self {
        Self {
            cell,
            keep: keep.into_iter().collect(),
        }
    }
}

impl ConstraintValidator for KeepStatesValidator {
    fn name(&self) -> &str {
        "keep-states"
    }

    fn validate(&self, _ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        if let Some(cell) = grid.cell_mut(self.cell) {
            cell.retain_live(|s| self.keep.contains(&s.id));
        }
        grid.live_count(self.cell) > 0
    }
}

/// Restricts one cell to states whose pattern is in an allowed set. Used
/// for the field-boundary constraints: cell 0 must hold a first of the
/// start pattern, the final cell a last.
pub struct PatternSetValidator {
    cell: CellId,
    allowed: Arc<HashSet<PatternId>>,
}

impl PatternSetValidator {
    pub fn new(cell: CellId, allowed: Arc<HashSet<PatternId>>) -> Self {
        Self { cell, allowed }
    }
}

impl ConstraintValidator for PatternSetValidator {
    fn name(&self) -> &str {
        "pattern-set"
    }

    fn validate(&self, _ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        if let Some(cell) = grid.cell_mut(self.cell) {
            cell.retain_live(|s| self.allowed.contains(&s.state_type));
        }
        grid.live_count(self.cell) > 0
    }
}

/// Arc consistency between two consecutive cells: a state survives on the
/// right only if some live left state may precede it, and vice versa.
/// The allowed-pair set is shared between every adjacency constraint of a
/// field.
pub struct AdjacencyValidator {
    left: CellId,
    right: CellId,
    allowed: Arc<HashSet<(PatternId, PatternId)>>,
    permissive: bool,
}

impl AdjacencyValidator {
    pub fn new(left: CellId, right: CellId, allowed: Arc<HashSet<(PatternId, PatternId)>>) -> Self {
        Self {
            left,
            right,
            allowed,
            permissive: false,
        }
    }

    /// An adjacency validator that admits everything. Installed by the
    /// periscope builder when no grammar-derived validator is supplied.
    pub fn permissive() -> Self {
        Self {
            left: CellId::new(0),
            right: CellId::new(0),
            allowed: Arc::new(HashSet::new()),
            permissive: true,
        }
    }
}

impl ConstraintValidator for AdjacencyValidator {
    fn name(&self) -> &str {
        "adjacency"
    }

    fn validate(&self, _ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        if self.permissive {
            return true;
        }
        let left_live: SmallVec<[PatternId; 8]> = match grid.cell(self.left) {
            Some(cell) => cell.live_states().map(|s| s.state_type).collect(),
            None => return true,
        };
        if let Some(cell) = grid.cell_mut(self.right) {
            cell.retain_live(|s| {
                left_live
                    .iter()
                    .any(|&l| self.allowed.contains(&(l, s.state_type)))
            });
        }
        let right_live: SmallVec<[PatternId; 8]> = match grid.cell(self.right) {
            Some(cell) => cell.live_states().map(|s| s.state_type).collect(),
            None => return true,
        };
        if let Some(cell) = grid.cell_mut(self.left) {
            cell.retain_live(|s| {
                right_live
                    .iter()
                    .any(|&r| self.allowed.contains(&(s.state_type, r)))
            });
        }
        grid.live_count(self.left) > 0 && grid.live_count(self.right) > 0
    }
}

/// Mutual exclusion of superposition alternatives: once any cell in the
/// span is certain about an alternative, states belonging to the other
/// alternatives are eliminated across the whole span.
pub struct ExclusionValidator {
    /// Leaf pattern → index of the alternative it belongs to.
    members: Arc<HashMap<PatternId, usize>>,
}

impl ExclusionValidator {
    pub fn new(members: Arc<HashMap<PatternId, usize>>) -> Self {
        Self { members }
    }
}

impl ConstraintValidator for ExclusionValidator {
    fn name(&self) -> &str {
        "exclusion"
    }

    fn validate(&self, ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        let mut required: Option<usize> = None;
        let mut consistent = true;
        for &cid in ctx.cells {
            let Some(cell) = grid.cell(cid) else { continue };
            let Some(state) = cell.sole_live() else {
                continue;
            };
            if let Some(&alt) = self.members.get(&state.state_type) {
                match required {
                    None => required = Some(alt),
                    Some(r) if r != alt => consistent = false,
                    Some(_) => {}
                }
            }
        }
        if let Some(required) = required {
            for &cid in ctx.cells {
                if let Some(cell) = grid.cell_mut(cid) {
                    cell.retain_live(|s| {
                        self.members
                            .get(&s.state_type)
                            .is_none_or(|&alt| alt == required)
                    });
                }
            }
        }
        consistent
            && ctx.cells.iter().all(|&cid| {
                grid.cell(cid)
                    .is_none_or(|c| !c.has_states() || c.live_state_count() > 0)
            })
    }
}

/// Grammar-predicate bias: pins the probability of targeted states to an
/// absolute weight, shifting collapse order without eliminating anything.
/// Idempotent, so repeated enforcement passes do not drift.
pub struct BiasValidator {
    targets: Arc<HashSet<PatternId>>,
    probability: u8,
}

impl BiasValidator {
    pub fn new(targets: Arc<HashSet<PatternId>>, probability: u8) -> Self {
        Self {
            // Weight 0 would eliminate; a bias never does.
            probability: probability.max(1),
            targets,
        }
    }
}

impl ConstraintValidator for BiasValidator {
    fn name(&self) -> &str {
        "bias"
    }

    fn validate(&self, ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        for &cid in ctx.cells {
            if let Some(cell) = grid.cell_mut(cid) {
                cell.reweight_live(|s| {
                    self.targets
                        .contains(&s.state_type)
                        .then_some(self.probability)
                });
            }
        }
        true
    }
}

/// Occurrence bound for repetition and optional spans: at most `max` (and
/// at least `min`) cells in the span may settle on one of the inner
/// pattern's leaves.
pub struct CardinalityValidator {
    inner: Arc<HashSet<PatternId>>,
    min: usize,
    max: Option<usize>,
}

impl CardinalityValidator {
    pub fn new(inner: Arc<HashSet<PatternId>>, min: usize, max: Option<usize>) -> Self {
        Self { inner, min, max }
    }
}

impl ConstraintValidator for CardinalityValidator {
    fn name(&self) -> &str {
        "cardinality"
    }

    fn validate(&self, ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        let mut certain: SmallVec<[CellId; 8]> = SmallVec::new();
        let mut possible = 0usize;
        for &cid in ctx.cells {
            let Some(cell) = grid.cell(cid) else { continue };
            if cell
                .live_states()
                .any(|s| self.inner.contains(&s.state_type))
            {
                possible += 1;
            }
            if let Some(state) = cell.sole_live() {
                if self.inner.contains(&state.state_type) {
                    certain.push(cid);
                }
            }
        }
        if let Some(max) = self.max {
            if certain.len() > max {
                // Occurrences past the bound cannot stand.
                for &cid in &certain[max..] {
                    if let Some(cell) = grid.cell_mut(cid) {
                        cell.retain_live(|s| !self.inner.contains(&s.state_type));
                    }
                }
                return false;
            }
        }
        possible >= self.min
    }
}

#[cfg(test)]
mod tests {
    use braggi_types::{ConstraintId, ConstraintKind, SourcePos};

    use crate::state::EntropyState;

    use super::*;

    fn grid_of(cells: &[&[(u32, u32)]]) -> CellGrid {
        // Each cell is a list of (state id, pattern id) pairs.
        let mut grid = CellGrid::new();
        for states in cells {
            let id = grid.add_cell(SourcePos::default());
            let cell = grid.cell_mut(id).unwrap();
            for &(sid, pid) in *states {
                cell.add_state(EntropyState::new(sid, PatternId::new(pid), 50));
            }
        }
        grid
    }

    fn ctx<'a>(cells: &'a [CellId], validator: &'a dyn ConstraintValidator) -> ConstraintCtx<'a> {
        ConstraintCtx {
            id: ConstraintId::new(0),
            kind: ConstraintKind::Syntax,
            cells,
            description: "test",
            validator,
        }
    }

    fn live_patterns(grid: &CellGrid, cell: CellId) -> Vec<u32> {
        grid.cell(cell)
            .unwrap()
            .live_states()
            .map(|s| s.state_type.get())
            .collect()
    }

    #[test]
    fn keep_states_restricts_to_list() {
        let mut grid = grid_of(&[&[(0, 0), (1, 1), (2, 2)]]);
        let v = KeepStatesValidator::new(CellId::new(0), [0, 2]);
        let cells = [CellId::new(0)];
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        assert_eq!(live_patterns(&grid, CellId::new(0)), vec![0, 2]);
    }

    #[test]
    fn pattern_set_restricts_by_pattern() {
        let mut grid = grid_of(&[&[(0, 5), (1, 6)]]);
        let allowed: Arc<HashSet<PatternId>> =
            Arc::new([PatternId::new(5)].into_iter().collect());
        let v = PatternSetValidator::new(CellId::new(0), allowed);
        let cells = [CellId::new(0)];
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        assert_eq!(live_patterns(&grid, CellId::new(0)), vec![5]);
    }

    #[test]
    fn adjacency_prunes_both_sides() {
        // Left has patterns {1, 2}, right {3, 4}; only 1→3 is legal.
        let mut grid = grid_of(&[&[(0, 1), (1, 2)], &[(2, 3), (3, 4)]]);
        let allowed: Arc<HashSet<(PatternId, PatternId)>> =
            Arc::new([(PatternId::new(1), PatternId::new(3))].into_iter().collect());
        let v = AdjacencyValidator::new(CellId::new(0), CellId::new(1), allowed);
        let cells = [CellId::new(0), CellId::new(1)];
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        assert_eq!(live_patterns(&grid, CellId::new(0)), vec![1]);
        assert_eq!(live_patterns(&grid, CellId::new(1)), vec![3]);
    }

    #[test]
    fn adjacency_with_no_legal_pair_reports_unsatisfiable() {
        let mut grid = grid_of(&[&[(0, 1)], &[(1, 2)]]);
        let allowed: Arc<HashSet<(PatternId, PatternId)>> = Arc::new(HashSet::new());
        let v = AdjacencyValidator::new(CellId::new(0), CellId::new(1), allowed);
        let cells = [CellId::new(0), CellId::new(1)];
        assert!(!v.validate(&ctx(&cells, &v), &mut grid));
        assert_eq!(grid.live_count(CellId::new(1)), 0);
    }

    #[test]
    fn permissive_adjacency_changes_nothing() {
        let mut grid = grid_of(&[&[(0, 1), (1, 2)]]);
        let v = AdjacencyValidator::permissive();
        let cells = [CellId::new(0)];
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        assert_eq!(grid.live_count(CellId::new(0)), 2);
    }

    #[test]
    fn exclusion_propagates_a_certain_alternative() {
        // Patterns 1, 2 belong to alternatives 0, 1. Cell 0 is certain on
        // pattern 1; cell 1 still holds both plus an outside pattern 9.
        let mut grid = grid_of(&[&[(0, 1)], &[(1, 1), (2, 2), (3, 9)]]);
        let members: Arc<HashMap<PatternId, usize>> = Arc::new(
            [(PatternId::new(1), 0), (PatternId::new(2), 1)]
                .into_iter()
                .collect(),
        );
        let v = ExclusionValidator::new(members);
        let cells = [CellId::new(0), CellId::new(1)];
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        // Pattern 2 (other alternative) is gone; the outsider survives.
        assert_eq!(live_patterns(&grid, CellId::new(1)), vec![1, 9]);
    }

    #[test]
    fn exclusion_conflict_is_unsatisfiable() {
        let mut grid = grid_of(&[&[(0, 1)], &[(1, 2)]]);
        let members: Arc<HashMap<PatternId, usize>> = Arc::new(
            [(PatternId::new(1), 0), (PatternId::new(2), 1)]
                .into_iter()
                .collect(),
        );
        let v = ExclusionValidator::new(members);
        let cells = [CellId::new(0), CellId::new(1)];
        assert!(!v.validate(&ctx(&cells, &v), &mut grid));
        // The conflicting certain cell lost its state.
        assert_eq!(grid.live_count(CellId::new(1)), 0);
    }

    #[test]
    fn bias_reweights_without_eliminating() {
        let mut grid = grid_of(&[&[(0, 1), (1, 2)]]);
        let targets: Arc<HashSet<PatternId>> =
            Arc::new([PatternId::new(1)].into_iter().collect());
        let v = BiasValidator::new(targets, 90);
        let cells = [CellId::new(0)];
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        let cell = grid.cell(CellId::new(0)).unwrap();
        let probs: Vec<u8> = cell.live_states().map(|s| s.probability()).collect();
        assert_eq!(probs, vec![90, 50]);
        assert_eq!(cell.live_state_count(), 2);
        // Idempotent under re-application.
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        let cell = grid.cell(CellId::new(0)).unwrap();
        assert_eq!(cell.live_states().next().unwrap().probability(), 90);
    }

    #[test]
    fn cardinality_caps_certain_occurrences() {
        // Optional span (max 1) with two cells already certain on the
        // inner pattern 7.
        let mut grid = grid_of(&[&[(0, 7)], &[(1, 7)], &[(2, 3), (3, 7)]]);
        let inner: Arc<HashSet<PatternId>> =
            Arc::new([PatternId::new(7)].into_iter().collect());
        let v = CardinalityValidator::new(inner, 0, Some(1));
        let cells = [CellId::new(0), CellId::new(1), CellId::new(2)];
        assert!(!v.validate(&ctx(&cells, &v), &mut grid));
        assert_eq!(grid.live_count(CellId::new(0)), 1);
        assert_eq!(grid.live_count(CellId::new(1)), 0);
    }

    #[test]
    fn cardinality_within_bounds_is_satisfied() {
        let mut grid = grid_of(&[&[(0, 7)], &[(1, 3), (2, 7)]]);
        let inner: Arc<HashSet<PatternId>> =
            Arc::new([PatternId::new(7)].into_iter().collect());
        let v = CardinalityValidator::new(inner, 0, None);
        let cells = [CellId::new(0), CellId::new(1)];
        assert!(v.validate(&ctx(&cells, &v), &mut grid));
        assert_eq!(grid.live_count(CellId::new(1)), 2);
    }
}
