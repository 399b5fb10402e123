//! The wave-function-collapse driver.
//!
//! The loop: run every constraint to a fixed point (the enforcement pass),
//! check for contradiction, check for full collapse, otherwise collapse
//! the lowest-entropy cell to a random state and propagate. Decisions go
//! on a stack; a contradiction pops the stack, restores the decided cell's
//! snapshot, and retries an untried state. The loop is bounded by a retry
//! ceiling and an optional caller-supplied deadline polled between passes.

use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use braggi_entropy::{EntropyField, GridSnapshot};
use braggi_types::{CellId, SourcePos};

/// Default retry ceiling for [`SolverConfig::max_passes`].
pub const DEFAULT_MAX_PASSES: u32 = 100;

/// Driver configuration. The RNG is always seeded from `seed`, never from
/// the clock, so a collapse is reproducible.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub max_passes: u32,
    pub seed: u64,
    /// Polled between enforcement passes; mid-pass interruption is not
    /// supported.
    pub deadline: Option<Instant>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            seed: 0,
            deadline: None,
        }
    }
}

/// Counters describing one collapse run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollapseStats {
    /// Enforcement sweeps executed.
    pub passes: u32,
    /// Random collapse decisions pushed on the stack.
    pub decisions: u32,
    /// Backtracking unwinds, including the final one that finds the stack
    /// empty.
    pub backtracks: u32,
    /// Collapses whose state was picked by the RNG.
    pub random_collapses: u32,
}

/// Terminal result of a collapse run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollapseOutcome {
    /// Every cell settled on exactly one state.
    Collapsed,
    /// A cell ran out of states and the decision stack was exhausted.
    Contradiction {
        cell: CellId,
        pos: SourcePos,
        message: String,
    },
    /// Retry ceiling or deadline reached; the field may be incomplete.
    Exhausted { passes: u32 },
}

/// Outcome plus run counters.
#[derive(Debug, Clone, Serialize)]
pub struct CollapseReport {
    pub outcome: CollapseOutcome,
    pub stats: CollapseStats,
}

impl CollapseReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, CollapseOutcome::Collapsed)
    }
}

/// One collapse decision: which cell, which live-state index, and the
/// whole grid's states as they were before the collapse. Propagation
/// eliminates states field-wide, so rewinding just the decided cell would
/// leak eliminations into retries of its siblings. `exhausted` records the
/// live indices already tried at this frame.
struct CollapseDecision {
    cell: CellId,
    choice: usize,
    snapshot: GridSnapshot,
    exhausted: SmallVec<[usize; 4]>,
}

impl CollapseDecision {
    fn untried(&self) -> SmallVec<[usize; 4]> {
        let live_total = self
            .snapshot
            .get(self.cell.index())
            .map_or(0, |states| states.iter().filter(|s| !s.is_eliminated()).count());
        (0..live_total)
            .filter(|i| !self.exhausted.contains(i))
            .collect()
    }
}

/// The WFC driver. One solver may run many fields; its RNG state carries
/// across runs so repeated collapses stay reproducible from the seed.
pub struct Solver {
    config: SolverConfig,
    rng: StdRng,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Run the field to a terminal outcome.
    pub fn collapse(&mut self, field: &mut EntropyField) -> CollapseReport {
        let mut stats = CollapseStats::default();
        let mut stack: Vec<CollapseDecision> = Vec::new();

        loop {
            if self.deadline_hit() {
                warn!(passes = stats.passes, "collapse deadline reached");
                return Self::exhausted(stats);
            }
            if stats.passes >= self.config.max_passes {
                warn!(passes = stats.passes, "retry ceiling reached; solution may be incomplete");
                return Self::exhausted(stats);
            }

            // Enforcement: run every constraint until nothing changes.
            loop {
                stats.passes += 1;
                let changed = field.enforce_all();
                if field.has_contradiction() || !changed {
                    break;
                }
                if stats.passes >= self.config.max_passes {
                    warn!(passes = stats.passes, "retry ceiling reached mid-enforcement");
                    return Self::exhausted(stats);
                }
            }

            if field.has_contradiction() {
                if !self.backtrack(field, &mut stack, &mut stats) {
                    return Self::contradiction(field, stats);
                }
                continue;
            }

            if field.is_fully_collapsed() {
                debug!(
                    passes = stats.passes,
                    decisions = stats.decisions,
                    "field fully collapsed"
                );
                return CollapseReport {
                    outcome: CollapseOutcome::Collapsed,
                    stats,
                };
            }

            // Decide: collapse the lowest-entropy cell to a random state.
            let Some(cell) = field.find_lowest_entropy_cell() else {
                // Not fully collapsed yet no cell qualifies; nothing left
                // to decide on.
                warn!("no collapsible cell despite incomplete field");
                return Self::exhausted(stats);
            };
            let snapshot = field.grid().snapshot();
            let live = field
                .cell(cell)
                .map_or(0, |c| c.live_state_count());
            if live == 0 {
                return Self::contradiction(field, stats);
            }
            let choice = self.rng.gen_range(0..live);
            if field.collapse_cell(cell, Some(choice), &mut self.rng).is_err() {
                return Self::contradiction(field, stats);
            }
            stats.decisions += 1;
            stats.random_collapses += 1;
            trace!(cell = %cell, choice, live, "decision pushed");
            stack.push(CollapseDecision {
                cell,
                choice,
                snapshot,
                exhausted: SmallVec::new(),
            });
            field.propagate(cell);
        }
    }

    /// Unwind the decision stack after a contradiction. Restores the top
    /// frame's cell, marks the failed choice exhausted, and retries an
    /// untried state; frames with nothing left to try pop further. Returns
    /// false when the stack is exhausted.
    fn backtrack(
        &mut self,
        field: &mut EntropyField,
        stack: &mut Vec<CollapseDecision>,
        stats: &mut CollapseStats,
    ) -> bool {
        stats.backtracks += 1;
        while let Some(mut decision) = stack.pop() {
            let cell = decision.cell;
            field.grid_mut().restore(&decision.snapshot);
            if !decision.exhausted.contains(&decision.choice) {
                decision.exhausted.push(decision.choice);
            }

            let untried = decision.untried();
            if untried.is_empty() {
                trace!(cell = %cell, "decision frame exhausted, popping further");
                continue;
            }
            let pick = untried[self.rng.gen_range(0..untried.len())];
            if field.collapse_cell(cell, Some(pick), &mut self.rng).is_err() {
                continue;
            }
            stats.random_collapses += 1;
            decision.choice = pick;
            stack.push(decision);
            trace!(cell = %cell, pick, "backtracked to untried state");
            field.propagate(cell);
            if field.has_contradiction() {
                stats.backtracks += 1;
                continue;
            }
            return true;
        }
        debug!("decision stack exhausted");
        false
    }

    fn deadline_hit(&self) -> bool {
        self.config
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn exhausted(stats: CollapseStats) -> CollapseReport {
        CollapseReport {
            outcome: CollapseOutcome::Exhausted {
                passes: stats.passes,
            },
            stats,
        }
    }

    fn contradiction(field: &EntropyField, stats: CollapseStats) -> CollapseReport {
        let cell = field.contradiction_cell().unwrap_or(CellId::new(0));
        let pos = field.cell(cell).map(|c| c.pos()).unwrap_or_default();
        CollapseReport {
            outcome: CollapseOutcome::Contradiction {
                cell,
                pos,
                message: format!("cell {cell} reached zero states"),
            },
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use braggi_entropy::EntropyState;
    use braggi_entropy::validators::KeepStatesValidator;
    use braggi_types::{ConstraintKind, FieldId, PatternId};

    use super::*;

    fn field_with_cells(state_counts: &[usize]) -> EntropyField {
        let mut field = EntropyField::new(FieldId::new(0), 0);
        let mut next = 0u32;
        for &count in state_counts {
            let cid = field.add_cell(SourcePos::default());
            let cell = field.grid_mut().cell_mut(cid).unwrap();
            for _ in 0..count {
                cell.add_state(EntropyState::new(next, PatternId::new(next), 50));
                next += 1;
            }
        }
        field
    }

    fn solver() -> Solver {
        Solver::new(SolverConfig::default())
    }

    #[test]
    fn already_collapsed_field_succeeds_in_one_pass() {
        let mut field = field_with_cells(&[1, 1]);
        let report = solver().collapse(&mut field);
        assert!(report.is_ok());
        assert_eq!(report.stats.passes, 1);
        assert_eq!(report.stats.decisions, 0);
        assert_eq!(report.stats.backtracks, 0);
    }

    #[test]
    fn elimination_pass_collapses_without_random_choice() {
        let mut field = field_with_cells(&[2]);
        let cell = CellId::new(0);
        let keep = Arc::new(KeepStatesValidator::new(cell, [0]));
        field.add_constraint(ConstraintKind::Syntax, [cell], keep, "keep 0");
        let report = solver().collapse(&mut field);
        assert!(report.is_ok());
        assert_eq!(report.stats.random_collapses, 0);
        assert_eq!(
            field.cell(cell).unwrap().sole_live().unwrap().id,
            0
        );
    }

    #[test]
    fn ambiguous_cells_are_decided_randomly_but_reproducibly() {
        let mut field_a = field_with_cells(&[2, 2]);
        let mut field_b = field_with_cells(&[2, 2]);
        let report_a = Solver::new(SolverConfig::default()).collapse(&mut field_a);
        let report_b = Solver::new(SolverConfig::default()).collapse(&mut field_b);
        assert!(report_a.is_ok());
        assert!(report_b.is_ok());
        assert!(report_a.stats.decisions >= 1);
        let survivors_a: Vec<u32> = field_a
            .grid()
            .iter()
            .map(|c| c.sole_live().unwrap().id)
            .collect();
        let survivors_b: Vec<u32> = field_b
            .grid()
            .iter()
            .map(|c| c.sole_live().unwrap().id)
            .collect();
        assert_eq!(survivors_a, survivors_b);
    }

    #[test]
    fn unsatisfiable_field_reports_contradiction_after_unwind() {
        let mut field = field_with_cells(&[1]);
        let cell = CellId::new(0);
        let keep = Arc::new(KeepStatesValidator::new(cell, [42]));
        field.add_constraint(ConstraintKind::Syntax, [cell], keep, "impossible");
        let report = solver().collapse(&mut field);
        match report.outcome {
            CollapseOutcome::Contradiction { cell, .. } => assert_eq!(cell, CellId::new(0)),
            other => panic!("expected contradiction, got {other:?}"),
        }
        assert!(report.stats.backtracks >= 1);
    }

    #[test]
    fn backtracking_recovers_from_a_bad_random_choice() {
        // Cell 0 has two states; a dependent constraint only accepts the
        // pairing where cell 1 keeps state 2 when cell 0 kept state 0.
        // Whatever the RNG tries first, the solver must end collapsed.
        struct PairBan;

        impl braggi_entropy::ConstraintValidator for PairBan {
            fn name(&self) -> &str {
                "pair-ban"
            }

            fn validate(
                &self,
                ctx: &braggi_entropy::ConstraintCtx<'_>,
                grid: &mut braggi_entropy::CellGrid,
            ) -> bool {
                let a = ctx.cells[0];
                let b = ctx.cells[1];
                let a_state = grid.cell(a).and_then(|c| c.sole_live().map(|s| s.id));
                if let Some(1) = a_state {
                    // State 1 on cell 0 is a dead end: ban everything on
                    // cell 1.
                    if let Some(cell) = grid.cell_mut(b) {
                        cell.retain_live(|_| false);
                    }
                    return false;
                }
                true
            }
        }

        for seed in 0..4 {
            let mut field = field_with_cells(&[2, 2]);
            field.add_constraint(
                ConstraintKind::Syntax,
                [CellId::new(0), CellId::new(1)],
                Arc::new(PairBan),
                "ban state 1 on cell 0",
            );
            let mut solver = Solver::new(SolverConfig {
                seed,
                ..SolverConfig::default()
            });
            let report = solver.collapse(&mut field);
            assert!(report.is_ok(), "seed {seed}: {report:?}");
            assert_eq!(
                field.cell(CellId::new(0)).unwrap().sole_live().unwrap().id,
                0,
                "seed {seed} must settle on the only viable state"
            );
        }
    }

    #[test]
    fn retry_ceiling_reports_exhausted() {
        // A constraint that flips a state's probability every application
        // keeps the field "changing" forever; the ceiling must stop it.
        struct Thrash;

        impl braggi_entropy::ConstraintValidator for Thrash {
            fn name(&self) -> &str {
                "thrash"
            }

            fn validate(
                &self,
                ctx: &braggi_entropy::ConstraintCtx<'_>,
                grid: &mut braggi_entropy::CellGrid,
            ) -> bool {
                let cid = ctx.cells[0];
                if let Some(cell) = grid.cell_mut(cid) {
                    let n = cell.states().len() as u32;
                    cell.add_state(EntropyState::new(100 + n, PatternId::new(0), 50));
                }
                true
            }
        }

        let mut field = field_with_cells(&[2]);
        field.add_constraint(
            ConstraintKind::Custom,
            [CellId::new(0)],
            Arc::new(Thrash),
            "thrash",
        );
        let report = solver().collapse(&mut field);
        assert_eq!(
            report.outcome,
            CollapseOutcome::Exhausted {
                passes: DEFAULT_MAX_PASSES
            }
        );
    }

    #[test]
    fn deadline_is_honoured_between_passes() {
        let mut field = field_with_cells(&[2, 2]);
        let mut solver = Solver::new(SolverConfig {
            deadline: Some(Instant::now() - std::time::Duration::from_millis(1)),
            ..SolverConfig::default()
        });
        let report = solver.collapse(&mut field);
        assert!(matches!(report.outcome, CollapseOutcome::Exhausted { .. }));
        assert_eq!(report.stats.passes, 0);
    }
}
