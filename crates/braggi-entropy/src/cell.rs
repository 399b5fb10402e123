//! Cells: one token position holding a superposition of states.

use smallvec::SmallVec;

use braggi_error::{BraggiError, Result};
use braggi_types::{CellId, ConstraintId, SourcePos};

use crate::state::EntropyState;

/// A position in the token stream and its candidate states.
///
/// Eliminated states keep their records (probability 0) so decision
/// snapshots and reports can still inspect them; only a collapse drops
/// the losing records.
#[derive(Debug, Clone)]
pub struct EntropyCell {
    id: CellId,
    pos: SourcePos,
    states: SmallVec<[EntropyState; 4]>,
    constraints: SmallVec<[ConstraintId; 4]>,
}

impl EntropyCell {
    pub fn new(id: CellId, pos: SourcePos) -> Self {
        Self {
            id,
            pos,
            states: SmallVec::new(),
            constraints: SmallVec::new(),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn pos(&self) -> SourcePos {
        self.pos
    }

    pub fn add_state(&mut self, state: EntropyState) {
        self.states.push(state);
    }

    pub fn states(&self) -> &[EntropyState] {
        &self.states
    }

    /// Replace the whole state list; used by the solver to restore a
    /// decision snapshot.
    pub fn replace_states(&mut self, states: SmallVec<[EntropyState; 4]>) {
        self.states = states;
    }

    pub fn snapshot_states(&self) -> SmallVec<[EntropyState; 4]> {
        self.states.clone()
    }

    pub fn live_states(&self) -> impl Iterator<Item = &EntropyState> {
        self.states.iter().filter(|s| !s.is_eliminated())
    }

    pub fn live_state_count(&self) -> usize {
        self.live_states().count()
    }

    /// The surviving state of a collapsed cell.
    pub fn sole_live(&self) -> Option<&EntropyState> {
        let mut live = self.live_states();
        let first = live.next()?;
        if live.next().is_some() { None } else { Some(first) }
    }

    pub fn has_states(&self) -> bool {
        !self.states.is_empty()
    }

    pub fn is_collapsed(&self) -> bool {
        self.live_state_count() == 1
    }

    pub fn is_contradicted(&self) -> bool {
        self.has_states() && self.live_state_count() == 0
    }

    /// Eliminate every live state the predicate rejects. Returns how many
    /// states were eliminated.
    pub fn retain_live<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&EntropyState) -> bool,
    {
        let mut eliminated = 0;
        for state in &mut self.states {
            if !state.is_eliminated() && !keep(state) {
                state.eliminate();
                eliminated += 1;
            }
        }
        eliminated
    }

    /// Re-weight live states. The closure returns the new probability for
    /// a state, or `None` to leave it untouched. Weights only shift
    /// collapse order; membership is unchanged.
    pub fn reweight_live<F>(&mut self, weight: F)
    where
        F: Fn(&EntropyState) -> Option<u8>,
    {
        for state in &mut self.states {
            if state.is_eliminated() {
                continue;
            }
            if let Some(p) = weight(state) {
                state.set_probability(p);
            }
        }
    }

    /// Shannon entropy over the live states, probabilities normalised.
    /// Collapsed and contradicted cells have entropy 0.
    pub fn entropy(&self) -> f64 {
        let total: f64 = self
            .live_states()
            .map(|s| f64::from(s.probability()))
            .sum();
        if total <= 0.0 || self.live_state_count() <= 1 {
            return 0.0;
        }
        self.live_states()
            .map(|s| {
                let p = f64::from(s.probability()) / total;
                -p * p.log2()
            })
            .sum()
    }

    /// Collapse to the live state at `live_index` (an index into the live
    /// subsequence, not the raw record list). The survivor is observed;
    /// every other record is destroyed. Returns the surviving state id.
    pub fn collapse_to_live_index(&mut self, live_index: usize) -> Result<u32> {
        let chosen = self
            .live_states()
            .nth(live_index)
            .map(|s| s.id)
            .ok_or_else(|| BraggiError::OutOfRange {
                what: "collapse state index".to_owned(),
                value: live_index.to_string(),
            })?;
        self.states.retain(|s| s.id == chosen);
        debug_assert_eq!(self.states.len(), 1);
        self.states[0].observe();
        Ok(chosen)
    }

    /// Register a constraint that mentions this cell. Idempotent.
    pub fn add_constraint_ref(&mut self, constraint: ConstraintId) {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
    }

    pub fn constraint_refs(&self) -> &[ConstraintId] {
        &self.constraints
    }
}
