//! Candidate grammatical states.

use braggi_types::PatternId;

/// Probability value meaning "observed": the state survived a collapse.
pub const PROB_CERTAIN: u8 = 100;

/// Probability value meaning "eliminated".
pub const PROB_ELIMINATED: u8 = 0;

/// One candidate interpretation of a cell: a leaf pattern the token at
/// this position could be, weighted by a probability in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropyState {
    pub id: u32,
    /// The pattern this state would collapse the cell to.
    pub state_type: PatternId,
    /// Human-readable derivation label, e.g. `"program/ident"`.
    pub label: Option<String>,
    /// Validator-defined payload; the grammar compiler stores the
    /// superposition alternative index here.
    pub data: u64,
    probability: u8,
}

impl EntropyState {
    pub fn new(id: u32, state_type: PatternId, probability: u8) -> Self {
        Self {
            id,
            state_type,
            label: None,
            data: 0,
            probability: probability.min(PROB_CERTAIN),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_data(mut self, data: u64) -> Self {
        self.data = data;
        self
    }

    pub fn probability(&self) -> u8 {
        self.probability
    }

    pub fn set_probability(&mut self, probability: u8) {
        self.probability = probability.min(PROB_CERTAIN);
    }

    /// Mark the state eliminated. Record stays in its cell so snapshots
    /// and reports can still see it.
    pub fn eliminate(&mut self) {
        self.probability = PROB_ELIMINATED;
    }

    /// Mark the state observed after a collapse.
    pub fn observe(&mut self) {
        self.probability = PROB_CERTAIN;
    }

    pub fn is_eliminated(&self) -> bool {
        self.probability == PROB_ELIMINATED
    }

    /// Certain means fully decided either way: observed or eliminated.
    pub fn is_certain(&self) -> bool {
        self.probability == PROB_ELIMINATED || self.probability == PROB_CERTAIN
    }
}
