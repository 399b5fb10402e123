//! The entropy field at the heart of WFCCC parsing.
//!
//! A field holds one [`EntropyCell`] per token position, each carrying a
//! superposition of candidate grammatical states, plus the constraints
//! that relate cells. Constraint application eliminates states; FIFO
//! propagation re-checks constraints around changed cells until a fixed
//! point; the solver collapses whichever cell has the lowest positive
//! entropy and repeats.

pub mod cell;
pub mod constraint;
pub mod field;
pub mod grid;
pub mod state;
pub mod validators;

pub use cell::EntropyCell;
pub use constraint::{
    Application, ConstraintCtx, ConstraintValidator, EntropyConstraint,
};
pub use field::EntropyField;
pub use grid::{CellGrid, DiagnosticSink, GridSnapshot};
pub use state::EntropyState;
