//! The Braggi compiler front-end, assembled.
//!
//! This crate wires the engine crates together behind a [`ParseSession`]:
//! tokens come in through a [`TokenSource`], the grammar compiler seeds an
//! entropy field, the periscope validates constraints under its contracts,
//! and the solver collapses the field to a single derivation or a reported
//! contradiction.

pub mod report;
pub mod session;

pub use report::{CellSummary, ParseReport};
pub use session::ParseSession;

pub use braggi_compiler::{CompileOptions, GrammarCompiler};
pub use braggi_ecs::{Component, ComponentMask, System, World};
pub use braggi_entropy::{
    CellGrid, ConstraintCtx, ConstraintValidator, EntropyCell, EntropyConstraint, EntropyField,
    EntropyState,
};
pub use braggi_error::{BraggiError, ErrorCategory, Result, Severity};
pub use braggi_pattern::{
    GrammarSpec, LibraryBuilder, Pattern, PatternKind, PatternLibrary, PatternSpec,
};
pub use braggi_periscope::{
    Periscope, PeriscopeBuilder, RegionLifetimeContract,
};
pub use braggi_region::{Region, RegionSlice, RegionStats};
pub use braggi_solver::{
    CollapseOutcome, CollapseReport, CollapseStats, DEFAULT_MAX_PASSES, Solver, SolverConfig,
};
pub use braggi_types::{
    CellId, ComponentTypeId, ConstraintId, ConstraintKind, ContractGuarantees, Diagnostic,
    EntityId, FieldId, PatternId, PeriscopeDirection, Regime, RegionId, SourcePos, Token, TokenId,
    TokenKind, TokenSource, VecTokenSource, regime_compatible,
};
