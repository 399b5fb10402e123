//! The grammar compiler: turns a pattern library and a token stream into
//! a seeded entropy field.
//!
//! The compiler walks the start pattern once (resolving `Reference` edges
//! lazily through the library and guarding against cycles), computing for
//! each composite its first/last leaf sets, nullability, and the legal
//! consecutive-leaf pairs. It then allocates one cell per token, seeds
//! every cell with a state per kind-matching Token pattern in the library,
//! and emits the SYNTAX constraints: per-cell token match, field
//! boundaries, per-pair adjacency, one mutual exclusion per superposition,
//! and one cardinality bound per repetition or optional span. The compiler
//! writes no global state; everything lands in the returned field.

pub mod analyze;

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use braggi_entropy::validators::{
    AdjacencyValidator, BiasValidator, CardinalityValidator, ExclusionValidator,
    KeepStatesValidator, PatternSetValidator,
};
use braggi_entropy::{EntropyField, EntropyState};
use braggi_error::{BraggiError, Result};
use braggi_pattern::{PatternKind, PatternLibrary};
use braggi_types::{CellId, ConstraintKind, FieldId, Token};

use crate::analyze::Analyzer;

/// Probability every seeded state starts with: maximally uncertain.
pub const INITIAL_PROBABILITY: u8 = 50;

/// Identity of the field a compilation produces.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub field_id: FieldId,
    pub source_id: u32,
}

/// Compiles one library against token streams. The compiler is pure with
/// respect to the fields it produces.
pub struct GrammarCompiler<'lib> {
    library: &'lib PatternLibrary,
}

impl<'lib> GrammarCompiler<'lib> {
    pub fn new(library: &'lib PatternLibrary) -> Self {
        Self { library }
    }

    pub fn compile(&self, tokens: &[Token], options: &CompileOptions) -> Result<EntropyField> {
        self.library.validate()?;
        let start = self.library.start()?;
        let mut analyzer = Analyzer::new(self.library);
        let start_shape = analyzer.shape(start.id, "")?;

        let mut field = EntropyField::new(options.field_id, options.source_id);

        // Cells, seeded states, and per-cell token-match constraints.
        let mut next_state = 0u32;
        for token in tokens {
            let cid = field.add_cell(token.pos);
            let mut keep: SmallVec<[u32; 8]> = SmallVec::new();
            let cell = field
                .grid_mut()
                .cell_mut(cid)
                .ok_or_else(|| BraggiError::internal("freshly added cell missing"))?;
            for pattern in self.library.iter() {
                let PatternKind::Token { kind, .. } = &pattern.kind else {
                    continue;
                };
                if *kind != token.kind {
                    continue;
                }
                let state_id = next_state;
                next_state += 1;
                let label = match analyzer.parent_of(pattern.id) {
                    Some(parent) if !parent.is_empty() => {
                        format!("{parent}/{}", pattern.name)
                    }
                    _ => pattern.name.clone(),
                };
                cell.add_state(
                    EntropyState::new(state_id, pattern.id, INITIAL_PROBABILITY)
                        .with_label(label)
                        .with_data(u64::from(pattern.id.get())),
                );
                if pattern.matches(token) {
                    keep.push(state_id);
                }
            }
            field.add_constraint(
                ConstraintKind::Syntax,
                [cid],
                Arc::new(KeepStatesValidator::new(cid, keep)),
                format!("token match at cell {cid}"),
            );
        }

        // Field boundaries: the first cell must hold a first of the start
        // pattern, the final cell one of its lasts.
        if !tokens.is_empty() {
            let first_cell = CellId::new(0);
            let last_cell = CellId::new(tokens.len() as u32 - 1);
            field.add_constraint(
                ConstraintKind::Syntax,
                [first_cell],
                Arc::new(PatternSetValidator::new(
                    first_cell,
                    Arc::new(start_shape.firsts.clone()),
                )),
                "start boundary",
            );
            field.add_constraint(
                ConstraintKind::Syntax,
                [last_cell],
                Arc::new(PatternSetValidator::new(
                    last_cell,
                    Arc::new(start_shape.lasts.clone()),
                )),
                "end boundary",
            );
        }

        // Adjacency between every pair of consecutive cells, sharing one
        // follower set.
        if tokens.len() >= 2 {
            let followers = Arc::new(analyzer.take_followers());
            for i in 0..tokens.len() - 1 {
                let left = CellId::new(i as u32);
                let right = CellId::new(i as u32 + 1);
                field.add_constraint(
                    ConstraintKind::Syntax,
                    [left, right],
                    Arc::new(AdjacencyValidator::new(left, right, Arc::clone(&followers))),
                    format!("adjacency {left}->{right}"),
                );
            }
        }

        // One mutual-exclusion constraint per superposition and one
        // cardinality bound per repetition/optional, spanning every cell.
        let all_cells: Vec<CellId> = (0..tokens.len()).map(|i| CellId::new(i as u32)).collect();
        if !all_cells.is_empty() {
            for (name, members) in analyzer.take_exclusions() {
                field.add_constraint(
                    ConstraintKind::Syntax,
                    all_cells.iter().copied(),
                    Arc::new(ExclusionValidator::new(Arc::new(members))),
                    format!("superposition {name}"),
                );
            }
            for (name, leaves, min, max) in analyzer.take_cardinalities() {
                field.add_constraint(
                    ConstraintKind::Syntax,
                    all_cells.iter().copied(),
                    Arc::new(CardinalityValidator::new(Arc::new(leaves), min, max)),
                    format!("cardinality {name}"),
                );
            }
            for (name, kind, bias, leaves) in analyzer.take_biases() {
                let weight =
                    (i16::from(INITIAL_PROBABILITY) + i16::from(bias)).clamp(1, 100) as u8;
                field.add_constraint(
                    kind,
                    all_cells.iter().copied(),
                    Arc::new(BiasValidator::new(Arc::new(leaves), weight)),
                    format!("bias {name}"),
                );
            }
        }

        debug!(
            cells = field.grid().len(),
            constraints = field.constraints().len(),
            start = %start.name,
            "grammar compiled"
        );
        Ok(field)
    }
}
