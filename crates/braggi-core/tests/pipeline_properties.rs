//! Property-style checks over the whole pipeline.

use proptest::prelude::*;

use braggi_core::{
    CollapseOutcome, ParseSession, PatternLibrary, SolverConfig, TokenKind, VecTokenSource,
};

fn expression_library() -> PatternLibrary {
    let mut lib = PatternLibrary::new();
    let number = lib.token("number", TokenKind::Number).unwrap();
    let plus = lib.token_text("plus", TokenKind::Operator, "+").unwrap();
    let pair = lib.sequence("pair", vec![plus, number]).unwrap();
    let tail = lib.repetition("tail", pair).unwrap();
    lib.sequence("expr", vec![number, tail]).unwrap();
    lib.set_start("expr").unwrap();
    lib
}

fn alternating_stream(terms: usize, trailing_operator: bool) -> VecTokenSource {
    let mut pairs: Vec<(TokenKind, &str)> = Vec::new();
    for i in 0..terms {
        if i > 0 {
            pairs.push((TokenKind::Operator, "+"));
        }
        pairs.push((TokenKind::Number, "1"));
    }
    if trailing_operator {
        pairs.push((TokenKind::Operator, "+"));
    }
    VecTokenSource::from_pairs(&pairs)
}

proptest! {
    /// Any well-formed alternating stream parses, never backtracks, and
    /// leaves every cell on exactly one state.
    #[test]
    fn prop_well_formed_streams_collapse(terms in 1usize..24) {
        let mut session =
            ParseSession::new(expression_library(), SolverConfig::default()).unwrap();
        let source = alternating_stream(terms, false);
        let report = session.parse(&source).unwrap();
        prop_assert!(report.is_ok(), "{:?}", report.outcome);
        prop_assert_eq!(report.stats.backtracks, 0);
        prop_assert!(report.cells.iter().all(|c| c.live_states == 1));
    }

    /// A trailing operator always contradicts, at the final cell.
    #[test]
    fn prop_trailing_operator_contradicts(terms in 1usize..24) {
        let mut session =
            ParseSession::new(expression_library(), SolverConfig::default()).unwrap();
        let source = alternating_stream(terms, true);
        let report = session.parse(&source).unwrap();
        let last = source.tokens().len() as u32 - 1;
        match &report.outcome {
            CollapseOutcome::Contradiction { cell, .. } => {
                prop_assert_eq!(cell.get(), last);
            }
            other => prop_assert!(false, "expected contradiction, got {other:?}"),
        }
    }

    /// State counts in the report never exceed what seeding produced:
    /// for this grammar each cell seeds exactly one kind-matching state.
    #[test]
    fn prop_counts_monotonic_from_seed(terms in 1usize..16) {
        let mut session =
            ParseSession::new(expression_library(), SolverConfig::default()).unwrap();
        let source = alternating_stream(terms, false);
        let report = session.parse(&source).unwrap();
        prop_assert!(report.cells.iter().all(|c| c.live_states <= 1));
    }
}
