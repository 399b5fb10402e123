//! Parse session orchestration.

use std::sync::{Arc, Mutex};

use tracing::debug;

use braggi_compiler::{CompileOptions, GrammarCompiler};
use braggi_entropy::ConstraintValidator;
use braggi_error::Result;
use braggi_pattern::PatternLibrary;
use braggi_periscope::PeriscopeBuilder;
use braggi_region::Region;
use braggi_solver::{Solver, SolverConfig};
use braggi_types::{FieldId, Regime, RegionId, Token, TokenId, TokenSource};

use crate::report::ParseReport;

/// Default capacity of the per-parse region backing the periscope world.
const DEFAULT_REGION_CAPACITY: usize = 64 * 1024;

/// One grammar, many parses. Each call to [`ParseSession::parse`] builds a
/// fresh field, periscope, and region, runs the solver, and tears the
/// field down; nothing is shared between parses except the library and
/// the solver configuration.
pub struct ParseSession {
    library: PatternLibrary,
    config: SolverConfig,
    region_capacity: usize,
    next_parse: u32,
}

impl ParseSession {
    /// The library is validated up front; a dangling reference or missing
    /// start pattern fails here rather than mid-parse.
    pub fn new(library: PatternLibrary, config: SolverConfig) -> Result<Self> {
        library.validate()?;
        Ok(Self {
            library,
            config,
            region_capacity: DEFAULT_REGION_CAPACITY,
            next_parse: 0,
        })
    }

    pub fn region_capacity(mut self, capacity: usize) -> Self {
        self.region_capacity = capacity;
        self
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// Run one parse over the source's tokens.
    pub fn parse(&mut self, source: &dyn TokenSource) -> Result<ParseReport> {
        let parse_id = self.next_parse;
        self.next_parse += 1;

        let tokens: Vec<Token> = (0..source.max_token_id())
            .filter_map(|raw| source.get_token(TokenId::new(raw)).cloned())
            .collect();
        debug!(parse_id, tokens = tokens.len(), "parse started");

        // Parse-scoped arena; token texts are interned into it so every
        // borrow the field holds stays inside the parse's own region.
        let mut region = Region::new(RegionId::new(parse_id), self.region_capacity, Regime::Seq);
        for token in &tokens {
            region.strdup(&token.text)?;
        }

        let mut periscope = PeriscopeBuilder::new()
            .entity_capacity(tokens.len().max(16))
            .with_region(region)
            .build()?;
        periscope.sync_tokens(source)?;
        // One system tick: audits the token↔cell mappings just built.
        periscope.world_mut().update(0.0);
        let region_stats = periscope.world().region().map(braggi_region::Region::stats);

        let compiler = GrammarCompiler::new(&self.library);
        let options = CompileOptions {
            field_id: FieldId::new(parse_id),
            source_id: parse_id,
        };
        let mut field = compiler.compile(&tokens, &options)?;

        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let sink_diags = Arc::clone(&diagnostics);
        field.set_sink(Box::new(move |diag| {
            if let Ok(mut collected) = sink_diags.lock() {
                collected.push(diag);
            }
        }));
        let periscope = Arc::new(periscope);
        field.set_dispatch(Arc::clone(&periscope) as Arc<dyn ConstraintValidator>);

        let mut solver = Solver::new(self.config);
        let collapse = solver.collapse(&mut field);
        debug!(parse_id, ok = collapse.is_ok(), "parse finished");

        let cells = ParseReport::cell_summaries(&field);
        field.teardown();
        let diagnostics = diagnostics
            .lock()
            .map(|mut collected| std::mem::take(&mut *collected))
            .unwrap_or_default();

        Ok(ParseReport {
            outcome: collapse.outcome,
            stats: collapse.stats,
            diagnostics,
            cells,
            region: region_stats,
        })
    }
}
