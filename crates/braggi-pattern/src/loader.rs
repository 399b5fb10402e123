//! Declarative grammar loading.
//!
//! A grammar arrives as a start-pattern name plus a sequence of named
//! pattern specs, either built in code or deserialised from JSON. Specs
//! reference each other by name in any order; the builder interns leaves
//! first, then composites as their children become available, and bridges
//! whatever remains (mutual recursion) with `Reference` patterns that the
//! grammar compiler resolves lazily.

use serde::{Deserialize, Serialize};
use tracing::debug;

use braggi_error::{BraggiError, Result};
use braggi_types::{ConstraintKind, PatternId, TokenKind};

use crate::{PatternKind, PatternLibrary};

/// One named pattern, as written in a grammar description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternSpec {
    Token {
        name: String,
        token: TokenKind,
        #[serde(default)]
        text: Option<String>,
    },
    Sequence {
        name: String,
        elements: Vec<String>,
    },
    Superposition {
        name: String,
        alternatives: Vec<String>,
    },
    Repetition {
        name: String,
        inner: String,
    },
    Optional {
        name: String,
        inner: String,
    },
    Group {
        name: String,
        label: String,
        inner: String,
    },
    Reference {
        name: String,
        target: String,
    },
    Predicate {
        name: String,
        constraint: ConstraintKind,
        #[serde(default)]
        bias: i8,
    },
}

impl PatternSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Token { name, .. }
            | Self::Sequence { name, .. }
            | Self::Superposition { name, .. }
            | Self::Repetition { name, .. }
            | Self::Optional { name, .. }
            | Self::Group { name, .. }
            | Self::Reference { name, .. }
            | Self::Predicate { name, .. } => name,
        }
    }

    fn children(&self) -> Vec<&str> {
        match self {
            Self::Token { .. } | Self::Reference { .. } | Self::Predicate { .. } => Vec::new(),
            Self::Sequence { elements, .. } => elements.iter().map(String::as_str).collect(),
            Self::Superposition { alternatives, .. } => {
                alternatives.iter().map(String::as_str).collect()
            }
            Self::Repetition { inner, .. }
            | Self::Optional { inner, .. }
            | Self::Group { inner, .. } => vec![inner.as_str()],
        }
    }
}

/// A whole grammar: its start pattern and every named pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarSpec {
    pub start: String,
    pub patterns: Vec<PatternSpec>,
}

/// Assembles a [`PatternLibrary`] from named specs.
#[derive(Debug)]
pub struct LibraryBuilder {
    start: String,
    specs: Vec<PatternSpec>,
}

impl LibraryBuilder {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            specs: Vec::new(),
        }
    }

    pub fn from_spec(spec: GrammarSpec) -> Self {
        Self {
            start: spec.start,
            specs: spec.patterns,
        }
    }

    /// Parse a JSON grammar description.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: GrammarSpec = serde_json::from_str(json)
            .map_err(|e| BraggiError::internal(format!("grammar deserialisation failed: {e}")))?;
        Ok(Self::from_spec(spec))
    }

    pub fn pattern(mut self, spec: PatternSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn patterns(mut self, specs: impl IntoIterator<Item = PatternSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Intern every spec and validate the result.
    pub fn build(self) -> Result<PatternLibrary> {
        let mut library = PatternLibrary::new();

        // Leaves first; they have no children.
        let mut pending: Vec<&PatternSpec> = Vec::new();
        for spec in &self.specs {
            match spec {
                PatternSpec::Token { name, token, text } => {
                    match text {
                        Some(text) => library.token_text(name, *token, text)?,
                        None => library.token(name, *token)?,
                    };
                }
                PatternSpec::Reference { name, target } => {
                    library.reference(name, target)?;
                }
                PatternSpec::Predicate {
                    name,
                    constraint,
                    bias,
                } => {
                    library.predicate(name, *constraint, *bias)?;
                }
                other => pending.push(other),
            }
        }

        // Composites, as their children appear. A round with no progress
        // means mutual recursion (or a missing name): bridge every
        // unresolved child that has a spec with a Reference the grammar
        // compiler resolves lazily, then intern the rest through the
        // bridges. A child with no spec fails resolution there.
        loop {
            let mut next_round = Vec::with_capacity(pending.len());
            let mut progressed = false;
            for spec in pending {
                let ready = spec
                    .children()
                    .iter()
                    .all(|child| library.get_by_name(child).is_some());
                if ready {
                    Self::intern_composite(&mut library, spec)?;
                    progressed = true;
                } else {
                    next_round.push(spec);
                }
            }
            pending = next_round;
            if pending.is_empty() {
                break;
            }
            if progressed {
                continue;
            }
            for spec in &pending {
                for child in spec.children() {
                    let bridge = format!("__ref_{child}");
                    if library.get_by_name(child).is_none()
                        && library.get_by_name(&bridge).is_none()
                        && self.specs.iter().any(|s| s.name() == child)
                    {
                        library.reference(&bridge, child)?;
                    }
                }
            }
            for spec in pending {
                Self::intern_composite(&mut library, spec)?;
            }
            break;
        }

        library.set_start(&self.start)?;
        library.validate()?;
        debug!(patterns = library.len(), start = %self.start, "grammar loaded");
        Ok(library)
    }

    fn child_id(library: &PatternLibrary, child: &str) -> Result<PatternId> {
        if let Some(pattern) = library.get_by_name(child) {
            return Ok(pattern.id);
        }
        let bridge = format!("__ref_{child}");
        library
            .get_by_name(&bridge)
            .map(|p| p.id)
            .ok_or_else(|| BraggiError::PatternResolution {
                name: child.to_owned(),
            })
    }

    fn intern_composite(library: &mut PatternLibrary, spec: &PatternSpec) -> Result<()> {
        match spec {
            PatternSpec::Sequence { name, elements } => {
                let ids = elements
                    .iter()
                    .map(|c| Self::child_id(library, c))
                    .collect::<Result<Vec<_>>>()?;
                library.sequence(name, ids)?;
            }
            PatternSpec::Superposition { name, alternatives } => {
                let ids = alternatives
                    .iter()
                    .map(|c| Self::child_id(library, c))
                    .collect::<Result<Vec<_>>>()?;
                library.superposition(name, ids)?;
            }
            PatternSpec::Repetition { name, inner } => {
                let id = Self::child_id(library, inner)?;
                library.repetition(name, id)?;
            }
            PatternSpec::Optional { name, inner } => {
                let id = Self::child_id(library, inner)?;
                library.optional(name, id)?;
            }
            PatternSpec::Group { name, label, inner } => {
                let id = Self::child_id(library, inner)?;
                library.group(name, label, id)?;
            }
            PatternSpec::Token { .. }
            | PatternSpec::Reference { .. }
            | PatternSpec::Predicate { .. } => {
                return Err(BraggiError::internal("leaf spec routed to composite pass"));
            }
        }
        Ok(())
    }
}
