//! The constraint-pattern library: a grammar as structural patterns.
//!
//! Patterns form a DAG. The library is an arena indexed by [`PatternId`];
//! composite patterns hold the ids of their sub-patterns, so sub-patterns
//! can be shared freely and the whole library is destroyed in one pass
//! without recursing. Cycles are expressed through [`PatternKind::Reference`]
//! edges, which store a target *name* and are resolved lazily by the
//! grammar compiler.

pub mod loader;

pub use loader::{GrammarSpec, LibraryBuilder, PatternSpec};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use braggi_error::{BraggiError, Result};
use braggi_types::{ConstraintKind, PatternId, Token, TokenKind};

/// The structural variants a grammar is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Matches one token of `kind`, optionally with exact literal text.
    Token {
        kind: TokenKind,
        text: Option<String>,
    },
    /// Each sub-pattern in order.
    Sequence(Vec<PatternId>),
    /// Ordered choice between alternatives.
    Superposition(Vec<PatternId>),
    /// Zero or more of the inner pattern.
    Repetition(PatternId),
    /// Zero or one of the inner pattern.
    Optional(PatternId),
    /// Names a sub-derivation without changing what it matches.
    Group { label: String, inner: PatternId },
    /// A by-name back-edge, resolved lazily through the library.
    Reference(String),
    /// A non-structural constraint seed with a collapse bias.
    Predicate { kind: ConstraintKind, bias: i8 },
}

/// One named pattern in the library arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    pub kind: PatternKind,
}

impl Pattern {
    /// True iff this is a Token pattern whose kind matches `token` and
    /// whose literal text, when present, equals the token's text.
    pub fn matches(&self, token: &Token) -> bool {
        match &self.kind {
            PatternKind::Token { kind, text } => {
                *kind == token.kind
                    && text.as_ref().is_none_or(|literal| literal == &token.text)
            }
            _ => false,
        }
    }
}

/// Name-indexed arena of patterns plus the designated start pattern.
#[derive(Debug, Default, Clone)]
pub struct PatternLibrary {
    patterns: Vec<Pattern>,
    by_name: HashMap<String, PatternId>,
    start: Option<String>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, name: &str, kind: PatternKind) -> Result<PatternId> {
        if self.by_name.contains_key(name) {
            return Err(BraggiError::DuplicatePattern {
                name: name.to_owned(),
            });
        }
        let id = PatternId::new(self.patterns.len() as u32);
        self.patterns.push(Pattern {
            id,
            name: name.to_owned(),
            kind,
        });
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// A token pattern matching any token of `kind`.
    pub fn token(&mut self, name: &str, kind: TokenKind) -> Result<PatternId> {
        self.intern(name, PatternKind::Token { kind, text: None })
    }

    /// A token pattern matching `kind` with exact literal text.
    pub fn token_text(&mut self, name: &str, kind: TokenKind, text: &str) -> Result<PatternId> {
        self.intern(
            name,
            PatternKind::Token {
                kind,
                text: Some(text.to_owned()),
            },
        )
    }

    pub fn sequence(&mut self, name: &str, elems: Vec<PatternId>) -> Result<PatternId> {
        self.intern(name, PatternKind::Sequence(elems))
    }

    pub fn superposition(&mut self, name: &str, alts: Vec<PatternId>) -> Result<PatternId> {
        self.intern(name, PatternKind::Superposition(alts))
    }

    pub fn repetition(&mut self, name: &str, inner: PatternId) -> Result<PatternId> {
        self.intern(name, PatternKind::Repetition(inner))
    }

    pub fn optional(&mut self, name: &str, inner: PatternId) -> Result<PatternId> {
        self.intern(name, PatternKind::Optional(inner))
    }

    pub fn group(&mut self, name: &str, label: &str, inner: PatternId) -> Result<PatternId> {
        self.intern(
            name,
            PatternKind::Group {
                label: label.to_owned(),
                inner,
            },
        )
    }

    pub fn reference(&mut self, name: &str, target: &str) -> Result<PatternId> {
        self.intern(name, PatternKind::Reference(target.to_owned()))
    }

    pub fn predicate(&mut self, name: &str, kind: ConstraintKind, bias: i8) -> Result<PatternId> {
        self.intern(name, PatternKind::Predicate { kind, bias })
    }

    pub fn get(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(id.index())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Pattern> {
        self.by_name.get(name).and_then(|&id| self.get(id))
    }

    /// Resolve a pattern name to its id, failing with
    /// [`BraggiError::PatternResolution`] on a dangling name.
    pub fn resolve(&self, name: &str) -> Result<PatternId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| BraggiError::PatternResolution {
                name: name.to_owned(),
            })
    }

    /// Designate the start pattern. The name must already be interned.
    pub fn set_start(&mut self, name: &str) -> Result<()> {
        self.resolve(name)?;
        self.start = Some(name.to_owned());
        Ok(())
    }

    pub fn start(&self) -> Result<&Pattern> {
        let name = self
            .start
            .as_deref()
            .ok_or_else(|| BraggiError::internal("pattern library has no start pattern"))?;
        self.get_by_name(name)
            .ok_or_else(|| BraggiError::PatternResolution {
                name: name.to_owned(),
            })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// Check the library invariants: a start pattern is designated and
    /// every `Reference` resolves.
    pub fn validate(&self) -> Result<()> {
        self.start()?;
        for pattern in &self.patterns {
            if let PatternKind::Reference(target) = &pattern.kind {
                self.resolve(target)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use braggi_types::{SourcePos, TokenId};

    use super::*;

    fn tok(kind: TokenKind, text: &str) -> Token {
        Token::new(TokenId::new(0), kind, text, SourcePos::default())
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut lib = PatternLibrary::new();
        lib.token("ident", TokenKind::Identifier).unwrap();
        assert_eq!(
            lib.token("ident", TokenKind::Keyword).unwrap_err(),
            BraggiError::DuplicatePattern {
                name: "ident".to_owned()
            }
        );
    }

    #[test]
    fn token_matching_checks_kind_and_text() {
        let mut lib = PatternLibrary::new();
        let any_kw = lib.token("kw", TokenKind::Keyword).unwrap();
        let ret = lib
            .token_text("kw_return", TokenKind::Keyword, "return")
            .unwrap();

        let any_kw = lib.get(any_kw).unwrap();
        let ret = lib.get(ret).unwrap();
        assert!(any_kw.matches(&tok(TokenKind::Keyword, "while")));
        assert!(ret.matches(&tok(TokenKind::Keyword, "return")));
        assert!(!ret.matches(&tok(TokenKind::Keyword, "break")));
        assert!(!ret.matches(&tok(TokenKind::Identifier, "return")));
    }

    #[test]
    fn composites_never_match_tokens() {
        let mut lib = PatternLibrary::new();
        let ident = lib.token("ident", TokenKind::Identifier).unwrap();
        let seq = lib.sequence("program", vec![ident]).unwrap();
        assert!(!lib.get(seq).unwrap().matches(&tok(TokenKind::Identifier, "x")));
    }

    #[test]
    fn start_must_exist() {
        let mut lib = PatternLibrary::new();
        assert!(lib.set_start("program").is_err());
        let ident = lib.token("ident", TokenKind::Identifier).unwrap();
        lib.sequence("program", vec![ident]).unwrap();
        lib.set_start("program").unwrap();
        assert_eq!(lib.start().unwrap().name, "program");
    }

    #[test]
    fn validate_catches_dangling_references() {
        let mut lib = PatternLibrary::new();
        let ident = lib.token("ident", TokenKind::Identifier).unwrap();
        lib.sequence("program", vec![ident]).unwrap();
        lib.set_start("program").unwrap();
        lib.reference("expr_ref", "expr").unwrap();
        assert_eq!(
            lib.validate().unwrap_err(),
            BraggiError::PatternResolution {
                name: "expr".to_owned()
            }
        );
        lib.token("expr", TokenKind::Number).unwrap();
        lib.validate().unwrap();
    }

    #[test]
    fn shared_subpatterns_resolve_through_one_arena() {
        let mut lib = PatternLibrary::new();
        let ident = lib.token("ident", TokenKind::Identifier).unwrap();
        let a = lib.sequence("a", vec![ident]).unwrap();
        let b = lib.sequence("b", vec![ident, ident]).unwrap();
        assert_ne!(a, b);
        assert_eq!(lib.resolve("a").unwrap(), a);
        assert_eq!(lib.len(), 3);
    }
}
