//! The token contract between the external lexer and the WFCCC core.
//!
//! Tokens are owned by the token manager for the lifetime of a parse; the
//! core only ever borrows them through a [`TokenSource`].

use serde::{Deserialize, Serialize};

use crate::TokenId;
use crate::pos::SourcePos;

/// Lexical class of a token. The lexer itself is an external collaborator;
/// this enum is its output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Keyword,
    Punctuation,
    Number,
    StringLit,
    Operator,
    Comment,
    Eof,
    Unknown,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identifier => "identifier",
            Self::Keyword => "keyword",
            Self::Punctuation => "punctuation",
            Self::Number => "number",
            Self::StringLit => "string",
            Self::Operator => "operator",
            Self::Comment => "comment",
            Self::Eof => "eof",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A single lexed token: kind, verbatim text, and source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub kind: TokenKind,
    pub text: String,
    pub pos: SourcePos,
}

impl Token {
    pub fn new(id: TokenId, kind: TokenKind, text: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            id,
            kind,
            text: text.into(),
            pos,
        }
    }
}

/// Read access to the externally owned token stream.
pub trait TokenSource {
    /// Look a token up by id. Ids past the end return `None`.
    fn get_token(&self, id: TokenId) -> Option<&Token>;

    /// One past the largest valid token id.
    fn max_token_id(&self) -> u32;
}

/// The obvious in-memory token source, used by tests and by callers that
/// already hold the whole stream.
#[derive(Debug, Clone, Default)]
pub struct VecTokenSource {
    tokens: Vec<Token>,
}

impl VecTokenSource {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Build a source from `(kind, text)` pairs, synthesising ids and
    /// one-token-per-column positions on line 0.
    pub fn from_pairs(pairs: &[(TokenKind, &str)]) -> Self {
        let mut offset = 0u32;
        let tokens = pairs
            .iter()
            .enumerate()
            .map(|(i, (kind, text))| {
                let len = text.len() as u32;
                let pos = SourcePos::new(0, 0, offset, offset, len);
                offset += len + 1;
                Token::new(TokenId::new(i as u32), *kind, *text, pos)
            })
            .collect();
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

impl TokenSource for VecTokenSource {
    fn get_token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id.index())
    }

    fn max_token_id(&self) -> u32 {
        self.tokens.len() as u32
    }
}
