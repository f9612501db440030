use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::lexer::{Token, TokenKind};

/// Zero-based source position; displayed one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn of(token: &Token) -> Self {
        Position {
            line: token.line,
            column: token.column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line + 1, self.column + 1)
    }
}

/// The parser met a token it had no rule for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error at {position}: unexpected {found}{}, expected {}", found_text(.text), expected_list(.expected))]
pub struct SyntaxError {
    pub position: Position,
    pub found: TokenKind,
    pub text: Option<String>,
    pub expected: Vec<TokenKind>,
}

impl SyntaxError {
    pub fn new(token: &Token, expected: &[TokenKind]) -> Self {
        SyntaxError {
            position: Position::of(token),
            found: token.kind,
            text: token.text.clone(),
            expected: expected.to_vec(),
        }
    }
}

fn found_text(text: &Option<String>) -> String {
    match text {
        Some(t) => format!(" '{}'", t),
        None => String::new(),
    }
}

fn expected_list(expected: &[TokenKind]) -> String {
    match expected {
        [] => "nothing".to_owned(),
        [one] => one.to_string(),
        many => {
            let names: Vec<&str> = many.iter().map(TokenKind::as_str).collect();
            format!("one of {}", names.join(", "))
        }
    }
}

/// Well-formed tokens that do not make a valid script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticError {
    #[error("{position}: There can only be one top-level action")]
    DuplicateRootAction { position: Position },

    #[error("{position}: '}}' does not close any open block")]
    StrayBlockClose { position: Position },

    #[error("{position}: routine has no action")]
    EmptyRoutine { position: Position },

    #[error("{position}: parameter '{name}' is declared more than once")]
    DuplicateParameter { name: String, position: Position },

    #[error("{position}: parameter '{name}' is not declared")]
    UndeclaredParameter { name: String, position: Position },

    #[error("{position}: '{text}' is not a calendar date")]
    InvalidDate { text: String, position: Position },

    #[error("{position}: actions nest deeper than {limit} levels")]
    NestingTooDeep { limit: usize, position: Position },

    #[error("{position}: {kind} token carries no text")]
    MissingTokenText { kind: TokenKind, position: Position },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Syntax(e) => e.position,
            ParseError::Semantic(e) => match e {
                SemanticError::DuplicateRootAction { position }
                | SemanticError::StrayBlockClose { position }
                | SemanticError::EmptyRoutine { position }
                | SemanticError::DuplicateParameter { position, .. }
                | SemanticError::UndeclaredParameter { position, .. }
                | SemanticError::InvalidDate { position, .. }
                | SemanticError::NestingTooDeep { position, .. }
                | SemanticError::MissingTokenText { position, .. } => *position,
            },
        }
    }
}

/// A tree that cannot be represented in the bytecode format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{what} is {len} bytes long, the limit is 65535")]
    StringTooLong { what: &'static str, len: usize },

    #[error("'{value}' contains non-ASCII characters")]
    NonAscii { value: String },

    #[error("{count} parameters declared, the limit is 65535")]
    TooManyParameters { count: usize },

    #[error("AND block has {count} children, the limit is 65535")]
    TooManyChildren { count: usize },

    #[error("compiled body is {len} bytes long, the limit is 4294967295")]
    BodyTooLong { len: usize },

    #[error("date {date} cannot be encoded as ticks")]
    DateOutOfRange { date: Date },
}
