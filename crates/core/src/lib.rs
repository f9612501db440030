//! groupscript-core: front end of the group script language.
//!
//! Turns `.gs` source text into a [`ScriptTree`] and compiles that tree
//! into the versioned big-endian bytecode image consumed by
//! `groupscript-eval`.
//!
//! # Public API
//!
//! - [`Lexer`] / [`lex()`] -- source text to tokens
//! - [`parse()`] / [`parse_source()`] -- tokens to [`ScriptTree`]
//! - [`compile()`] -- [`ScriptTree`] to bytecode
//! - [`bytecode`] -- opcode, wire type and tick constants shared with the decoder

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Action, ParamKind, ParamValue, ParameterDeclaration, ScriptTree};
pub use bytecode::{Opcode, ParamType, BYTECODE_VERSION};
pub use error::{CompileError, ParseError, SemanticError, SyntaxError};
pub use lexer::{Lexer, Token, TokenKind, TokenList, TokenStream};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use compiler::compile;
pub use lexer::lex;
pub use parser::{
    parse, parse_source, parse_source_with_max_depth, parse_with_max_depth, DEFAULT_MAX_DEPTH,
};
