//! Recursive-descent parser with one token of lookahead.
//!
//! Nested `AND { ... }` blocks are tracked on an explicit stack of open
//! child lists, so block depth never turns into call depth. Depth is still
//! capped, since the finished tree is walked recursively by the compiler.

use time::{Date, Month};

use crate::ast::{Action, ParamKind, ParamValue, ParameterDeclaration, ScriptTree};
use crate::error::{ParseError, Position, SemanticError, SyntaxError};
use crate::lexer::{Lexer, Token, TokenKind, TokenStream};

/// Actions allowed inside an open block.
const IN_BLOCK: &[TokenKind] = &[
    TokenKind::And,
    TokenKind::Born,
    TokenKind::Species,
    TokenKind::RBrace,
];
/// Actions allowed at routine level.
const AT_TOP: &[TokenKind] = &[
    TokenKind::And,
    TokenKind::Born,
    TokenKind::Species,
    TokenKind::End,
];

/// Deepest action nesting accepted by [`parse`], counting the main action
/// as level 1.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parse a full script from any token stream.
pub fn parse<S: TokenStream>(tokens: S) -> Result<ScriptTree, ParseError> {
    parse_with_max_depth(tokens, DEFAULT_MAX_DEPTH)
}

/// Like [`parse`], with a caller-chosen nesting limit.
pub fn parse_with_max_depth<S: TokenStream>(
    tokens: S,
    max_depth: usize,
) -> Result<ScriptTree, ParseError> {
    let tree = Parser::new(tokens, max_depth).parse_script()?;
    tracing::debug!(
        name = %tree.name,
        parameters = tree.parameters.len(),
        "parsed group script"
    );
    Ok(tree)
}

/// Lex and parse `src`.
pub fn parse_source(src: &str) -> Result<ScriptTree, ParseError> {
    parse(Lexer::new(src))
}

pub fn parse_source_with_max_depth(src: &str, max_depth: usize) -> Result<ScriptTree, ParseError> {
    parse_with_max_depth(Lexer::new(src), max_depth)
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<S> {
    tokens: S,
    cur: Token,
    max_depth: usize,
}

impl<S: TokenStream> Parser<S> {
    fn new(mut tokens: S, max_depth: usize) -> Self {
        let cur = tokens.next_token();
        Parser {
            tokens,
            cur,
            max_depth,
        }
    }

    fn peek(&self) -> TokenKind {
        self.cur.kind
    }

    fn advance(&mut self) -> Token {
        let next = self.tokens.next_token();
        std::mem::replace(&mut self.cur, next)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&[kind]))
        }
    }

    /// `expect` for identifiers and date literals, which must carry text.
    fn expect_text(&mut self, kind: TokenKind) -> Result<(String, Position), ParseError> {
        let tok = self.expect(kind)?;
        let position = Position::of(&tok);
        match tok.text {
            Some(text) => Ok((text, position)),
            None => Err(SemanticError::MissingTokenText { kind, position }.into()),
        }
    }

    fn unexpected(&self, expected: &[TokenKind]) -> ParseError {
        SyntaxError::new(&self.cur, expected).into()
    }

    // -- Script -------------------------------------------------

    fn parse_script(&mut self) -> Result<ScriptTree, ParseError> {
        self.expect(TokenKind::Name)?;
        let (name, _) = self.expect_text(TokenKind::Identifier)?;
        let parameters = self.parse_parameters()?;
        let root = self.parse_routine(&parameters)?;
        self.expect(TokenKind::Eof)?;
        Ok(ScriptTree {
            name,
            parameters,
            root,
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<ParameterDeclaration>, ParseError> {
        self.expect(TokenKind::Parameters)?;
        let mut params: Vec<ParameterDeclaration> = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Species => {
                    self.advance();
                    let (name, position) = self.expect_text(TokenKind::Identifier)?;
                    if params.iter().any(|p| p.name == name) {
                        return Err(SemanticError::DuplicateParameter { name, position }.into());
                    }
                    params.push(ParameterDeclaration {
                        name,
                        kind: ParamKind::Species,
                    });
                }
                TokenKind::End => {
                    self.advance();
                    return Ok(params);
                }
                _ => return Err(self.unexpected(&[TokenKind::Species, TokenKind::End])),
            }
        }
    }

    // -- Routine ------------------------------------------------

    fn parse_routine(&mut self, params: &[ParameterDeclaration]) -> Result<Action, ParseError> {
        self.expect(TokenKind::Routine)?;
        let mut open: Vec<Vec<Action>> = Vec::new();
        let mut root: Option<Action> = None;

        loop {
            let position = Position::of(&self.cur);
            if matches!(
                self.peek(),
                TokenKind::And | TokenKind::Born | TokenKind::Species
            ) && open.len() >= self.max_depth
            {
                return Err(SemanticError::NestingTooDeep {
                    limit: self.max_depth,
                    position,
                }
                .into());
            }
            match self.peek() {
                TokenKind::And => {
                    if open.is_empty() && root.is_some() {
                        return Err(SemanticError::DuplicateRootAction { position }.into());
                    }
                    self.advance();
                    self.expect(TokenKind::LBrace)?;
                    open.push(Vec::new());
                }
                TokenKind::RBrace => {
                    self.advance();
                    let children = open
                        .pop()
                        .ok_or(SemanticError::StrayBlockClose { position })?;
                    attach(&mut open, &mut root, Action::And(children), position)?;
                }
                TokenKind::Born | TokenKind::Species => {
                    if open.is_empty() && root.is_some() {
                        return Err(SemanticError::DuplicateRootAction { position }.into());
                    }
                    let clause = self.parse_clause(params)?;
                    attach(&mut open, &mut root, clause, position)?;
                }
                TokenKind::End if open.is_empty() => {
                    self.advance();
                    return root.ok_or_else(|| SemanticError::EmptyRoutine { position }.into());
                }
                _ if open.is_empty() => return Err(self.unexpected(AT_TOP)),
                _ => return Err(self.unexpected(IN_BLOCK)),
            }
        }
    }

    fn parse_clause(&mut self, params: &[ParameterDeclaration]) -> Result<Action, ParseError> {
        let make: fn(ParamValue) -> Action = match self.peek() {
            TokenKind::Born => {
                self.advance();
                let born: fn(ParamValue) -> Action = match self.peek() {
                    TokenKind::After => Action::BornAfter,
                    TokenKind::Before => Action::BornBefore,
                    _ => return Err(self.unexpected(&[TokenKind::After, TokenKind::Before])),
                };
                self.advance();
                born
            }
            TokenKind::Species => {
                self.advance();
                self.expect(TokenKind::Is)?;
                Action::SpeciesIs
            }
            _ => return Err(self.unexpected(&[TokenKind::Born, TokenKind::Species])),
        };
        let value = self.parse_param_value(params)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(make(value))
    }

    fn parse_param_value(
        &mut self,
        params: &[ParameterDeclaration],
    ) -> Result<ParamValue, ParseError> {
        match self.peek() {
            TokenKind::Date => {
                self.advance();
                self.expect(TokenKind::Colon)?;
                let (text, position) = self.expect_text(TokenKind::DateLiteral)?;
                match calendar_date(&text) {
                    Some(date) => Ok(ParamValue::Date(date)),
                    None => Err(SemanticError::InvalidDate { text, position }.into()),
                }
            }
            TokenKind::Param => {
                self.advance();
                self.expect(TokenKind::Colon)?;
                let (name, position) = self.expect_text(TokenKind::Identifier)?;
                if !params.iter().any(|p| p.name == name) {
                    return Err(SemanticError::UndeclaredParameter { name, position }.into());
                }
                Ok(ParamValue::Param(name))
            }
            _ => Err(self.unexpected(&[TokenKind::Date, TokenKind::Param])),
        }
    }
}

/// Put a finished action into the innermost open block, or make it the root.
fn attach(
    open: &mut [Vec<Action>],
    root: &mut Option<Action>,
    action: Action,
    position: Position,
) -> Result<(), ParseError> {
    if let Some(block) = open.last_mut() {
        block.push(action);
        return Ok(());
    }
    if root.is_some() {
        return Err(SemanticError::DuplicateRootAction { position }.into());
    }
    *root = Some(action);
    Ok(())
}

/// `DD/MM/YYYY` text (already shape-checked by the lexer) to a calendar date.
fn calendar_date(text: &str) -> Option<Date> {
    let mut parts = text.split('/');
    let day: u8 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
