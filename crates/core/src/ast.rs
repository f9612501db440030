//! Syntax tree produced by the parser and consumed by the compiler.
//!
//! The tree is built once, never mutated afterwards, and owns its whole
//! action hierarchy.

use serde::{Deserialize, Serialize};
use time::Date;

// ──────────────────────────────────────────────
// Parameters
// ──────────────────────────────────────────────

/// Source-level parameter kind. Only species parameters exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Species,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub name: String,
    pub kind: ParamKind,
}

/// A literal or a reference to a declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    /// `DATE:DD/MM/YYYY`
    Date(Date),
    /// Species identifier literal. Not expressible in source, only via bytecode.
    Species(i32),
    /// `PARAM:name`
    Param(String),
}

// ──────────────────────────────────────────────
// Actions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// All children must match; an empty block matches everything.
    And(Vec<Action>),
    BornAfter(ParamValue),
    BornBefore(ParamValue),
    SpeciesIs(ParamValue),
}

impl Action {
    pub fn is_block(&self) -> bool {
        matches!(self, Action::And(_))
    }
}

// ──────────────────────────────────────────────
// Script
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTree {
    pub name: String,
    pub parameters: Vec<ParameterDeclaration>,
    pub root: Action,
}
