//! Runtime form of a decoded script.
//!
//! Mirrors the syntax tree, but every leaf carries its opcode and a fully
//! decoded operand. Built once per evaluator and never mutated.

use std::fmt;

use groupscript_core::{
    Action, Opcode, ParamKind, ParamType, ParamValue, ParameterDeclaration, ScriptTree,
};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// A decoded `PARAM_VALUE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operand {
    Param(String),
    Date(OffsetDateTime),
    Int(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub ty: ParamType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Node {
    And(Vec<Node>),
    BornAfter(Operand),
    BornBefore(Operand),
    SpeciesIs(Operand),
}

impl Node {
    pub fn opcode(&self) -> Opcode {
        match self {
            Node::And(_) => Opcode::And,
            Node::BornAfter(_) => Opcode::BornAfter,
            Node::BornBefore(_) => Opcode::BornBefore,
            Node::SpeciesIs(_) => Opcode::SpeciesIs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    pub version: u16,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub root: Node,
}

impl Program {
    /// Rebuild the syntax tree this program was compiled from.
    ///
    /// `None` when the program uses something source text cannot express:
    /// a parameter that is not Int32-typed, or a date that is not midnight UTC.
    pub fn to_script_tree(&self) -> Option<ScriptTree> {
        let parameters = self
            .parameters
            .iter()
            .map(|p| match p.ty {
                ParamType::Int32 => Some(ParameterDeclaration {
                    name: p.name.clone(),
                    kind: ParamKind::Species,
                }),
                ParamType::Date | ParamType::ParamRef => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some(ScriptTree {
            name: self.name.clone(),
            parameters,
            root: to_action(&self.root)?,
        })
    }
}

fn to_action(node: &Node) -> Option<Action> {
    let action = match node {
        Node::And(children) => {
            Action::And(children.iter().map(to_action).collect::<Option<Vec<_>>>()?)
        }
        Node::BornAfter(op) => Action::BornAfter(to_value(op)?),
        Node::BornBefore(op) => Action::BornBefore(to_value(op)?),
        Node::SpeciesIs(op) => Action::SpeciesIs(to_value(op)?),
    };
    Some(action)
}

fn to_value(operand: &Operand) -> Option<ParamValue> {
    match operand {
        Operand::Param(name) => Some(ParamValue::Param(name.clone())),
        Operand::Int(id) => Some(ParamValue::Species(*id)),
        Operand::Date(at) => {
            let midnight = at.date().midnight().assume_utc();
            (*at == midnight).then(|| ParamValue::Date(at.date()))
        }
    }
}

// ──────────────────────────────────────────────
// Disassembly listing
// ──────────────────────────────────────────────

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version {}", self.version)?;
        writeln!(f, "name {}", self.name)?;
        for p in &self.parameters {
            writeln!(f, "param {} {}", p.ty, p.name)?;
        }
        write_node(f, &self.root, 0)
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match node {
        Node::And(children) => {
            writeln!(f, "{}{} {}", indent, node.opcode(), children.len())?;
            for child in children {
                write_node(f, child, depth + 1)?;
            }
            Ok(())
        }
        Node::BornAfter(op) | Node::BornBefore(op) | Node::SpeciesIs(op) => {
            writeln!(f, "{}{} {}", indent, node.opcode(), OperandListing(op))
        }
    }
}

struct OperandListing<'a>(&'a Operand);

impl fmt::Display for OperandListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Operand::Param(name) => write!(f, "ParamRef {}", name),
            Operand::Int(id) => write!(f, "Int32 {}", id),
            Operand::Date(at) => match at.format(&Rfc3339) {
                Ok(text) => write!(f, "Date {}", text),
                Err(_) => write!(f, "Date {:?}", at),
            },
        }
    }
}
