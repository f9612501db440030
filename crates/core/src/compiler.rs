//! ScriptTree -> bytecode.
//!
//! Layout: `u16` version, `u32` body length, name, parameter table, then
//! the root action encoded recursively. The length field is patched last
//! and counts every byte written after it.

use crate::ast::{Action, ParamKind, ParamValue, ScriptTree};
use crate::bytecode::{ticks_from_date, Opcode, ParamType, BYTECODE_VERSION, HEADER_LEN};
use crate::error::CompileError;

/// Compile a tree into a fresh bytecode image. Identical trees always
/// produce identical bytes.
pub fn compile(tree: &ScriptTree) -> Result<Vec<u8>, CompileError> {
    let mut w = Writer::default();
    w.u16(BYTECODE_VERSION);
    let length_at = w.reserve_u32();
    w.string("script name", &tree.name)?;

    w.count(tree.parameters.len(), |count| CompileError::TooManyParameters {
        count,
    })?;
    for param in &tree.parameters {
        w.u8(wire_type(param.kind) as u8);
        w.string("parameter name", &param.name)?;
    }

    write_action(&mut w, &tree.root)?;
    w.patch_length(length_at)?;

    tracing::debug!(name = %tree.name, bytes = w.buf.len(), "compiled group script");
    Ok(w.buf)
}

/// Species identifiers are plain integers on the wire.
pub fn wire_type(kind: ParamKind) -> ParamType {
    match kind {
        ParamKind::Species => ParamType::Int32,
    }
}

pub fn opcode(action: &Action) -> Opcode {
    match action {
        Action::And(_) => Opcode::And,
        Action::BornAfter(_) => Opcode::BornAfter,
        Action::BornBefore(_) => Opcode::BornBefore,
        Action::SpeciesIs(_) => Opcode::SpeciesIs,
    }
}

fn write_action(w: &mut Writer, action: &Action) -> Result<(), CompileError> {
    w.u8(opcode(action) as u8);
    match action {
        Action::And(children) => {
            w.count(children.len(), |count| CompileError::TooManyChildren { count })?;
            for child in children {
                write_action(w, child)?;
            }
        }
        Action::BornAfter(value) | Action::BornBefore(value) | Action::SpeciesIs(value) => {
            write_value(w, value)?;
        }
    }
    Ok(())
}

fn write_value(w: &mut Writer, value: &ParamValue) -> Result<(), CompileError> {
    match value {
        ParamValue::Param(name) => {
            w.u8(ParamType::ParamRef as u8);
            w.string("parameter reference", name)?;
        }
        ParamValue::Date(date) => {
            let ticks = ticks_from_date(*date).ok_or(CompileError::DateOutOfRange { date: *date })?;
            w.u8(ParamType::Date as u8);
            w.buf.extend_from_slice(&ticks.to_be_bytes());
        }
        ParamValue::Species(id) => {
            w.u8(ParamType::Int32 as u8);
            w.buf.extend_from_slice(&id.to_be_bytes());
        }
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Writer
// ──────────────────────────────────────────────

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn reserve_u32(&mut self) -> usize {
        let at = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        at
    }

    fn count(
        &mut self,
        len: usize,
        too_many: impl FnOnce(usize) -> CompileError,
    ) -> Result<(), CompileError> {
        let n = u16::try_from(len).map_err(|_| too_many(len))?;
        self.u16(n);
        Ok(())
    }

    fn string(&mut self, what: &'static str, s: &str) -> Result<(), CompileError> {
        if !s.is_ascii() {
            return Err(CompileError::NonAscii {
                value: s.to_owned(),
            });
        }
        let len = u16::try_from(s.len()).map_err(|_| CompileError::StringTooLong {
            what,
            len: s.len(),
        })?;
        self.u16(len);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn patch_length(&mut self, at: usize) -> Result<(), CompileError> {
        let body = self.buf.len() - at - 4;
        let len = u32::try_from(body).map_err(|_| CompileError::BodyTooLong { len: body })?;
        self.buf[at..at + 4].copy_from_slice(&len.to_be_bytes());
        debug_assert_eq!(at + 4, HEADER_LEN);
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
