//! Bytecode -> [`Program`].
//!
//! Mirrors `groupscript_core::compiler` field for field. Every operand is
//! type-checked against its opcode here, so a loaded program never needs to
//! check types during evaluation.

use groupscript_core::bytecode::{datetime_from_ticks, Opcode, ParamType};

use crate::config::EvaluatorConfig;
use crate::error::FormatError;
use crate::program::{Node, Operand, Parameter, Program};

pub fn decode(bytes: &[u8], config: &EvaluatorConfig) -> Result<Program, FormatError> {
    let mut r = Reader { bytes, pos: 0 };

    let version = r.u16("version")?;
    let supported = config.supported_version();
    if version > supported {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            supported,
        });
    }

    let declared = r.u32("length")?;
    let actual = r.remaining();
    if usize::try_from(declared).map_or(true, |d| d != actual) {
        return Err(FormatError::LengthMismatch { declared, actual });
    }

    let name = r.string("script name")?;
    let parameters = read_parameters(&mut r)?;

    let root_at = r.pos;
    let root = read_node(&mut r, &parameters, 1, config.max_depth)?;
    if !root.opcode().is_block() {
        tracing::debug!(offset = root_at, "rejected bytecode with a leaf main action");
        return Err(FormatError::RootNotBlock {
            opcode: root.opcode(),
        });
    }
    if r.remaining() > 0 {
        return Err(FormatError::TrailingBytes {
            count: r.remaining(),
        });
    }

    tracing::debug!(%name, version, bytes = bytes.len(), "decoded group script");
    Ok(Program {
        version,
        name,
        parameters,
        root,
    })
}

fn read_parameters(r: &mut Reader<'_>) -> Result<Vec<Parameter>, FormatError> {
    let count = r.u16("parameter count")?;
    let mut params: Vec<Parameter> = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let ty = r.param_type()?;
        let name = r.string("parameter name")?;
        if ty == ParamType::ParamRef {
            return Err(FormatError::InvalidParameterType { name, ty });
        }
        if params.iter().any(|p| p.name == name) {
            return Err(FormatError::DuplicateParameter { name });
        }
        params.push(Parameter { name, ty });
    }
    Ok(params)
}

fn read_node(
    r: &mut Reader<'_>,
    params: &[Parameter],
    depth: usize,
    max_depth: usize,
) -> Result<Node, FormatError> {
    if depth > max_depth {
        return Err(FormatError::NestingTooDeep { limit: max_depth });
    }
    let offset = r.pos;
    let byte = r.u8("opcode")?;
    let opcode = match Opcode::try_from(byte) {
        Ok(Opcode::Nonce) | Err(_) => return Err(FormatError::UnknownOpcode { byte, offset }),
        Ok(op) => op,
    };
    let node = match (opcode, opcode.operand_type()) {
        (Opcode::And, _) => {
            let count = r.u16("child count")?;
            let mut children = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                children.push(read_node(r, params, depth + 1, max_depth)?);
            }
            Node::And(children)
        }
        (Opcode::BornAfter, Some(ty)) => Node::BornAfter(read_operand(r, params, opcode, ty)?),
        (Opcode::BornBefore, Some(ty)) => Node::BornBefore(read_operand(r, params, opcode, ty)?),
        (Opcode::SpeciesIs, Some(ty)) => Node::SpeciesIs(read_operand(r, params, opcode, ty)?),
        _ => return Err(FormatError::UnknownOpcode { byte, offset }),
    };
    Ok(node)
}

fn read_operand(
    r: &mut Reader<'_>,
    params: &[Parameter],
    opcode: Opcode,
    expected: ParamType,
) -> Result<Operand, FormatError> {
    let ty = r.param_type()?;
    match ty {
        ParamType::ParamRef => {
            let name = r.string("parameter reference")?;
            let declared = params
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| FormatError::UnknownParameter {
                    opcode,
                    name: name.clone(),
                })?;
            if declared.ty != expected {
                return Err(FormatError::TypeMismatch {
                    opcode,
                    expected,
                    actual: declared.ty,
                });
            }
            Ok(Operand::Param(name))
        }
        _ if ty != expected => Err(FormatError::TypeMismatch {
            opcode,
            expected,
            actual: ty,
        }),
        ParamType::Date => {
            let ticks = u64::from_be_bytes(r.array("date literal")?);
            datetime_from_ticks(ticks)
                .map(Operand::Date)
                .ok_or(FormatError::DateOutOfRange { ticks })
        }
        ParamType::Int32 => Ok(Operand::Int(i32::from_be_bytes(r.array("int literal")?))),
    }
}

// ──────────────────────────────────────────────
// Reader
// ──────────────────────────────────────────────

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::UnexpectedEof {
                offset: self.pos,
                what,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, FormatError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, FormatError> {
        Ok(u16::from_be_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.array(what)?))
    }

    fn param_type(&mut self) -> Result<ParamType, FormatError> {
        let offset = self.pos;
        let byte = self.u8("value type")?;
        ParamType::try_from(byte).map_err(|byte| FormatError::UnknownParamType { byte, offset })
    }

    fn string(&mut self, what: &'static str) -> Result<String, FormatError> {
        let len = self.u16(what)?;
        let offset = self.pos;
        let raw = self.take(usize::from(len), what)?;
        if !raw.is_ascii() {
            return Err(FormatError::InvalidString { offset });
        }
        String::from_utf8(raw.to_vec()).map_err(|_| FormatError::InvalidString { offset })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
