//! Wire-level vocabulary shared by the compiler and the decoder.
//!
//! All multi-byte integers are big-endian. Strings are prefixed by a `u16`
//! byte count and carry no terminator.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Highest bytecode version this crate produces and understands.
pub const BYTECODE_VERSION: u16 = 1;

/// Size of the fixed header: version + length.
pub const HEADER_LEN: usize = 6;

/// One action tag in the encoded tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Reserved, never emitted.
    Nonce = 0,
    And = 1,
    BornAfter = 2,
    BornBefore = 3,
    SpeciesIs = 4,
}

impl Opcode {
    /// The operand type a leaf opcode requires. `None` for blocks.
    pub fn operand_type(self) -> Option<ParamType> {
        match self {
            Opcode::BornAfter | Opcode::BornBefore => Some(ParamType::Date),
            Opcode::SpeciesIs => Some(ParamType::Int32),
            Opcode::Nonce | Opcode::And => None,
        }
    }

    pub fn is_block(self) -> bool {
        self == Opcode::And
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Opcode::Nonce => "NONCE",
            Opcode::And => "AND",
            Opcode::BornAfter => "BORN_AFTER",
            Opcode::BornBefore => "BORN_BEFORE",
            Opcode::SpeciesIs => "SPECIES_IS",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Opcode::Nonce),
            1 => Ok(Opcode::And),
            2 => Ok(Opcode::BornAfter),
            3 => Ok(Opcode::BornBefore),
            4 => Ok(Opcode::SpeciesIs),
            other => Err(other),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag for parameter declarations and operand values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParamType {
    ParamRef = 0,
    Date = 1,
    Int32 = 2,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::ParamRef => "ParamRef",
            ParamType::Date => "Date",
            ParamType::Int32 => "Int32",
        }
    }
}

impl TryFrom<u8> for ParamType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(ParamType::ParamRef),
            1 => Ok(ParamType::Date),
            2 => Ok(ParamType::Int32),
            other => Err(other),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Ticks
// ──────────────────────────────────────────────

/// Ticks are 100 ns intervals since 0001-01-01T00:00:00 UTC.
const NANOS_PER_TICK: i128 = 100;
/// Tick count at 1970-01-01T00:00:00 UTC.
pub const UNIX_EPOCH_TICKS: i128 = 621_355_968_000_000_000;

/// `None` if the instant precedes year 1.
pub fn ticks_from_datetime(at: OffsetDateTime) -> Option<u64> {
    let ticks = at.unix_timestamp_nanos().div_euclid(NANOS_PER_TICK) + UNIX_EPOCH_TICKS;
    u64::try_from(ticks).ok()
}

/// Midnight UTC of `date`.
pub fn ticks_from_date(date: Date) -> Option<u64> {
    ticks_from_datetime(date.midnight().assume_utc())
}

/// `None` if the tick count lies outside the representable calendar range.
pub fn datetime_from_ticks(ticks: u64) -> Option<OffsetDateTime> {
    let nanos = (i128::from(ticks) - UNIX_EPOCH_TICKS) * NANOS_PER_TICK;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}
