use groupscript_core::{CompileError, Opcode, ParamType, ParseError};

/// A bytecode image that cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("bytecode version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("bytecode truncated at offset {offset} while reading {what}")]
    UnexpectedEof { offset: usize, what: &'static str },

    #[error("length field declares {declared} bytes but {actual} follow")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("{count} unread bytes after the main action")]
    TrailingBytes { count: usize },

    #[error("unknown opcode {byte} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("unknown value type {byte} at offset {offset}")]
    UnknownParamType { byte: u8, offset: usize },

    #[error("the main action must be a block action, found {opcode}")]
    RootNotBlock { opcode: Opcode },

    #[error("{opcode} expects a {expected} value, found {actual}")]
    TypeMismatch {
        opcode: Opcode,
        expected: ParamType,
        actual: ParamType,
    },

    #[error("{opcode} references undeclared parameter '{name}'")]
    UnknownParameter { opcode: Opcode, name: String },

    #[error("parameter '{name}' is declared more than once")]
    DuplicateParameter { name: String },

    #[error("parameter '{name}' cannot be declared with type {ty}")]
    InvalidParameterType { name: String, ty: ParamType },

    #[error("string at offset {offset} is not ASCII")]
    InvalidString { offset: usize },

    #[error("tick count {ticks} is outside the supported date range")]
    DateOutOfRange { ticks: u64 },

    #[error("actions are nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

/// The fact record could not supply a required fact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactError {
    #[error("no '{event}' life event recorded")]
    MissingEvent { event: String },

    #[error("life event '{event}' has no '{field}' field")]
    MissingField { event: String, field: String },

    #[error("life event '{event}' field '{field}' is not a date: '{value}'")]
    InvalidValue {
        event: String,
        field: String,
        value: String,
    },

    #[error("fact provider error: {0}")]
    Provider(String),
}

/// Failure while evaluating a loaded program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("missing binding for parameter '{name}' of type {ty}")]
    MissingBinding { name: String, ty: ParamType },

    #[error("binding for parameter '{name}' must be {expected}, got {actual}")]
    BindingType {
        name: String,
        expected: ParamType,
        actual: ParamType,
    },

    #[error("{opcode} expects a {expected} value, found {actual}")]
    OperandType {
        opcode: Opcode,
        expected: ParamType,
        actual: ParamType,
    },

    #[error(transparent)]
    Fact(#[from] FactError),

    #[error("invalid bindings: {message}")]
    InvalidBindings { message: String },
}

/// Any failure on the source-text construction path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid evaluator config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid evaluator config: {message}")]
    Invalid { message: String },
}
