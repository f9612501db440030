//! Group script evaluator -- loads bytecode produced by `groupscript-core`
//! and decides whether a fact record belongs to the group it describes.
//!
//! The evaluator consumes bytecode (not raw source), checks every operand
//! against its opcode while decoding, and evaluates the resulting
//! [`Program`] against a [`FactProvider`] and caller-supplied [`Bindings`].

pub mod bindings;
pub mod config;
pub mod decode;
pub mod error;
pub mod evaluator;
pub mod fact;
pub mod program;

pub use bindings::{BindingValue, Bindings};
pub use config::EvaluatorConfig;
pub use decode::decode;
pub use error::{ConfigError, EvalError, FactError, FormatError, ScriptError};
pub use evaluator::Evaluator;
pub use fact::{Animal, FactProvider, LifeEvent};
pub use program::{Node, Operand, Parameter, Program};
