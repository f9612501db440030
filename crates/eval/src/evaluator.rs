//! Loads a program and decides group membership.

use groupscript_core::{compile, parse_source_with_max_depth, Opcode, ParamType};
use time::OffsetDateTime;

use crate::bindings::{BindingValue, Bindings};
use crate::config::EvaluatorConfig;
use crate::decode::decode;
use crate::error::{EvalError, FormatError, ScriptError};
use crate::fact::FactProvider;
use crate::program::{Node, Operand, Program};

/// A loaded, immutable group script.
///
/// Construction always goes through the bytecode decoder, including from
/// source text, so what runs is exactly what the binary format can carry.
#[derive(Debug, Clone)]
pub struct Evaluator {
    program: Program,
}

impl Evaluator {
    pub fn from_bytecode(bytes: &[u8]) -> Result<Self, FormatError> {
        Self::from_bytecode_with_config(bytes, &EvaluatorConfig::default())
    }

    pub fn from_bytecode_with_config(
        bytes: &[u8],
        config: &EvaluatorConfig,
    ) -> Result<Self, FormatError> {
        let program = decode(bytes, config)?;
        Ok(Evaluator { program })
    }

    /// Lex, parse, compile and decode `src`. `config.max_depth` also bounds
    /// nesting in the parser.
    pub fn from_source(src: &str) -> Result<Self, ScriptError> {
        Self::from_source_with_config(src, &EvaluatorConfig::default())
    }

    pub fn from_source_with_config(
        src: &str,
        config: &EvaluatorConfig,
    ) -> Result<Self, ScriptError> {
        let tree = parse_source_with_max_depth(src, config.max_depth)?;
        let bytes = compile(&tree)?;
        Ok(Self::from_bytecode_with_config(&bytes, config)?)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Does `fact` belong to the group under `bindings`?
    ///
    /// Every declared parameter needs a binding of the matching type;
    /// bindings for undeclared names are ignored.
    pub fn matches<F: FactProvider + ?Sized>(
        &self,
        fact: &F,
        bindings: &Bindings,
    ) -> Result<bool, EvalError> {
        for param in &self.program.parameters {
            let value = bindings
                .get(&param.name)
                .ok_or_else(|| EvalError::MissingBinding {
                    name: param.name.clone(),
                    ty: param.ty,
                })?;
            if value.param_type() != param.ty {
                return Err(EvalError::BindingType {
                    name: param.name.clone(),
                    expected: param.ty,
                    actual: value.param_type(),
                });
            }
        }

        let mut run = Run {
            fact,
            bindings,
            date_of_birth: None,
        };
        let matched = run.eval(&self.program.root)?;
        tracing::debug!(script = %self.program.name, matched, "evaluated group script");
        Ok(matched)
    }
}

// ──────────────────────────────────────────────
// Execution
// ──────────────────────────────────────────────

/// Per-call state. The date of birth is fetched at most once.
struct Run<'a, F: ?Sized> {
    fact: &'a F,
    bindings: &'a Bindings,
    date_of_birth: Option<OffsetDateTime>,
}

impl<F: FactProvider + ?Sized> Run<'_, F> {
    fn eval(&mut self, node: &Node) -> Result<bool, EvalError> {
        let result = match node {
            Node::And(children) => {
                for child in children {
                    if !self.eval(child)? {
                        return Ok(false);
                    }
                }
                true
            }
            Node::BornAfter(operand) => {
                let bound = self.instant(Opcode::BornAfter, operand)?;
                self.date_of_birth()? > bound
            }
            Node::BornBefore(operand) => {
                let bound = self.instant(Opcode::BornBefore, operand)?;
                self.date_of_birth()? < bound
            }
            Node::SpeciesIs(operand) => {
                let species = self.int(Opcode::SpeciesIs, operand)?;
                self.fact.species_id() == species
            }
        };
        tracing::trace!(opcode = %node.opcode(), result, "evaluated action");
        Ok(result)
    }

    fn date_of_birth(&mut self) -> Result<OffsetDateTime, EvalError> {
        if let Some(at) = self.date_of_birth {
            return Ok(at);
        }
        let at = self.fact.date_of_birth()?;
        self.date_of_birth = Some(at);
        Ok(at)
    }

    fn resolve(&self, operand: &Operand, ty: ParamType) -> Result<BindingValue, EvalError> {
        match operand {
            Operand::Int(v) => Ok(BindingValue::Int(*v)),
            Operand::Date(at) => Ok(BindingValue::Date(*at)),
            // `matches` has already checked every declared binding.
            Operand::Param(name) => {
                self.bindings
                    .get(name)
                    .ok_or_else(|| EvalError::MissingBinding {
                        name: name.clone(),
                        ty,
                    })
            }
        }
    }

    fn int(&self, opcode: Opcode, operand: &Operand) -> Result<i32, EvalError> {
        match self.resolve(operand, ParamType::Int32)? {
            BindingValue::Int(v) => Ok(v),
            other => Err(EvalError::OperandType {
                opcode,
                expected: ParamType::Int32,
                actual: other.param_type(),
            }),
        }
    }

    fn instant(&self, opcode: Opcode, operand: &Operand) -> Result<OffsetDateTime, EvalError> {
        match self.resolve(operand, ParamType::Date)? {
            BindingValue::Date(at) => Ok(at),
            other => Err(EvalError::OperandType {
                opcode,
                expected: ParamType::Date,
                actual: other.param_type(),
            }),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactError;
    use crate::fact::Animal;
    use groupscript_core::{ParseError, SemanticError};
    use time::macros::{date, datetime};

    const EXAMPLE: &str = r#"
NAME Born2019BySpecies

PARAMETERS
    SPECIES species
END

ROUTINE
    AND
    {
        BORN AFTER  DATE:01/01/2019;
        BORN BEFORE DATE:01/01/2020;
        SPECIES IS  PARAM:species;
    }
END
"#;

    fn script(params: &str, routine: &str) -> Evaluator {
        Evaluator::from_source(&format!(
            "NAME t PARAMETERS {} END ROUTINE {} END",
            params, routine
        ))
        .unwrap()
    }

    /// Counts how often the date of birth is requested.
    struct Counting {
        species: i32,
        born: OffsetDateTime,
        calls: std::cell::Cell<usize>,
    }

    impl FactProvider for Counting {
        fn species_id(&self) -> i32 {
            self.species
        }

        fn date_of_birth(&self) -> Result<OffsetDateTime, FactError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.born)
        }
    }

    struct NoBirth;

    impl FactProvider for NoBirth {
        fn species_id(&self) -> i32 {
            1
        }

        fn date_of_birth(&self) -> Result<OffsetDateTime, FactError> {
            Err(FactError::Provider("history unavailable".to_owned()))
        }
    }

    #[test]
    fn example_scenario() {
        let eval = Evaluator::from_source(EXAMPLE).unwrap();
        let animal = Animal::born_on(1, date!(2019 - 04 - 13));
        assert!(eval.matches(&animal, &Bindings::new().with("species", 1)).unwrap());
        assert!(!eval.matches(&animal, &Bindings::new().with("species", 2)).unwrap());
    }

    #[test]
    fn empty_and_always_matches() {
        let eval = script("", "AND { }");
        assert!(eval.matches(&NoBirth, &Bindings::new()).unwrap());
        assert!(eval
            .matches(&Animal::new(99), &Bindings::new().with("extra", 5))
            .unwrap());
    }

    #[test]
    fn boundary_dates_never_match() {
        let after = script("", "AND { BORN AFTER DATE:01/01/2019; }");
        let before = script("", "AND { BORN BEFORE DATE:01/01/2019; }");
        let on_boundary = Animal::born_on(1, date!(2019 - 01 - 01));
        assert!(!after.matches(&on_boundary, &Bindings::new()).unwrap());
        assert!(!before.matches(&on_boundary, &Bindings::new()).unwrap());

        let day_later = Animal::born_on(1, date!(2019 - 01 - 02));
        assert!(after.matches(&day_later, &Bindings::new()).unwrap());
        let day_earlier = Animal::born_on(1, date!(2018 - 12 - 31));
        assert!(before.matches(&day_earlier, &Bindings::new()).unwrap());
    }

    #[test]
    fn parameter_substitution() {
        let eval = script("SPECIES x", "AND { SPECIES IS PARAM:x; }");
        let animal = Animal::new(7);
        assert!(eval.matches(&animal, &Bindings::new().with("x", 7)).unwrap());
        assert!(!eval.matches(&animal, &Bindings::new().with("x", 8)).unwrap());
        assert_eq!(
            eval.matches(&animal, &Bindings::new().with("y", 7)),
            Err(EvalError::MissingBinding {
                name: "x".to_owned(),
                ty: ParamType::Int32,
            })
        );
    }

    #[test]
    fn unused_parameter_still_needs_binding() {
        let eval = script("SPECIES unused", "AND { }");
        let err = eval.matches(&Animal::new(1), &Bindings::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing binding for parameter 'unused' of type Int32"
        );
    }

    #[test]
    fn binding_of_wrong_type_rejected() {
        let eval = script("SPECIES x", "AND { SPECIES IS PARAM:x; }");
        let bindings = Bindings::new().with("x", date!(2020 - 01 - 01));
        assert_eq!(
            eval.matches(&Animal::new(1), &bindings),
            Err(EvalError::BindingType {
                name: "x".to_owned(),
                expected: ParamType::Int32,
                actual: ParamType::Date,
            })
        );
    }

    #[test]
    fn date_of_birth_fetched_once() {
        let eval = Evaluator::from_source(EXAMPLE).unwrap();
        let fact = Counting {
            species: 1,
            born: datetime!(2019-06-01 0:00 UTC),
            calls: std::cell::Cell::new(0),
        };
        assert!(eval.matches(&fact, &Bindings::new().with("species", 1)).unwrap());
        assert_eq!(fact.calls.get(), 1);
    }

    #[test]
    fn short_circuit_skips_later_children() {
        let eval = script(
            "SPECIES s",
            "AND { SPECIES IS PARAM:s; BORN AFTER DATE:01/01/2019; }",
        );
        // Species mismatch stops evaluation before the date of birth is needed.
        assert!(!eval.matches(&NoBirth, &Bindings::new().with("s", 2)).unwrap());
    }

    #[test]
    fn fact_failure_propagates() {
        let eval = script("", "AND { BORN AFTER DATE:01/01/2019; }");
        assert_eq!(
            eval.matches(&NoBirth, &Bindings::new()),
            Err(EvalError::Fact(FactError::Provider(
                "history unavailable".to_owned()
            )))
        );
    }

    #[test]
    fn animal_without_birth_event_fails_born_clause() {
        let eval = script("", "AND { BORN BEFORE DATE:01/01/2019; }");
        assert!(matches!(
            eval.matches(&Animal::new(1), &Bindings::new()),
            Err(EvalError::Fact(FactError::MissingEvent { .. }))
        ));
    }

    #[test]
    fn nested_blocks_all_must_hold() {
        let eval = script(
            "SPECIES s",
            "AND { AND { SPECIES IS PARAM:s; } AND { BORN AFTER DATE:01/01/2019; AND { } } }",
        );
        let young = Animal::born_on(4, date!(2021 - 05 - 05));
        let old = Animal::born_on(4, date!(2010 - 05 - 05));
        let bindings = Bindings::new().with("s", 4);
        assert!(eval.matches(&young, &bindings).unwrap());
        assert!(!eval.matches(&old, &bindings).unwrap());
    }

    #[test]
    fn source_errors_surface_by_stage() {
        assert!(matches!(
            Evaluator::from_source("NAME"),
            Err(ScriptError::Parse(_))
        ));
        assert!(matches!(
            Evaluator::from_source("NAME t PARAMETERS END ROUTINE BORN AFTER DATE:01/01/2019; END"),
            Err(ScriptError::Format(FormatError::RootNotBlock { .. }))
        ));
        assert!(matches!(
            Evaluator::from_source("NAME tü PARAMETERS END ROUTINE AND { } END"),
            Err(ScriptError::Compile(_))
        ));
    }

    #[test]
    fn config_limits_apply_to_source_path() {
        let config = EvaluatorConfig {
            max_depth: 1,
            ..EvaluatorConfig::default()
        };
        let err = Evaluator::from_source_with_config(
            "NAME t PARAMETERS END ROUTINE AND { AND { } } END",
            &config,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Parse(ParseError::Semantic(SemanticError::NestingTooDeep {
                limit: 1,
                ..
            }))
        ));
    }

    #[test]
    fn deeply_nested_source_is_rejected() {
        let depth = 200_000;
        let src = format!(
            "NAME t PARAMETERS END ROUTINE {}{} END",
            "AND { ".repeat(depth),
            "} ".repeat(depth)
        );
        let err = Evaluator::from_source(&src).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Parse(ParseError::Semantic(SemanticError::NestingTooDeep {
                limit: EvaluatorConfig::DEFAULT_MAX_DEPTH,
                ..
            }))
        ));
    }

    #[test]
    fn raised_depth_limit_loads_deeper_scripts() {
        let depth = 150;
        let src = format!(
            "NAME t PARAMETERS END ROUTINE {}{} END",
            "AND { ".repeat(depth),
            "} ".repeat(depth)
        );
        assert!(Evaluator::from_source(&src).is_err());

        let config = EvaluatorConfig {
            max_depth: depth,
            ..EvaluatorConfig::default()
        };
        let eval = Evaluator::from_source_with_config(&src, &config).unwrap();
        assert!(eval.matches(&Animal::new(1), &Bindings::new()).unwrap());
    }

    #[test]
    fn unbound_reference_reports_missing_binding() {
        let bindings = Bindings::new();
        let animal = Animal::new(1);
        let run = Run {
            fact: &animal,
            bindings: &bindings,
            date_of_birth: None,
        };
        let err = run
            .int(Opcode::SpeciesIs, &Operand::Param("species".to_owned()))
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::MissingBinding {
                name: "species".to_owned(),
                ty: ParamType::Int32,
            }
        );
    }

    #[test]
    fn evaluator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Evaluator>();

        let eval = std::sync::Arc::new(Evaluator::from_source(EXAMPLE).unwrap());
        let handles: Vec<_> = (1..=4)
            .map(|species| {
                let eval = std::sync::Arc::clone(&eval);
                std::thread::spawn(move || {
                    let animal = Animal::born_on(species, date!(2019 - 04 - 13));
                    eval.matches(&animal, &Bindings::new().with("species", 2))
                })
            })
            .collect();
        let results: Vec<bool> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(results, vec![false, true, false, false]);
    }

    #[test]
    fn works_through_trait_objects() {
        let eval = script("", "AND { BORN AFTER DATE:01/01/2019; }");
        let animal = Animal::born_on(1, date!(2019 - 04 - 13));
        let fact: &dyn FactProvider = &animal;
        assert!(eval.matches(fact, &Bindings::new()).unwrap());
    }
}
