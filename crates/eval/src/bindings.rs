//! Caller-supplied parameter values.

use std::collections::HashMap;

use groupscript_core::ParamType;
use time::{Date, OffsetDateTime};

use crate::error::EvalError;
use crate::fact::parse_instant;

/// A value bound to a script parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingValue {
    Int(i32),
    Date(OffsetDateTime),
}

impl BindingValue {
    /// Wire type this value satisfies.
    pub fn param_type(&self) -> ParamType {
        match self {
            BindingValue::Int(_) => ParamType::Int32,
            BindingValue::Date(_) => ParamType::Date,
        }
    }
}

impl From<i32> for BindingValue {
    fn from(v: i32) -> Self {
        BindingValue::Int(v)
    }
}

impl From<OffsetDateTime> for BindingValue {
    fn from(v: OffsetDateTime) -> Self {
        BindingValue::Date(v)
    }
}

impl From<Date> for BindingValue {
    fn from(v: Date) -> Self {
        BindingValue::Date(v.midnight().assume_utc())
    }
}

/// Name -> value map consulted for `PARAM:` references.
///
/// Entries for names the script does not declare are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: HashMap<String, BindingValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<BindingValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<BindingValue>,
    ) -> Option<BindingValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<BindingValue> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Load bindings from a JSON object.
    ///
    /// Integers become `Int`; strings holding an RFC 3339 date-time or a
    /// `YYYY-MM-DD` date become `Date`. Anything else is rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, EvalError> {
        let obj = json.as_object().ok_or_else(|| EvalError::InvalidBindings {
            message: "bindings must be a JSON object".to_owned(),
        })?;
        let mut bindings = Bindings::new();
        for (name, raw) in obj {
            let value = match raw {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .and_then(|i| i32::try_from(i).ok())
                    .map(BindingValue::Int),
                serde_json::Value::String(s) => parse_instant(s).map(BindingValue::Date),
                _ => None,
            };
            let value = value.ok_or_else(|| EvalError::InvalidBindings {
                message: format!("'{}' is neither a 32-bit integer nor a date: {}", name, raw),
            })?;
            bindings.insert(name.clone(), value);
        }
        Ok(bindings)
    }
}

impl<K: Into<String>, V: Into<BindingValue>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bindings = Bindings::new();
        for (name, value) in iter {
            bindings.insert(name, value);
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::{date, datetime};

    #[test]
    fn loads_ints_and_dates_from_json() {
        let bindings = Bindings::from_json(&json!({
            "species": 3,
            "cutoff": "2020-06-01",
            "stamp": "2020-06-01T12:00:00Z"
        }))
        .unwrap();
        assert!(!bindings.is_empty());
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings.get("species"), Some(BindingValue::Int(3)));
        assert_eq!(
            bindings.get("cutoff"),
            Some(BindingValue::Date(datetime!(2020-06-01 0:00 UTC)))
        );
        assert_eq!(
            bindings.get("stamp"),
            Some(BindingValue::Date(datetime!(2020-06-01 12:00 UTC)))
        );
    }

    #[test]
    fn rejects_non_objects_and_bad_values() {
        assert!(Bindings::from_json(&json!([1, 2])).is_err());
        assert!(Bindings::from_json(&json!({})).unwrap().is_empty());
        for bad in [json!({"x": 1.5}), json!({"x": true}), json!({"x": "soon"})] {
            let err = Bindings::from_json(&bad).unwrap_err();
            assert!(matches!(err, EvalError::InvalidBindings { .. }), "{}", bad);
        }
        let too_big = json!({ "x": i64::from(i32::MAX) + 1 });
        assert!(Bindings::from_json(&too_big).is_err());
    }

    #[test]
    fn builder_and_collect_agree() {
        let built = Bindings::new()
            .with("species", 2)
            .with("cutoff", date!(2020 - 01 - 01));
        let collected: Bindings = vec![
            ("species", BindingValue::Int(2)),
            ("cutoff", BindingValue::from(date!(2020 - 01 - 01))),
        ]
        .into_iter()
        .collect();
        assert_eq!(built, collected);
        assert_eq!(built.get("cutoff").map(|v| v.param_type()), Some(ParamType::Date));
    }
}
