use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::integral_f64_to_i64;

/// The type tag of a [FlagValue], as it appears in the `type` field of a flag record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FlagType {
    #[serde(rename = "allow")]
    Allow,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "int:min")]
    IntMin,
    #[serde(rename = "int:max")]
    IntMax,
}

impl FlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::Allow => "allow",
            FlagType::Int => "int",
            FlagType::IntMin => "int:min",
            FlagType::IntMax => "int:max",
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a feature flag. The variant doubles as the flag's type tag, so a value can never
/// disagree with the kind of flag it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum FlagValue {
    /// An on/off gate.
    Allow(bool),
    /// A value that candidates must match exactly.
    Int(i64),
    /// An inclusive lower bound. `None` means unbounded.
    IntMin(Option<i64>),
    /// An inclusive upper bound. `None` means unbounded.
    IntMax(Option<i64>),
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> FlagValue {
        FlagValue::Allow(b)
    }
}

impl From<i64> for FlagValue {
    fn from(i: i64) -> FlagValue {
        FlagValue::Int(i)
    }
}

impl FlagValue {
    pub fn flag_type(&self) -> FlagType {
        match self {
            FlagValue::Allow(_) => FlagType::Allow,
            FlagValue::Int(_) => FlagType::Int,
            FlagValue::IntMin(_) => FlagType::IntMin,
            FlagValue::IntMax(_) => FlagType::IntMax,
        }
    }

    /// Builds a value of the given type from its JSON representation, rejecting any value whose
    /// shape does not fit the tag.
    pub fn from_json(flag_type: FlagType, value: Value) -> Result<FlagValue, String> {
        let parsed = match flag_type {
            FlagType::Allow => value.as_bool().map(FlagValue::Allow),
            FlagType::Int => json_to_int(&value).map(FlagValue::Int),
            FlagType::IntMin => json_to_bound(&value).map(FlagValue::IntMin),
            FlagType::IntMax => json_to_bound(&value).map(FlagValue::IntMax),
        };
        parsed.ok_or_else(|| {
            let expected = match flag_type {
                FlagType::Allow => "a boolean",
                FlagType::Int => "an integer",
                FlagType::IntMin | FlagType::IntMax => "an integer or null",
            };
            format!(
                "value of a \"{}\" flag must be {}, got {}",
                flag_type, expected, value
            )
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            FlagValue::Allow(b) => Value::from(*b),
            FlagValue::Int(i) => Value::from(*i),
            FlagValue::IntMin(bound) | FlagValue::IntMax(bound) => match bound {
                Some(i) => Value::from(*i),
                None => Value::Null,
            },
        }
    }
}

fn json_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_f64_to_i64)),
        _ => None,
    }
}

fn json_to_bound(value: &Value) -> Option<Option<i64>> {
    match value {
        Value::Null => Some(None),
        _ => json_to_int(value).map(Some),
    }
}
