use serde::Serialize;

use crate::flag::FeatureFlag;
use crate::flag_value::FlagValue;

/// Error describes why a query could not be answered from a flag. Queries never surface it to
/// their callers; it is reported through a [crate::DiagnosticSink] and the query degrades to
/// `false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Error {
    /// FlagNotFound indicates that no flag was loaded for the requested name and tier.
    FlagNotFound,
    /// WrongType indicates that the flag exists but its type does not support the query, e.g.
    /// a range check against an allow flag.
    WrongType,
}

/// Returns the value of an allow flag.
pub fn evaluate_allowed(flag: &FeatureFlag) -> Result<bool, Error> {
    match flag.value() {
        FlagValue::Allow(allowed) => Ok(*allowed),
        FlagValue::Int(_) | FlagValue::IntMin(_) | FlagValue::IntMax(_) => Err(Error::WrongType),
    }
}

/// Checks `candidate` against an integer flag. Bounds are inclusive, and an unset bound admits
/// every candidate.
pub fn evaluate_in_range(flag: &FeatureFlag, candidate: i64) -> Result<bool, Error> {
    match flag.value() {
        FlagValue::Int(target) => Ok(candidate == *target),
        FlagValue::IntMin(min) => Ok(min.map_or(true, |min| candidate >= min)),
        FlagValue::IntMax(max) => Ok(max.map_or(true, |max| candidate <= max)),
        FlagValue::Allow(_) => Err(Error::WrongType),
    }
}
