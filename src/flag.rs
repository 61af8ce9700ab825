use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flag_value::{FlagType, FlagValue};

/// The tier used when a flag is not segmented.
pub const DEFAULT_TIER: &str = "";

/// FlagKey identifies a flag within a registry. Name and tier are compared as a pair, so no
/// character is reserved in either of them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagKey {
    pub name: String,
    pub tier: String,
}

impl FlagKey {
    pub fn new(name: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tier: tier.into(),
        }
    }
}

impl fmt::Display for FlagKey {
    /// Renders the key as `name.tier`. This is for humans only; two different keys may render
    /// identically.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.tier)
    }
}

/// A named, tier-scoped feature flag.
///
/// Flags are immutable once built; replacing a flag means loading a new record for the same
/// name and tier into the [crate::Registry].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "FlagRecord", into = "FlagRecord")]
pub struct FeatureFlag {
    name: String,
    tier: String,
    value: FlagValue,
}

impl FeatureFlag {
    pub fn new(name: impl Into<String>, tier: impl Into<String>, value: FlagValue) -> Self {
        Self {
            name: name.into(),
            tier: tier.into(),
            value,
        }
    }

    /// Creates an on/off gate.
    pub fn allow(name: impl Into<String>, tier: impl Into<String>, allowed: bool) -> Self {
        Self::new(name, tier, FlagValue::Allow(allowed))
    }

    /// Creates a flag that only admits `target`.
    pub fn int(name: impl Into<String>, tier: impl Into<String>, target: i64) -> Self {
        Self::new(name, tier, FlagValue::Int(target))
    }

    /// Creates a flag admitting values greater than or equal to `min`. `None` admits everything.
    pub fn int_min(name: impl Into<String>, tier: impl Into<String>, min: Option<i64>) -> Self {
        Self::new(name, tier, FlagValue::IntMin(min))
    }

    /// Creates a flag admitting values less than or equal to `max`. `None` admits everything.
    pub fn int_max(name: impl Into<String>, tier: impl Into<String>, max: Option<i64>) -> Self {
        Self::new(name, tier, FlagValue::IntMax(max))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }

    pub fn value(&self) -> &FlagValue {
        &self.value
    }

    pub fn flag_type(&self) -> FlagType {
        self.value.flag_type()
    }

    pub fn key(&self) -> FlagKey {
        FlagKey::new(self.name.as_str(), self.tier.as_str())
    }
}

// The wire form of a flag. Validation happens when converting it into a FeatureFlag, so a record
// whose value does not fit its type never reaches a registry.
#[derive(Deserialize, Serialize)]
struct FlagRecord {
    name: String,
    #[serde(default)]
    tier: String,
    #[serde(rename = "type")]
    flag_type: FlagType,
    #[serde(default)]
    value: serde_json::Value,
}

impl TryFrom<FlagRecord> for FeatureFlag {
    type Error = String;

    fn try_from(record: FlagRecord) -> Result<Self, Self::Error> {
        if record.name.is_empty() {
            return Err(String::from("flag name cannot be empty"));
        }
        let value = FlagValue::from_json(record.flag_type, record.value)
            .map_err(|e| format!("flag \"{}\": {}", record.name, e))?;
        Ok(FeatureFlag {
            name: record.name,
            tier: record.tier,
            value,
        })
    }
}

impl From<FeatureFlag> for FlagRecord {
    fn from(flag: FeatureFlag) -> Self {
        FlagRecord {
            flag_type: flag.value.flag_type(),
            value: flag.value.to_json(),
            name: flag.name,
            tier: flag.tier,
        }
    }
}
