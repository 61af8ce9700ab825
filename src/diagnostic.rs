use log::warn;
use serde::Serialize;

use crate::eval::Error;
use crate::flag::FeatureFlag;
use crate::flag_value::FlagType;

/// The registry query that ran into a [Diagnostic].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Query {
    IsAllowed,
    IsInRange,
}

impl Query {
    /// Returns true if a flag of type `flag_type` can answer this query.
    pub(crate) fn accepts(&self, flag_type: FlagType) -> bool {
        match self {
            Query::IsAllowed => flag_type == FlagType::Allow,
            Query::IsInRange => flag_type != FlagType::Allow,
        }
    }
}

/// An anomaly noticed while answering a query.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Diagnostic {
    /// No flag was loaded for this name and tier.
    FlagNotFound { name: String, tier: String },
    /// A flag was found, but it cannot answer the query that was made of it.
    WrongType {
        /// The query that was made.
        query: Query,
        /// The flag as it is stored.
        flag: FeatureFlag,
    },
}

impl Diagnostic {
    pub fn error(&self) -> Error {
        match self {
            Diagnostic::FlagNotFound { .. } => Error::FlagNotFound,
            Diagnostic::WrongType { .. } => Error::WrongType,
        }
    }
}

/// Trait used by [crate::Registry] to report diagnostics.
///
/// Implementations must not fail or panic; queries ignore the outcome of recording.
pub trait DiagnosticSink: Send + Sync {
    /// Record a diagnostic.
    fn record(&self, diagnostic: Diagnostic);
}

/// The default sink, which writes every diagnostic as a warning through the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::FlagNotFound { name, tier } => {
                warn!("feature flag {:?} not found for tier {:?}", name, tier)
            }
            Diagnostic::WrongType { query, flag } => warn!(
                "feature flag {:?} for tier {:?} is of type {} and cannot answer {:?}: {:?}",
                flag.name(),
                flag.tier(),
                flag.flag_type(),
                query,
                flag
            ),
        }
    }
}
