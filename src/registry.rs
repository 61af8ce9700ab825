use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::diagnostic::{Diagnostic, DiagnosticSink, LogSink, Query};
use crate::eval::{evaluate_allowed, evaluate_in_range};
use crate::flag::{FeatureFlag, FlagKey};
use crate::store::FlagStore;

/// Registry is an in-memory table of feature flags, shared by everything that needs to consult
/// them.
///
/// A registry starts empty. Flags are added or replaced with [Registry::load] and dropped with
/// [Registry::clear]; queries never fail, and instead answer `false` or `None` when a flag is
/// missing or of the wrong type, reporting the anomaly to the registry's [DiagnosticSink].
///
/// All methods take `&self`, so a registry can be wrapped in an [Arc] and handed to as many
/// threads as needed. Readers never observe a partially applied [Registry::load].
pub struct Registry {
    store: RwLock<FlagStore>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Registry {
    /// Creates an empty registry that logs diagnostics through [LogSink].
    pub fn new() -> Self {
        Self::with_sink(Arc::new(LogSink))
    }

    /// Creates an empty registry that reports diagnostics to `sink`.
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            store: RwLock::new(FlagStore::default()),
            sink,
        }
    }

    /// Adds `flags` to the registry, replacing any flag already loaded with the same name and
    /// tier. When `flags` holds several flags with the same name and tier, the last one wins.
    ///
    /// The whole batch becomes visible at once.
    pub fn load<I>(&self, flags: I)
    where
        I: IntoIterator<Item = FeatureFlag>,
    {
        // Drain the caller's iterator before taking the lock, in case it consults this registry.
        let flags: Vec<FeatureFlag> = flags.into_iter().collect();
        if flags.is_empty() {
            return;
        }

        let mut store = self.store.write();
        for flag in flags {
            store.insert(flag);
        }
    }

    /// Parses a JSON array of flag records and loads them.
    ///
    /// Each record has the shape `{"name": .., "tier": .., "type": .., "value": ..}`, where `type`
    /// is one of `allow`, `int`, `int:min` or `int:max` and `tier` may be omitted. If any record
    /// is malformed, nothing is loaded. Returns the number of records loaded.
    pub fn load_json(&self, json: &str) -> Result<usize, serde_json::Error> {
        let flags: Vec<FeatureFlag> = serde_json::from_str(json)?;
        let count = flags.len();
        self.load(flags);
        Ok(count)
    }

    /// Removes every flag.
    pub fn clear(&self) {
        self.store.write().clear();
    }

    /// Returns the flag loaded for `name` and `tier`, if any.
    ///
    /// A miss is reported to the sink as [Diagnostic::FlagNotFound].
    pub fn get(&self, name: &str, tier: &str) -> Option<FeatureFlag> {
        let flag = self.store.read().flag(name, tier).cloned();
        if flag.is_none() {
            self.sink.record(Diagnostic::FlagNotFound {
                name: name.to_owned(),
                tier: tier.to_owned(),
            });
        }
        flag
    }

    /// Returns the value of the allow flag loaded for `name` and `tier`.
    ///
    /// Answers `false` when there is no such flag, or when it is not an allow flag.
    pub fn is_allowed(&self, name: &str, tier: &str) -> bool {
        let flag = match self.get(name, tier) {
            Some(flag) => flag,
            None => return false,
        };
        evaluate_allowed(&flag).unwrap_or_else(|_| {
            self.wrong_type(Query::IsAllowed, flag);
            false
        })
    }

    /// Checks `candidate` against the integer flag loaded for `name` and `tier`.
    ///
    /// `int` flags need an exact match, `int:min` and `int:max` flags are inclusive bounds which
    /// admit everything when unset. Answers `false` when there is no such flag, or when it is an
    /// allow flag.
    pub fn is_in_range(&self, name: &str, tier: &str, candidate: i64) -> bool {
        let flag = match self.get(name, tier) {
            Some(flag) => flag,
            None => return false,
        };
        evaluate_in_range(&flag, candidate).unwrap_or_else(|_| {
            self.wrong_type(Query::IsInRange, flag);
            false
        })
    }

    /// Returns a copy of every loaded flag, keyed by name and tier. Later loads do not affect
    /// the returned map.
    pub fn get_all(&self) -> HashMap<FlagKey, FeatureFlag> {
        self.store.read().snapshot()
    }

    /// Returns the number of loaded flags.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wrong_type(&self, query: Query, flag: FeatureFlag) {
        debug_assert!(!query.accepts(flag.flag_type()));
        self.sink.record(Diagnostic::WrongType { query, flag });
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("flags", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Error;
    use crate::flag::DEFAULT_TIER;
    use crate::test_common::{test_flags, test_registry, InMemoryDiagnosticSink};
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use proptest::prelude::*;
    use spectral::prelude::*;
    use std::thread;
    use test_case::test_case;

    fn not_found(name: &str, tier: &str) -> Diagnostic {
        Diagnostic::FlagNotFound {
            name: name.into(),
            tier: tier.into(),
        }
    }

    #[test]
    fn starts_empty() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.get_all().is_empty());
    }

    #[test]
    fn get_returns_loaded_flag() {
        let (registry, sink) = test_registry();

        assert_that!(registry.get("build", "qa"))
            .contains_value(FeatureFlag::int("build", "qa", 1234));
        assert_that!(registry.get("maxUploads", DEFAULT_TIER))
            .contains_value(FeatureFlag::int_max("maxUploads", "", Some(10)));
        assert_that!(sink.take()).is_empty();
    }

    #[test]
    fn get_reports_missing_flag() {
        let (registry, sink) = test_registry();

        assert_that!(registry.get("build", "prod")).is_none();
        assert_that!(sink.take()).is_equal_to(vec![not_found("build", "prod")]);
    }

    #[test]
    fn last_load_wins() {
        let (registry, _) = test_registry();
        registry.load(vec![
            FeatureFlag::int("build", "qa", 1),
            FeatureFlag::int("build", "qa", 2),
        ]);

        assert_that!(registry.get("build", "qa"))
            .contains_value(FeatureFlag::int("build", "qa", 2));
        assert_that!(registry.len()).is_equal_to(test_flags().len());
    }

    #[test]
    fn load_can_change_flag_type() {
        let (registry, _) = test_registry();
        registry.load(vec![FeatureFlag::allow("build", "qa", true)]);

        assert!(registry.is_allowed("build", "qa"));
        assert!(!registry.is_in_range("build", "qa", 1234));
    }

    #[test]
    fn loading_nothing_changes_nothing() {
        let (registry, _) = test_registry();
        let before = registry.get_all();
        registry.load(Vec::new());
        assert_that!(registry.get_all()).is_equal_to(before);
    }

    #[test]
    fn loading_twice_is_idempotent() {
        let (registry, _) = test_registry();
        let before = registry.get_all();
        registry.load(test_flags());
        assert_that!(registry.get_all()).is_equal_to(before);
    }

    #[test]
    fn clear_forgets_everything() {
        let (registry, sink) = test_registry();
        registry.clear();

        assert!(registry.get_all().is_empty());
        for flag in test_flags() {
            assert_that!(registry.get(flag.name(), flag.tier())).is_none();
        }
        assert_that!(sink.take()).has_length(test_flags().len());
    }

    #[test_case("newCheckout", "beta", true)]
    #[test_case("newCheckout", "", false; "allow flag set to false")]
    #[test_case("newCheckout", "alpha", false; "missing tier")]
    #[test_case("build", "qa", false; "int flag")]
    #[test_case("seats", "enterprise", false; "unbounded max flag")]
    fn is_allowed(name: &str, tier: &str, expected: bool) {
        let (registry, _) = test_registry();
        assert_eq!(registry.is_allowed(name, tier), expected);
    }

    #[test]
    fn is_allowed_on_missing_flag_reports_once() {
        let (registry, sink) = test_registry();

        assert!(!registry.is_allowed("nonexistent", ""));
        assert_that!(sink.take()).is_equal_to(vec![not_found("nonexistent", "")]);
    }

    #[test]
    fn is_allowed_on_wrong_type_reports_stored_flag() {
        let (registry, sink) = test_registry();

        assert!(!registry.is_allowed("build", "qa"));
        let diagnostics = sink.take();
        assert_that!(diagnostics).is_equal_to(vec![Diagnostic::WrongType {
            query: Query::IsAllowed,
            flag: FeatureFlag::int("build", "qa", 1234),
        }]);
        assert_eq!(diagnostics[0].error(), Error::WrongType);
    }

    #[test_case("maxUploads", "", 10, true; "max at bound")]
    #[test_case("maxUploads", "", 11, false; "max above bound")]
    #[test_case("maxUploads", "", -3, true; "max below bound")]
    #[test_case("minAge", "eu", 16, true; "min at bound")]
    #[test_case("minAge", "eu", 15, false; "min below bound")]
    #[test_case("minAge", "us", 16, false; "min on missing tier")]
    #[test_case("build", "qa", 1234, true; "int exact")]
    #[test_case("build", "qa", 1235, false; "int above")]
    #[test_case("build", "qa", 1233, false; "int below")]
    #[test_case("seats", "enterprise", i64::MAX, true; "unbounded max")]
    #[test_case("seats", "trial", i64::MIN, true; "unbounded min")]
    #[test_case("newCheckout", "beta", 1, false; "allow flag")]
    fn is_in_range(name: &str, tier: &str, candidate: i64, expected: bool) {
        let (registry, _) = test_registry();
        assert_eq!(registry.is_in_range(name, tier, candidate), expected);
    }

    #[test]
    fn is_in_range_on_missing_flag_reports_once() {
        let (registry, sink) = test_registry();

        assert!(!registry.is_in_range("minAge", "us", 16));
        assert_that!(sink.take()).is_equal_to(vec![not_found("minAge", "us")]);
    }

    #[test]
    fn is_in_range_on_allow_flag_reports_stored_flag() {
        let (registry, sink) = test_registry();

        assert!(!registry.is_in_range("newCheckout", "beta", 1));
        assert_that!(sink.take()).is_equal_to(vec![Diagnostic::WrongType {
            query: Query::IsInRange,
            flag: FeatureFlag::allow("newCheckout", "beta", true),
        }]);
    }

    #[test]
    fn get_all_is_a_snapshot() {
        let (registry, _) = test_registry();
        let mut all = registry.get_all();
        assert_eq!(all.len(), test_flags().len());
        assert_that!(all.get(&FlagKey::new("minAge", "eu")))
            .contains_value(&FeatureFlag::int_min("minAge", "eu", Some(16)));

        all.clear();
        registry.load(vec![FeatureFlag::allow("late", "", true)]);
        assert!(all.is_empty());
        assert_eq!(registry.get_all().len(), test_flags().len() + 1);
    }

    #[test]
    fn get_all_values_serialize_as_records() {
        let registry = Registry::with_sink(Arc::new(InMemoryDiagnosticSink::default()));
        registry.load(vec![
            FeatureFlag::int_min("minAge", "eu", Some(16)),
            FeatureFlag::allow("a.b", "c", true),
            FeatureFlag::allow("a", "b.c", false),
        ]);

        let mut flags: Vec<FeatureFlag> = registry.get_all().into_values().collect();
        flags.sort_by_key(FeatureFlag::key);
        assert_json_eq!(
            serde_json::to_value(&flags).unwrap(),
            json!([
                {"name": "a", "tier": "b.c", "type": "allow", "value": false},
                {"name": "a.b", "tier": "c", "type": "allow", "value": true},
                {"name": "minAge", "tier": "eu", "type": "int:min", "value": 16}
            ])
        );
    }

    #[test]
    fn load_json_loads_records() {
        let registry = Registry::with_sink(Arc::new(InMemoryDiagnosticSink::default()));
        let count = registry
            .load_json(
                r#"[
                    {"name": "maxUploads", "type": "int:max", "value": 10},
                    {"name": "maxUploads", "type": "int:max", "value": 20}
                ]"#,
            )
            .unwrap();

        assert_that!(count).is_equal_to(2);
        assert!(registry.is_in_range("maxUploads", "", 20));
        assert!(!registry.is_in_range("maxUploads", "", 21));
    }

    #[test]
    fn load_json_rejects_whole_batch() {
        let (registry, _) = test_registry();
        let before = registry.get_all();

        let result = registry.load_json(
            r#"[
                {"name": "fresh", "type": "allow", "value": true},
                {"name": "build", "tier": "qa", "type": "int", "value": "1235"}
            ]"#,
        );

        assert_that!(result).is_err();
        assert_that!(registry.get_all()).is_equal_to(before);
    }

    #[test]
    fn shared_across_threads() {
        let registry = Arc::new(Registry::with_sink(Arc::new(
            InMemoryDiagnosticSink::default(),
        )));

        let writers: Vec<_> = (0..4i64)
            .map(|n| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry.load(
                        (0..50i64).map(|i| FeatureFlag::int(format!("f{}", i), n.to_string(), i)),
                    );
                })
            })
            .collect();
        let reader = {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    // A batch is either fully visible or not at all.
                    assert_eq!(registry.len() % 50, 0);
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_that!(registry.len()).is_equal_to(200);
        assert!(registry.is_in_range("f7", "3", 7));
    }

    fn any_flag() -> impl Strategy<Value = FeatureFlag> {
        ("[ab]", "[xy]?", any::<crate::FlagValue>())
            .prop_map(|(name, tier, value)| FeatureFlag::new(name, tier, value))
    }

    proptest! {
        #[test]
        fn get_returns_last_loaded_record(flags in prop::collection::vec(any_flag(), 0..20)) {
            let registry = Registry::with_sink(Arc::new(InMemoryDiagnosticSink::default()));
            registry.load(flags.clone());

            for flag in &flags {
                let last = flags.iter().rev().find(|f| f.key() == flag.key());
                let got = registry.get(flag.name(), flag.tier());
                prop_assert_eq!(got.as_ref(), last);
            }
        }

        #[test]
        fn is_allowed_only_for_true_allow_flags(flag in any_flag()) {
            let registry = Registry::with_sink(Arc::new(InMemoryDiagnosticSink::default()));
            registry.load(vec![flag.clone()]);

            let expected = *flag.value() == crate::FlagValue::Allow(true);
            prop_assert_eq!(registry.is_allowed(flag.name(), flag.tier()), expected);
        }
    }
}
