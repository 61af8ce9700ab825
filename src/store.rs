use std::collections::HashMap;

use crate::flag::{FeatureFlag, FlagKey};

/// FlagStore is the table behind a [crate::Registry]. It does no locking of its own.
///
/// Flags are indexed by name, then by tier, so lookups by borrowed strings never allocate and a
/// separator character in either part cannot cause two identities to collide.
#[derive(Clone, Debug, Default)]
pub(crate) struct FlagStore {
    flags: HashMap<String, HashMap<String, FeatureFlag>>,
}

impl FlagStore {
    /// Stores `flag`, replacing any flag with the same name and tier.
    pub(crate) fn insert(&mut self, flag: FeatureFlag) {
        self.flags
            .entry(flag.name().to_owned())
            .or_default()
            .insert(flag.tier().to_owned(), flag);
    }

    pub(crate) fn flag(&self, name: &str, tier: &str) -> Option<&FeatureFlag> {
        self.flags.get(name).and_then(|tiers| tiers.get(tier))
    }

    pub(crate) fn clear(&mut self) {
        self.flags.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.flags.values().map(HashMap::len).sum()
    }

    pub(crate) fn snapshot(&self) -> HashMap<FlagKey, FeatureFlag> {
        self.flags
            .values()
            .flat_map(HashMap::values)
            .map(|flag| (flag.key(), flag.clone()))
            .collect()
    }
}
