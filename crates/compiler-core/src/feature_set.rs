//! Feature-set tracker (C11, spec §4.5).
//!
//! A monotone set over a fixed enumeration of source-language features.
//! Passes declare the features they consume and produce; the pass
//! manager (C7) refuses to run a pass whose consumed set is not a
//! subset of the current set, then folds in the pass's produced set.
//! This is the sole mechanism that orders transpilation passes.

use std::collections::BTreeSet;

use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Feature {
    ArrowFunctions,
    Classes,
    Destructuring,
    LetConst,
    TemplateStrings,
    AsyncAwait,
    Generators,
    OptionalChaining,
    NullishCoalescing,
    StringContinuation,
    TrailingCommasInLists,
}

/// A monotone lattice point: a subset of `Feature`. `language_in` /
/// `language_out` (spec §6) are themselves `FeatureSet` values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn of(features: impl IntoIterator<Item = Feature>) -> Self {
        Self(features.into_iter().collect())
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn insert(&mut self, feature: Feature) {
        self.0.insert(feature);
    }

    pub fn remove(&mut self, feature: Feature) {
        self.0.remove(&feature);
    }

    /// True iff every feature in `other` is also in `self` - the subset
    /// check the pass manager runs before allowing a pass to execute.
    pub fn is_superset_of(&self, other: &FeatureSet) -> bool {
        other.0.is_subset(&self.0)
    }

    /// Folds `produced` into the set, then removes `removed` - the
    /// update the pass manager applies after a pass completes.
    pub fn apply(&mut self, produced: &FeatureSet, removed: &FeatureSet) {
        self.0.extend(produced.0.iter().copied());
        for f in &removed.0 {
            self.0.remove(f);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_check_gates_pass_execution() {
        let current = FeatureSet::of([Feature::ArrowFunctions, Feature::Classes]);
        let consumes_subset = FeatureSet::of([Feature::ArrowFunctions]);
        let consumes_missing = FeatureSet::of([Feature::Generators]);

        assert!(current.is_superset_of(&consumes_subset));
        assert!(!current.is_superset_of(&consumes_missing));
    }

    #[test]
    fn apply_adds_produced_and_drops_removed_features() {
        let mut set = FeatureSet::of([Feature::ArrowFunctions, Feature::LetConst]);
        let produced = FeatureSet::of([Feature::Classes]);
        let removed = FeatureSet::of([Feature::LetConst]);

        set.apply(&produced, &removed);

        assert!(set.contains(Feature::ArrowFunctions));
        assert!(set.contains(Feature::Classes));
        assert!(!set.contains(Feature::LetConst));
    }

    #[test]
    fn desugaring_pass_can_drive_a_feature_to_empty() {
        let mut set = FeatureSet::of([Feature::Destructuring]);
        set.apply(&FeatureSet::empty(), &FeatureSet::of([Feature::Destructuring]));
        assert!(!set.contains(Feature::Destructuring));
    }
}
