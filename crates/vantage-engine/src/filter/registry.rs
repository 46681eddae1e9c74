use crate::filter::error::FilterError;
use crate::filter::group::{CustomFilterGroup, IdentityFilterGroup, ValueFilterGroup};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use vantage_model::{
    natural_cmp, CustomFilterPatch, CustomFilterState, Dataset, IdentityFilterPatch,
    IdentityFilterState, RowMask, ValueFilterPatch, ValueFilterState,
};

/// How enabled groups' masks are merged during [`FilterRegistry::recompute`].
///
/// An explicit parameter rather than ambient state, so recompute stays
/// referentially transparent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Every group must keep a row (elementwise AND).
    All,
    /// Any group may keep a row (elementwise OR).
    Any,
}

/// The three filter-group kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Custom,
    Identity,
    Value,
}

/// Owns all filter groups and merges their outputs into one mask per dataset.
///
/// The registry never owns datasets: `recompute` returns the merged masks and
/// the caller writes them back via [`Dataset::set_filtered_mask`], using the
/// returned map to decide which datasets actually changed.
#[derive(Clone, Debug, Default)]
pub struct FilterRegistry {
    custom: BTreeMap<String, CustomFilterGroup>,
    identity: BTreeMap<String, IdentityFilterGroup>,
    value: BTreeMap<String, ValueFilterGroup>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_custom(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        name: &str,
        patch: &CustomFilterPatch,
    ) -> Result<(), FilterError> {
        if self.custom.contains_key(name) {
            return Err(FilterError::DuplicateName(name.to_owned()));
        }
        let mut group = CustomFilterGroup::new(name.to_owned());
        group.set_state(datasets, patch)?;
        self.custom.insert(name.to_owned(), group);
        Ok(())
    }

    pub fn edit_custom(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        name: &str,
        patch: &CustomFilterPatch,
    ) -> Result<(), FilterError> {
        self.custom
            .get_mut(name)
            .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))?
            .set_state(datasets, patch)
    }

    pub fn remove_custom(&mut self, name: &str) -> Result<(), FilterError> {
        self.custom
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))
    }

    pub fn clear_custom(&mut self) {
        self.custom.clear();
    }

    pub fn add_identity(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        name: &str,
        patch: &IdentityFilterPatch,
    ) -> Result<(), FilterError> {
        if self.identity.contains_key(name) {
            return Err(FilterError::DuplicateName(name.to_owned()));
        }
        let mut group = IdentityFilterGroup::new(name.to_owned());
        group.set_state(datasets, patch)?;
        self.identity.insert(name.to_owned(), group);
        Ok(())
    }

    pub fn edit_identity(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        name: &str,
        patch: &IdentityFilterPatch,
    ) -> Result<(), FilterError> {
        self.identity
            .get_mut(name)
            .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))?
            .set_state(datasets, patch)
    }

    pub fn remove_identity(&mut self, name: &str) -> Result<(), FilterError> {
        self.identity
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))
    }

    pub fn clear_identity(&mut self) {
        self.identity.clear();
    }

    pub fn add_value(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        name: &str,
        patch: &ValueFilterPatch,
    ) -> Result<(), FilterError> {
        if self.value.contains_key(name) {
            return Err(FilterError::DuplicateName(name.to_owned()));
        }
        let mut group = ValueFilterGroup::new(name.to_owned());
        group.set_state(datasets, patch)?;
        self.value.insert(name.to_owned(), group);
        Ok(())
    }

    pub fn edit_value(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        name: &str,
        patch: &ValueFilterPatch,
    ) -> Result<(), FilterError> {
        self.value
            .get_mut(name)
            .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))?
            .set_state(datasets, patch)
    }

    pub fn remove_value(&mut self, name: &str) -> Result<(), FilterError> {
        self.value
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))
    }

    pub fn clear_value(&mut self) {
        self.value.clear();
    }

    pub fn custom_state(&self, name: &str) -> Option<CustomFilterState> {
        self.custom.get(name).map(CustomFilterGroup::state)
    }

    pub fn identity_state(&self, name: &str) -> Option<IdentityFilterState> {
        self.identity.get(name).map(IdentityFilterGroup::state)
    }

    pub fn value_state(&self, name: &str) -> Option<ValueFilterState> {
        self.value.get(name).map(ValueFilterGroup::state)
    }

    /// All custom group states, listed in natural name order.
    pub fn custom_states(&self) -> Vec<CustomFilterState> {
        let mut states: Vec<_> = self.custom.values().map(CustomFilterGroup::state).collect();
        states.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        states
    }

    pub fn identity_states(&self) -> Vec<IdentityFilterState> {
        let mut states: Vec<_> = self
            .identity
            .values()
            .map(IdentityFilterGroup::state)
            .collect();
        states.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        states
    }

    pub fn value_states(&self) -> Vec<ValueFilterState> {
        let mut states: Vec<_> = self.value.values().map(ValueFilterGroup::state).collect();
        states.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        states
    }

    /// Datasets one group can affect; used by hosts to scope the next
    /// recompute to the datasets a filter edit touched.
    pub fn data_names(&self, kind: FilterKind, name: &str) -> Result<BTreeSet<String>, FilterError> {
        match kind {
            FilterKind::Custom => self.custom.get(name).map(CustomFilterGroup::data_names),
            FilterKind::Identity => self.identity.get(name).map(IdentityFilterGroup::data_names),
            FilterKind::Value => self.value.get(name).map(ValueFilterGroup::data_names),
        }
        .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))
    }

    /// One group's per-dataset masks, unmerged.
    pub fn group_masks(
        &self,
        kind: FilterKind,
        name: &str,
        datasets: &BTreeMap<String, Dataset>,
        subset: Option<&BTreeSet<String>>,
    ) -> Result<BTreeMap<String, RowMask>, FilterError> {
        match kind {
            FilterKind::Custom => self.custom.get(name).map(|group| group.masks(subset)),
            FilterKind::Identity => self
                .identity
                .get(name)
                .map(|group| group.masks(datasets, subset)),
            FilterKind::Value => self
                .value
                .get(name)
                .map(|group| group.masks(datasets, subset)),
        }
        .ok_or_else(|| FilterError::UnknownGroup(name.to_owned()))
    }

    /// Merge every enabled group's masks under `policy`.
    ///
    /// A dataset absent from a group's output is left at the fold's identity
    /// element (all-true for AND, all-false for OR), so a group that doesn't
    /// touch a dataset never penalizes it. Datasets untouched by every
    /// enabled group are absent from the result entirely.
    pub fn recompute(
        &self,
        datasets: &BTreeMap<String, Dataset>,
        policy: MergePolicy,
        subset: Option<&BTreeSet<String>>,
    ) -> BTreeMap<String, RowMask> {
        let mut merged: BTreeMap<String, RowMask> = BTreeMap::new();
        for group in self.custom.values().filter(|group| group.enabled()) {
            merge_into(&mut merged, group.masks(subset), policy);
        }
        for group in self.identity.values().filter(|group| group.enabled()) {
            merge_into(&mut merged, group.masks(datasets, subset), policy);
        }
        for group in self.value.values().filter(|group| group.enabled()) {
            merge_into(&mut merged, group.masks(datasets, subset), policy);
        }
        merged
    }

    /// Purge a removed dataset from every group.
    pub fn on_dataset_removed(&mut self, name: &str) {
        for group in self.custom.values_mut() {
            group.on_dataset_removed(name);
        }
        for group in self.identity.values_mut() {
            group.on_dataset_removed(name);
        }
        for group in self.value.values_mut() {
            group.on_dataset_removed(name);
        }
    }

    /// After a dataset edit, drop whatever no longer validates: custom masks
    /// with stale lengths, identity entries without an identity column, and
    /// predicates whose dataset/field/operand no longer line up.
    pub fn revalidate(&mut self, datasets: &BTreeMap<String, Dataset>) {
        for group in self.custom.values_mut() {
            group.revalidate(datasets);
        }
        for group in self.identity.values_mut() {
            group.revalidate(datasets);
        }
        for group in self.value.values_mut() {
            group.revalidate(datasets);
        }
    }
}

fn merge_into(
    merged: &mut BTreeMap<String, RowMask>,
    group_masks: BTreeMap<String, RowMask>,
    policy: MergePolicy,
) {
    for (name, mask) in group_masks {
        match merged.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(mask);
            }
            Entry::Occupied(mut entry) => match policy {
                MergePolicy::All => entry.get_mut().and_inplace(&mask),
                MergePolicy::Any => entry.get_mut().or_inplace(&mask),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vantage_model::{ColumnSchema, ColumnType, Value};

    fn dataset(name: &str, rows: usize) -> Dataset {
        let mut builder =
            vantage_model::TableBuilder::new(vec![ColumnSchema::new("v", ColumnType::Number)])
                .unwrap();
        for row in 0..rows {
            builder.push_row(&[Value::Number(row as f64)]).unwrap();
        }
        Dataset::new(name, builder.finish(), None, None).unwrap()
    }

    fn datasets() -> BTreeMap<String, Dataset> {
        let mut map = BTreeMap::new();
        map.insert("a".to_owned(), dataset("a", 2));
        map.insert("b".to_owned(), dataset("b", 3));
        map
    }

    fn custom_patch(name: &str, bools: Vec<bool>) -> CustomFilterPatch {
        CustomFilterPatch {
            values: Some(BTreeMap::from([(name.to_owned(), bools)])),
            enabled: None,
        }
    }

    #[test]
    fn duplicate_names_rejected_within_a_kind() {
        let data = datasets();
        let mut registry = FilterRegistry::new();
        registry
            .add_custom(&data, "f", &custom_patch("a", vec![true, false]))
            .unwrap();
        assert_eq!(
            registry
                .add_custom(&data, "f", &custom_patch("a", vec![true, true]))
                .unwrap_err(),
            FilterError::DuplicateName("f".to_owned())
        );
        // Same name in another kind is fine.
        registry
            .add_value(&data, "f", &ValueFilterPatch::default())
            .unwrap();
    }

    #[test]
    fn untouched_datasets_keep_the_fold_identity() {
        let data = datasets();
        let mut registry = FilterRegistry::new();
        registry
            .add_custom(&data, "only-a", &custom_patch("a", vec![true, false]))
            .unwrap();

        let and = registry.recompute(&data, MergePolicy::All, None);
        assert_eq!(and["a"].to_bools(), vec![true, false]);
        assert!(!and.contains_key("b"));

        let or = registry.recompute(&data, MergePolicy::Any, None);
        assert_eq!(or["a"].to_bools(), vec![true, false]);
        assert!(!or.contains_key("b"));
    }

    #[test]
    fn merge_policy_folds_across_groups() {
        let data = datasets();
        let mut registry = FilterRegistry::new();
        registry
            .add_custom(&data, "f1", &custom_patch("a", vec![true, false]))
            .unwrap();
        registry
            .add_custom(&data, "f2", &custom_patch("a", vec![false, false]))
            .unwrap();

        let and = registry.recompute(&data, MergePolicy::All, None);
        assert_eq!(and["a"].to_bools(), vec![false, false]);

        let or = registry.recompute(&data, MergePolicy::Any, None);
        assert_eq!(or["a"].to_bools(), vec![true, false]);
    }

    #[test]
    fn disabled_groups_contribute_nothing() {
        let data = datasets();
        let mut registry = FilterRegistry::new();
        registry
            .add_custom(&data, "f", &custom_patch("a", vec![false, false]))
            .unwrap();
        registry
            .edit_custom(
                &data,
                "f",
                &CustomFilterPatch {
                    values: None,
                    enabled: Some(false),
                },
            )
            .unwrap();
        assert!(registry.recompute(&data, MergePolicy::All, None).is_empty());
    }

    #[test]
    fn subset_restricts_recompute_scope() {
        let data = datasets();
        let mut registry = FilterRegistry::new();
        registry
            .add_custom(&data, "f", &custom_patch("a", vec![true, false]))
            .unwrap();
        let subset = BTreeSet::from(["b".to_owned()]);
        assert!(registry
            .recompute(&data, MergePolicy::All, Some(&subset))
            .is_empty());
    }

    #[test]
    fn states_list_in_natural_order() {
        let data = datasets();
        let mut registry = FilterRegistry::new();
        for name in ["g10", "g2", "g1"] {
            registry
                .add_custom(&data, name, &custom_patch("a", vec![true, true]))
                .unwrap();
        }
        let names: Vec<String> = registry
            .custom_states()
            .into_iter()
            .map(|state| state.name)
            .collect();
        assert_eq!(names, vec!["g1", "g2", "g10"]);
    }

    #[test]
    fn unknown_group_names_error() {
        let data = datasets();
        let mut registry = FilterRegistry::new();
        assert_eq!(
            registry
                .edit_custom(&data, "missing", &CustomFilterPatch::default())
                .unwrap_err(),
            FilterError::UnknownGroup("missing".to_owned())
        );
        assert_eq!(
            registry.remove_value("missing").unwrap_err(),
            FilterError::UnknownGroup("missing".to_owned())
        );
    }
}
