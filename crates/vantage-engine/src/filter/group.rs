use crate::filter::error::FilterError;
use crate::filter::identity::apply_identity_policy;
use crate::filter::tree::{evaluate_tree, prune_dataset, prune_invalid, validate_tree};
use ahash::AHashSet;
use std::collections::{BTreeMap, BTreeSet};
use vantage_model::{
    CustomFilterPatch, CustomFilterState, Dataset, FilterNode, IdentityFilterPatch,
    IdentityFilterState, IdentityPolicy, LogicalOp, RowMask, Value, ValueFilterPatch,
    ValueFilterState,
};

/// A filter group holding an explicit per-dataset boolean array.
#[derive(Clone, Debug)]
pub struct CustomFilterGroup {
    name: String,
    values: BTreeMap<String, RowMask>,
    enabled: bool,
}

impl CustomFilterGroup {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            values: BTreeMap::new(),
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Validate and apply a partial update. The supplied fields replace the
    /// stored ones wholesale; nothing is committed unless every field
    /// validates.
    pub fn set_state(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        patch: &CustomFilterPatch,
    ) -> Result<(), FilterError> {
        let staged = match &patch.values {
            None => None,
            Some(supplied) => {
                let mut built = BTreeMap::new();
                for (data_name, bools) in supplied {
                    let dataset = datasets
                        .get(data_name)
                        .ok_or_else(|| FilterError::UnknownDataset(data_name.clone()))?;
                    if bools.len() != dataset.row_count() {
                        return Err(FilterError::MaskLength {
                            dataset: data_name.clone(),
                            expected: dataset.row_count(),
                            got: bools.len(),
                        });
                    }
                    built.insert(data_name.clone(), RowMask::from(&bools[..]));
                }
                Some(built)
            }
        };
        if let Some(values) = staged {
            self.values = values;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        Ok(())
    }

    /// Datasets this group can affect.
    pub fn data_names(&self) -> BTreeSet<String> {
        self.values.keys().cloned().collect()
    }

    pub fn masks(&self, subset: Option<&BTreeSet<String>>) -> BTreeMap<String, RowMask> {
        self.values
            .iter()
            .filter(|(name, _)| subset.is_none_or(|s| s.contains(*name)))
            .map(|(name, mask)| (name.clone(), mask.clone()))
            .collect()
    }

    pub fn on_dataset_removed(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Drop entries invalidated by a dataset edit (length changed or dataset
    /// gone).
    pub(crate) fn revalidate(&mut self, datasets: &BTreeMap<String, Dataset>) {
        self.values.retain(|name, mask| {
            datasets
                .get(name)
                .is_some_and(|dataset| dataset.row_count() == mask.len())
        });
    }

    pub fn state(&self) -> CustomFilterState {
        CustomFilterState {
            name: self.name.clone(),
            values: self
                .values
                .iter()
                .map(|(name, mask)| (name.clone(), mask.to_bools()))
                .collect(),
            enabled: self.enabled,
        }
    }
}

/// A filter group keeping rows whose identity value is in a per-dataset set.
#[derive(Clone, Debug)]
pub struct IdentityFilterGroup {
    name: String,
    values: BTreeMap<String, Vec<Value>>,
    enabled: bool,
}

impl IdentityFilterGroup {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            values: BTreeMap::new(),
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_state(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        patch: &IdentityFilterPatch,
    ) -> Result<(), FilterError> {
        if let Some(supplied) = &patch.values {
            for data_name in supplied.keys() {
                let dataset = datasets
                    .get(data_name)
                    .ok_or_else(|| FilterError::UnknownDataset(data_name.clone()))?;
                if dataset.identity_column().is_none() {
                    return Err(FilterError::NoIdentityColumn(data_name.clone()));
                }
            }
            self.values = supplied.clone();
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        Ok(())
    }

    pub fn data_names(&self) -> BTreeSet<String> {
        self.values.keys().cloned().collect()
    }

    /// Membership masks: a row is kept iff its identity value is in the
    /// group's set for that dataset. Identity values compare as text.
    pub fn masks(
        &self,
        datasets: &BTreeMap<String, Dataset>,
        subset: Option<&BTreeSet<String>>,
    ) -> BTreeMap<String, RowMask> {
        let mut out = BTreeMap::new();
        for (data_name, wanted) in &self.values {
            if subset.is_some_and(|s| !s.contains(data_name)) {
                continue;
            }
            let Some(dataset) = datasets.get(data_name) else {
                continue;
            };
            let Some(column) = dataset.identity_values() else {
                continue;
            };
            let wanted: AHashSet<String> = wanted.iter().map(Value::to_text).collect();
            let mask: RowMask = (0..dataset.row_count())
                .map(|row| {
                    column
                        .text(row)
                        .is_some_and(|identity| wanted.contains(&identity))
                })
                .collect();
            out.insert(data_name.clone(), mask);
        }
        out
    }

    pub fn on_dataset_removed(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub(crate) fn revalidate(&mut self, datasets: &BTreeMap<String, Dataset>) {
        self.values.retain(|name, _| {
            datasets
                .get(name)
                .is_some_and(|dataset| dataset.identity_column().is_some())
        });
    }

    pub fn state(&self) -> IdentityFilterState {
        IdentityFilterState {
            name: self.name.clone(),
            values: self.values.clone(),
            enabled: self.enabled,
        }
    }
}

/// A filter group defined by a predicate tree, optionally collapsed per
/// identity.
#[derive(Clone, Debug)]
pub struct ValueFilterGroup {
    name: String,
    targets: BTreeSet<String>,
    tree: Option<FilterNode>,
    identity_policy: IdentityPolicy,
    enabled: bool,
}

impl ValueFilterGroup {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            targets: BTreeSet::new(),
            tree: None,
            identity_policy: IdentityPolicy::None,
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_state(
        &mut self,
        datasets: &BTreeMap<String, Dataset>,
        patch: &ValueFilterPatch,
    ) -> Result<(), FilterError> {
        let staged_targets = match &patch.targets {
            None => None,
            Some(supplied) => {
                for data_name in supplied {
                    if !datasets.contains_key(data_name) {
                        return Err(FilterError::UnknownDataset(data_name.clone()));
                    }
                }
                Some(supplied.clone())
            }
        };
        let staged_tree = match &patch.tree {
            None => None,
            Some(tree) => Some(validate_tree(tree, datasets)?),
        };
        if let Some(targets) = staged_targets {
            self.targets = targets;
        }
        if let Some(tree) = staged_tree {
            self.tree = Some(tree);
        }
        if let Some(policy) = patch.identity_policy {
            self.identity_policy = policy;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        Ok(())
    }

    pub fn data_names(&self) -> BTreeSet<String> {
        self.targets.clone()
    }

    /// Evaluate the tree against each target dataset.
    ///
    /// With an identity policy set, only targets that declare an identity
    /// column participate, and the per-row result is collapsed/re-expanded
    /// per identity before being returned.
    pub fn masks(
        &self,
        datasets: &BTreeMap<String, Dataset>,
        subset: Option<&BTreeSet<String>>,
    ) -> BTreeMap<String, RowMask> {
        let mut out = BTreeMap::new();
        let Some(tree) = &self.tree else {
            return out;
        };
        for data_name in &self.targets {
            if subset.is_some_and(|s| !s.contains(data_name)) {
                continue;
            }
            let Some(dataset) = datasets.get(data_name) else {
                continue;
            };
            if !self.identity_policy.is_none() && dataset.identity_column().is_none() {
                continue;
            }
            let Some(mut mask) = evaluate_tree(tree, datasets, data_name) else {
                continue;
            };
            if !self.identity_policy.is_none() {
                if let Some(column) = dataset.identity_values() {
                    mask = apply_identity_policy(self.identity_policy, &mask, column);
                }
            }
            out.insert(data_name.clone(), mask);
        }
        out
    }

    /// Drop the dataset from the target set and prune every predicate
    /// referencing it. The root logical node survives even when all children
    /// are pruned; a childless root simply makes the group inert.
    pub fn on_dataset_removed(&mut self, name: &str) {
        self.targets.remove(name);
        if let Some(root) = self.tree.take() {
            let op = root_op(&root);
            self.tree = Some(prune_dataset(root, name).unwrap_or(FilterNode::Logical {
                op,
                children: Vec::new(),
            }));
        }
    }

    pub(crate) fn revalidate(&mut self, datasets: &BTreeMap<String, Dataset>) {
        self.targets.retain(|name| datasets.contains_key(name));
        if let Some(root) = self.tree.take() {
            let op = root_op(&root);
            self.tree = Some(prune_invalid(root, datasets).unwrap_or(FilterNode::Logical {
                op,
                children: Vec::new(),
            }));
        }
    }

    pub fn state(&self) -> ValueFilterState {
        ValueFilterState {
            name: self.name.clone(),
            targets: self.targets.clone(),
            tree: self.tree.clone(),
            identity_policy: self.identity_policy,
            enabled: self.enabled,
        }
    }
}

fn root_op(root: &FilterNode) -> LogicalOp {
    match root {
        FilterNode::Logical { op, .. } => *op,
        // Stored trees always have a logical root (enforced by validation).
        FilterNode::Predicate { .. } => LogicalOp::And,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vantage_model::{ColumnSchema, ColumnType, CompareOp, TableBuilder};

    fn dataset_with_ids(name: &str, ids: &[&str], scores: &[f64]) -> Dataset {
        let mut builder = TableBuilder::new(vec![
            ColumnSchema::new("id", ColumnType::Text),
            ColumnSchema::new("score", ColumnType::Number),
        ])
        .unwrap();
        for (id, score) in ids.iter().zip(scores) {
            builder
                .push_row(&[Value::from(*id), Value::Number(*score)])
                .unwrap();
        }
        Dataset::new(name, builder.finish(), Some("id".to_owned()), None).unwrap()
    }

    fn datasets() -> BTreeMap<String, Dataset> {
        let mut map = BTreeMap::new();
        map.insert(
            "a".to_owned(),
            dataset_with_ids("a", &["x", "z", "y", "z"], &[1.0, 2.0, 3.0, 4.0]),
        );
        map
    }

    #[test]
    fn custom_group_checks_lengths_before_committing() {
        let data = datasets();
        let mut group = CustomFilterGroup::new("c".to_owned());
        group
            .set_state(
                &data,
                &CustomFilterPatch {
                    values: Some(BTreeMap::from([(
                        "a".to_owned(),
                        vec![true, false, true, false],
                    )])),
                    enabled: None,
                },
            )
            .unwrap();

        let err = group
            .set_state(
                &data,
                &CustomFilterPatch {
                    values: Some(BTreeMap::from([("a".to_owned(), vec![true])])),
                    enabled: None,
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::MaskLength {
                dataset: "a".to_owned(),
                expected: 4,
                got: 1,
            }
        );
        // The rejected patch left the stored mask untouched.
        let masks = group.masks(None);
        assert_eq!(masks["a"].to_bools(), vec![true, false, true, false]);
    }

    #[test]
    fn identity_group_membership_mask() {
        let data = datasets();
        let mut group = IdentityFilterGroup::new("ids".to_owned());
        group
            .set_state(
                &data,
                &IdentityFilterPatch {
                    values: Some(BTreeMap::from([(
                        "a".to_owned(),
                        vec![Value::from("x"), Value::from("y")],
                    )])),
                    enabled: None,
                },
            )
            .unwrap();
        let masks = group.masks(&data, None);
        assert_eq!(masks["a"].to_bools(), vec![true, false, true, false]);
    }

    #[test]
    fn identity_group_requires_identity_column() {
        let mut data = datasets();
        let plain = {
            let mut builder =
                TableBuilder::new(vec![ColumnSchema::new("v", ColumnType::Number)]).unwrap();
            builder.push_row(&[Value::Number(1.0)]).unwrap();
            Dataset::new("plain", builder.finish(), None, None).unwrap()
        };
        data.insert("plain".to_owned(), plain);

        let mut group = IdentityFilterGroup::new("ids".to_owned());
        let err = group
            .set_state(
                &data,
                &IdentityFilterPatch {
                    values: Some(BTreeMap::from([("plain".to_owned(), vec![Value::from("x")])])),
                    enabled: None,
                },
            )
            .unwrap_err();
        assert_eq!(err, FilterError::NoIdentityColumn("plain".to_owned()));
    }

    #[test]
    fn value_group_applies_identity_policy_on_top() {
        let data = datasets();
        let mut group = ValueFilterGroup::new("v".to_owned());
        group
            .set_state(
                &data,
                &ValueFilterPatch {
                    targets: Some(BTreeSet::from(["a".to_owned()])),
                    tree: Some(FilterNode::and(vec![FilterNode::predicate(
                        CompareOp::Ge,
                        "a",
                        "score",
                        4.0,
                    )])),
                    identity_policy: Some(IdentityPolicy::AnyMatch),
                    enabled: None,
                },
            )
            .unwrap();
        // score >= 4 selects only the last row (id "z"); any-match keeps every
        // "z" row.
        let masks = group.masks(&data, None);
        assert_eq!(masks["a"].to_bools(), vec![false, true, false, true]);
    }

    #[test]
    fn value_group_prunes_on_dataset_removal() {
        let mut data = datasets();
        data.insert(
            "b".to_owned(),
            dataset_with_ids("b", &["q"], &[1.0]),
        );
        let mut group = ValueFilterGroup::new("v".to_owned());
        group
            .set_state(
                &data,
                &ValueFilterPatch {
                    targets: Some(BTreeSet::from(["a".to_owned(), "b".to_owned()])),
                    tree: Some(FilterNode::and(vec![
                        FilterNode::or(vec![FilterNode::predicate(
                            CompareOp::Gt,
                            "b",
                            "score",
                            0.0,
                        )]),
                        FilterNode::predicate(CompareOp::Gt, "a", "score", 2.0),
                    ])),
                    identity_policy: None,
                    enabled: None,
                },
            )
            .unwrap();

        group.on_dataset_removed("b");
        let state = group.state();
        assert_eq!(state.targets, BTreeSet::from(["a".to_owned()]));
        let tree = state.tree.unwrap();
        assert!(!tree.references_dataset("b"));
        assert_eq!(
            tree,
            FilterNode::and(vec![FilterNode::predicate(CompareOp::Gt, "a", "score", 2.0)])
        );
    }

    #[test]
    fn value_group_with_childless_root_is_inert() {
        let data = datasets();
        let mut group = ValueFilterGroup::new("v".to_owned());
        group
            .set_state(
                &data,
                &ValueFilterPatch {
                    targets: Some(BTreeSet::from(["a".to_owned()])),
                    tree: Some(FilterNode::and(vec![FilterNode::predicate(
                        CompareOp::Gt,
                        "a",
                        "score",
                        2.0,
                    )])),
                    identity_policy: None,
                    enabled: None,
                },
            )
            .unwrap();
        // Removing the only referenced dataset empties the root.
        group.on_dataset_removed("a");
        assert!(group.masks(&data, None).is_empty());
    }
}
