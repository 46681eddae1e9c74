use crate::value::{CompareOp, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Combinator of a logical filter-tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOp {
    And,
    Or,
}

/// Per-identity aggregation applied on top of a value filter group.
///
/// `None` disables aggregation; the other variants collapse a per-row mask to
/// a per-identity decision and re-expand it (match) or its negation
/// (mismatch).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    #[default]
    None,
    AnyMatch,
    AllMatch,
    AnyMismatch,
    AllMismatch,
}

impl IdentityPolicy {
    pub fn is_none(self) -> bool {
        matches!(self, IdentityPolicy::None)
    }
}

/// One node of a value filter tree.
///
/// The root of a stored tree is always [`FilterNode::Logical`]; the engine's
/// validation enforces this, the type deliberately does not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    Logical {
        op: LogicalOp,
        children: Vec<FilterNode>,
    },
    Predicate {
        op: CompareOp,
        dataset: String,
        field: String,
        value: Value,
    },
}

impl FilterNode {
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Logical {
            op: LogicalOp::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Logical {
            op: LogicalOp::Or,
            children,
        }
    }

    pub fn predicate(
        op: CompareOp,
        dataset: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        FilterNode::Predicate {
            op,
            dataset: dataset.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// True if any predicate in the subtree references `dataset`.
    pub fn references_dataset(&self, dataset: &str) -> bool {
        match self {
            FilterNode::Logical { children, .. } => {
                children.iter().any(|child| child.references_dataset(dataset))
            }
            FilterNode::Predicate { dataset: name, .. } => name == dataset,
        }
    }
}

/// Complete state of a custom filter group, as read back by callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomFilterState {
    pub name: String,
    /// Dataset name → explicit per-row selection.
    pub values: BTreeMap<String, Vec<bool>>,
    pub enabled: bool,
}

/// Partial update for a custom filter group; absent fields keep their value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFilterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, Vec<bool>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Complete state of an identity filter group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityFilterState {
    pub name: String,
    /// Dataset name → identity values to keep.
    pub values: BTreeMap<String, Vec<Value>>,
    pub enabled: bool,
}

/// Partial update for an identity filter group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityFilterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, Vec<Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Complete state of a value filter group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueFilterState {
    pub name: String,
    /// Datasets this group applies to.
    pub targets: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<FilterNode>,
    #[serde(default)]
    pub identity_policy: IdentityPolicy,
    pub enabled: bool,
}

/// Partial update for a value filter group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueFilterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<FilterNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_policy: Option<IdentityPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
