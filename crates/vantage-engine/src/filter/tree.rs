use crate::filter::error::FilterError;
use crate::filter::project::project_time_intervals;
use std::collections::BTreeMap;
use vantage_model::{
    Column, ColumnType, CompareOp, Dataset, FilterNode, LogicalOp, RowMask, Value,
};

/// Validate a filter tree against the live datasets and return a canonical
/// deep copy.
///
/// The root must be a logical node, logical nodes must have at least one
/// child, every predicate must reference an existing dataset and field, and
/// number/timestamp columns only accept operands of their own family (text
/// columns accept anything and compare textually). The returned copy has
/// value semantics: later mutation of caller-owned nodes cannot corrupt
/// stored filters.
pub fn validate_tree(
    tree: &FilterNode,
    datasets: &BTreeMap<String, Dataset>,
) -> Result<FilterNode, FilterError> {
    if !matches!(tree, FilterNode::Logical { .. }) {
        return Err(FilterError::NonLogicalRoot);
    }
    validate_node(tree, datasets)
}

fn validate_node(
    node: &FilterNode,
    datasets: &BTreeMap<String, Dataset>,
) -> Result<FilterNode, FilterError> {
    match node {
        FilterNode::Logical { op, children } => {
            if children.is_empty() {
                return Err(FilterError::EmptyLogical);
            }
            let children = children
                .iter()
                .map(|child| validate_node(child, datasets))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FilterNode::Logical {
                op: *op,
                children,
            })
        }
        FilterNode::Predicate {
            op,
            dataset,
            field,
            value,
        } => {
            validate_predicate(datasets, dataset, field, value)?;
            Ok(FilterNode::Predicate {
                op: *op,
                dataset: dataset.clone(),
                field: field.clone(),
                value: value.clone(),
            })
        }
    }
}

fn validate_predicate(
    datasets: &BTreeMap<String, Dataset>,
    dataset: &str,
    field: &str,
    value: &Value,
) -> Result<(), FilterError> {
    let owner = datasets
        .get(dataset)
        .ok_or_else(|| FilterError::UnknownDataset(dataset.to_owned()))?;
    let column_type = owner
        .table()
        .column_type(field)
        .ok_or_else(|| FilterError::UnknownField {
            dataset: dataset.to_owned(),
            field: field.to_owned(),
        })?;
    let compatible = match column_type {
        ColumnType::Number => matches!(value, Value::Number(_)),
        ColumnType::Timestamp => matches!(value, Value::Timestamp(_)),
        ColumnType::Text => true,
    };
    if !compatible {
        return Err(FilterError::IncompatibleOperand {
            dataset: dataset.to_owned(),
            field: field.to_owned(),
            value: value.to_text(),
            column_type,
        });
    }
    Ok(())
}

/// Evaluate a filter tree against `target`, bottom-up.
///
/// `None` means the subtree contributes nothing for this target: the
/// predicate's own dataset is gone, or a cross-dataset predicate has no
/// compatible timeline to project along. Contributing nothing is the fold's
/// identity element, so unrelated datasets are never excluded by a predicate
/// they cannot see.
pub fn evaluate_tree(
    tree: &FilterNode,
    datasets: &BTreeMap<String, Dataset>,
    target: &str,
) -> Option<RowMask> {
    match tree {
        FilterNode::Logical { op, children } => {
            let mut acc: Option<RowMask> = None;
            for child in children {
                let Some(mask) = evaluate_tree(child, datasets, target) else {
                    continue;
                };
                acc = Some(match acc.take() {
                    None => mask,
                    Some(mut folded) => {
                        match op {
                            LogicalOp::And => folded.and_inplace(&mask),
                            LogicalOp::Or => folded.or_inplace(&mask),
                        }
                        folded
                    }
                });
            }
            acc
        }
        FilterNode::Predicate {
            op,
            dataset,
            field,
            value,
        } => {
            let owner = datasets.get(dataset)?;
            let mask = predicate_mask(*op, owner, field, value)?;
            if dataset == target {
                return Some(mask);
            }
            let target_dataset = datasets.get(target)?;
            let source_axis = owner.time_axis()?;
            let target_axis = target_dataset.time_axis()?;
            project_time_intervals(&source_axis, &mask, &target_axis)
        }
    }
}

/// Per-row comparison of a column against a predicate operand.
fn predicate_mask(
    op: CompareOp,
    dataset: &Dataset,
    field: &str,
    value: &Value,
) -> Option<RowMask> {
    let column = dataset.table().column(field)?;
    let mask = match (column, value) {
        (Column::Number(cells), Value::Number(rhs)) => {
            cells.iter().map(|lhs| op.compare_f64(*lhs, *rhs)).collect()
        }
        (Column::Timestamp(cells), Value::Timestamp(rhs)) => {
            cells.iter().map(|lhs| op.compare_ord(lhs, rhs)).collect()
        }
        (Column::Text(cells), Value::Text(rhs)) => cells
            .iter()
            .map(|lhs| op.compare_ord(lhs.as_str(), rhs.as_str()))
            .collect(),
        (column, value) => {
            // Families differ: compare text renditions instead of failing.
            let rhs = value.to_text();
            (0..column.len())
                .map(|row| {
                    let lhs = column.text(row).unwrap_or_default();
                    op.compare_ord(lhs.as_str(), rhs.as_str())
                })
                .collect()
        }
    };
    Some(mask)
}

/// Remove every predicate referencing `dataset`; logical nodes left without
/// children are dropped from their parent. Returns `None` when the whole
/// subtree goes away.
pub(crate) fn prune_dataset(node: FilterNode, dataset: &str) -> Option<FilterNode> {
    prune(node, &mut |predicate_dataset, _field, _value| {
        predicate_dataset != dataset
    })
}

/// Remove every predicate that no longer validates against the live datasets
/// (dataset or field gone, operand family now incompatible).
pub(crate) fn prune_invalid(
    node: FilterNode,
    datasets: &BTreeMap<String, Dataset>,
) -> Option<FilterNode> {
    prune(node, &mut |dataset, field, value| {
        validate_predicate(datasets, dataset, field, value).is_ok()
    })
}

fn prune(
    node: FilterNode,
    keep_predicate: &mut dyn FnMut(&str, &str, &Value) -> bool,
) -> Option<FilterNode> {
    match node {
        FilterNode::Logical { op, children } => {
            let children: Vec<FilterNode> = children
                .into_iter()
                .filter_map(|child| prune(child, keep_predicate))
                .collect();
            if children.is_empty() {
                None
            } else {
                Some(FilterNode::Logical { op, children })
            }
        }
        FilterNode::Predicate {
            ref dataset,
            ref field,
            ref value,
            ..
        } => {
            if keep_predicate(dataset, field, value) {
                Some(node)
            } else {
                None
            }
        }
    }
}
