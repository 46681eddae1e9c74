use thiserror::Error;
use vantage_model::ColumnType;

/// Validation failures surfaced by `set_state`/`validate_tree`.
///
/// All of these are detected before any mutation (validate-then-commit).
/// Filter *evaluation* never errors: type-incompatible comparisons fall back
/// to text and unprojectable cross-dataset predicates contribute nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("\"{0}\" is not a valid dataset name")]
    UnknownDataset(String),
    #[error("\"{field}\" is not a valid field name for dataset \"{dataset}\"")]
    UnknownField { dataset: String, field: String },
    #[error("dataset \"{0}\" doesn't have an identity column")]
    NoIdentityColumn(String),
    #[error(
        "\"{value}\" cannot be compared with field \"{field}\" in dataset \"{dataset}\" \
         because the column is {column_type}"
    )]
    IncompatibleOperand {
        dataset: String,
        field: String,
        value: String,
        column_type: ColumnType,
    },
    #[error("mask length {got} for dataset \"{dataset}\" doesn't match its row count {expected}")]
    MaskLength {
        dataset: String,
        expected: usize,
        got: usize,
    },
    #[error("a logical node must have at least one child")]
    EmptyLogical,
    #[error("the root of a filter tree must be a logical node")]
    NonLogicalRoot,
    #[error("name \"{0}\" is already in use")]
    DuplicateName(String),
    #[error("\"{0}\" is not a valid filter group name")]
    UnknownGroup(String),
}
