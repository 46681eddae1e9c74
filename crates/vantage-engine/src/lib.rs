#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Filter evaluation engine for Vantage.
//!
//! Given a set of named datasets ([`vantage_model::Dataset`]) and a set of
//! user-defined filter groups, the engine computes one boolean row-selection
//! mask per dataset. Three independently enabled group kinds contribute:
//! explicit per-row masks (custom), identity-membership sets (identity), and
//! predicate trees with logical combinators (value). The registry merges all
//! enabled groups under a caller-supplied AND/OR policy; callers write the
//! result back into each dataset's filtered mask.
//!
//! Everything here is single-threaded and synchronous: `recompute` runs
//! inline on the host's control thread and blocks the triggering UI action.
//! There is no caching between calls; repeated small edits should be batched
//! through the `data_subset` restriction.

pub mod filter;

pub use filter::{
    apply_identity_policy, evaluate_tree, project_time_intervals, validate_tree,
    CustomFilterGroup, FilterError, FilterKind, FilterRegistry, IdentityFilterGroup, MergePolicy,
    ValueFilterGroup,
};
