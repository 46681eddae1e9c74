use ahash::AHashMap;
use vantage_model::{Column, IdentityPolicy, RowMask};

/// Collapse a per-row mask to a per-identity decision and re-expand it.
///
/// Rows are grouped by the text rendition of their identity value (one rule
/// for every identity type, so mixed-type identity columns can't split a
/// group by hashing artifacts). Match policies broadcast the group aggregate
/// back to every row of the group; mismatch policies broadcast its negation.
/// The output always has the input's length: this is a re-broadcast, not a
/// reduction.
pub fn apply_identity_policy(
    policy: IdentityPolicy,
    mask: &RowMask,
    identities: &Column,
) -> RowMask {
    if policy.is_none() {
        return mask.clone();
    }
    debug_assert_eq!(identities.len(), mask.len(), "identity/mask length mismatch");

    let keys: Vec<String> = (0..mask.len())
        .map(|row| identities.text(row).unwrap_or_default())
        .collect();

    // AnyMatch and AllMismatch partition rows by `any`; AllMatch and
    // AnyMismatch by `all`.
    let use_any = matches!(
        policy,
        IdentityPolicy::AnyMatch | IdentityPolicy::AllMismatch
    );
    let mut aggregates: AHashMap<&str, bool> = AHashMap::new();
    for (row, key) in keys.iter().enumerate() {
        let bit = mask.get(row);
        aggregates
            .entry(key.as_str())
            .and_modify(|agg| {
                *agg = if use_any { *agg || bit } else { *agg && bit };
            })
            .or_insert(bit);
    }

    let negate = matches!(
        policy,
        IdentityPolicy::AnyMismatch | IdentityPolicy::AllMismatch
    );
    keys.iter()
        .map(|key| {
            let agg = aggregates[key.as_str()];
            if negate {
                !agg
            } else {
                agg
            }
        })
        .collect()
}
