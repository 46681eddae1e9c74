use crate::mask::RowMask;
use crate::table::{Column, Table};
use crate::time::{epoch_nanos, TimeAxis, TimeValue};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("\"{0}\" is not a valid field name")]
    UnknownColumn(String),
    #[error("time column \"{0}\" must be numeric or timestamp")]
    TimeColumnType(String),
    #[error("time values must all be finite")]
    NonFiniteTime,
    #[error("time values must be monotonic non-decreasing")]
    NonMonotonicTime,
    #[error("mask length {got} doesn't match the row count {expected}")]
    MaskLength { expected: usize, got: usize },
}

/// One named table plus its identity/time column references and the current
/// row-selection masks.
///
/// `filtered_mask` is owned by the filter registry's caller: it is reset to
/// all-true whenever the table is replaced and overwritten with recompute
/// results. `selection_mask` belongs to the (external) selection subsystem;
/// this type only stores it and degrades it gracefully on data replacement.
#[derive(Clone, Debug)]
pub struct Dataset {
    name: String,
    table: Table,
    identity_column: Option<String>,
    time_column: Option<String>,
    filtered_mask: RowMask,
    selection_mask: Option<RowMask>,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        table: Table,
        identity_column: Option<String>,
        time_column: Option<String>,
    ) -> Result<Self, DatasetError> {
        validate_columns(&table, identity_column.as_deref(), time_column.as_deref())?;
        let rows = table.row_count();
        Ok(Self {
            name: name.into(),
            table,
            identity_column,
            time_column,
            filtered_mask: RowMask::all_true(rows),
            selection_mask: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn identity_column(&self) -> Option<&str> {
        self.identity_column.as_deref()
    }

    pub fn time_column(&self) -> Option<&str> {
        self.time_column.as_deref()
    }

    /// The identity column's data, when one is declared.
    pub fn identity_values(&self) -> Option<&Column> {
        self.table.column(self.identity_column.as_deref()?)
    }

    /// Replace the table (and column references) wholesale.
    ///
    /// Validate-then-commit: a failed replacement leaves the dataset exactly
    /// as it was. On success the filtered mask resets to all-true and an
    /// existing selection degrades to an all-false mask of the new length.
    pub fn replace_table(
        &mut self,
        table: Table,
        identity_column: Option<String>,
        time_column: Option<String>,
    ) -> Result<(), DatasetError> {
        validate_columns(&table, identity_column.as_deref(), time_column.as_deref())?;
        let rows = table.row_count();
        self.table = table;
        self.identity_column = identity_column;
        self.time_column = time_column;
        self.filtered_mask = RowMask::all_true(rows);
        if self.selection_mask.is_some() {
            self.selection_mask = Some(RowMask::all_false(rows));
        }
        Ok(())
    }

    pub fn filtered_mask(&self) -> &RowMask {
        &self.filtered_mask
    }

    /// Overwrite the filtered mask (filter registry output).
    pub fn set_filtered_mask(&mut self, mask: RowMask) -> Result<(), DatasetError> {
        if mask.len() != self.table.row_count() {
            return Err(DatasetError::MaskLength {
                expected: self.table.row_count(),
                got: mask.len(),
            });
        }
        self.filtered_mask = mask;
        Ok(())
    }

    pub fn reset_filtered_mask(&mut self) {
        self.filtered_mask = RowMask::all_true(self.table.row_count());
    }

    pub fn selection_mask(&self) -> Option<&RowMask> {
        self.selection_mask.as_ref()
    }

    /// Store a selection produced by the (external) selection subsystem.
    pub fn set_selection_mask(&mut self, mask: RowMask) -> Result<(), DatasetError> {
        if mask.len() != self.table.row_count() {
            return Err(DatasetError::MaskLength {
                expected: self.table.row_count(),
                got: mask.len(),
            });
        }
        self.selection_mask = Some(mask);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection_mask = None;
    }

    /// The dataset's timeline, when a time column is declared.
    pub fn time_axis(&self) -> Option<TimeAxis<'_>> {
        let name = self.time_column.as_deref()?;
        match self.table.column(name)? {
            Column::Number(values) => Some(TimeAxis::Numeric(values)),
            Column::Timestamp(values) => Some(TimeAxis::Timestamp(values)),
            Column::Text(_) => None,
        }
    }

    /// Rows whose time value lies in `(current_time - lookback, current_time]`,
    /// intersected with the filtered mask.
    ///
    /// Without a time column the filtered mask is returned unchanged; without
    /// a lookback the lower bound is unconstrained. A cursor from the wrong
    /// temporal family selects nothing. Both bounds are found by binary search
    /// over the monotonic time column.
    pub fn time_window_mask(&self, current_time: TimeValue, lookback: Option<f64>) -> RowMask {
        let Some(axis) = self.time_axis() else {
            return self.filtered_mask.clone();
        };
        let mut mask = self.filtered_mask.clone();
        match (axis, current_time) {
            (TimeAxis::Numeric(times), TimeValue::Number(now)) => {
                if let Some(lookback) = lookback {
                    let lower = now - lookback;
                    mask.clear_before(times.partition_point(|t| *t <= lower));
                }
                mask.clear_from(times.partition_point(|t| *t <= now));
            }
            (TimeAxis::Timestamp(times), TimeValue::Timestamp(now)) => {
                let now_ns = epoch_nanos(&now);
                if let Some(lookback) = lookback {
                    let lower = now_ns.saturating_sub((lookback * 1e9) as i64);
                    mask.clear_before(times.partition_point(|t| epoch_nanos(t) <= lower));
                }
                mask.clear_from(times.partition_point(|t| epoch_nanos(t) <= now_ns));
            }
            _ => return RowMask::all_false(self.table.row_count()),
        }
        mask
    }
}

/// Minimum and maximum time values across the given datasets.
///
/// `use_filter` restricts the scan to filter-visible rows. Returns `None`
/// when no dataset contributes a time value or when numeric and timestamp
/// timelines are mixed across the set.
pub fn time_limits<'a, I>(datasets: I, use_filter: bool) -> Option<(TimeValue, TimeValue)>
where
    I: IntoIterator<Item = &'a Dataset>,
{
    let mut numeric: Option<(f64, f64)> = None;
    let mut stamped: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> = None;
    for dataset in datasets {
        let Some(axis) = dataset.time_axis() else {
            continue;
        };
        match axis {
            TimeAxis::Numeric(times) => {
                for (row, t) in times.iter().enumerate() {
                    if use_filter && !dataset.filtered_mask.get(row) {
                        continue;
                    }
                    numeric = Some(match numeric {
                        None => (*t, *t),
                        Some((lo, hi)) => (lo.min(*t), hi.max(*t)),
                    });
                }
            }
            TimeAxis::Timestamp(times) => {
                for (row, t) in times.iter().enumerate() {
                    if use_filter && !dataset.filtered_mask.get(row) {
                        continue;
                    }
                    stamped = Some(match stamped {
                        None => (*t, *t),
                        Some((lo, hi)) => (lo.min(*t), hi.max(*t)),
                    });
                }
            }
        }
        if numeric.is_some() && stamped.is_some() {
            return None;
        }
    }
    match (numeric, stamped) {
        (Some((lo, hi)), None) => Some((TimeValue::Number(lo), TimeValue::Number(hi))),
        (None, Some((lo, hi))) => Some((TimeValue::Timestamp(lo), TimeValue::Timestamp(hi))),
        _ => None,
    }
}

fn validate_columns(
    table: &Table,
    identity_column: Option<&str>,
    time_column: Option<&str>,
) -> Result<(), DatasetError> {
    if let Some(name) = identity_column {
        if !table.has_column(name) {
            return Err(DatasetError::UnknownColumn(name.to_owned()));
        }
    }
    if let Some(name) = time_column {
        let column = table
            .column(name)
            .ok_or_else(|| DatasetError::UnknownColumn(name.to_owned()))?;
        match column {
            Column::Text(_) => return Err(DatasetError::TimeColumnType(name.to_owned())),
            Column::Number(values) => {
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(DatasetError::NonFiniteTime);
                }
                if values.windows(2).any(|pair| pair[0] > pair[1]) {
                    return Err(DatasetError::NonMonotonicTime);
                }
            }
            Column::Timestamp(values) => {
                if values.windows(2).any(|pair| pair[0] > pair[1]) {
                    return Err(DatasetError::NonMonotonicTime);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnSchema, TableBuilder};
    use crate::value::{ColumnType, Value};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn numeric_dataset(name: &str, times: &[f64]) -> Dataset {
        let mut builder =
            TableBuilder::new(vec![ColumnSchema::new("t", ColumnType::Number)]).unwrap();
        for t in times {
            builder.push_row(&[Value::Number(*t)]).unwrap();
        }
        Dataset::new(name, builder.finish(), None, Some("t".to_owned())).unwrap()
    }

    #[test]
    fn rejects_non_monotonic_time() {
        let mut builder =
            TableBuilder::new(vec![ColumnSchema::new("t", ColumnType::Number)]).unwrap();
        for t in [0.0, 2.0, 1.0] {
            builder.push_row(&[Value::Number(t)]).unwrap();
        }
        let err = Dataset::new("a", builder.finish(), None, Some("t".to_owned())).unwrap_err();
        assert_eq!(err, DatasetError::NonMonotonicTime);
    }

    #[test]
    fn rejects_non_finite_time() {
        let mut builder =
            TableBuilder::new(vec![ColumnSchema::new("t", ColumnType::Number)]).unwrap();
        builder.push_row(&[Value::Number(f64::NAN)]).unwrap();
        let err = Dataset::new("a", builder.finish(), None, Some("t".to_owned())).unwrap_err();
        assert_eq!(err, DatasetError::NonFiniteTime);
    }

    #[test]
    fn replace_table_is_validate_then_commit() {
        let mut dataset = numeric_dataset("a", &[0.0, 1.0]);
        dataset.set_selection_mask(RowMask::from([true, false])).unwrap();

        let mut bad = TableBuilder::new(vec![ColumnSchema::new("t", ColumnType::Number)]).unwrap();
        for t in [1.0, 0.0] {
            bad.push_row(&[Value::Number(t)]).unwrap();
        }
        let err = dataset
            .replace_table(bad.finish(), None, Some("t".to_owned()))
            .unwrap_err();
        assert_eq!(err, DatasetError::NonMonotonicTime);
        // Prior state untouched.
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.selection_mask().unwrap().to_bools(), vec![true, false]);

        let mut good = TableBuilder::new(vec![ColumnSchema::new("t", ColumnType::Number)]).unwrap();
        for t in [0.0, 1.0, 2.0] {
            good.push_row(&[Value::Number(t)]).unwrap();
        }
        dataset
            .replace_table(good.finish(), None, Some("t".to_owned()))
            .unwrap();
        assert_eq!(dataset.filtered_mask().to_bools(), vec![true; 3]);
        // Selection degrades to all-false of the new length.
        assert_eq!(
            dataset.selection_mask().unwrap().to_bools(),
            vec![false, false, false]
        );
    }

    #[test]
    fn time_window_bounds_are_open_below_and_closed_above() {
        let dataset = numeric_dataset("a", &[0.0, 1.0, 2.0, 3.0, 4.0]);
        let window = dataset.time_window_mask(TimeValue::Number(3.0), Some(2.0));
        // (1, 3]: rows with time 2 and 3.
        assert_eq!(window.to_bools(), vec![false, false, true, true, false]);
    }

    #[test]
    fn time_window_without_lookback_keeps_everything_up_to_now() {
        let dataset = numeric_dataset("a", &[0.0, 1.0, 2.0, 3.0, 4.0]);
        let window = dataset.time_window_mask(TimeValue::Number(2.5), None);
        assert_eq!(window.to_bools(), vec![true, true, true, false, false]);
    }

    #[test]
    fn time_window_intersects_filtered_mask() {
        let mut dataset = numeric_dataset("a", &[0.0, 1.0, 2.0, 3.0]);
        dataset
            .set_filtered_mask(RowMask::from([true, false, true, true]))
            .unwrap();
        let window = dataset.time_window_mask(TimeValue::Number(2.0), None);
        assert_eq!(window.to_bools(), vec![true, false, true, false]);
    }

    #[test]
    fn time_window_mixed_family_selects_nothing() {
        let dataset = numeric_dataset("a", &[0.0, 1.0]);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let window = dataset.time_window_mask(TimeValue::Timestamp(now), None);
        assert_eq!(window.to_bools(), vec![false, false]);
    }

    #[test]
    fn time_limits_respects_filter_and_rejects_mixed_families() {
        let mut a = numeric_dataset("a", &[0.0, 1.0, 2.0]);
        a.set_filtered_mask(RowMask::from([false, true, true])).unwrap();
        assert_eq!(
            time_limits([&a], true),
            Some((TimeValue::Number(1.0), TimeValue::Number(2.0)))
        );
        assert_eq!(
            time_limits([&a], false),
            Some((TimeValue::Number(0.0), TimeValue::Number(2.0)))
        );

        let mut builder =
            TableBuilder::new(vec![ColumnSchema::new("t", ColumnType::Timestamp)]).unwrap();
        builder
            .push_row(&[Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )])
            .unwrap();
        let b = Dataset::new("b", builder.finish(), None, Some("t".to_owned())).unwrap();
        assert_eq!(time_limits([&a, &b], false), None);
    }
}
