use vantage_model::{epoch_nanos, RowMask, TimeAxis};

/// Project a row selection from one timeline onto another.
///
/// The source mask (ordered by the source's monotonic time column) is
/// reinterpreted as a set of closed time intervals: each run of selected rows
/// covers `[time of first selected row, time of last selected row]`, and a
/// run still open at the final row extends to +infinity. Every target row is
/// then classified by which interval it falls in.
///
/// Returns `None` when the two timelines belong to different temporal
/// families; numeric and timestamp axes are never projectable onto each
/// other.
pub fn project_time_intervals(
    source: &TimeAxis<'_>,
    mask: &RowMask,
    target: &TimeAxis<'_>,
) -> Option<RowMask> {
    match (source, target) {
        (TimeAxis::Numeric(source_times), TimeAxis::Numeric(target_times)) => Some(project_inner(
            source_times,
            mask,
            target_times,
            f64::INFINITY,
        )),
        (TimeAxis::Timestamp(source_times), TimeAxis::Timestamp(target_times)) => {
            let source_ns: Vec<i64> = source_times.iter().map(epoch_nanos).collect();
            let target_ns: Vec<i64> = target_times.iter().map(epoch_nanos).collect();
            Some(project_inner(&source_ns, mask, &target_ns, i64::MAX))
        }
        _ => None,
    }
}

fn project_inner<T: Copy + PartialOrd>(
    source_times: &[T],
    mask: &RowMask,
    target_times: &[T],
    open_end: T,
) -> RowMask {
    let breaks = breakpoints(source_times, mask, open_end);
    target_times
        .iter()
        .map(|t| in_selected_interval(&breaks, *t))
        .collect()
}

/// Sorted breakpoint array alternating run start/end times.
fn breakpoints<T: Copy>(times: &[T], mask: &RowMask, open_end: T) -> Vec<T> {
    debug_assert_eq!(times.len(), mask.len(), "mask/timeline length mismatch");
    let mut breaks = Vec::new();
    let mut run_start: Option<usize> = None;
    for row in 0..times.len() {
        if mask.get(row) {
            if run_start.is_none() {
                run_start = Some(row);
            }
        } else if let Some(start) = run_start.take() {
            breaks.push(times[start]);
            // The run's closed end is the last selected row's time.
            breaks.push(times[row - 1]);
        }
    }
    if let Some(start) = run_start {
        breaks.push(times[start]);
        breaks.push(open_end);
    }
    breaks
}

/// A value is selected iff it falls inside a (closed) start/end pair: either
/// an odd number of breakpoints lies strictly below it, or it sits exactly on
/// a breakpoint (both interval edges are inclusive).
fn in_selected_interval<T: Copy + PartialOrd>(breaks: &[T], value: T) -> bool {
    let below = breaks.partition_point(|b| *b < value);
    below % 2 == 1 || breaks.get(below).is_some_and(|b| *b == value)
}
