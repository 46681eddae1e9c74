use chrono::{DateTime, Utc};

/// The temporal family of a time column or time cursor.
///
/// Numeric and timestamp timelines are never comparable to each other; every
/// cross-dataset operation first checks the families match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeFamily {
    Numeric,
    Timestamp,
}

/// A time-cursor value supplied by the host (animation control).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeValue {
    Number(f64),
    Timestamp(DateTime<Utc>),
}

impl TimeValue {
    pub fn family(&self) -> TimeFamily {
        match self {
            TimeValue::Number(_) => TimeFamily::Numeric,
            TimeValue::Timestamp(_) => TimeFamily::Timestamp,
        }
    }
}

/// A borrowed view of a dataset's timeline.
///
/// Timestamp axes are exposed in their chrono form; callers needing a uniform
/// numeric representation convert via [`epoch_nanos`].
#[derive(Clone, Copy, Debug)]
pub enum TimeAxis<'a> {
    Numeric(&'a [f64]),
    Timestamp(&'a [DateTime<Utc>]),
}

impl TimeAxis<'_> {
    pub fn family(&self) -> TimeFamily {
        match self {
            TimeAxis::Numeric(_) => TimeFamily::Numeric,
            TimeAxis::Timestamp(_) => TimeFamily::Timestamp,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TimeAxis::Numeric(values) => values.len(),
            TimeAxis::Timestamp(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Epoch nanoseconds for a timestamp, saturating at the `i64` range instead
/// of failing for far-future/far-past values.
pub fn epoch_nanos(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or_else(|| {
        if ts.timestamp() >= 0 {
            i64::MAX
        } else {
            i64::MIN
        }
    })
}
