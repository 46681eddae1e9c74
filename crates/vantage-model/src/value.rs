use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar value held by a table column or a filter predicate.
///
/// The enum uses an explicit `{type, value}` tagged layout for stable IPC.
/// Timestamps are always timezone-aware (UTC internally); naive datetimes are
/// not representable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// IEEE-754 double precision number.
    Number(f64),
    /// Timezone-aware timestamp.
    Timestamp(DateTime<Utc>),
    /// Plain text.
    Text(String),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Number(_) => ColumnType::Number,
            Value::Timestamp(_) => ColumnType::Timestamp,
            Value::Text(_) => ColumnType::Text,
        }
    }

    /// Plain-text rendition used by the textual comparison fallback.
    ///
    /// Number formatting follows Rust's shortest round-trip display; timestamps
    /// use RFC 3339. The exact shapes only need to be consistent engine-wide,
    /// not host-locale aware.
    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format!("{n}"),
            Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

/// The homogeneous type of a table column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Number,
    Timestamp,
    Text,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Number => "number",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a filter predicate.
///
/// Serialized as the operator symbol (`">"`, `"=="`, ...) so filter payloads
/// read the way they are written in dialogs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Le => "<=",
            CompareOp::Lt => "<",
        }
    }

    /// Numeric comparison.
    ///
    /// NaN is the numeric "missing" marker: `==` treats two NaNs as equal and
    /// `!=` as not-unequal, while the ordering operators are false whenever
    /// either side is NaN.
    pub fn compare_f64(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => lhs == rhs || (lhs.is_nan() && rhs.is_nan()),
            CompareOp::Ne => !(lhs == rhs || (lhs.is_nan() && rhs.is_nan())),
            CompareOp::Le => lhs <= rhs,
            CompareOp::Lt => lhs < rhs,
        }
    }

    pub fn compare_ord<T: Ord + ?Sized>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Lt => lhs < rhs,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempt the comparison natively; `None` means the operand families are
/// incompatible and the caller should fall back to [`compare_values`]'s
/// textual path.
pub fn try_compare_native(op: CompareOp, lhs: &Value, rhs: &Value) -> Option<bool> {
    match (lhs, rhs) {
        (Value::Number(l), Value::Number(r)) => Some(op.compare_f64(*l, *r)),
        (Value::Timestamp(l), Value::Timestamp(r)) => Some(op.compare_ord(l, r)),
        (Value::Text(l), Value::Text(r)) => Some(op.compare_ord(l.as_str(), r.as_str())),
        _ => None,
    }
}

/// Compare two values, falling back to a lexicographic comparison of their
/// text renditions when the families differ.
///
/// The fallback never fails; cross-type predicates are a documented leniency
/// of the filter engine rather than an error.
pub fn compare_values(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    match try_compare_native(op, lhs, rhs) {
        Some(result) => result,
        None => op.compare_ord(lhs.to_text().as_str(), rhs.to_text().as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn nan_equality_matches_missing_semantics() {
        assert!(CompareOp::Eq.compare_f64(f64::NAN, f64::NAN));
        assert!(!CompareOp::Ne.compare_f64(f64::NAN, f64::NAN));
        assert!(CompareOp::Ne.compare_f64(f64::NAN, 1.0));
        assert!(!CompareOp::Lt.compare_f64(f64::NAN, 1.0));
        assert!(!CompareOp::Ge.compare_f64(1.0, f64::NAN));
    }

    #[test]
    fn native_comparison_covers_matching_families() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            try_compare_native(CompareOp::Lt, &Value::Timestamp(a), &Value::Timestamp(b)),
            Some(true)
        );
        assert_eq!(
            try_compare_native(CompareOp::Gt, &Value::Number(2.0), &Value::Number(1.0)),
            Some(true)
        );
        assert_eq!(
            try_compare_native(CompareOp::Eq, &Value::Number(1.0), &Value::Text("1".into())),
            None
        );
    }

    #[test]
    fn mismatched_families_fall_back_to_text() {
        // "1" == "1" textually even though the families differ.
        assert!(compare_values(
            CompareOp::Eq,
            &Value::Number(1.0),
            &Value::Text("1".into())
        ));
        assert!(compare_values(
            CompareOp::Lt,
            &Value::Number(1.0),
            &Value::Text("2".into())
        ));
    }

    #[test]
    fn compare_op_serde_uses_symbols() {
        assert_eq!(serde_json::to_string(&CompareOp::Ge).unwrap(), "\">=\"");
        let op: CompareOp = serde_json::from_str("\"!=\"").unwrap();
        assert_eq!(op, CompareOp::Ne);
    }

    #[test]
    fn value_serde_is_tagged() {
        let json = serde_json::to_value(Value::Number(1.5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "number", "value": 1.5}));
    }
}
