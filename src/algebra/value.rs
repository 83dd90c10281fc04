//! Tagged constant values.
//!
//! These are the scalar values an algebra tree can embed as constants.
//! Each tag is preserved exactly through rewriting and lowering: an
//! `Int32` never widens to `Int64` or decays to `Double` on the way to
//! the lowered plan.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use rust_decimal::Decimal;

/// A constant scalar value carried by the algebra.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// IEEE 754 double.
    Double(f64),
    /// High-precision decimal.
    Decimal(Decimal),
    /// Raw engine timestamp (opaque 64-bit value, ordered).
    Timestamp(u64),
    /// Calendar date-time with millisecond precision.
    Date(NaiveDateTime),
    /// Boolean.
    Boolean(bool),
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a date value from milliseconds since the Unix epoch.
    ///
    /// Returns `None` if the millisecond count is outside chrono's
    /// representable range.
    #[must_use]
    pub fn date_from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|dt| Self::Date(dt.naive_utc()))
    }

    /// The name of this value's tag, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Boolean(_) => "boolean",
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this value is the boolean `true`.
    #[must_use]
    pub const fn is_true(&self) -> bool {
        matches!(self, Self::Boolean(true))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}l"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}dec"),
            Self::Timestamp(v) => write!(f, "Timestamp({v})"),
            Self::Date(v) => write!(f, "Date({v})"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}
