//! Dynamically-typed column values.

use serde::{Deserialize, Serialize};

use crate::error::{Error, TypeError};

/// A dynamically-typed value decoded from one result-set cell.
///
/// The variant set mirrors what the text protocol can carry: every integer
/// width widens to `Int`, both float widths widen to `Double`, decimals keep
/// their exact wire text, and everything else is a binary-safe byte string
/// copied at its declared length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,

    /// Signed integer (TINYINT through BIGINT)
    Int(i64),

    /// Floating point (FLOAT and DOUBLE)
    Double(f64),

    /// Fixed-precision decimal, exact text preserved
    Decimal(String),

    /// Raw bytes: strings, blobs, sets, enums and any unrecognized type
    Bytes(Vec<u8>),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL-ish name of this value's type, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INTEGER",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Bytes(_) => "BYTES",
        }
    }

    /// This value as an `i64`, if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// This value as an `f64`.
    ///
    /// Integers and decimal text also convert, since searchd reports
    /// numeric attributes under more than one wire type depending on
    /// version.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// This value as UTF-8 text, if its bytes are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Decimal(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// This value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Decimal(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Convert a `u64`, clamping to `i64::MAX` on overflow.
    ///
    /// For strict conversion that errors on overflow, use `Value::try_from`.
    #[must_use]
    pub fn from_u64_clamped(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(signed) => Value::Int(signed),
            Err(_) => {
                tracing::warn!(
                    value = v,
                    clamped_to = i64::MAX,
                    "u64 value exceeds i64::MAX; clamping"
                );
                Value::Int(i64::MAX)
            }
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(i64::from(v))
            }
        }
    )*};
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! value_from_float {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Double(f64::from(v))
            }
        }
    )*};
}

value_from_float!(f32, f64);

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Bytes(v.into_bytes())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Strict `u64` conversion; errors when the value exceeds `i64::MAX`.
/// Use `Value::from_u64_clamped` for silent clamping instead.
impl TryFrom<u64> for Value {
    type Error = Error;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        i64::try_from(v).map(Value::Int).map_err(|_| {
            Error::Type(TypeError {
                expected: "u64 <= i64::MAX",
                actual: format!("u64 value {v} exceeds i64::MAX"),
                column: None,
            })
        })
    }
}
