//! Decoded result rows.

use crate::error::{Error, Result, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared by every row of one result set.
///
/// Handed out as an `Arc`, so the decoder builds it once per result set and
/// all rows point at the same copy. Sharing is also what makes row shape
/// uniform within a result set by construction.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in wire order
    names: Vec<String>,
    /// Name lookup, name -> position
    by_name: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        let mut by_name = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            by_name.insert(name.clone(), position);
        }
        Self { names, by_name }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Name of the column at `index`.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All column names, in wire order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One row of a decoded result set.
///
/// Cells are addressable by position or by column name; name order equals
/// wire column order.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Build a row carrying its own column metadata.
    ///
    /// When several rows come from the same result set, build the
    /// [`ColumnInfo`] once and use [`Row::with_columns`] instead.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: Arc::new(ColumnInfo::new(column_names)),
        }
    }

    /// Build a row over shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// The shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Number of cells in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cell at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Cell under the named column.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let index = self.columns.index_of(name)?;
        self.values.get(index)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Cell at `index`, converted via [`FromValue`].
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        match self.get(index) {
            Some(value) => T::from_value(value),
            None => Err(Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("index {index} out of bounds for {}-column row", self.len()),
                column: None,
            })),
        }
    }

    /// Cell under the named column, converted via [`FromValue`].
    ///
    /// Conversion failures are annotated with the column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let Some(value) = self.get_by_name(name) else {
            return Err(Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{name}' not found"),
                column: Some(name.to_string()),
            }));
        };
        T::from_value(value).map_err(|e| annotate_column(e, name))
    }

    /// All column names, in wire order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over the cells.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column name, cell) pairs, in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values.iter())
    }
}

fn annotate_column(err: Error, name: &str) -> Error {
    match err {
        Error::Type(mut te) => {
            te.column = Some(name.to_string());
            Error::Type(te)
        }
        other => other,
    }
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

/// Conversion from a dynamically-typed [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(*v != 0),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("String", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch("Vec<u8>", value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Narrower integers convert through `i64` with a range check.
macro_rules! from_value_via_i64 {
    ($($ty:ty),* $(,)?) => {$(
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                let wide = i64::from_value(value)?;
                <$ty>::try_from(wide).map_err(|_| {
                    Error::Type(TypeError {
                        expected: stringify!($ty),
                        actual: format!("value {wide} out of range"),
                        column: None,
                    })
                })
            }
        }
    )*};
}

from_value_via_i64!(i8, i16, i32, u8, u16, u32, u64);
