//! Core types for sphinxql-rust.
//!
//! This crate provides the foundational types shared by any front end built
//! on the sphinxql driver:
//!
//! - `Value` for dynamically-typed column values
//! - `Row` and `ColumnInfo` for decoded result rows
//! - `ResultTable` for one statement's decoded result set
//! - The error taxonomy (`Error`, `ConnectionError`, `TypeError`)

pub mod error;
pub mod result;
pub mod row;
pub mod value;

pub use error::{ConnectionError, ConnectionErrorKind, Error, Result, ServerError, TypeError};
pub use result::ResultTable;
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
