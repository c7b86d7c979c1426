//! Wire column types and value decoding.
//!
//! Search daemons answer text-protocol queries, so every cell arrives as a
//! length-encoded byte string plus the column's declared wire type from the
//! result-set metadata. Decoding dispatches on the declared type tag - never
//! on cell content - because blob cells may contain embedded NUL bytes and
//! only the declared length is trustworthy.

use sphinxql_core::Value;

/// Wire type tags from result-set column metadata (the `MYSQL_TYPE_*`
/// codes), in tag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Year = 0x0D,
    VarChar = 0x0F,
    Bit = 0x10,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl FieldType {
    /// Parse a type tag from the metadata byte.
    ///
    /// Tags this client has no special handling for collapse to `String`,
    /// which routes them through the verbatim byte-copy decoder.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Decimal,
            0x01 => Self::Tiny,
            0x02 => Self::Short,
            0x03 => Self::Long,
            0x04 => Self::Float,
            0x05 => Self::Double,
            0x06 => Self::Null,
            0x07 => Self::Timestamp,
            0x08 => Self::LongLong,
            0x09 => Self::Int24,
            0x0A => Self::Date,
            0x0B => Self::Time,
            0x0C => Self::DateTime,
            0x0D => Self::Year,
            0x0F => Self::VarChar,
            0x10 => Self::Bit,
            0xF6 => Self::NewDecimal,
            0xF7 => Self::Enum,
            0xF8 => Self::Set,
            0xF9 => Self::TinyBlob,
            0xFA => Self::MediumBlob,
            0xFB => Self::LongBlob,
            0xFC => Self::Blob,
            0xFD => Self::VarString,
            0xFE => Self::String,
            0xFF => Self::Geometry,
            _ => Self::String,
        }
    }

    /// The decoder for this type tag.
    ///
    /// One entry per tag; adding a wire type means adding one arm here.
    /// Temporal tags deliberately take the byte-copy decoder: the daemon
    /// already sends them as formatted text and this client does not
    /// reinterpret calendar values.
    #[must_use]
    pub fn decoder(self) -> Decoder {
        match self {
            Self::Null => decode_null,
            Self::Tiny | Self::Short => decode_short,
            Self::Long => decode_long,
            Self::Int24 | Self::LongLong => decode_longlong,
            Self::Decimal | Self::NewDecimal => decode_decimal,
            Self::Float | Self::Double => decode_double,
            Self::Timestamp
            | Self::Date
            | Self::Time
            | Self::DateTime
            | Self::Year
            | Self::VarChar
            | Self::Bit
            | Self::Enum
            | Self::Set
            | Self::TinyBlob
            | Self::MediumBlob
            | Self::LongBlob
            | Self::Blob
            | Self::VarString
            | Self::String
            | Self::Geometry => decode_bytes,
        }
    }
}

/// A cell decoder: raw bytes at their declared length in, `Value` out.
pub type Decoder = fn(&[u8]) -> Value;

/// Decode one non-NULL cell using the column's declared type.
#[must_use]
pub fn decode_value(field_type: FieldType, raw: &[u8]) -> Value {
    (field_type.decoder())(raw)
}

fn parse_text<T: std::str::FromStr>(raw: &[u8]) -> Option<T> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn decode_null(_raw: &[u8]) -> Value {
    Value::Null
}

fn decode_short(raw: &[u8]) -> Value {
    parse_text::<i16>(raw).map_or_else(|| Value::Bytes(raw.to_vec()), |v| Value::Int(i64::from(v)))
}

fn decode_long(raw: &[u8]) -> Value {
    parse_text::<i32>(raw).map_or_else(|| Value::Bytes(raw.to_vec()), |v| Value::Int(i64::from(v)))
}

fn decode_longlong(raw: &[u8]) -> Value {
    parse_text::<i64>(raw).map_or_else(|| Value::Bytes(raw.to_vec()), Value::Int)
}

fn decode_double(raw: &[u8]) -> Value {
    parse_text::<f64>(raw).map_or_else(|| Value::Bytes(raw.to_vec()), Value::Double)
}

fn decode_decimal(raw: &[u8]) -> Value {
    Value::Decimal(String::from_utf8_lossy(raw).into_owned())
}

fn decode_bytes(raw: &[u8]) -> Value {
    Value::Bytes(raw.to_vec())
}

/// Flag bits from column metadata.
pub mod column_flags {
    pub const NOT_NULL: u16 = 0x0001;
    pub const UNSIGNED: u16 = 0x0020;
    pub const BINARY: u16 = 0x0080;
}

/// One column's metadata, as sent at the head of a result set.
///
/// The catalog is always "def" and the schema is empty for search daemons;
/// both are kept because the packet carries them.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub catalog: String,
    pub schema: String,
    /// Index name or alias
    pub table: String,
    pub org_table: String,
    /// Column name or alias
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    /// Declared wire type; selects the cell decoder
    pub column_type: FieldType,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDef {
    #[must_use]
    pub const fn is_not_null(&self) -> bool {
        self.flags & column_flags::NOT_NULL != 0
    }

    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED != 0
    }
}

/// Quote and escape a string literal for SphinxQL.
pub fn escape_str(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => result.push_str("\\'"),
            '\\' => result.push_str("\\\\"),
            '\0' => result.push_str("\\0"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(ch),
        }
    }
    result.push('\'');
    result
}

/// Render a `Value` as a SphinxQL literal.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Double(f) => {
            if f.is_finite() {
                f.to_string()
            } else {
                // searchd has no literal for NaN or infinity
                "NULL".to_string()
            }
        }
        Value::Decimal(s) => s.clone(),
        Value::Bytes(b) => escape_str(&String::from_utf8_lossy(b)),
    }
}

/// Interpolate `?` placeholders into a SphinxQL string.
///
/// Placeholders inside single- or double-quoted regions are left alone.
/// Surplus placeholders (more `?` than params) stay verbatim.
pub fn interpolate(sql: &str, params: &[Value]) -> String {
    if params.is_empty() {
        return sql.to_string();
    }

    let mut result = String::with_capacity(sql.len() + params.len() * 8);
    let mut chars = sql.chars().peekable();
    let mut param_index = 0;

    while let Some(ch) = chars.next() {
        match ch {
            '?' => {
                if param_index < params.len() {
                    result.push_str(&format_value(&params[param_index]));
                    param_index += 1;
                } else {
                    result.push('?');
                }
            }
            quote @ ('\'' | '"') => {
                result.push(quote);
                let mut escaped = false;
                for next_ch in chars.by_ref() {
                    result.push(next_ch);
                    if escaped {
                        escaped = false;
                    } else if next_ch == '\\' {
                        escaped = true;
                    } else if next_ch == quote {
                        break;
                    }
                }
            }
            _ => result.push(ch),
        }
    }

    result
}
