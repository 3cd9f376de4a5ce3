//! Conversion of accumulated content to typed values.
//!
//! Lexical forms follow the XML Schema built-in types. Surrounding XML
//! whitespace is ignored by every conversion except the string one.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use rust_decimal::Decimal;

use crate::errors::{ConversionError, Error, Result};
use crate::name::split_qname;

/// Requested type of [`XmlRead::read_content_as`](crate::read::XmlRead::read_content_as).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// [`TypedValue::String`]
    String,
    /// [`TypedValue::Boolean`]
    Boolean,
    /// [`TypedValue::Int`]
    Int,
    /// [`TypedValue::Long`]
    Long,
    /// [`TypedValue::Float`]
    Float,
    /// [`TypedValue::Double`]
    Double,
    /// [`TypedValue::Decimal`]
    Decimal,
    /// [`TypedValue::DateTime`]
    DateTime,
    /// [`TypedValue::DateTimeOffset`]
    DateTimeOffset,
    /// [`TypedValue::QualifiedName`], resolved through a [`NamespaceLookup`]
    QualifiedName,
}

/// A value converted from element or attribute content.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    /// `xs:string`
    String(String),
    /// `xs:boolean`
    Boolean(bool),
    /// `xs:int`
    Int(i32),
    /// `xs:long`
    Long(i64),
    /// `xs:float`
    Float(f32),
    /// `xs:double`
    Double(f64),
    /// `xs:decimal`
    Decimal(Decimal),
    /// `xs:dateTime`, normalized to UTC when the lexical form has an offset
    DateTime(NaiveDateTime),
    /// `xs:dateTime` keeping its offset; UTC when the lexical form has none
    DateTimeOffset(DateTime<FixedOffset>),
    /// `xs:QName`
    QualifiedName {
        /// Local part of the name
        local_name: String,
        /// Namespace bound to the prefix of the name
        namespace: String,
    },
}

impl TypedValue {
    /// The value an element without content reads as.
    pub fn empty(value_type: ValueType) -> Self {
        match value_type {
            ValueType::String => TypedValue::String(String::new()),
            ValueType::Boolean => TypedValue::Boolean(false),
            ValueType::Int => TypedValue::Int(0),
            ValueType::Long => TypedValue::Long(0),
            ValueType::Float => TypedValue::Float(0.0),
            ValueType::Double => TypedValue::Double(0.0),
            ValueType::Decimal => TypedValue::Decimal(Decimal::ZERO),
            ValueType::DateTime => TypedValue::DateTime(NaiveDateTime::default()),
            ValueType::DateTimeOffset => {
                TypedValue::DateTimeOffset(DateTime::<FixedOffset>::default())
            }
            ValueType::QualifiedName => TypedValue::QualifiedName {
                local_name: String::new(),
                namespace: String::new(),
            },
        }
    }
}

/// Resolves prefixes of qualified names found in content.
pub trait NamespaceLookup {
    /// Returns the namespace bound to `prefix`, if any.
    fn lookup_namespace(&self, prefix: &str) -> Option<&str>;
}

/// A lexical form outside of the value space of the type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexicalError(&'static str);

impl LexicalError {
    pub(crate) fn new(message: &'static str) -> Self {
        Self(message)
    }
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl StdError for LexicalError {}

fn fail<E>(type_name: &'static str, value: &str, source: E) -> Error
where
    E: StdError + Send + Sync + 'static,
{
    Error::Conversion(ConversionError {
        type_name,
        value: value.to_string(),
        source: Arc::new(source),
        position: None,
    })
}

#[inline]
fn trim(value: &str) -> &str {
    value.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// `true`, `false`, `1` or `0`.
pub fn to_boolean(value: &str) -> Result<bool> {
    match trim(value) {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(fail(
            "boolean",
            value,
            LexicalError("expected `true`, `false`, `1` or `0`"),
        )),
    }
}

/// Decimal digits with an optional sign.
pub fn to_int(value: &str) -> Result<i32> {
    trim(value).parse().map_err(|e| fail("int", value, e))
}

/// Decimal digits with an optional sign.
pub fn to_long(value: &str) -> Result<i64> {
    trim(value).parse().map_err(|e| fail("long", value, e))
}

/// Rejects the spellings of infinity and NaN that Rust accepts but XML
/// Schema does not.
fn check_float_form(type_name: &'static str, value: &str, text: &str) -> Result<()> {
    if text
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E')
    {
        return Err(fail(
            type_name,
            value,
            LexicalError("only `INF`, `-INF` and `NaN` are allowed as special values"),
        ));
    }
    Ok(())
}

/// A floating point number; `INF`, `-INF` and `NaN` are the special values.
pub fn to_float(value: &str) -> Result<f32> {
    match trim(value) {
        "INF" => Ok(f32::INFINITY),
        "-INF" => Ok(f32::NEG_INFINITY),
        "NaN" => Ok(f32::NAN),
        text => {
            check_float_form("float", value, text)?;
            text.parse().map_err(|e| fail("float", value, e))
        }
    }
}

/// A floating point number; `INF`, `-INF` and `NaN` are the special values.
pub fn to_double(value: &str) -> Result<f64> {
    match trim(value) {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        text => {
            check_float_form("double", value, text)?;
            text.parse().map_err(|e| fail("double", value, e))
        }
    }
}

/// A decimal number without exponent.
pub fn to_decimal(value: &str) -> Result<Decimal> {
    let text = trim(value);
    let text = text.strip_prefix('+').unwrap_or(text);
    if text.bytes().any(|b| !matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+')) {
        return Err(fail("decimal", value, LexicalError("invalid decimal")));
    }
    Decimal::from_str(text).map_err(|e| fail("decimal", value, e))
}

/// Splits a trailing `Z` or `+hh:mm` / `-hh:mm` from a date-time.
fn split_offset(text: &str) -> std::result::Result<(&str, Option<FixedOffset>), LexicalError> {
    if let Some(head) = text.strip_suffix('Z') {
        return Ok((head, FixedOffset::east_opt(0)));
    }
    if text.len() > 10 && text.is_char_boundary(text.len() - 6) {
        let (head, tail) = text.split_at(text.len() - 6);
        let bytes = tail.as_bytes();
        if matches!(bytes[0], b'+' | b'-') && bytes[3] == b':' {
            let invalid = LexicalError("invalid time zone offset");
            let hours: i32 = tail[1..3].parse().map_err(|_| invalid)?;
            let minutes: i32 = tail[4..6].parse().map_err(|_| invalid)?;
            if hours > 14 || minutes > 59 {
                return Err(invalid);
            }
            let seconds = (hours * 3600 + minutes * 60) * if bytes[0] == b'-' { -1 } else { 1 };
            return match FixedOffset::east_opt(seconds) {
                Some(offset) => Ok((head, Some(offset))),
                None => Err(invalid),
            };
        }
    }
    Ok((text, None))
}

/// Parses `YYYY-MM-DD` or `YYYY-MM-DDThh:mm:ss[.f]` with an optional offset.
fn parse_date_time(
    type_name: &'static str,
    value: &str,
) -> Result<(NaiveDateTime, Option<FixedOffset>)> {
    let (text, offset) = split_offset(trim(value)).map_err(|e| fail(type_name, value, e))?;
    let naive = if text.contains('T') {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| fail(type_name, value, e))?
    } else {
        let date =
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| fail(type_name, value, e))?;
        match date.and_hms_opt(0, 0, 0) {
            Some(midnight) => midnight,
            None => return Err(fail(type_name, value, LexicalError("invalid date"))),
        }
    };
    Ok((naive, offset))
}

/// A date-time, normalized to UTC when it carries an offset. A bare date is
/// midnight.
pub fn to_date_time(value: &str) -> Result<NaiveDateTime> {
    match parse_date_time("dateTime", value)? {
        (naive, None) => Ok(naive),
        (naive, Some(offset)) => match offset.from_local_datetime(&naive).single() {
            Some(dt) => Ok(dt.naive_utc()),
            None => Err(fail("dateTime", value, LexicalError("ambiguous local time"))),
        },
    }
}

/// A date-time with its offset; UTC is assumed when there is none.
pub fn to_date_time_offset(value: &str) -> Result<DateTime<FixedOffset>> {
    let (naive, offset) = parse_date_time("dateTimeOffset", value)?;
    let offset = match offset.or_else(|| FixedOffset::east_opt(0)) {
        Some(offset) => offset,
        None => return Err(fail("dateTimeOffset", value, LexicalError("invalid offset"))),
    };
    match offset.from_local_datetime(&naive).single() {
        Some(dt) => Ok(dt),
        None => Err(fail(
            "dateTimeOffset",
            value,
            LexicalError("ambiguous local time"),
        )),
    }
}

/// A `prefix:local` or `local` name whose prefix is resolved by `resolver`.
/// An unprefixed name takes the default namespace, if one is bound.
pub fn to_qualified_name(value: &str, resolver: &dyn NamespaceLookup) -> Result<TypedValue> {
    let (prefix, local) = split_qname(trim(value));
    if local.is_empty() {
        return Err(fail("QName", value, LexicalError("empty local name")));
    }
    let namespace = match resolver.lookup_namespace(prefix) {
        Some(ns) => ns.to_string(),
        None if prefix.is_empty() => String::new(),
        None => return Err(fail("QName", value, LexicalError("undeclared prefix"))),
    };
    Ok(TypedValue::QualifiedName {
        local_name: local.to_string(),
        namespace,
    })
}

/// Converts `value` to the requested type.
pub fn convert(
    value_type: ValueType,
    value: String,
    resolver: &dyn NamespaceLookup,
) -> Result<TypedValue> {
    Ok(match value_type {
        ValueType::String => TypedValue::String(value),
        ValueType::Boolean => TypedValue::Boolean(to_boolean(&value)?),
        ValueType::Int => TypedValue::Int(to_int(&value)?),
        ValueType::Long => TypedValue::Long(to_long(&value)?),
        ValueType::Float => TypedValue::Float(to_float(&value)?),
        ValueType::Double => TypedValue::Double(to_double(&value)?),
        ValueType::Decimal => TypedValue::Decimal(to_decimal(&value)?),
        ValueType::DateTime => TypedValue::DateTime(to_date_time(&value)?),
        ValueType::DateTimeOffset => TypedValue::DateTimeOffset(to_date_time_offset(&value)?),
        ValueType::QualifiedName => to_qualified_name(&value, resolver)?,
    })
}
