//! Type codec between [`Value`] and XML-RPC value elements
//!
//! [`encode`] turns a value into its typed element (`<i4>`, `<struct>`, ...)
//! and [`decode`] reads such an element, or a `<value>` wrapper, back.
//!
//! # Wire mapping
//!
//! | Value | Element |
//! |-------|---------|
//! | `Null` | `<nil/>` |
//! | `Bool` | `<boolean>1</boolean>` / `<boolean>0</boolean>` |
//! | `Integer` | `<i4>` when strictly between -2147483648 and 2147483647, `<double>` otherwise |
//! | `Double` | `<double>` |
//! | `String` | `<string>` |
//! | `Binary` | `<base64>` |
//! | `DateTime` | `<dateTime.iso8601>20240102T03:04:05</dateTime.iso8601>` |
//! | `Array` | `<array><data><value>...</value></data></array>` |
//! | `Struct` | `<struct><member><name>..</name><value>..</value></member></struct>` |
//!
//! Integers outside the `i4` window travel as doubles and come back as
//! `Value::Double`. Both window edges count as outside.
//!
//! # Decoding leniency
//!
//! `<int>` and `<integer>` are read like `<i4>`, `<string>` text and bare
//! `<value>` text are trimmed, base64 may contain line breaks, and dates may
//! use the compact `YYYYMMDDTHHMMSS` layout.
//!
//! ```rust
//! use xrow_core::{codec, Value};
//!
//! let element = codec::encode(&Value::Integer(3_000_000_000)).unwrap();
//! assert_eq!(element.name(), "double");
//! assert_eq!(codec::decode(&element).unwrap(), Value::Double(3e9));
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::value::{Struct, Value, DATETIME_FORMAT, DATETIME_FORMAT_COMPACT};
use crate::xml::{check_chars, Element};

/// Element names of the XML-RPC grammar
pub mod tag {
    pub const METHOD_CALL: &str = "methodCall";
    pub const METHOD_NAME: &str = "methodName";
    pub const METHOD_RESPONSE: &str = "methodResponse";
    pub const PARAMS: &str = "params";
    pub const PARAM: &str = "param";
    pub const FAULT: &str = "fault";
    pub const VALUE: &str = "value";

    pub const NIL: &str = "nil";
    pub const BOOLEAN: &str = "boolean";
    pub const I4: &str = "i4";
    pub const INT: &str = "int";
    pub const INTEGER: &str = "integer";
    pub const DOUBLE: &str = "double";
    pub const STRING: &str = "string";
    pub const BASE64: &str = "base64";
    pub const DATETIME: &str = "dateTime.iso8601";
    pub const ARRAY: &str = "array";
    pub const DATA: &str = "data";
    pub const STRUCT: &str = "struct";
    pub const MEMBER: &str = "member";
    pub const NAME: &str = "name";
}

const I4_LOWER_EXCLUSIVE: i64 = -2_147_483_648;
const I4_UPPER_EXCLUSIVE: i64 = 2_147_483_647;

/// Whether an integer is sent as `<i4>`
pub fn fits_i4(n: i64) -> bool {
    I4_LOWER_EXCLUSIVE < n && n < I4_UPPER_EXCLUSIVE
}

/// Encode a value as its typed element
pub fn encode(value: &Value) -> Result<Element> {
    let element = match value {
        Value::Null => Element::new(tag::NIL),
        Value::Bool(b) => Element::with_text(tag::BOOLEAN, if *b { "1" } else { "0" }),
        Value::Integer(n) if fits_i4(*n) => Element::with_text(tag::I4, n.to_string()),
        Value::Integer(n) => Element::with_text(tag::DOUBLE, n.to_string()),
        Value::Double(d) => Element::with_text(tag::DOUBLE, format_double(*d)?),
        Value::String(s) => Element::with_text(tag::STRING, checked(s)?),
        Value::Binary(bytes) => Element::with_text(tag::BASE64, STANDARD.encode(bytes)),
        Value::DateTime(dt) => {
            Element::with_text(tag::DATETIME, dt.format(DATETIME_FORMAT).to_string())
        }
        Value::Array(items) => {
            let mut data = Element::new(tag::DATA);
            for item in items {
                data.push(encode_value(item)?);
            }
            Element::new(tag::ARRAY).with_child(data)
        }
        Value::Struct(members) => {
            let mut element = Element::new(tag::STRUCT);
            for (name, member) in members.iter() {
                element.push(
                    Element::new(tag::MEMBER)
                        .with_child(Element::with_text(tag::NAME, checked(name)?))
                        .with_child(encode_value(member)?),
                );
            }
            element
        }
    };
    Ok(element)
}

/// Encode a value wrapped in `<value>`
pub fn encode_value(value: &Value) -> Result<Element> {
    Ok(Element::new(tag::VALUE).with_child(encode(value)?))
}

fn checked(text: &str) -> Result<&str> {
    check_chars(text)
        .map(|_| text)
        .map_err(|c| Error::Unencodable(format!("character {:?} cannot appear in XML", c)))
}

fn format_double(d: f64) -> Result<String> {
    if !d.is_finite() {
        return Err(Error::Unencodable(format!("{} has no XML-RPC representation", d)));
    }
    // Debug keeps a fractional part and prints the shortest round-trip digits
    Ok(format!("{:?}", d))
}

/// Decode a typed element or a `<value>` wrapper
pub fn decode(element: &Element) -> Result<Value> {
    match element.name() {
        tag::VALUE => match element.first_child() {
            Some(typed) => decode(typed),
            None => Ok(Value::String(element.text_or_empty().trim().to_string())),
        },
        tag::STRING => Ok(Value::String(element.text_or_empty().trim().to_string())),
        tag::I4 | tag::INT | tag::INTEGER => parse_scalar(tag::I4, element).map(Value::Integer),
        tag::DOUBLE => parse_scalar(tag::DOUBLE, element).map(Value::Double),
        tag::BOOLEAN => parse_scalar::<i64>(tag::BOOLEAN, element).map(|n| Value::Bool(n != 0)),
        tag::NIL => Ok(Value::Null),
        tag::BASE64 => decode_base64(element),
        tag::DATETIME => decode_datetime(element),
        tag::ARRAY => {
            let items = match element.child(tag::DATA) {
                Some(data) => data
                    .children_named(tag::VALUE)
                    .map(decode)
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            Ok(Value::Array(items))
        }
        tag::STRUCT => {
            let mut members = Struct::new();
            for member in element.children_named(tag::MEMBER) {
                let name = member.child(tag::NAME).map(Element::text_or_empty).unwrap_or("");
                let value = member.child(tag::VALUE).ok_or_else(|| {
                    Error::InvalidDocument(format!("struct member {:?} has no value", name))
                })?;
                members.insert(name, decode(value)?);
            }
            Ok(Value::Struct(members))
        }
        other => Err(Error::UnknownTag(other.to_string())),
    }
}

fn parse_scalar<T: std::str::FromStr>(tag: &'static str, element: &Element) -> Result<T> {
    let text = element.text_or_empty().trim();
    text.parse().map_err(|_| Error::InvalidScalar {
        tag,
        text: text.to_string(),
    })
}

fn decode_base64(element: &Element) -> Result<Value> {
    let compact: String = element
        .text_or_empty()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact.as_bytes())
        .map(Value::Binary)
        .map_err(|_| Error::InvalidScalar {
            tag: tag::BASE64,
            text: compact,
        })
}

fn decode_datetime(element: &Element) -> Result<Value> {
    let text = element.text_or_empty().trim();
    [DATETIME_FORMAT, DATETIME_FORMAT_COMPACT]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(Value::DateTime)
        .ok_or_else(|| Error::InvalidScalar {
            tag: tag::DATETIME,
            text: text.to_string(),
        })
}
