//! The XML-RPC value model
//!
//! Every argument and every result that crosses the wire is a [`Value`]. The
//! enum is closed: the codec matches on it exhaustively, so adding a variant is
//! a compile-time change everywhere it matters.
//!
//! # Structs
//!
//! [`Struct`] keeps its members in insertion order. Inserting a name that is
//! already present replaces the value in place, so the member keeps its
//! original position and the last write wins.
//!
//! # Conversions
//!
//! Native Rust types convert into `Value` through `From`, and back through the
//! [`FromValue`] trait. Conversion failures are reported as
//! `InvalidArguments` faults so that a handler receiving the wrong type of
//! argument answers with a meaningful fault code.
//!
//! ```rust
//! use xrow_core::{FromValue, Struct, Value};
//!
//! let mut point = Struct::new();
//! point.insert("x", 1);
//! point.insert("y", 2.5);
//!
//! let value = Value::from(vec![Value::from("label"), Value::from(point)]);
//! let items: Vec<Value> = Vec::from_value(value).unwrap();
//! assert_eq!(items.len(), 2);
//! ```

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::fault::RpcError;

/// Text layout of `dateTime.iso8601` values on the wire
pub const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Compact layout accepted when decoding
pub const DATETIME_FORMAT_COMPACT: &str = "%Y%m%dT%H%M%S";

/// A single XML-RPC value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `<nil/>`
    Null,
    /// `<boolean>`
    Bool(bool),
    /// `<i4>` on the wire when it fits, `<double>` otherwise
    Integer(i64),
    /// `<double>`
    Double(f64),
    /// `<string>`
    String(String),
    /// `<dateTime.iso8601>`, without a timezone
    DateTime(NaiveDateTime),
    /// `<base64>`
    Binary(Vec<u8>),
    /// `<array>`
    Array(Vec<Value>),
    /// `<struct>`
    Struct(Struct),
}

impl Value {
    /// Short name of the variant, used in conversion error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nil",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::DateTime(_) => "dateTime",
            Value::Binary(_) => "base64",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }
}

/// An ordered collection of named values with unique names
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    members: Vec<(String, Value)>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: Vec::with_capacity(capacity),
        }
    }

    /// Insert a member, returning the previous value if the name existed
    ///
    /// An existing member is replaced in place and keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.members.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.members.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Remove a member, preserving the order of the remaining ones
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.members.iter().position(|(existing, _)| existing == name)?;
        Some(self.members.remove(index).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl IntoIterator for Struct {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Struct
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut s = Struct::new();
        s.extend(iter);
        s
    }
}

impl<K, V> Extend<(K, V)> for Struct
where
    K: Into<String>,
    V: Into<Value>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

/// Raw bytes, carried as `<base64>`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Binary(pub Vec<u8>);

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Binary(bytes)
    }
}

impl From<&[u8]> for Binary {
    fn from(bytes: &[u8]) -> Self {
        Binary(bytes.to_vec())
    }
}

macro_rules! from_small_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Integer(i64::from(n))
                }
            }
        )*
    };
}

from_small_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n)
            .map(Value::Integer)
            .unwrap_or(Value::Double(n as f64))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n)
            .map(Value::Integer)
            .unwrap_or(Value::Double(n as f64))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(d: f32) -> Self {
        Value::Double(f64::from(d))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Binary> for Value {
    fn from(bytes: Binary) -> Self {
        Value::Binary(bytes.0)
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Value::Struct(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(map: BTreeMap<String, V>) -> Self {
        Value::Struct(map.into_iter().collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(map: HashMap<String, V>) -> Self {
        let mut entries: Vec<(String, V)> = map.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Value::Struct(entries.into_iter().collect())
    }
}

/// Conversion from a wire [`Value`] into a native type
///
/// Implemented for the types handlers usually take as arguments. The
/// `from_missing` hook decides what an absent argument means: an error for
/// most types, `None` for `Option<T>`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, RpcError>;

    fn from_missing(name: &str) -> Result<Self, RpcError> {
        Err(RpcError::invalid_arguments(format!(
            "missing required argument '{}'",
            name
        )))
    }
}

fn mismatch(expected: &str, value: &Value) -> RpcError {
    RpcError::invalid_arguments(format!(
        "expected {}, got {}",
        expected,
        value.type_name()
    ))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Integer(n) => Ok(n),
            // wide integers arrive as doubles
            Value::Double(d) if d.fract() == 0.0 && d.abs() < 9.2e18 => Ok(d as i64),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        let n = i64::from_value(value)?;
        i32::try_from(n).map_err(|_| {
            RpcError::invalid_arguments(format!("integer {} out of range for i32", n))
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        value.as_f64().ok_or_else(|| mismatch("double", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(mismatch("dateTime", &other)),
        }
    }
}

impl FromValue for Binary {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Binary(bytes) => Ok(Binary(bytes)),
            other => Err(mismatch("base64", &other)),
        }
    }
}

impl FromValue for Struct {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Struct(s) => Ok(s),
            other => Err(mismatch("struct", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_missing(_name: &str) -> Result<Self, RpcError> {
        Ok(None)
    }
}

/// JSON-friendly rendering, used when values are logged
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.format(DATETIME_FORMAT).to_string())
            }
            Value::Binary(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Struct(s) => s.serialize(serializer),
        }
    }
}

impl Serialize for Struct {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
