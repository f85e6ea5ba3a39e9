//! [`Value`] -> typed value binding
//!
//! Binding is strict by default: a value of the wrong JSON kind fails with
//! [`BindingError::TypeMismatch`]. The only coercions are between numbers and
//! strings: a string holding exactly one JSON number literal binds to a
//! numeric target, and a number binds to a `String` target as its JSON
//! spelling. Booleans are never coerced.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Display;
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::{Arc, LazyLock};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use tracing::trace;

use crate::bytes::Bytes;
use crate::descriptor::{descriptor, Kind, Record};
use crate::error::BindingError;
use crate::options::CodecOptions;
use crate::parser;
use crate::path::FieldPath;
use crate::render;
use crate::value::{Map, Value};

static NUMBER_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(?:0|[1-9][0-9]*)(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?$")
        .expect("number literal pattern compiles")
});

/// Largest magnitude below which every integer has an exact `f64` (2^53)
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Types that can be built from a [`Value`]
pub trait Decode: Sized {
    /// Declared kind, recorded in field descriptors and error messages
    fn kind() -> Kind;

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError>;
}

/// State of one bind walk
pub struct Binder<'o> {
    options: &'o CodecOptions,
    path: FieldPath,
}

impl<'o> Binder<'o> {
    pub fn new(options: &'o CodecOptions) -> Self {
        Self {
            options,
            path: FieldPath::new(),
        }
    }

    pub fn options(&self) -> &'o CodecOptions {
        self.options
    }

    /// Current location, rendered as a JSON path
    pub fn path(&self) -> String {
        self.path.to_string()
    }

    pub fn bind<T: Decode>(&mut self, value: &Value) -> Result<T, BindingError> {
        T::decode(value, self)
    }

    /// Bind an object onto a fresh default instance of `R`.
    ///
    /// Keys are matched to fields by exact name. Unknown keys are skipped
    /// unless `strict_field_matching` is set; fields without a key keep their
    /// default value unless marked required.
    pub fn bind_record<R: Record>(&mut self, value: &Value) -> Result<R, BindingError> {
        let Value::Object(map) = value else {
            return Err(self.type_mismatch(&Kind::Record(R::NAME), value));
        };

        let descriptor = descriptor::<R>();
        let mut record = R::default();
        let mut seen = vec![false; descriptor.fields().len()];

        for (key, member) in map.iter() {
            let Some(idx) = descriptor.position(key) else {
                if self.options.strict_field_matching {
                    return Err(BindingError::UnknownField {
                        path: self.path(),
                        field: key.to_string(),
                        type_name: R::NAME,
                    });
                }
                trace!(record = R::NAME, field = key, "ignoring unknown field");
                continue;
            };

            self.path.push_field(key);
            let written = descriptor.fields()[idx].write(&mut record, member, self);
            self.path.pop();
            written?;
            seen[idx] = true;
        }

        let missing = descriptor
            .fields()
            .iter()
            .zip(&seen)
            .find(|(field, seen)| field.is_required() && !**seen);
        if let Some((field, _)) = missing {
            return Err(BindingError::MissingRequiredField {
                path: self.path(),
                field: field.name(),
                type_name: R::NAME,
            });
        }

        Ok(record)
    }

    /// Bind every element in order
    pub fn bind_seq<T: Decode>(&mut self, items: &[Value]) -> Result<Vec<T>, BindingError> {
        let mut out = Vec::with_capacity(items.len());
        for idx in 0..items.len() {
            out.push(self.bind_element(items, idx)?);
        }
        Ok(out)
    }

    fn bind_element<T: Decode>(&mut self, items: &[Value], idx: usize) -> Result<T, BindingError> {
        self.path.push_index(idx);
        let bound = T::decode(&items[idx], self);
        self.path.pop();
        bound
    }

    fn bind_array<T: Decode>(&mut self, value: &Value) -> Result<Vec<T>, BindingError> {
        match value {
            Value::Array(items) => self.bind_seq(items),
            other => Err(self.type_mismatch(&Kind::Array(Box::new(T::kind())), other)),
        }
    }

    fn bind_entries<K, V, C>(&mut self, value: &Value) -> Result<C, BindingError>
    where
        K: FromKey,
        V: Decode,
        C: FromIterator<(K, V)>,
    {
        let Value::Object(map) = value else {
            return Err(self.type_mismatch(&Kind::Object(Box::new(V::kind())), value));
        };

        map.iter()
            .map(|(key, member)| {
                let parsed = K::from_key(key).ok_or_else(|| {
                    self.invalid_value(format!("object key {key:?} is not a valid map key"))
                })?;
                self.path.push_field(key);
                let bound = V::decode(member, self);
                self.path.pop();
                Ok((parsed, bound?))
            })
            .collect()
    }

    /// Bind a numeric string through its number value
    fn coerce_numeric_string<T: Decode>(
        &mut self,
        text: &str,
        original: &Value,
    ) -> Result<T, BindingError> {
        match numeric_literal(text) {
            Some(number) => {
                trace!(path = %self.path, "coercing numeric string");
                T::decode(&number, self)
            }
            None => Err(self.type_mismatch(&T::kind(), original)),
        }
    }

    pub fn type_mismatch(&self, expected: &Kind, actual: &Value) -> BindingError {
        BindingError::TypeMismatch {
            path: self.path(),
            expected: expected.to_string(),
            actual: actual.kind_name(),
        }
    }

    pub fn out_of_range(&self, value: impl Display, target: &'static str) -> BindingError {
        BindingError::OutOfRange {
            path: self.path(),
            value: value.to_string(),
            target,
        }
    }

    pub fn length_mismatch(&self, expected: usize, actual: usize) -> BindingError {
        BindingError::LengthMismatch {
            path: self.path(),
            expected,
            actual,
        }
    }

    pub fn invalid_value(&self, reason: impl Into<String>) -> BindingError {
        BindingError::InvalidValue {
            path: self.path(),
            reason: reason.into(),
        }
    }
}

/// The number a string spells, when it is exactly one JSON number literal
fn numeric_literal(text: &str) -> Option<Value> {
    if NUMBER_LITERAL.is_match(text) {
        parser::parse(text).ok()
    } else {
        None
    }
}

/// Types an object key can be bound to
pub trait FromKey: Sized {
    fn from_key(key: &str) -> Option<Self>;
}

impl FromKey for String {
    fn from_key(key: &str) -> Option<Self> {
        Some(key.to_string())
    }
}

impl FromKey for char {
    fn from_key(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

macro_rules! int_from_key {
    ($($t:ty),*) => {
        $(
            impl FromKey for $t {
                fn from_key(key: &str) -> Option<Self> {
                    key.parse().ok()
                }
            }
        )*
    };
}

int_from_key!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

// ============================================================
// Scalars
// ============================================================

impl Decode for bool {
    fn kind() -> Kind {
        Kind::Bool
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(binder.type_mismatch(&Kind::Bool, other)),
        }
    }
}

macro_rules! decode_int {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn kind() -> Kind {
                    Kind::Integer
                }

                fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
                    let wide = match value {
                        Value::Int(i) => i128::from(*i),
                        // Integral doubles (1e3, 2.0) are whole numbers, but only
                        // exact up to 2^53; larger ones already lost digits
                        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                            if f.abs() > MAX_EXACT_FLOAT_INT {
                                return Err(binder.out_of_range(render::render(value), stringify!($t)));
                            }
                            *f as i128
                        }
                        Value::String(s) => return binder.coerce_numeric_string(s, value),
                        other => return Err(binder.type_mismatch(&Kind::Integer, other)),
                    };
                    <$t>::try_from(wide)
                        .map_err(|_| binder.out_of_range(render::render(value), stringify!($t)))
                }
            }
        )*
    };
}

decode_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Decode for f64 {
    fn kind() -> Kind {
        Kind::Float
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        match value {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::String(s) => binder.coerce_numeric_string(s, value),
            other => Err(binder.type_mismatch(&Kind::Float, other)),
        }
    }
}

impl Decode for f32 {
    fn kind() -> Kind {
        Kind::Float
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        let wide = f64::decode(value, binder)?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(binder.out_of_range(wide, "f32"));
        }
        Ok(wide as f32)
    }
}

impl Decode for String {
    fn kind() -> Kind {
        Kind::String
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Int(_) | Value::Float(_) => {
                trace!(path = %binder.path, "coercing number to string");
                Ok(render::render(value))
            }
            other => Err(binder.type_mismatch(&Kind::String, other)),
        }
    }
}

impl Decode for char {
    fn kind() -> Kind {
        Kind::String
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        let Value::String(s) = value else {
            return Err(binder.type_mismatch(&Kind::String, value));
        };
        char::from_key(s)
            .ok_or_else(|| binder.invalid_value(format!("{s:?} is not a single character")))
    }
}

impl Decode for () {
    fn kind() -> Kind {
        Kind::Null
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        match value {
            Value::Null => Ok(()),
            other => Err(binder.type_mismatch(&Kind::Null, other)),
        }
    }
}

impl Decode for Value {
    fn kind() -> Kind {
        Kind::Any
    }

    fn decode(value: &Value, _: &mut Binder<'_>) -> Result<Self, BindingError> {
        Ok(value.clone())
    }
}

impl Decode for Map {
    fn kind() -> Kind {
        Kind::Object(Box::new(Kind::Any))
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        match value {
            Value::Object(map) => Ok(map.clone()),
            other => Err(binder.type_mismatch(&Self::kind(), other)),
        }
    }
}

// ============================================================
// Timestamps and binary
// ============================================================

fn parse_timestamp(text: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    match format {
        Some(format) => DateTime::parse_from_str(text, format)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, format)
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        None => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Strings in `date_format` (RFC 3339 by default), or integers as epoch
/// milliseconds
impl Decode for DateTime<Utc> {
    fn kind() -> Kind {
        Kind::Timestamp
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        match value {
            Value::String(s) => parse_timestamp(s, binder.options().date_format.as_deref())
                .ok_or_else(|| binder.invalid_value(format!("{s:?} is not a valid timestamp"))),
            Value::Int(millis) => DateTime::from_timestamp_millis(*millis)
                .ok_or_else(|| binder.out_of_range(millis, "DateTime<Utc>")),
            other => Err(binder.type_mismatch(&Kind::Timestamp, other)),
        }
    }
}

impl Decode for NaiveDate {
    fn kind() -> Kind {
        Kind::Date
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        let Value::String(s) = value else {
            return Err(binder.type_mismatch(&Kind::Date, value));
        };
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| binder.invalid_value(format!("{s:?} is not a date: {e}")))
    }
}

impl Decode for Bytes {
    fn kind() -> Kind {
        Kind::Bytes
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        let Value::String(s) = value else {
            return Err(binder.type_mismatch(&Kind::Bytes, value));
        };
        BASE64
            .decode(s)
            .map(Bytes)
            .map_err(|e| binder.invalid_value(format!("invalid base64: {e}")))
    }
}

// ============================================================
// Containers
// ============================================================

impl<T: Decode> Decode for Option<T> {
    fn kind() -> Kind {
        Kind::Optional(Box::new(T::kind()))
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        match value {
            Value::Null => Ok(None),
            other => T::decode(other, binder).map(Some),
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn kind() -> Kind {
        Kind::Array(Box::new(T::kind()))
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        binder.bind_array(value)
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    fn kind() -> Kind {
        Kind::Array(Box::new(T::kind()))
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        binder.bind_array(value).map(VecDeque::from)
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn kind() -> Kind {
        Kind::Array(Box::new(T::kind()))
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        let Value::Array(items) = value else {
            return Err(binder.type_mismatch(&Self::kind(), value));
        };
        if items.len() != N {
            return Err(binder.length_mismatch(N, items.len()));
        }
        let bound = binder.bind_seq(items)?;
        <[T; N]>::try_from(bound).map_err(|rest| binder.length_mismatch(N, rest.len()))
    }
}

macro_rules! decode_tuple {
    ($len:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn kind() -> Kind {
                Kind::Tuple(vec![$($name::kind()),+])
            }

            fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
                let Value::Array(items) = value else {
                    return Err(binder.type_mismatch(&Self::kind(), value));
                };
                if items.len() != $len {
                    return Err(binder.length_mismatch($len, items.len()));
                }
                Ok(($(binder.bind_element::<$name>(items, $idx)?,)+))
            }
        }
    };
}

decode_tuple!(2 => A: 0, B: 1);
decode_tuple!(3 => A: 0, B: 1, C: 2);

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: FromKey + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn kind() -> Kind {
        Kind::Object(Box::new(V::kind()))
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        binder.bind_entries(value)
    }
}

impl<K: FromKey + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn kind() -> Kind {
        Kind::Object(Box::new(V::kind()))
    }

    fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
        binder.bind_entries(value)
    }
}

macro_rules! decode_wrapper {
    ($($wrapper:ident),*) => {
        $(
            impl<T: Decode> Decode for $wrapper<T> {
                fn kind() -> Kind {
                    T::kind()
                }

                fn decode(value: &Value, binder: &mut Binder<'_>) -> Result<Self, BindingError> {
                    T::decode(value, binder).map($wrapper::new)
                }
            }
        )*
    };
}

decode_wrapper!(Box, Rc, Arc, RefCell);
