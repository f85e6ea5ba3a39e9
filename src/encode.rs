//! Typed value -> [`Value`] encoding

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt::{Display, Write as _};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tracing::debug;

use crate::bytes::Bytes;
use crate::descriptor::{descriptor, Record};
use crate::error::EncodingError;
use crate::options::CodecOptions;
use crate::path::FieldPath;
use crate::value::{Map, Value};

/// Types that can be turned into a [`Value`]
pub trait Encode {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError>;

    /// True when a record field holding this value should be left out of
    /// the output (unless `include_nulls` is set)
    fn is_absent(&self) -> bool {
        false
    }
}

/// State of one encode walk
pub struct Encoder<'o> {
    options: &'o CodecOptions,
    path: FieldPath,
    // Records on the current path, by type and address
    visiting: HashSet<(TypeId, usize)>,
}

impl<'o> Encoder<'o> {
    pub fn new(options: &'o CodecOptions) -> Self {
        Self {
            options,
            path: FieldPath::new(),
            visiting: HashSet::new(),
        }
    }

    pub fn options(&self) -> &'o CodecOptions {
        self.options
    }

    /// Current location, rendered as a JSON path
    pub fn path(&self) -> String {
        self.path.to_string()
    }

    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> Result<Value, EncodingError> {
        value.encode(self)
    }

    /// Encode a record as an object, one member per present field.
    ///
    /// Fails with [`EncodingError::CyclicReference`] when `record` is
    /// already being encoded further up the current path.
    pub fn encode_record<R: Record>(&mut self, record: &R) -> Result<Value, EncodingError> {
        let key = (TypeId::of::<R>(), record as *const R as usize);
        if !self.visiting.insert(key) {
            debug!(record = R::NAME, path = %self.path, "cyclic reference detected");
            return Err(EncodingError::CyclicReference {
                path: self.path(),
                type_name: R::NAME,
            });
        }

        let result = self.encode_fields(record);
        self.visiting.remove(&key);
        result
    }

    fn encode_fields<R: Record>(&mut self, record: &R) -> Result<Value, EncodingError> {
        let descriptor = descriptor::<R>();
        let mut map = Map::with_capacity(descriptor.fields().len());

        for field in descriptor.fields() {
            self.path.push_field(field.name());
            let encoded = field.read(record, self);
            self.path.pop();

            if let Some(value) = encoded? {
                map.insert(field.name(), value);
            }
        }

        Ok(Value::Object(map))
    }

    /// Encode each item in order into an array
    pub fn encode_seq<'a, T, I>(&mut self, items: I) -> Result<Value, EncodingError>
    where
        T: Encode + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut out = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            self.path.push_index(i);
            let encoded = item.encode(self);
            self.path.pop();
            out.push(encoded?);
        }
        Ok(Value::Array(out))
    }

    /// Encode key/value pairs into an object. Absent values are omitted
    /// like absent record fields.
    pub fn encode_entries<'a, K, V, I>(&mut self, entries: I) -> Result<Value, EncodingError>
    where
        K: MapKey + 'a,
        V: Encode + 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        let mut map = Map::new();
        for (key, value) in entries {
            if value.is_absent() && !self.options.include_nulls {
                continue;
            }
            let key = key.to_key();
            self.path.push_field(key.as_str());
            let encoded = value.encode(self);
            self.path.pop();
            map.insert(key, encoded?);
        }
        Ok(Value::Object(map))
    }

    pub fn numeric_overflow(&self, value: impl Display) -> EncodingError {
        EncodingError::NumericOverflow {
            path: self.path(),
            value: value.to_string(),
        }
    }

    pub fn unsupported(&self, type_name: &'static str, reason: impl Into<String>) -> EncodingError {
        EncodingError::UnsupportedType {
            path: self.path(),
            type_name,
            reason: reason.into(),
        }
    }

    /// Apply `numeric_precision` and reject values JSON cannot carry
    fn float(&self, f: f64) -> Result<Value, EncodingError> {
        if !f.is_finite() {
            return Err(self.numeric_overflow(f));
        }
        let f = match self.options.numeric_precision {
            Some(digits) => {
                let scale = 10f64.powi(digits as i32);
                let rounded = (f * scale).round() / scale;
                // Scaling very large values overflows; keep them unrounded
                if rounded.is_finite() {
                    rounded
                } else {
                    f
                }
            }
            None => f,
        };
        Ok(Value::Float(f))
    }
}

/// Types usable as object keys
pub trait MapKey {
    fn to_key(&self) -> String;
}

impl MapKey for String {
    fn to_key(&self) -> String {
        self.clone()
    }
}

impl MapKey for &str {
    fn to_key(&self) -> String {
        (*self).to_string()
    }
}

impl MapKey for char {
    fn to_key(&self) -> String {
        self.to_string()
    }
}

macro_rules! int_map_key {
    ($($t:ty),*) => {
        $(
            impl MapKey for $t {
                fn to_key(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

int_map_key!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

// ============================================================
// Scalars
// ============================================================

impl Encode for bool {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::Bool(*self))
    }
}

macro_rules! encode_lossless_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
                    Ok(Value::Int(i64::from(*self)))
                }
            }
        )*
    };
}

encode_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! encode_checked_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
                    i64::try_from(*self)
                        .map(Value::Int)
                        .map_err(|_| encoder.numeric_overflow(self))
                }
            }
        )*
    };
}

encode_checked_int!(isize, i128, u64, usize, u128);

impl Encode for f64 {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        encoder.float(*self)
    }
}

impl Encode for f32 {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        if !self.is_finite() {
            return Err(encoder.numeric_overflow(self));
        }
        // Go through the shortest decimal form so 0.1f32 becomes 0.1, not
        // 0.10000000149011612
        let widened = self.to_string().parse::<f64>().unwrap_or(f64::from(*self));
        encoder.float(widened)
    }
}

impl Encode for char {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::String(self.to_string()))
    }
}

impl Encode for str {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::String(self.to_string()))
    }
}

impl Encode for String {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::String(self.clone()))
    }
}

impl Encode for () {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::Null)
    }
}

impl Encode for Value {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(self.clone())
    }
}

impl Encode for Map {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::Object(self.clone()))
    }
}

// ============================================================
// Timestamps and binary
// ============================================================

impl Encode for DateTime<Utc> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        let Some(format) = encoder.options().date_format.as_deref() else {
            return Ok(Value::String(self.to_rfc3339_opts(SecondsFormat::AutoSi, true)));
        };

        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(encoder.unsupported("DateTime<Utc>", format!("invalid date format {format:?}")));
        }

        let mut out = String::new();
        write!(out, "{}", self.format_with_items(items.iter()))
            .map_err(|_| encoder.unsupported("DateTime<Utc>", format!("cannot format with {format:?}")))?;
        Ok(Value::String(out))
    }
}

impl Encode for NaiveDate {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::String(self.format("%Y-%m-%d").to_string()))
    }
}

impl Encode for Bytes {
    fn encode(&self, _: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        Ok(Value::String(BASE64.encode(self.as_slice())))
    }
}

// ============================================================
// Containers
// ============================================================

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        match self {
            Some(value) => value.encode(encoder),
            None => Ok(Value::Null),
        }
    }

    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        encoder.encode_seq(self)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        encoder.encode_seq(self)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        encoder.encode_seq(self)
    }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        encoder.encode_seq(self)
    }
}

impl<K: MapKey, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        encoder.encode_entries(self)
    }
}

impl<K: MapKey, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        encoder.encode_entries(self)
    }
}

macro_rules! encode_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
                let mut out = Vec::new();
                $(
                    encoder.path.push_index($idx);
                    let encoded = self.$idx.encode(encoder);
                    encoder.path.pop();
                    out.push(encoded?);
                )+
                Ok(Value::Array(out))
            }
        }
    };
}

encode_tuple!(A: 0, B: 1);
encode_tuple!(A: 0, B: 1, C: 2);

// ============================================================
// Pointers
// ============================================================

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        (**self).encode(encoder)
    }

    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        (**self).encode(encoder)
    }

    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

impl<T: Encode + ?Sized> Encode for Rc<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        (**self).encode(encoder)
    }

    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

impl<T: Encode + ?Sized> Encode for Arc<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        (**self).encode(encoder)
    }

    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

impl<T: Encode + ?Sized> Encode for RefCell<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        match self.try_borrow() {
            Ok(inner) => inner.encode(encoder),
            Err(_) => Err(encoder.unsupported("RefCell", "value is mutably borrowed")),
        }
    }
}

/// A dangling `Weak` is absent; a live one encodes its target
impl<T: Encode> Encode for Weak<T> {
    fn encode(&self, encoder: &mut Encoder<'_>) -> Result<Value, EncodingError> {
        match self.upgrade() {
            Some(target) => target.encode(encoder),
            None => Ok(Value::Null),
        }
    }

    fn is_absent(&self) -> bool {
        self.strong_count() == 0
    }
}
