//! Record types and their cached field descriptors
//!
//! A [`Record`] lists its fields once as [`FieldDescriptor`]s. The first
//! encode or bind of a record type builds a [`RecordDescriptor`] and stores
//! it in a process-wide cache keyed by [`TypeId`]; every later call reuses
//! the cached copy. Two threads racing on the first use may both build a
//! descriptor, but only the first one inserted is ever handed out.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::decode::{Binder, Decode};
use crate::encode::{Encode, Encoder};
use crate::error::{BindingError, EncodingError};
use crate::value::Value;

/// Declared type of a field or bind target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// Any JSON value
    Any,
    Null,
    Bool,
    Integer,
    Float,
    String,
    /// Homogeneous sequence
    Array(Box<Kind>),
    /// String-keyed map with homogeneous values
    Object(Box<Kind>),
    /// Fixed-size heterogeneous sequence
    Tuple(Vec<Kind>),
    /// A nested record, by name
    Record(&'static str),
    /// `null` or the inner kind
    Optional(Box<Kind>),
    Timestamp,
    Date,
    Bytes,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Any => f.write_str("any"),
            Kind::Null => f.write_str("null"),
            Kind::Bool => f.write_str("bool"),
            Kind::Integer => f.write_str("integer"),
            Kind::Float => f.write_str("float"),
            Kind::String => f.write_str("string"),
            Kind::Array(item) => write!(f, "array<{item}>"),
            Kind::Object(value) => write!(f, "object<{value}>"),
            Kind::Tuple(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Kind::Record(name) => f.write_str(name),
            Kind::Optional(inner) => write!(f, "optional<{inner}>"),
            Kind::Timestamp => f.write_str("timestamp"),
            Kind::Date => f.write_str("date"),
            Kind::Bytes => f.write_str("bytes"),
        }
    }
}

type ReadFn<R> =
    dyn Fn(&R, &mut Encoder<'_>) -> Result<Option<Value>, EncodingError> + Send + Sync;
type WriteFn<R> = dyn Fn(&mut R, &Value, &mut Binder<'_>) -> Result<(), BindingError> + Send + Sync;

/// One field of a record: wire name, declared kind, and its accessors
pub struct FieldDescriptor<R> {
    name: &'static str,
    kind: Kind,
    required: bool,
    read: Box<ReadFn<R>>,
    write: Box<WriteFn<R>>,
}

impl<R: 'static> FieldDescriptor<R> {
    /// Describe a field through a pair of projections onto it.
    ///
    /// ```
    /// use json_bind::FieldDescriptor;
    ///
    /// #[derive(Default)]
    /// struct Point { x: i32 }
    ///
    /// let field = FieldDescriptor::<Point>::new("x", |p| &p.x, |p| &mut p.x);
    /// assert_eq!(field.name(), "x");
    /// ```
    pub fn new<T>(name: &'static str, get: fn(&R) -> &T, get_mut: fn(&mut R) -> &mut T) -> Self
    where
        T: Encode + Decode + 'static,
    {
        Self {
            name,
            kind: T::kind(),
            required: false,
            read: Box::new(
                move |record: &R, encoder: &mut Encoder<'_>| -> Result<Option<Value>, EncodingError> {
                    let field = get(record);
                    if field.is_absent() && !encoder.options().include_nulls {
                        return Ok(None);
                    }
                    encoder.encode(field).map(Some)
                },
            ),
            write: Box::new(
                move |record: &mut R, value: &Value, binder: &mut Binder<'_>| -> Result<(), BindingError> {
                    *get_mut(record) = binder.bind::<T>(value)?;
                    Ok(())
                },
            ),
        }
    }

    /// Fail binding when the field's key is missing from the input
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Use a different key on the wire
    pub fn rename(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Encode the field's current value; `None` when it is omitted
    pub(crate) fn read(
        &self,
        record: &R,
        encoder: &mut Encoder<'_>,
    ) -> Result<Option<Value>, EncodingError> {
        (self.read)(record, encoder)
    }

    /// Bind `value` and store it into the field
    pub(crate) fn write(
        &self,
        record: &mut R,
        value: &Value,
        binder: &mut Binder<'_>,
    ) -> Result<(), BindingError> {
        (self.write)(record, value, binder)
    }
}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .finish()
    }
}

/// A structured type with named fields.
///
/// `Default` is the construction rule: binding starts from a default
/// instance and overwrites the fields present in the input. Most types
/// implement this through the [`record!`](crate::record) macro; hand-written
/// impls pair it with [`impl_record_codec!`](crate::impl_record_codec).
pub trait Record: Default + 'static {
    /// Type name used in diagnostics
    const NAME: &'static str;

    /// Fields in declaration order
    fn fields() -> Vec<FieldDescriptor<Self>>;
}

/// Cached descriptor set of one record type
#[derive(Debug)]
pub struct RecordDescriptor<R> {
    name: &'static str,
    fields: Vec<FieldDescriptor<R>>,
    index: HashMap<&'static str, usize>,
}

impl<R: Record> RecordDescriptor<R> {
    fn build() -> Self {
        let fields = R::fields();
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name, i))
            .collect();
        Self {
            name: R::NAME,
            fields,
            index,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor<R>] {
        &self.fields
    }

    /// Declaration index of the field with this exact wire name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<R>> {
        self.position(name).map(|i| &self.fields[i])
    }
}

type CacheEntry = Arc<dyn Any + Send + Sync>;

static DESCRIPTORS: LazyLock<RwLock<HashMap<TypeId, CacheEntry>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Descriptor set of `R`, built on first use and cached for the process
pub fn descriptor<R: Record>() -> Arc<RecordDescriptor<R>> {
    let type_id = TypeId::of::<R>();

    if let Some(entry) = DESCRIPTORS.read().get(&type_id) {
        return downcast(Arc::clone(entry));
    }

    // Built without holding the lock; a concurrent builder may win the insert
    let built: CacheEntry = Arc::new(RecordDescriptor::<R>::build());
    let entry = Arc::clone(DESCRIPTORS.write().entry(type_id).or_insert_with(|| {
        debug!(record = R::NAME, "caching field descriptors");
        built
    }));
    downcast(entry)
}

fn downcast<R: Record>(entry: CacheEntry) -> Arc<RecordDescriptor<R>> {
    match entry.downcast::<RecordDescriptor<R>>() {
        Ok(descriptor) => descriptor,
        Err(_) => unreachable!("descriptor cache entry for {} has another type", R::NAME),
    }
}

/// Implement [`Encode`] and [`Decode`] for a type that implements [`Record`]
#[macro_export]
macro_rules! impl_record_codec {
    ($ty:ty) => {
        impl $crate::Encode for $ty {
            fn encode(
                &self,
                encoder: &mut $crate::Encoder<'_>,
            ) -> ::std::result::Result<$crate::Value, $crate::EncodingError> {
                encoder.encode_record(self)
            }
        }

        impl $crate::Decode for $ty {
            fn kind() -> $crate::Kind {
                $crate::Kind::Record(<$ty as $crate::Record>::NAME)
            }

            fn decode(
                value: &$crate::Value,
                binder: &mut $crate::Binder<'_>,
            ) -> ::std::result::Result<Self, $crate::BindingError> {
                binder.bind_record(value)
            }
        }
    };
}

/// Declare a struct as a record from its field list.
///
/// Fields are encoded in the order listed; `field as "wireName"` changes the
/// key used on the wire.
///
/// ```
/// use json_bind::{record, to_json_text};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct User {
///     id: i32,
///     display_name: String,
/// }
///
/// record!(User { id, display_name as "displayName" });
///
/// let user = User { id: 7, display_name: "Ada".into() };
/// assert_eq!(to_json_text(&user).unwrap(), r#"{"id":7,"displayName":"Ada"}"#);
/// ```
#[macro_export]
macro_rules! record {
    (@name $field:ident) => {
        stringify!($field)
    };
    (@name $field:ident, $key:literal) => {
        $key
    };
    ($ty:ident { $($field:ident $(as $key:literal)?),* $(,)? }) => {
        impl $crate::Record for $ty {
            const NAME: &'static str = stringify!($ty);

            fn fields() -> ::std::vec::Vec<$crate::FieldDescriptor<Self>> {
                ::std::vec![$(
                    $crate::FieldDescriptor::<$ty>::new(
                        $crate::record!(@name $field $(, $key)?),
                        |r| &r.$field,
                        |r| &mut r.$field,
                    ),
                )*]
            }
        }

        $crate::impl_record_codec!($ty);
    };
}
