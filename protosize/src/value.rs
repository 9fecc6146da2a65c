//! Runtime message values.
//!
//! A [`MessageValue`] is the per-instance data the estimator walks: one
//! [`FieldValue`] per populated field number, plus the opaque extension and
//! unrecognized-field byte ranges a decoder retained.
//!
//! Values are plain owned trees, so a value graph is always finite. Schemas may
//! refer to themselves; values cannot.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

/// A single scalar, string, bytes, nested message, or custom value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(i32),
    String(String),
    Bytes(Bytes),
    Message(MessageValue),
    Custom(CustomValue),
}

impl Value {
    /// Short name of the variant, used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Enum(_) => "enum",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
            Value::Custom(_) => "custom",
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    &str => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
    &'static [u8] => Bytes,
    MessageValue => Message,
    CustomValue => Custom,
}

/// A map key. Floating point, message, and enum keys do not exist in protobuf.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
    Bytes(Bytes),
}

impl MapKey {
    pub fn kind_name(&self) -> &'static str {
        match self {
            MapKey::Bool(_) => "bool",
            MapKey::I32(_) => "i32",
            MapKey::I64(_) => "i64",
            MapKey::U32(_) => "u32",
            MapKey::U64(_) => "u64",
            MapKey::String(_) => "string",
            MapKey::Bytes(_) => "bytes",
        }
    }
}

macro_rules! impl_map_key_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MapKey {
                fn from(value: $ty) -> Self {
                    MapKey::$variant(value.into())
                }
            }
        )*
    };
}

impl_map_key_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    String => String,
    &str => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
}

/// The data held for one field number.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Singular(Value),
    Repeated(Vec<Value>),
    Map(HashMap<MapKey, Value>),
}

impl FieldValue {
    /// Shape name matching [`Cardinality::as_str`](crate::schema::Cardinality::as_str).
    pub fn shape_name(&self) -> &'static str {
        match self {
            FieldValue::Singular(_) => "singular",
            FieldValue::Repeated(_) => "repeated",
            FieldValue::Map(_) => "map",
        }
    }
}

/// A decoded or still-encoded extension entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Extension {
    /// Already-serialized bytes (tag included), counted by length.
    Encoded(Bytes),
    /// A decoded value, sized through the schema's extension descriptor.
    Field(FieldValue),
}

/// Extension storage of a message value.
#[derive(Clone, Debug, PartialEq)]
pub enum Extensions {
    /// One opaque, already-serialized byte range.
    Encoded(Bytes),
    /// Per-number entries.
    Map(BTreeMap<u32, Extension>),
}

/// A self-sizing opaque type stored in a custom-typed field.
///
/// Implementations must report the exact number of bytes [`encode`](Self::encode)
/// writes.
pub trait CustomType: Send + Sync + std::fmt::Debug + 'static {
    /// Name matching the `custom_type` marker on the field descriptor.
    fn type_name(&self) -> &str;

    /// Encoded length in bytes, excluding tag and length prefix.
    fn size(&self) -> usize;

    /// Write the encoded bytes.
    fn encode(&self, buf: &mut BytesMut);
}

/// A shared handle to a [`CustomType`] value.
#[derive(Clone, Debug)]
pub struct CustomValue(Arc<dyn CustomType>);

impl CustomValue {
    pub fn new<T: CustomType>(value: T) -> Self {
        CustomValue(Arc::new(value))
    }

    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    pub fn size(&self) -> usize {
        self.0.size()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf)
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Field data of one message instance.
///
/// # Example
///
/// ```
/// use protosize::value::{MessageValue, Value};
///
/// let mut inner = MessageValue::new();
/// inner.set(1, "nested");
///
/// let value = MessageValue::new()
///     .with_field(1, 42i32)
///     .with_repeated(2, [1i64, 300])
///     .with_entry(3, "weight", 7i32)
///     .with_field(4, inner);
///
/// assert_eq!(value.len(), 4);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageValue {
    fields: BTreeMap<u32, FieldValue>,
    extensions: Option<Extensions>,
    unknown_fields: Option<Bytes>,
}

impl MessageValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a singular field, replacing any previous value.
    pub fn set(&mut self, number: u32, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(number, FieldValue::Singular(value.into()));
        self
    }

    /// Set the raw field value for `number`.
    pub fn set_field(&mut self, number: u32, value: FieldValue) -> &mut Self {
        self.fields.insert(number, value);
        self
    }

    /// Append to a repeated field, creating it if needed.
    ///
    /// A singular or map value already stored under `number` is replaced.
    pub fn push(&mut self, number: u32, value: impl Into<Value>) -> &mut Self {
        let entry = self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::Repeated(Vec::new()));
        match entry {
            FieldValue::Repeated(values) => values.push(value.into()),
            other => *other = FieldValue::Repeated(vec![value.into()]),
        }
        self
    }

    /// Insert a map entry, creating the map if needed.
    ///
    /// A singular or repeated value already stored under `number` is replaced.
    pub fn insert(
        &mut self,
        number: u32,
        key: impl Into<MapKey>,
        value: impl Into<Value>,
    ) -> &mut Self {
        let entry = self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::Map(HashMap::new()));
        if !matches!(entry, FieldValue::Map(_)) {
            *entry = FieldValue::Map(HashMap::new());
        }
        if let FieldValue::Map(map) = entry {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Remove a field, returning it to the absent state.
    pub fn clear(&mut self, number: u32) -> Option<FieldValue> {
        self.fields.remove(&number)
    }

    pub fn get(&self, number: u32) -> Option<&FieldValue> {
        self.fields.get(&number)
    }

    /// Populated fields in ascending field-number order.
    pub fn fields(&self) -> impl Iterator<Item = (u32, &FieldValue)> {
        self.fields.iter().map(|(number, value)| (*number, value))
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.extensions.is_none() && self.unknown_fields.is_none()
    }

    pub fn set_extensions(&mut self, extensions: Extensions) -> &mut Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    /// Store bytes of fields the decoder did not recognize.
    pub fn set_unknown_fields(&mut self, bytes: impl Into<Bytes>) -> &mut Self {
        self.unknown_fields = Some(bytes.into());
        self
    }

    pub fn unknown_fields(&self) -> Option<&Bytes> {
        self.unknown_fields.as_ref()
    }

    // Consuming variants for building values inline.

    pub fn with_field(mut self, number: u32, value: impl Into<Value>) -> Self {
        self.set(number, value);
        self
    }

    pub fn with_repeated<V: Into<Value>>(
        mut self,
        number: u32,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.fields.insert(number, FieldValue::Repeated(values));
        self
    }

    pub fn with_entry(
        mut self,
        number: u32,
        key: impl Into<MapKey>,
        value: impl Into<Value>,
    ) -> Self {
        self.insert(number, key, value);
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_unknown_fields(mut self, bytes: impl Into<Bytes>) -> Self {
        self.unknown_fields = Some(bytes.into());
        self
    }
}
