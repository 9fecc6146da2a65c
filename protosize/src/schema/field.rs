//! Field descriptors.
//!
//! A [`FieldDescriptor`] describes one declared field of a message: its number,
//! its scalar type, its cardinality, and the annotations that steer how it is
//! emitted (`packed`, `nullable`, `proto3_optional`, `custom_type`).

use protosize_core::WireKind;
use serde::Serialize;

/// The declared type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    /// A nested message, identified by its fully-qualified type name.
    Message(String),
    Enum,
    /// Deprecated group encoding. Accepted by the model only so that schema
    /// construction can reject it.
    Group,
}

impl ScalarType {
    /// Get the protobuf name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Message(_) => "message",
            ScalarType::Enum => "enum",
            ScalarType::Group => "group",
        }
    }

    /// The wire kind an unpacked element of this type is written with.
    ///
    /// Returns `None` for [`ScalarType::Group`].
    pub fn wire_kind(&self) -> Option<WireKind> {
        let kind = match self {
            ScalarType::Double | ScalarType::Fixed64 | ScalarType::Sfixed64 => WireKind::Fixed64,
            ScalarType::Float | ScalarType::Fixed32 | ScalarType::Sfixed32 => WireKind::Fixed32,
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Bool
            | ScalarType::Enum => WireKind::Varint,
            ScalarType::String | ScalarType::Bytes | ScalarType::Message(_) => {
                WireKind::LengthDelimited
            }
            ScalarType::Group => return None,
        };
        Some(kind)
    }

    /// Returns true for types that may use packed encoding: every varint and
    /// fixed-width type, including `bool` and `enum`.
    pub fn is_packable(&self) -> bool {
        matches!(
            self.wire_kind(),
            Some(WireKind::Varint | WireKind::Fixed32 | WireKind::Fixed64)
        )
    }

    /// Returns true for types protobuf permits as map keys.
    pub fn is_valid_map_key(&self) -> bool {
        match self {
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Fixed32
            | ScalarType::Fixed64
            | ScalarType::Sfixed32
            | ScalarType::Sfixed64
            | ScalarType::Bool
            | ScalarType::String
            | ScalarType::Bytes => true,
            ScalarType::Double
            | ScalarType::Float
            | ScalarType::Message(_)
            | ScalarType::Enum
            | ScalarType::Group => false,
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::Message(name) => write!(f, "message `{name}`"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// How many values a field holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Singular,
    Repeated,
    Map,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::Singular => "singular",
            Cardinality::Repeated => "repeated",
            Cardinality::Map => "map",
        }
    }
}

/// The synthetic key (field 1) and value (field 2) descriptors of a map entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapEntry {
    pub key: FieldDescriptor,
    pub value: FieldDescriptor,
}

/// Descriptor of a single declared field.
///
/// # Example
///
/// ```
/// use protosize::schema::{FieldDescriptor, ScalarType};
///
/// let ids = FieldDescriptor::repeated("ids", 4, ScalarType::Int64).packed(true);
/// let title = FieldDescriptor::singular("title", 1, ScalarType::String).nullable(false);
/// let tags = FieldDescriptor::map("tags", 7, ScalarType::String, ScalarType::Int32);
///
/// assert!(ids.is_packed());
/// assert!(!title.is_nullable());
/// assert!(tags.map_entry().is_some());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    ty: ScalarType,
    cardinality: Cardinality,
    packed: bool,
    nullable: bool,
    proto3_optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    map_entry: Option<Box<MapEntry>>,
}

impl FieldDescriptor {
    fn new(name: impl Into<String>, number: u32, ty: ScalarType, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            number,
            ty,
            cardinality,
            packed: false,
            nullable: true,
            proto3_optional: false,
            custom_type: None,
            map_entry: None,
        }
    }

    /// Create a singular field.
    pub fn singular(name: impl Into<String>, number: u32, ty: ScalarType) -> Self {
        Self::new(name, number, ty, Cardinality::Singular)
    }

    /// Create a repeated field. Unpacked unless [`packed`](Self::packed) is set.
    pub fn repeated(name: impl Into<String>, number: u32, ty: ScalarType) -> Self {
        Self::new(name, number, ty, Cardinality::Repeated)
    }

    /// Create a map field with its synthetic key/value descriptors.
    ///
    /// The field's own type is the conventional entry message name
    /// (`foo_bar` becomes `FooBarEntry`).
    pub fn map(name: impl Into<String>, number: u32, key: ScalarType, value: ScalarType) -> Self {
        let name = name.into();
        let entry = MapEntry {
            key: FieldDescriptor::singular("key", 1, key),
            value: FieldDescriptor::singular("value", 2, value),
        };
        Self::map_with_entry(entry_type_name(&name), name, number, entry)
    }

    /// Create a map field from explicit entry descriptors.
    pub fn map_with_entry(
        entry_type: impl Into<String>,
        name: impl Into<String>,
        number: u32,
        entry: MapEntry,
    ) -> Self {
        let mut field = Self::new(
            name,
            number,
            ScalarType::Message(entry_type.into()),
            Cardinality::Map,
        );
        field.map_entry = Some(Box::new(entry));
        field
    }

    /// Set the packed flag (repeated numeric fields only).
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    /// Set whether presence is tracked for this field. Defaults to `true`.
    ///
    /// A non-nullable message or custom-typed field, and a non-nullable
    /// proto2 scalar, is always emitted, even at its zero value.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark a proto3 scalar as `optional` (explicit presence).
    pub fn proto3_optional(mut self, proto3_optional: bool) -> Self {
        self.proto3_optional = proto3_optional;
        self
    }

    /// Attach a custom opaque type whose values report their own size.
    pub fn custom_type(mut self, type_name: impl Into<String>) -> Self {
        self.custom_type = Some(type_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn ty(&self) -> &ScalarType {
        &self.ty
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_proto3_optional(&self) -> bool {
        self.proto3_optional
    }

    pub fn custom_type_name(&self) -> Option<&str> {
        self.custom_type.as_deref()
    }

    pub fn map_entry(&self) -> Option<&MapEntry> {
        self.map_entry.as_deref()
    }

    /// The wire kind of this field's tag: length-delimited for packed and map
    /// fields, the element's own kind otherwise.
    pub fn wire_kind(&self) -> Option<WireKind> {
        if self.packed || self.cardinality == Cardinality::Map {
            return Some(WireKind::LengthDelimited);
        }
        self.ty.wire_kind()
    }
}

/// Conventional entry message name for a map field (`foo_bar` -> `FooBarEntry`).
pub(crate) fn entry_type_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len() + 5);
    let mut upper = true;
    for c in field_name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}
