//! Per-field size dispatch.
//!
//! Every declared field is compiled once, when its schema is built, into a
//! [`FieldSizer`]: the precomputed tag length plus a [`FieldKind`] that fixes
//! which size formula applies. Sizing a field is then a pure function of the
//! compiled kind and the runtime value.
//!
//! ```text
//! Packed     tag + varint(P) + P        P = sum of element payloads
//! Repeated   sum(tag + payload(e))
//! Singular   tag + payload(v)           subject to Emission
//! Map        sum(tag + varint(E) + E)   E = entry size, see crate::map
//! ```

use protosize_core::{
    SchemaError, SizeError, WireKind, length_delimited_len, tag_len, varint_len, zigzag_len,
};

use crate::map::MapEntrySizer;
use crate::schema::{Cardinality, FieldDescriptor, ScalarType, SchemaPool};
use crate::value::{FieldValue, MessageValue, Value};

/// When a singular field is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emission {
    /// Omitted when absent or equal to the type's zero value (proto3 scalars).
    NonZero,
    /// Written whenever a value is present, whatever it holds.
    IfPresent,
    /// Always written; an absent value is sized as the type's zero value.
    Always,
}

/// The payload rule for one element of a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    /// A scalar, string, bytes, or enum type. Never `Message` or `Group`.
    Scalar(ScalarType),
    /// A nested message sized through its own schema.
    Message(String),
    /// A custom opaque type that reports its own size.
    Custom(String),
}

impl ElementType {
    fn of(descriptor: &FieldDescriptor) -> Self {
        match (descriptor.custom_type_name(), descriptor.ty()) {
            (Some(name), _) => ElementType::Custom(name.to_owned()),
            (None, ScalarType::Message(name)) => ElementType::Message(name.clone()),
            (None, ty) => ElementType::Scalar(ty.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            ElementType::Scalar(ty) => ty.to_string(),
            ElementType::Message(name) => format!("message `{name}`"),
            ElementType::Custom(name) => format!("custom type `{name}`"),
        }
    }

    /// Bytes one element occupies after its tag. Length-delimited payloads
    /// include their length prefix.
    pub(crate) fn payload_len(
        &self,
        value: &Value,
        cx: &SizeContext<'_>,
    ) -> Result<usize, SizeError> {
        let len = match (self, value) {
            (ElementType::Scalar(ty), value) => match (ty, value) {
                (ScalarType::Double, Value::F64(_))
                | (ScalarType::Fixed64, Value::U64(_))
                | (ScalarType::Sfixed64, Value::I64(_)) => 8,
                (ScalarType::Float, Value::F32(_))
                | (ScalarType::Fixed32, Value::U32(_))
                | (ScalarType::Sfixed32, Value::I32(_)) => 4,
                // negative int32 and enum values are sign-extended to ten bytes
                (ScalarType::Int32, Value::I32(v)) => varint_len(*v as i64 as u64),
                (ScalarType::Enum, Value::Enum(v)) => varint_len(*v as i64 as u64),
                (ScalarType::Int64, Value::I64(v)) => varint_len(*v as u64),
                (ScalarType::Uint32, Value::U32(v)) => varint_len(*v as u64),
                (ScalarType::Uint64, Value::U64(v)) => varint_len(*v),
                (ScalarType::Sint32, Value::I32(v)) => zigzag_len(*v as i64),
                (ScalarType::Sint64, Value::I64(v)) => zigzag_len(*v),
                (ScalarType::Bool, Value::Bool(_)) => 1,
                (ScalarType::String, Value::String(s)) => length_delimited_len(s.len()),
                (ScalarType::Bytes, Value::Bytes(b)) => length_delimited_len(b.len()),
                _ => return Err(cx.mismatch(self, value)),
            },
            (ElementType::Message(name), Value::Message(message)) => {
                length_delimited_len(cx.pool.message_size(name, message)?)
            }
            (ElementType::Custom(name), Value::Custom(custom)) if custom.type_name() == name => {
                length_delimited_len(custom.size())
            }
            _ => return Err(cx.mismatch(self, value)),
        };
        Ok(len)
    }

    /// Payload of the type's zero value, for always-emitted fields left unset.
    fn zero_payload_len(&self, cx: &SizeContext<'_>) -> Result<usize, SizeError> {
        match self {
            ElementType::Scalar(ty) => Ok(ty
                .wire_kind()
                .and_then(|kind| kind.fixed_width())
                // varint zero, false, and the empty length prefix are all one byte
                .unwrap_or(1)),
            ElementType::Message(name) => Ok(length_delimited_len(
                cx.pool.message_size(name, &MessageValue::default())?,
            )),
            ElementType::Custom(_) => Err(SizeError::MissingValue {
                message: cx.message.to_owned(),
                number: cx.number,
            }),
        }
    }
}

/// Zero-value test for proto3 elision. Call after the value type-checked.
fn is_zero(value: &Value) -> bool {
    match value {
        Value::Bool(v) => !v,
        Value::I32(v) | Value::Enum(v) => *v == 0,
        Value::I64(v) => *v == 0,
        Value::U32(v) => *v == 0,
        Value::U64(v) => *v == 0,
        // -0.0 compares equal to 0.0 and is elided as well
        Value::F32(v) => *v == 0.0,
        Value::F64(v) => *v == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Bytes(b) => b.is_empty(),
        Value::Message(_) | Value::Custom(_) => false,
    }
}

/// The closed set of size formulas a field can follow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Singular { ty: ElementType, emission: Emission },
    Repeated { ty: ElementType },
    Packed { ty: ElementType },
    Map(MapEntrySizer),
}

impl FieldKind {
    fn cardinality(&self) -> &'static str {
        match self {
            FieldKind::Singular { .. } => Cardinality::Singular.as_str(),
            FieldKind::Repeated { .. } | FieldKind::Packed { .. } => Cardinality::Repeated.as_str(),
            FieldKind::Map(_) => Cardinality::Map.as_str(),
        }
    }
}

/// Where a size is being computed, for error reporting and nested lookups.
pub(crate) struct SizeContext<'a> {
    pub pool: &'a SchemaPool,
    pub message: &'a str,
    pub number: u32,
}

impl SizeContext<'_> {
    fn mismatch(&self, expected: &ElementType, found: &Value) -> SizeError {
        SizeError::TypeMismatch {
            message: self.message.to_owned(),
            number: self.number,
            expected: expected.describe(),
            found: found.kind_name().to_owned(),
        }
    }

    pub(crate) fn key_mismatch(&self, expected: &ScalarType, found: &'static str) -> SizeError {
        SizeError::TypeMismatch {
            message: self.message.to_owned(),
            number: self.number,
            expected: format!("{expected} key"),
            found: found.to_owned(),
        }
    }
}

/// A compiled field: tag length plus size formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSizer {
    number: u32,
    tag_len: usize,
    kind: FieldKind,
}

impl FieldSizer {
    /// Compile a descriptor for a message with the given syntax.
    ///
    /// Structural validation (packing, map entries, custom types) is done by
    /// the schema builder; this only rejects what has no size formula.
    pub(crate) fn compile(
        message: &str,
        descriptor: &FieldDescriptor,
        proto3: bool,
    ) -> Result<Self, SchemaError> {
        let wire_kind = descriptor
            .wire_kind()
            .ok_or_else(|| SchemaError::UnsupportedEncodingKind {
                message: message.to_owned(),
                field: descriptor.name().to_owned(),
            })?;
        let ty = ElementType::of(descriptor);

        let kind = match descriptor.cardinality() {
            Cardinality::Map => {
                let entry = descriptor.map_entry().ok_or_else(|| SchemaError::InvariantViolation {
                    message: message.to_owned(),
                    field: descriptor.name().to_owned(),
                    reason: "map field has no key/value descriptors".into(),
                })?;
                FieldKind::Map(MapEntrySizer::compile(entry))
            }
            Cardinality::Repeated if descriptor.is_packed() => FieldKind::Packed { ty },
            Cardinality::Repeated => FieldKind::Repeated { ty },
            Cardinality::Singular => {
                let emission = emission(&ty, descriptor, proto3);
                FieldKind::Singular { ty, emission }
            }
        };

        Ok(Self {
            number: descriptor.number(),
            tag_len: tag_len(descriptor.number(), wire_kind),
            kind,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn tag_len(&self) -> usize {
        self.tag_len
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Byte contribution of this field for `value` (`None` when unset).
    pub(crate) fn size(
        &self,
        value: Option<&FieldValue>,
        cx: &SizeContext<'_>,
    ) -> Result<usize, SizeError> {
        match (&self.kind, value) {
            (FieldKind::Singular { ty, emission }, None) => match emission {
                Emission::Always => Ok(self.tag_len + ty.zero_payload_len(cx)?),
                Emission::NonZero | Emission::IfPresent => Ok(0),
            },
            (FieldKind::Singular { ty, emission }, Some(FieldValue::Singular(value))) => {
                let payload = ty.payload_len(value, cx)?;
                if *emission == Emission::NonZero && is_zero(value) {
                    return Ok(0);
                }
                Ok(self.tag_len + payload)
            }
            (FieldKind::Repeated { ty }, Some(FieldValue::Repeated(values))) => {
                values
                    .iter()
                    .try_fold(0, |total, value| -> Result<usize, SizeError> {
                        Ok(total + self.tag_len + ty.payload_len(value, cx)?)
                    })
            }
            (FieldKind::Packed { ty }, Some(FieldValue::Repeated(values))) => {
                if values.is_empty() {
                    return Ok(0);
                }
                let payload = values
                    .iter()
                    .try_fold(0, |total, value| -> Result<usize, SizeError> {
                        Ok(total + ty.payload_len(value, cx)?)
                    })?;
                Ok(self.tag_len + length_delimited_len(payload))
            }
            (FieldKind::Map(entry), Some(FieldValue::Map(entries))) => {
                entry.size(self.tag_len, entries, cx)
            }
            (FieldKind::Repeated { .. } | FieldKind::Packed { .. } | FieldKind::Map(_), None) => {
                Ok(0)
            }
            (kind, Some(found)) => Err(SizeError::CardinalityMismatch {
                message: cx.message.to_owned(),
                number: cx.number,
                expected: kind.cardinality(),
                found: found.shape_name(),
            }),
        }
    }
}

/// Pick the emission rule of a singular field.
///
/// Proto3 scalars are elided at their zero value whatever their nullability;
/// messages and custom types follow nullability in both syntaxes.
fn emission(ty: &ElementType, descriptor: &FieldDescriptor, proto3: bool) -> Emission {
    let nullable = descriptor.is_nullable();
    match ty {
        ElementType::Message(_) | ElementType::Custom(_) if nullable => Emission::IfPresent,
        ElementType::Message(_) | ElementType::Custom(_) => Emission::Always,
        _ if descriptor.is_proto3_optional() => Emission::IfPresent,
        _ if proto3 => Emission::NonZero,
        // plain bytes carry their own presence
        ElementType::Scalar(ScalarType::Bytes) => Emission::IfPresent,
        _ if nullable => Emission::IfPresent,
        _ => Emission::Always,
    }
}

/// Wire kind used by an element inside a map entry.
pub(crate) fn element_wire_kind(ty: &ElementType) -> WireKind {
    match ty {
        ElementType::Scalar(ty) => ty.wire_kind().unwrap_or(WireKind::LengthDelimited),
        ElementType::Message(_) | ElementType::Custom(_) => WireKind::LengthDelimited,
    }
}
